use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tracing::{error, info, warn, Instrument};

use crate::{
    auth::{
        claims::{Claims, Role},
        dto::{
            AuthResponse, CreateAdminRequest, LoginRequest, RegisterRequest,
            ResetPasswordRequest, VerifyAdminRequest,
        },
        password::{hash_password, verify_against_dummy, verify_password, MIN_PASSWORD_LEN},
        repo::{NewUser, PublicUser, StoreError},
        tokens::{generate_token, secrets_match},
    },
    error::{AppError, AppResult},
    mailer::{password_reset_email, verification_email, OutgoingEmail},
    state::AppState,
};

/// How long a password reset link stays usable.
pub const RESET_TOKEN_TTL: Duration = Duration::hours(1);

pub const REGISTERED_MSG: &str = "User registered. Please check your email for verification.";
pub const VERIFIED_MSG: &str = "Email verified successfully";
pub const RESENT_MSG: &str = "Verification email sent. Please check your inbox.";
pub const FORGOT_PASSWORD_MSG: &str =
    "If an account exists for that email, a password reset link has been sent.";
pub const PASSWORD_RESET_MSG: &str = "Password has been reset successfully";
pub const ADMIN_CREATED_MSG: &str = "Admin account created successfully";
pub const ADMIN_VERIFIED_MSG: &str = "Admin account verified successfully";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validated_email(raw: &str) -> AppResult<String> {
    let email = normalize_email(raw);
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    Ok(email)
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Best effort: a failed delivery is logged and the committed change stays.
async fn deliver(state: &AppState, email: OutgoingEmail) {
    let to = email.to.clone();
    if let Err(e) = state.mailer.send(email).await {
        warn!(error = ?e, to = %to, "email delivery failed");
    }
}

/// Sends on a detached task so the caller's latency does not depend on the relay.
fn deliver_detached(state: &AppState, email: OutgoingEmail) {
    let mailer = state.mailer.clone();
    tokio::spawn(
        async move {
            let to = email.to.clone();
            if let Err(e) = mailer.send(email).await {
                warn!(error = ?e, to = %to, "email delivery failed");
            }
        }
        .in_current_span(),
    );
}

pub async fn register(state: &AppState, req: RegisterRequest) -> AppResult<()> {
    let email = validated_email(&req.email)?;
    validate_password(&req.password)?;

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::DuplicateEmail);
    }

    let hash = hash_password(&req.password).map_err(AppError::RegistrationFailed)?;
    let token = generate_token();

    let user = state
        .users
        .create(NewUser {
            email: &email,
            password_hash: &hash,
            role: Role::Standard,
            is_email_verified: false,
            verification_token: Some(&token),
        })
        .await
        .map_err(|e| match e {
            StoreError::DuplicateEmail => {
                warn!(email = %email, "email registered concurrently");
                AppError::DuplicateEmail
            }
            StoreError::Database(e) => AppError::RegistrationFailed(anyhow::Error::new(e)),
        })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    deliver(
        state,
        verification_email(&state.config.app_base_url, &user.email, &token),
    )
    .await;
    Ok(())
}

pub async fn verify_email(state: &AppState, token: &str) -> AppResult<()> {
    if token.is_empty() {
        return Err(AppError::InvalidToken);
    }
    match state.users.consume_verification_token(token).await? {
        Some(user) => {
            info!(user_id = %user.id, "email verified");
            Ok(())
        }
        None => {
            warn!("unknown or used verification token");
            Err(AppError::InvalidToken)
        }
    }
}

pub async fn resend_verification(state: &AppState, raw_email: &str) -> AppResult<()> {
    let email = validated_email(raw_email)?;
    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    if user.is_email_verified {
        return Err(AppError::AlreadyVerified);
    }

    let token = generate_token();
    if !state.users.replace_verification_token(user.id, &token).await? {
        // verified between the lookup and the update
        return Err(AppError::AlreadyVerified);
    }

    info!(user_id = %user.id, "verification token reissued");
    deliver(
        state,
        verification_email(&state.config.app_base_url, &user.email, &token),
    )
    .await;
    Ok(())
}

pub async fn login(state: &AppState, req: LoginRequest) -> AppResult<AuthResponse> {
    // A malformed address is just another unknown account here.
    let email = normalize_email(&req.email);

    let Some(user) = state.users.find_by_email(&email).await? else {
        verify_against_dummy(&req.password);
        warn!(email = %email, "login failed");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(email = %email, "login failed");
        return Err(AppError::InvalidCredentials);
    }

    if !user.is_email_verified {
        warn!(user_id = %user.id, "login before email verification");
        return Err(AppError::EmailNotVerified);
    }

    let public = PublicUser::from(&user);
    let token = state.keys.issue_session(&public)?;

    info!(user_id = %user.id, role = ?public.role, "user logged in");
    Ok(AuthResponse {
        token,
        user: public,
    })
}

/// Always yields [`FORGOT_PASSWORD_MSG`], whatever happened internally.
pub async fn forgot_password(state: &AppState, raw_email: &str) -> &'static str {
    let email = normalize_email(raw_email);
    if !is_valid_email(&email) {
        return FORGOT_PASSWORD_MSG;
    }

    let user = match state.users.find_by_email(&email).await {
        Ok(Some(user)) => user,
        Ok(None) => return FORGOT_PASSWORD_MSG,
        Err(e) => {
            error!(error = %e, "forgot-password lookup failed");
            return FORGOT_PASSWORD_MSG;
        }
    };

    let token = generate_token();
    let expires_at = OffsetDateTime::now_utc() + RESET_TOKEN_TTL;
    if let Err(e) = state.users.set_reset_token(user.id, &token, expires_at).await {
        error!(error = %e, user_id = %user.id, "storing reset token failed");
        return FORGOT_PASSWORD_MSG;
    }

    info!(user_id = %user.id, "password reset requested");
    deliver_detached(
        state,
        password_reset_email(&state.config.app_base_url, &user.email, &token),
    );
    FORGOT_PASSWORD_MSG
}

pub async fn reset_password(state: &AppState, req: ResetPasswordRequest) -> AppResult<()> {
    if req.token.is_empty() {
        return Err(AppError::InvalidOrExpiredToken);
    }
    validate_password(&req.new_password)?;

    let hash = hash_password(&req.new_password)?;
    let now = OffsetDateTime::now_utc();
    match state.users.consume_reset_token(&req.token, &hash, now).await? {
        Some(user) => {
            info!(user_id = %user.id, "password reset");
            Ok(())
        }
        None => {
            warn!("unknown, used or expired reset token");
            Err(AppError::InvalidOrExpiredToken)
        }
    }
}

/// Which admin-creation route is being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminGate {
    /// Only while no admin exists yet.
    FirstAdmin,
    /// Whenever the shared secret matches.
    SecretOnly,
}

fn check_admin_secret(state: &AppState, supplied: &str) -> AppResult<()> {
    let Some(expected) = state.config.admin_secret.as_deref() else {
        warn!("admin route called while ADMIN_SECRET is unset");
        return Err(AppError::Forbidden("Admin creation is disabled".into()));
    };
    if !secrets_match(supplied, expected) {
        warn!("admin secret mismatch");
        return Err(AppError::Forbidden("Invalid secret key".into()));
    }
    Ok(())
}

pub async fn create_admin(
    state: &AppState,
    req: CreateAdminRequest,
    gate: AdminGate,
) -> AppResult<PublicUser> {
    check_admin_secret(state, &req.secret_key)?;

    if gate == AdminGate::FirstAdmin && state.users.count_admins().await? > 0 {
        warn!("admin bootstrap refused: an admin already exists");
        return Err(AppError::Forbidden("An admin account already exists".into()));
    }

    let email = validated_email(&req.email)?;
    validate_password(&req.password)?;

    let hash = hash_password(&req.password)?;
    let new = NewUser {
        email: &email,
        password_hash: &hash,
        role: Role::Admin,
        is_email_verified: true,
        verification_token: None,
    };
    let user = match gate {
        // The count above can be stale; the insert itself enforces the gate.
        AdminGate::FirstAdmin => state.users.create_first_admin(new).await?.ok_or_else(|| {
            warn!("admin bootstrap lost a race with another bootstrap");
            AppError::Forbidden("An admin account already exists".into())
        })?,
        AdminGate::SecretOnly => state.users.create(new).await?,
    };

    info!(user_id = %user.id, email = %user.email, gate = ?gate, "admin account created");
    Ok(PublicUser::from(&user))
}

pub async fn verify_admin(state: &AppState, req: VerifyAdminRequest) -> AppResult<()> {
    check_admin_secret(state, &req.secret_key)?;

    let email = normalize_email(&req.email);
    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    if !user.is_admin {
        warn!(user_id = %user.id, "verify-admin on a standard account");
        return Err(AppError::Forbidden("User is not an admin".into()));
    }

    state.users.mark_verified(user.id).await?;
    info!(user_id = %user.id, "admin account verified manually");
    Ok(())
}

pub async fn admin_exists(state: &AppState) -> AppResult<bool> {
    Ok(state.users.count_admins().await? > 0)
}

/// Fresh projection of the session's user.
pub async fn current_user(state: &AppState, claims: &Claims) -> AppResult<PublicUser> {
    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    Ok(PublicUser::from(&user))
}
