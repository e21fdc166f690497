use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use crate::{
    auth::{claims::Claims, repo::PublicUser},
    config::JwtConfig,
    error::AppError,
    state::AppState,
};

/// Lifetime of a session token.
pub const SESSION_TTL: Duration = Duration::hours(1);

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
        }
    }

    /// Signs `{id, email, role}` with an expiry `ttl` after now.
    pub fn issue(&self, user: &PublicUser, ttl: Duration) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(user_id = %user.id, role = ?user.role, "jwt signed");
        Ok(token)
    }

    pub fn issue_session(&self, user: &PublicUser) -> anyhow::Result<String> {
        self.issue(user, SESSION_TTL)
    }

    /// Checks signature, issuer, audience and expiry; no store lookup.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        if token.trim().is_empty() {
            return Err(AppError::MissingToken);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            warn!(error = %e, "jwt rejected");
            AppError::InvalidSession
        })?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}
