use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AdminExistsResponse, AuthResponse, CreateAdminRequest, EmailRequest, LoginRequest,
            MessageResponse, RegisterRequest, ResetPasswordRequest, VerifyAdminRequest,
        },
        extractors::{AuthUser, JsonBody},
        repo::PublicUser,
        services::{self, AdminGate},
    },
    error::AppResult,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify-email/:token", get(verify_email))
        .route("/resend-verification", post(resend_verification))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/create", post(create_first_admin))
        .route("/create-verified-admin", post(create_verified_admin))
        .route("/verify-admin", post(verify_admin))
        .route("/users/check", get(admin_exists))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    services::register(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(services::REGISTERED_MSG)),
    ))
}

#[instrument(skip_all)]
pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    services::verify_email(&state, &token).await?;
    Ok(Json(MessageResponse::new(services::VERIFIED_MSG)))
}

#[instrument(skip(state, payload))]
pub async fn resend_verification(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::resend_verification(&state, &payload.email).await?;
    Ok(Json(MessageResponse::new(services::RESENT_MSG)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    Ok(Json(services::login(&state, payload).await?))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<EmailRequest>,
) -> Json<MessageResponse> {
    Json(MessageResponse::new(
        services::forgot_password(&state, &payload.email).await,
    ))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::reset_password(&state, payload).await?;
    Ok(Json(MessageResponse::new(services::PASSWORD_RESET_MSG)))
}

#[instrument(skip(state, payload))]
pub async fn create_first_admin(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateAdminRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    services::create_admin(&state, payload, AdminGate::FirstAdmin).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(services::ADMIN_CREATED_MSG)),
    ))
}

#[instrument(skip(state, payload))]
pub async fn create_verified_admin(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateAdminRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    services::create_admin(&state, payload, AdminGate::SecretOnly).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(services::ADMIN_CREATED_MSG)),
    ))
}

#[instrument(skip(state, payload))]
pub async fn verify_admin(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<VerifyAdminRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::verify_admin(&state, payload).await?;
    Ok(Json(MessageResponse::new(services::ADMIN_VERIFIED_MSG)))
}

#[instrument(skip(state))]
pub async fn admin_exists(State(state): State<AppState>) -> AppResult<Json<AdminExistsResponse>> {
    let exists = services::admin_exists(&state).await?;
    Ok(Json(AdminExistsResponse { exists }))
}

#[instrument(skip_all)]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<PublicUser>> {
    Ok(Json(services::current_user(&state, &claims).await?))
}
