use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRef, FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use tracing::warn;

use super::{claims::Claims, jwt::JwtKeys};
use crate::error::AppError;

/// Verified session claims of the caller.
///
/// Reads `Authorization: Bearer <token>` and nothing else. The claims are also
/// left in the request extensions for anything running after the extractor.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

/// An [`AuthUser`] whose role is admin.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<Claims>() {
            return Ok(AuthUser(claims.clone()));
        }

        let keys = JwtKeys::from_ref(state);
        let token = bearer_token(parts).ok_or_else(|| {
            warn!(uri = %parts.uri, "request without bearer token");
            AppError::MissingToken
        })?;
        let claims = keys.verify(token)?;

        parts.extensions.insert(claims.clone());
        Ok(AuthUser(claims))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if !claims.role.is_admin() {
            warn!(user_id = %claims.sub, uri = %parts.uri, "admin route denied");
            return Err(AppError::AccessDenied);
        }
        Ok(AdminUser(claims))
    }
}

/// `Json` whose rejections render as [`AppError::Validation`].
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        Ok(JsonBody(value))
    }
}
