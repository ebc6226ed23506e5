//! Acting user extracted from identity headers.
//!
//! The BFF authenticates the user and forwards `X-User-ID`, `X-User-Role`
//! and optionally `X-User-Name`. This service trusts those headers.

use crate::models::{Actor, ActorRole};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

pub const USER_ID_HEADER: &str = "X-User-ID";
pub const USER_NAME_HEADER: &str = "X-User-Name";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let user_id = header(USER_ID_HEADER).ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing X-User-ID header (required from BFF)"))
        })?;
        let raw_role = header(USER_ROLE_HEADER).ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing X-User-Role header (required from BFF)"))
        })?;
        let role = ActorRole::from_string(raw_role)
            .ok_or_else(|| AppError::bad_request(format!("Unknown role '{}'", raw_role)))?;
        if role == ActorRole::System {
            return Err(AppError::forbidden("The system role is reserved for internal jobs"));
        }

        tracing::Span::current().record("user_id", user_id);

        Ok(Actor::new(user_id, header(USER_NAME_HEADER).map(str::to_string), role))
    }
}
