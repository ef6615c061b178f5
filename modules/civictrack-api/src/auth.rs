use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use civictrack_common::UserId;

use crate::error::ApiError;
use crate::AppState;

/// Caller identity from a verified bearer token. Extracting this rejects
/// unknown users with 401 and banned users with 403.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: UserId,
    pub is_admin: bool,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthorized("Access token required"))?;

        let claims = state
            .jwt
            .verify_token(token)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token"))?;
        let id = claims
            .user_id()
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token"))?;

        let user = state
            .users
            .find_user(id)
            .await?
            .ok_or(ApiError::Unauthorized("Unknown user"))?;

        if user.is_banned {
            return Err(ApiError::Forbidden("Account is banned"));
        }

        Ok(AuthUser {
            id,
            is_admin: claims.is_admin,
        })
    }
}

/// An [`AuthUser`] whose token carries the admin claim.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub AuthUser);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(ApiError::Forbidden("Admin access required"));
        }
        Ok(AdminUser(user))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
