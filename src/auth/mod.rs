pub mod jwt;
pub mod password;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};

use crate::{error::AppError, models::Role, state::AppState};

/// The request-scoped session: who is acting, under which role. Every
/// handler that mutates state receives one of these instead of consulting
/// any shared login state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub fullname: String,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn require_admin_or_manager(&self) -> Result<(), AppError> {
        if self.role.is_admin_or_manager() {
            Ok(())
        } else {
            Err(AppError::forbidden("requires Admin or Manager role"))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::forbidden("requires Admin role"))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized("missing bearer token"))?;

        let claims = state
            .jwt
            .verify_token(bearer.token())
            .map_err(|_| AppError::unauthorized("invalid bearer token"))?;

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            fullname: claims.fullname,
            role: claims.role,
        })
    }
}
