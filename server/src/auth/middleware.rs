//! Bearer token extraction.
//!
//! When `AUTH_SECRET` is configured, mutating routes require
//! `Authorization: Bearer <AUTH_SECRET>`. Without it every request is
//! accepted as anonymous.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AppError;
use crate::AppState;

/// Caller allowed to mutate engine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthUser {
    /// Presented the configured secret
    Token,
    /// No secret is configured
    Anonymous,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(secret) = state.config.auth_secret.as_deref() else {
            return Ok(AuthUser::Anonymous);
        };

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized("Missing authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized("Invalid authorization header format"))?
            .trim();

        if token.is_empty() {
            return Err(AppError::Unauthorized("Empty bearer token"));
        }
        if token != secret {
            tracing::warn!("Rejected request with invalid bearer token");
            return Err(AppError::Unauthorized("Invalid bearer token"));
        }

        Ok(AuthUser::Token)
    }
}
