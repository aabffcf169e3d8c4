//! Request extractors.

use agora_common::AppError;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Member id attached by [`crate::middleware::member_identity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerMember(pub String);

/// Authenticated member extractor. Rejects with 401 when no identity was forwarded.
#[derive(Debug, Clone)]
pub struct AuthMember(pub String);

impl<S> FromRequestParts<S> for AuthMember
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerMember>()
            .map(|caller| Self(caller.0.clone()))
            .ok_or(AppError::Unauthorized)
    }
}
