//! Caller-identity boundary for Treebio services.
//!
//! The platform's authentication provider runs upstream of these services and
//! installs the authenticated caller into request extensions. This crate only
//! exposes that identity to handlers; it performs no authentication itself.

use axum::{extract::FromRequestParts, http::request::Parts, http::StatusCode};
use serde::{Deserialize, Serialize};
use treebio_core::error_builder::ErrorBuilder;
use treebio_core::problemdetails::Problem;

/// The authenticated caller, as established by the upstream identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: i32,
}

impl AuthUser {
    pub fn new(id: i32) -> Self {
        Self { id }
    }
}

/// Extractor requiring an authenticated caller on the request.
///
/// Usage mirrors any axum extractor:
/// `async fn handler(RequireAuth(user): RequireAuth, ...)`.
pub struct RequireAuth(pub AuthUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = Problem;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(RequireAuth)
            .ok_or_else(|| {
                ErrorBuilder::new(StatusCode::UNAUTHORIZED)
                    .title("Authentication Required")
                    .detail("No authenticated user on this request")
                    .build()
            })
    }
}
