//! API-side authorization guards.
//!
//! Thin wrappers that turn the current user into a [`Principal`] and run the
//! policy checks from `profilehub-auth`, converting failures into HTTP errors.

use profilehub_auth::{AuthzError, ensure_owner_or_superuser, ensure_superuser};
use profilehub_core::UserId;

use crate::app::errors::ApiError;
use crate::context::CurrentUser;

pub fn require_superuser(current: &CurrentUser) -> Result<(), ApiError> {
    ensure_superuser(&current.principal()).map_err(ApiError::from)
}

pub fn require_owner_or_superuser(current: &CurrentUser, owner: UserId) -> Result<(), ApiError> {
    ensure_owner_or_superuser(&current.principal(), owner).map_err(ApiError::from)
}

/// Same check with a resource-specific denial message.
pub fn require_owner_or_superuser_msg(
    current: &CurrentUser,
    owner: UserId,
    denied: &'static str,
) -> Result<(), ApiError> {
    match ensure_owner_or_superuser(&current.principal(), owner) {
        Ok(()) => Ok(()),
        Err(AuthzError::NotOwner) => Err(ApiError::Forbidden(denied.to_string())),
        Err(other) => Err(other.into()),
    }
}
