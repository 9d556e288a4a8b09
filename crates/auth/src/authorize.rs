//! Ownership and privilege checks.
//!
//! - No IO
//! - No panics
//! - No business logic (pure policy check)

use thiserror::Error;

use profilehub_core::UserId;

use crate::Principal;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthzError {
    #[error("Inactive user")]
    Inactive,

    #[error("The user doesn't have enough privileges")]
    NotSuperuser,

    #[error("Not enough privileges")]
    NotOwner,
}

pub fn ensure_active(principal: &Principal) -> Result<(), AuthzError> {
    if principal.is_active {
        Ok(())
    } else {
        Err(AuthzError::Inactive)
    }
}

pub fn ensure_superuser(principal: &Principal) -> Result<(), AuthzError> {
    if principal.is_superuser {
        Ok(())
    } else {
        Err(AuthzError::NotSuperuser)
    }
}

/// Superusers bypass ownership; everyone else must own the resource.
pub fn ensure_owner_or_superuser(principal: &Principal, owner: UserId) -> Result<(), AuthzError> {
    if principal.is_superuser || principal.user_id == owner {
        Ok(())
    } else {
        Err(AuthzError::NotOwner)
    }
}
