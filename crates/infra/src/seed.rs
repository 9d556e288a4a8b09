//! Initial data: the first superuser.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument};

use profilehub_auth::{PasswordError, hash_password};
use profilehub_core::{DomainError, UserId};
use profilehub_profiles::Profile;
use profilehub_users::{User, UserCreate};

use crate::repository::{Store, StoreError};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("invalid first superuser: {0}")]
    Invalid(#[from] DomainError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Create the configured superuser (plus an empty profile) unless the email is
/// already registered. Returns `true` when a new account was created.
///
/// An existing account is left exactly as it is.
#[instrument(skip(store, password), err)]
pub async fn ensure_first_superuser(
    store: &Store,
    email: &str,
    password: &str,
) -> Result<bool, SeedError> {
    let input = UserCreate {
        email: email.to_string(),
        password: password.to_string(),
        is_active: true,
        is_superuser: true,
        full_name: None,
    }
    .validated()?;

    if store.users.get_by_email(&input.email).await?.is_some() {
        info!("first superuser already present");
        return Ok(false);
    }

    let now = Utc::now();
    let hashed = hash_password(&input.password)?;
    let user = User::new(UserId::new(), input, hashed, now);
    let profile = Profile::empty(user.id, now);

    match store.users.insert_with_profile(&user, &profile).await {
        Ok(()) => {
            info!(user_id = %user.id, "created first superuser");
            Ok(true)
        }
        // Lost a race with another instance seeding the same email.
        Err(StoreError::Conflict(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}
