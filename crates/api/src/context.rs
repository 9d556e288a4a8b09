use profilehub_auth::Principal;
use profilehub_users::User;

/// The authenticated, active user behind a request.
///
/// Inserted into request extensions by [`crate::middleware::auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn user(&self) -> &User {
        &self.0
    }

    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.0.id,
            is_active: self.0.is_active,
            is_superuser: self.0.is_superuser,
        }
    }
}
