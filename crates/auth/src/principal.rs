use profilehub_core::UserId;

/// The authenticated user behind a request, reduced to what policy needs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub is_active: bool,
    pub is_superuser: bool,
}

impl Principal {
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            is_active: true,
            is_superuser: false,
        }
    }

    pub fn superuser(user_id: UserId) -> Self {
        Self {
            user_id,
            is_active: true,
            is_superuser: true,
        }
    }
}
