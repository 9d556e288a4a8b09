//! Repository traits over users, items, profiles and roles.
//!
//! Two implementations exist: [`InMemoryDatabase`] for dev and tests, and the
//! Postgres repositories in [`postgres`]. Both enforce the same relational
//! rules: unique emails and role names, cascading deletes from users to their
//! items and profile, and from profiles/roles to their association rows.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use profilehub_core::{ItemId, Page, RoleId, UserId};
use profilehub_items::Item;
use profilehub_profiles::{Profile, Role};
use profilehub_users::User;

pub use in_memory::InMemoryDatabase;
pub use postgres::{PgItemRepository, PgProfileRepository, PgRoleRepository, PgUserRepository};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A unique constraint would be broken.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, id: UserId) -> StoreResult<Option<User>>;
    async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// One page plus the total number of users.
    async fn list(&self, page: Page) -> StoreResult<(Vec<User>, u64)>;
    /// Insert the account together with its (empty) profile, atomically.
    async fn insert_with_profile(&self, user: &User, profile: &Profile) -> StoreResult<()>;
    async fn update(&self, user: &User) -> StoreResult<()>;
    /// Removes the user's items, profile and role associations as well.
    async fn delete(&self, id: UserId) -> StoreResult<()>;
}

#[async_trait]
pub trait ItemRepository: Send + Sync {
    async fn get(&self, id: ItemId) -> StoreResult<Option<Item>>;
    async fn list_by_owner(&self, owner: UserId, page: Page) -> StoreResult<(Vec<Item>, u64)>;
    async fn insert(&self, item: &Item) -> StoreResult<()>;
    async fn update(&self, item: &Item) -> StoreResult<()>;
    async fn delete(&self, id: ItemId) -> StoreResult<()>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get(&self, user_id: UserId) -> StoreResult<Option<Profile>>;
    /// Insert the profile and its role set in one step.
    async fn insert(&self, profile: &Profile, role_ids: &[RoleId]) -> StoreResult<()>;
    /// `Some(ids)` replaces the role set; `None` keeps it.
    async fn update(&self, profile: &Profile, role_ids: Option<&[RoleId]>) -> StoreResult<()>;
    async fn delete(&self, user_id: UserId) -> StoreResult<()>;
    /// Roles attached to the profile, ordered by role id.
    async fn roles_for(&self, user_id: UserId) -> StoreResult<Vec<Role>>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn get(&self, id: RoleId) -> StoreResult<Option<Role>>;
    async fn get_by_name(&self, name: &str) -> StoreResult<Option<Role>>;
    /// Roles matching `ids`; unknown ids are silently absent from the result.
    async fn get_many(&self, ids: &[RoleId]) -> StoreResult<Vec<Role>>;
    async fn list(&self, page: Page) -> StoreResult<(Vec<Role>, u64)>;
    /// The store assigns the id.
    async fn insert(&self, name: &str) -> StoreResult<Role>;
    async fn rename(&self, id: RoleId, name: &str) -> StoreResult<Role>;
    /// Removes association rows; profiles are untouched.
    async fn delete(&self, id: RoleId) -> StoreResult<()>;
}

/// The four repositories behind one handle.
#[derive(Clone)]
pub struct Store {
    pub users: Arc<dyn UserRepository>,
    pub items: Arc<dyn ItemRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub roles: Arc<dyn RoleRepository>,
}

impl Store {
    pub fn in_memory() -> Self {
        let db = Arc::new(InMemoryDatabase::new());
        Self {
            users: db.clone(),
            items: db.clone(),
            profiles: db.clone(),
            roles: db,
        }
    }

    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            items: Arc::new(PgItemRepository::new(pool.clone())),
            profiles: Arc::new(PgProfileRepository::new(pool.clone())),
            roles: Arc::new(PgRoleRepository::new(pool)),
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}
