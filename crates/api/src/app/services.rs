//! Request-level business rules over the [`Store`].
//!
//! Handlers stay thin: they extract, call one method here and wrap the result.
//! Everything that needs more than one repository call (uniqueness checks,
//! ownership, role resolution, relation loading) lives in this module.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use profilehub_auth::{TokenIssuer, hash_password, verify_password};
use profilehub_core::{ItemId, Page, RoleId, UserId};
use profilehub_infra::{Store, StoreError};
use profilehub_items::{Item, ItemCreate, ItemUpdate};
use profilehub_profiles::{
    Profile, ProfileCreate, ProfileUpdate, Role, RoleCreate, RoleUpdate, dedup_role_ids,
    ensure_all_found,
};
use profilehub_users::{
    UpdatePassword, User, UserChanges, UserCreate, UserUpdate, normalize_email, validate_password,
};

use crate::app::dto::{ItemPublic, ProfilePublic, Token, UserPublic};
use crate::app::errors::ApiError;
use crate::authz::{require_owner_or_superuser, require_owner_or_superuser_msg, require_superuser};
use crate::context::CurrentUser;

const INCORRECT_LOGIN: &str = "Incorrect email or password";
const EMAIL_TAKEN: &str = "Email already exists";

/// Relations loaded for a single-user view.
const RELATED_ITEMS: Page = Page {
    skip: 0,
    limit: Page::MAX_LIMIT,
};

pub struct AppServices {
    store: Store,
    tokens: Arc<dyn TokenIssuer>,
}

impl AppServices {
    pub fn new(store: Store, tokens: Arc<dyn TokenIssuer>) -> Self {
        Self { store, tokens }
    }

    // -------------------------
    // Login
    // -------------------------

    #[instrument(skip_all, err)]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let Ok(email) = normalize_email(email) else {
            return Err(ApiError::BadRequest(INCORRECT_LOGIN.into()));
        };
        let Some(user) = self.store.users.get_by_email(&email).await? else {
            return Err(ApiError::BadRequest(INCORRECT_LOGIN.into()));
        };
        if !check_password(password, &user.hashed_password).await? {
            return Err(ApiError::BadRequest(INCORRECT_LOGIN.into()));
        }
        if !user.is_active {
            return Err(ApiError::BadRequest("Inactive user".into()));
        }
        Ok(user)
    }

    pub fn issue_token(&self, user: &User) -> Result<Token, ApiError> {
        let token = self.tokens.issue(user.id, Utc::now())?;
        Ok(Token::bearer(token))
    }

    // -------------------------
    // Users
    // -------------------------

    /// Create an account plus its empty profile.
    #[instrument(skip_all, err)]
    pub async fn create_user(&self, input: UserCreate) -> Result<User, ApiError> {
        let input = input.validated()?;
        if self.store.users.get_by_email(&input.email).await?.is_some() {
            return Err(ApiError::BadRequest(EMAIL_TAKEN.into()));
        }

        let now = Utc::now();
        let hashed = hash_blocking(input.password.clone()).await?;
        let user = User::new(UserId::new(), input, hashed, now);
        let profile = Profile::empty(user.id, now);

        match self.store.users.insert_with_profile(&user, &profile).await {
            Ok(()) => {
                info!(user_id = %user.id, superuser = user.is_superuser, "user created");
                Ok(user)
            }
            Err(StoreError::Conflict(_)) => Err(ApiError::BadRequest(EMAIL_TAKEN.into())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_users(&self, page: Page) -> Result<(Vec<User>, u64), ApiError> {
        Ok(self.store.users.list(page.clamped()).await?)
    }

    async fn user_or_404(&self, id: UserId) -> Result<User, ApiError> {
        self.store
            .users
            .get(id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    /// Self or superuser.
    pub async fn get_user(&self, current: &CurrentUser, id: UserId) -> Result<UserPublic, ApiError> {
        let user = self.user_or_404(id).await?;
        require_owner_or_superuser(current, user.id)?;
        self.user_with_relations(user).await
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    pub async fn user_with_relations(&self, user: User) -> Result<UserPublic, ApiError> {
        let profile = match self.store.profiles.get(user.id).await? {
            Some(profile) => {
                let roles = self.store.profiles.roles_for(user.id).await?;
                Some(ProfilePublic::new(profile, roles))
            }
            None => None,
        };
        let (items, _) = self.store.items.list_by_owner(user.id, RELATED_ITEMS).await?;
        let items = items.into_iter().map(ItemPublic::from).collect();
        Ok(UserPublic::with_relations(user, profile, items))
    }

    #[instrument(skip(self, update), fields(user_id = %id), err)]
    pub async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<User, ApiError> {
        let update = update.validated()?;
        let mut user = self.user_or_404(id).await?;
        self.apply_user_update(&mut user, update).await?;
        Ok(user)
    }

    /// Own email/full name only.
    pub async fn update_me(&self, current: &CurrentUser, update: UserUpdate) -> Result<User, ApiError> {
        let update = update.validated()?;
        let mut user = current.user().clone();
        self.apply_user_update(&mut user, update).await?;
        Ok(user)
    }

    async fn apply_user_update(&self, user: &mut User, update: UserUpdate) -> Result<(), ApiError> {
        if let Some(email) = &update.email {
            if let Some(existing) = self.store.users.get_by_email(email).await? {
                if existing.id != user.id {
                    return Err(ApiError::Conflict(EMAIL_TAKEN.into()));
                }
            }
        }

        let hashed = match &update.password {
            Some(password) => Some(hash_blocking(password.clone()).await?),
            None => None,
        };
        user.apply(UserChanges::from_update(update, hashed), Utc::now());

        match self.store.users.update(user).await {
            Ok(()) => Ok(()),
            Err(StoreError::Conflict(_)) => Err(ApiError::Conflict(EMAIL_TAKEN.into())),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip_all, fields(user_id = %current.user().id), err)]
    pub async fn change_password(
        &self,
        current: &CurrentUser,
        body: UpdatePassword,
    ) -> Result<(), ApiError> {
        validate_password(&body.new_password)?;
        let user = current.user();
        if !check_password(&body.current_password, &user.hashed_password).await? {
            return Err(ApiError::BadRequest("Incorrect password".into()));
        }
        let body = body.validated()?;

        let mut user = user.clone();
        let hashed = hash_blocking(body.new_password).await?;
        let changes = UserChanges {
            hashed_password: Some(hashed),
            ..Default::default()
        };
        user.apply(changes, Utc::now());
        self.store.users.update(&user).await?;
        Ok(())
    }

    /// Superusers cannot remove their own account; everything owned goes too.
    #[instrument(skip(self, current), fields(actor = %current.user().id, user_id = %id), err)]
    pub async fn delete_user(&self, current: &CurrentUser, id: UserId) -> Result<(), ApiError> {
        let user = self.user_or_404(id).await?;
        if user.id == current.user().id && user.is_superuser {
            return Err(ApiError::forbidden("Superusers cannot delete themselves"));
        }
        self.store.users.delete(user.id).await?;
        info!("user deleted");
        Ok(())
    }

    // -------------------------
    // Items
    // -------------------------

    pub async fn list_items(
        &self,
        current: &CurrentUser,
        page: Page,
    ) -> Result<(Vec<Item>, u64), ApiError> {
        Ok(self
            .store
            .items
            .list_by_owner(current.user().id, page.clamped())
            .await?)
    }

    pub async fn create_item(&self, current: &CurrentUser, input: ItemCreate) -> Result<Item, ApiError> {
        let input = input.validated()?;
        let item = Item::new(ItemId::new(), current.user().id, input, Utc::now());
        self.store.items.insert(&item).await?;
        Ok(item)
    }

    /// Owner or superuser.
    pub async fn get_item(&self, current: &CurrentUser, id: ItemId) -> Result<Item, ApiError> {
        let item = self
            .store
            .items
            .get(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Item not found"))?;
        require_owner_or_superuser(current, item.owner_id)?;
        Ok(item)
    }

    pub async fn update_item(
        &self,
        current: &CurrentUser,
        id: ItemId,
        update: ItemUpdate,
    ) -> Result<Item, ApiError> {
        let mut item = self.get_item(current, id).await?;
        let update = update.validated()?;
        item.apply(update, Utc::now());
        self.store.items.update(&item).await?;
        Ok(item)
    }

    pub async fn delete_item(&self, current: &CurrentUser, id: ItemId) -> Result<(), ApiError> {
        let item = self.get_item(current, id).await?;
        self.store.items.delete(item.id).await?;
        Ok(())
    }

    // -------------------------
    // Profiles
    // -------------------------

    pub async fn get_profile(&self, user_id: UserId) -> Result<ProfilePublic, ApiError> {
        let profile = self.profile_or_404(user_id).await?;
        let roles = self.store.profiles.roles_for(user_id).await?;
        Ok(ProfilePublic::new(profile, roles))
    }

    async fn profile_or_404(&self, user_id: UserId) -> Result<Profile, ApiError> {
        self.store
            .profiles
            .get(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Profile not found"))
    }

    #[instrument(skip(self, current, input), fields(actor = %current.user().id, user_id = %input.user_id), err)]
    pub async fn create_profile(
        &self,
        current: &CurrentUser,
        input: ProfileCreate,
    ) -> Result<ProfilePublic, ApiError> {
        let input = input.validated()?;
        let principal = current.principal();
        if input.user_id != principal.user_id && !principal.is_superuser {
            return Err(ApiError::forbidden("Cannot create a profile for another user"));
        }

        let role_ids = self.resolve_roles(current, input.role_ids.as_deref()).await?;

        if self.store.users.get(input.user_id).await?.is_none() {
            return Err(ApiError::not_found("User not found"));
        }
        if self.store.profiles.get(input.user_id).await?.is_some() {
            return Err(ApiError::BadRequest("Profile already exists for this user".into()));
        }

        let profile = Profile::new(input.user_id, input.fields, Utc::now());
        let role_ids = role_ids.unwrap_or_default();
        match self.store.profiles.insert(&profile, &role_ids).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                return Err(ApiError::BadRequest("Profile already exists for this user".into()));
            }
            Err(e) => return Err(role_store_error(e)),
        }

        let roles = self.store.profiles.roles_for(profile.user_id).await?;
        Ok(ProfilePublic::new(profile, roles))
    }

    #[instrument(skip(self, current, update), fields(actor = %current.user().id, user_id = %user_id), err)]
    pub async fn update_profile(
        &self,
        current: &CurrentUser,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<ProfilePublic, ApiError> {
        let update = update.validated()?;
        let mut profile = self.profile_or_404(user_id).await?;
        require_owner_or_superuser_msg(
            current,
            profile.user_id,
            "Not enough privileges to update this profile",
        )?;

        let role_ids = self.resolve_roles(current, update.role_ids.as_deref()).await?;

        profile.apply(update.fields, Utc::now());
        self.store
            .profiles
            .update(&profile, role_ids.as_deref())
            .await
            .map_err(role_store_error)?;

        let roles = self.store.profiles.roles_for(user_id).await?;
        Ok(ProfilePublic::new(profile, roles))
    }

    #[instrument(skip(self, current), fields(actor = %current.user().id, user_id = %user_id), err)]
    pub async fn delete_profile(&self, current: &CurrentUser, user_id: UserId) -> Result<(), ApiError> {
        let profile = self.profile_or_404(user_id).await?;
        require_owner_or_superuser_msg(
            current,
            profile.user_id,
            "Not enough privileges to delete this profile",
        )?;
        self.store.profiles.delete(profile.user_id).await?;
        Ok(())
    }

    /// Dedup and check requested role ids. Only superusers may assign roles.
    async fn resolve_roles(
        &self,
        current: &CurrentUser,
        requested: Option<&[RoleId]>,
    ) -> Result<Option<Vec<RoleId>>, ApiError> {
        let Some(requested) = requested else {
            return Ok(None);
        };
        require_superuser(current)?;

        let ids = dedup_role_ids(requested);
        let found = self.store.roles.get_many(&ids).await?;
        ensure_all_found(&ids, &found)?;
        Ok(Some(ids))
    }

    // -------------------------
    // Roles
    // -------------------------

    pub async fn list_roles(&self, page: Page) -> Result<(Vec<Role>, u64), ApiError> {
        Ok(self.store.roles.list(page.clamped()).await?)
    }

    pub async fn get_role(&self, id: RoleId) -> Result<Role, ApiError> {
        self.store
            .roles
            .get(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Role not found"))
    }

    #[instrument(skip(self, input), err)]
    pub async fn create_role(&self, input: RoleCreate) -> Result<Role, ApiError> {
        let input = input.validated()?;
        if self.store.roles.get_by_name(&input.name).await?.is_some() {
            return Err(role_taken(&input.name));
        }
        match self.store.roles.insert(&input.name).await {
            Ok(role) => Ok(role),
            Err(StoreError::Conflict(_)) => Err(role_taken(&input.name)),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, update), fields(role_id = %id), err)]
    pub async fn rename_role(&self, id: RoleId, update: RoleUpdate) -> Result<Role, ApiError> {
        let update = update.validated()?;
        if let Some(existing) = self.store.roles.get_by_name(&update.name).await? {
            if existing.id != id {
                return Err(role_taken(&update.name));
            }
        }
        match self.store.roles.rename(id, &update.name).await {
            Ok(role) => Ok(role),
            Err(StoreError::Conflict(_)) => Err(role_taken(&update.name)),
            Err(StoreError::NotFound(_)) => Err(ApiError::not_found("Role not found")),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_role(&self, id: RoleId) -> Result<(), ApiError> {
        match self.store.roles.delete(id).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => Err(ApiError::not_found("Role not found")),
            Err(e) => Err(e.into()),
        }
    }
}

/// A role deleted between resolution and write is still an invalid id.
fn role_store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound("Role") => ApiError::Validation("Invalid role IDs provided".into()),
        other => other.into(),
    }
}

fn role_taken(name: &str) -> ApiError {
    ApiError::Conflict(format!("Role '{name}' already exists"))
}

/// Runs argon2 on the blocking pool.
async fn hash_blocking(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))?
        .map_err(ApiError::from)
}

async fn check_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("verification task failed: {e}")))?
        .map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use profilehub_auth::Hs256Jwt;
    use profilehub_profiles::ProfileFields;

    fn services() -> AppServices {
        let jwt = Hs256Jwt::new(b"test-secret", chrono::Duration::minutes(5));
        AppServices::new(Store::in_memory(), Arc::new(jwt))
    }

    fn create(email: &str, superuser: bool) -> UserCreate {
        UserCreate {
            email: email.into(),
            password: "password123".into(),
            is_active: true,
            is_superuser: superuser,
            full_name: None,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_bad_request() {
        let svc = services();
        svc.create_user(create("dup@example.com", false)).await.unwrap();
        let err = svc.create_user(create("DUP@example.com", false)).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "Email already exists"));
    }

    #[tokio::test]
    async fn authenticate_checks_password_and_activity() {
        let svc = services();
        let mut input = create("idle@example.com", false);
        input.is_active = false;
        svc.create_user(input).await.unwrap();

        let err = svc.authenticate("idle@example.com", "wrong-password").await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == INCORRECT_LOGIN));

        let err = svc.authenticate("idle@example.com", "password123").await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "Inactive user"));
    }

    #[tokio::test]
    async fn role_assignment_requires_superuser() {
        let svc = services();
        let user = svc.create_user(create("plain@example.com", false)).await.unwrap();
        let current = CurrentUser(user.clone());

        let update = ProfileUpdate {
            fields: ProfileFields::default(),
            role_ids: Some(vec![RoleId::new(1)]),
        };
        let err = svc.update_profile(&current, user.id, update).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn unknown_role_ids_are_rejected() {
        let svc = services();
        let admin = svc.create_user(create("root@example.com", true)).await.unwrap();
        let current = CurrentUser(admin.clone());
        let role = svc
            .create_role(RoleCreate { name: "editor".into() })
            .await
            .unwrap();

        let update = ProfileUpdate {
            fields: ProfileFields::default(),
            role_ids: Some(vec![role.id, RoleId::new(999)]),
        };
        let err = svc.update_profile(&current, admin.id, update).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Invalid role IDs provided"));

        let update = ProfileUpdate {
            fields: ProfileFields::default(),
            role_ids: Some(vec![role.id, role.id]),
        };
        let profile = svc.update_profile(&current, admin.id, update).await.unwrap();
        assert_eq!(profile.roles.len(), 1);
    }

    #[tokio::test]
    async fn superuser_cannot_delete_self() {
        let svc = services();
        let admin = svc.create_user(create("boss@example.com", true)).await.unwrap();
        let current = CurrentUser(admin.clone());
        let err = svc.delete_user(&current, admin.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(ref m) if m == "Superusers cannot delete themselves"));
    }

    #[tokio::test]
    async fn role_names_stay_unique() {
        let svc = services();
        let editor = svc.create_role(RoleCreate { name: "editor".into() }).await.unwrap();
        let viewer = svc.create_role(RoleCreate { name: "viewer".into() }).await.unwrap();

        let err = svc.create_role(RoleCreate { name: "editor".into() }).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m == "Role 'editor' already exists"));

        let err = svc
            .rename_role(viewer.id, RoleUpdate { name: "editor".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        // Renaming to its current name is a no-op, not a conflict.
        let same = svc
            .rename_role(editor.id, RoleUpdate { name: "editor".into() })
            .await
            .unwrap();
        assert_eq!(same.id, editor.id);
    }
}
