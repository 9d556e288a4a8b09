use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use profilehub_core::{ItemId, Page, RoleId, UserId};
use profilehub_items::Item;
use profilehub_profiles::{Profile, Role};
use profilehub_users::User;

use super::{
    ItemRepository, ProfileRepository, RoleRepository, StoreError, StoreResult, UserRepository,
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    items: HashMap<ItemId, Item>,
    profiles: HashMap<UserId, Profile>,
    roles: BTreeMap<RoleId, Role>,
    next_role_id: i32,
    profile_roles: BTreeSet<(UserId, RoleId)>,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn role_name_taken(&self, name: &str, except: Option<RoleId>) -> bool {
        self.roles
            .values()
            .any(|r| r.name == name && Some(r.id) != except)
    }

    fn replace_roles(&mut self, user_id: UserId, role_ids: &[RoleId]) -> StoreResult<()> {
        if role_ids.iter().any(|id| !self.roles.contains_key(id)) {
            return Err(StoreError::NotFound("Role"));
        }
        self.profile_roles.retain(|(u, _)| *u != user_id);
        self.profile_roles
            .extend(role_ids.iter().map(|role_id| (user_id, *role_id)));
        Ok(())
    }

    fn drop_profile(&mut self, user_id: UserId) -> bool {
        self.profile_roles.retain(|(u, _)| *u != user_id);
        self.profiles.remove(&user_id).is_some()
    }
}

/// In-memory twin of the relational schema, for dev and tests.
///
/// A single lock guards every table so cascades are atomic.
#[derive(Debug)]
pub struct InMemoryDatabase {
    inner: RwLock<Tables>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Tables {
                next_role_id: 1,
                ..Tables::default()
            }),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".into()))
    }
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

fn paged<T, K: Ord>(mut rows: Vec<T>, page: Page, key: impl Fn(&T) -> K) -> (Vec<T>, u64) {
    rows.sort_by_key(|r| key(r));
    let total = rows.len() as u64;
    (page.slice(rows), total)
}

#[async_trait]
impl UserRepository for InMemoryDatabase {
    async fn get(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list(&self, page: Page) -> StoreResult<(Vec<User>, u64)> {
        let rows = self.read()?.users.values().cloned().collect();
        Ok(paged(rows, page, |u: &User| (u.timestamps.created_at, u.id)))
    }

    async fn insert_with_profile(&self, user: &User, profile: &Profile) -> StoreResult<()> {
        let mut t = self.write()?;
        if t.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user {} already exists", user.id)));
        }
        if t.email_taken(&user.email, None) {
            return Err(StoreError::Conflict("email already registered".into()));
        }
        t.users.insert(user.id, user.clone());
        t.profiles.insert(user.id, profile.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> StoreResult<()> {
        let mut t = self.write()?;
        if !t.users.contains_key(&user.id) {
            return Err(StoreError::NotFound("User"));
        }
        if t.email_taken(&user.email, Some(user.id)) {
            return Err(StoreError::Conflict("email already registered".into()));
        }
        t.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete(&self, id: UserId) -> StoreResult<()> {
        let mut t = self.write()?;
        if t.users.remove(&id).is_none() {
            return Err(StoreError::NotFound("User"));
        }
        t.items.retain(|_, item| item.owner_id != id);
        t.drop_profile(id);
        Ok(())
    }
}

#[async_trait]
impl ItemRepository for InMemoryDatabase {
    async fn get(&self, id: ItemId) -> StoreResult<Option<Item>> {
        Ok(self.read()?.items.get(&id).cloned())
    }

    async fn list_by_owner(&self, owner: UserId, page: Page) -> StoreResult<(Vec<Item>, u64)> {
        let rows = self
            .read()?
            .items
            .values()
            .filter(|i| i.owner_id == owner)
            .cloned()
            .collect();
        Ok(paged(rows, page, |i: &Item| (i.timestamps.created_at, i.id)))
    }

    async fn insert(&self, item: &Item) -> StoreResult<()> {
        let mut t = self.write()?;
        if !t.users.contains_key(&item.owner_id) {
            return Err(StoreError::NotFound("User"));
        }
        if t.items.contains_key(&item.id) {
            return Err(StoreError::Conflict(format!("item {} already exists", item.id)));
        }
        t.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn update(&self, item: &Item) -> StoreResult<()> {
        let mut t = self.write()?;
        match t.items.get_mut(&item.id) {
            Some(slot) => {
                *slot = item.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound("Item")),
        }
    }

    async fn delete(&self, id: ItemId) -> StoreResult<()> {
        self.write()?
            .items
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("Item"))
    }
}

#[async_trait]
impl ProfileRepository for InMemoryDatabase {
    async fn get(&self, user_id: UserId) -> StoreResult<Option<Profile>> {
        Ok(self.read()?.profiles.get(&user_id).cloned())
    }

    async fn insert(&self, profile: &Profile, role_ids: &[RoleId]) -> StoreResult<()> {
        let mut t = self.write()?;
        if !t.users.contains_key(&profile.user_id) {
            return Err(StoreError::NotFound("User"));
        }
        if t.profiles.contains_key(&profile.user_id) {
            return Err(StoreError::Conflict("profile already exists for this user".into()));
        }
        t.replace_roles(profile.user_id, role_ids)?;
        t.profiles.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn update(&self, profile: &Profile, role_ids: Option<&[RoleId]>) -> StoreResult<()> {
        let mut t = self.write()?;
        if !t.profiles.contains_key(&profile.user_id) {
            return Err(StoreError::NotFound("Profile"));
        }
        if let Some(role_ids) = role_ids {
            t.replace_roles(profile.user_id, role_ids)?;
        }
        t.profiles.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn delete(&self, user_id: UserId) -> StoreResult<()> {
        if self.write()?.drop_profile(user_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound("Profile"))
        }
    }

    async fn roles_for(&self, user_id: UserId) -> StoreResult<Vec<Role>> {
        let t = self.read()?;
        Ok(t.profile_roles
            .range((user_id, RoleId::new(i32::MIN))..=(user_id, RoleId::new(i32::MAX)))
            .filter_map(|(_, role_id)| t.roles.get(role_id).cloned())
            .collect())
    }
}

#[async_trait]
impl RoleRepository for InMemoryDatabase {
    async fn get(&self, id: RoleId) -> StoreResult<Option<Role>> {
        Ok(self.read()?.roles.get(&id).cloned())
    }

    async fn get_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        Ok(self
            .read()?
            .roles
            .values()
            .find(|r| r.name == name)
            .cloned())
    }

    async fn get_many(&self, ids: &[RoleId]) -> StoreResult<Vec<Role>> {
        let t = self.read()?;
        let wanted: BTreeSet<RoleId> = ids.iter().copied().collect();
        Ok(wanted
            .into_iter()
            .filter_map(|id| t.roles.get(&id).cloned())
            .collect())
    }

    async fn list(&self, page: Page) -> StoreResult<(Vec<Role>, u64)> {
        let rows = self.read()?.roles.values().cloned().collect();
        Ok(paged(rows, page, |r: &Role| r.id))
    }

    async fn insert(&self, name: &str) -> StoreResult<Role> {
        let mut t = self.write()?;
        if t.role_name_taken(name, None) {
            return Err(StoreError::Conflict(format!("role '{name}' already exists")));
        }
        let role = Role {
            id: RoleId::new(t.next_role_id),
            name: name.to_string(),
        };
        t.next_role_id += 1;
        t.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn rename(&self, id: RoleId, name: &str) -> StoreResult<Role> {
        let mut t = self.write()?;
        if t.role_name_taken(name, Some(id)) {
            return Err(StoreError::Conflict(format!("role '{name}' already exists")));
        }
        let role = t.roles.get_mut(&id).ok_or(StoreError::NotFound("Role"))?;
        role.name = name.to_string();
        Ok(role.clone())
    }

    async fn delete(&self, id: RoleId) -> StoreResult<()> {
        let mut t = self.write()?;
        if t.roles.remove(&id).is_none() {
            return Err(StoreError::NotFound("Role"));
        }
        t.profile_roles.retain(|(_, role_id)| *role_id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use profilehub_items::ItemCreate;
    use profilehub_users::UserCreate;

    fn user(email: &str) -> User {
        User::new(
            UserId::new(),
            UserCreate {
                email: email.into(),
                password: "unused-here".into(),
                is_active: true,
                is_superuser: false,
                full_name: None,
            },
            "hash".into(),
            Utc::now(),
        )
    }

    fn item(owner: UserId, title: &str) -> Item {
        Item::new(
            ItemId::new(),
            owner,
            ItemCreate {
                title: title.into(),
                description: None,
            },
            Utc::now(),
        )
    }

    async fn seeded(db: &InMemoryDatabase, email: &str) -> User {
        let u = user(email);
        db.insert_with_profile(&u, &Profile::empty(u.id, Utc::now()))
            .await
            .unwrap();
        u
    }

    #[tokio::test]
    async fn email_is_unique() {
        let db = InMemoryDatabase::new();
        seeded(&db, "a@b.io").await;

        let dupe = user("a@b.io");
        let err = db
            .insert_with_profile(&dupe, &Profile::empty(dupe.id, Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_cannot_steal_email() {
        let db = InMemoryDatabase::new();
        seeded(&db, "a@b.io").await;
        let mut b = seeded(&db, "b@b.io").await;

        b.email = "a@b.io".into();
        assert!(matches!(
            UserRepository::update(&db, &b).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn deleting_user_cascades() {
        let db = InMemoryDatabase::new();
        let owner = seeded(&db, "owner@b.io").await;
        let other = seeded(&db, "other@b.io").await;
        let role = RoleRepository::insert(&db, "editor").await.unwrap();

        let profile = ProfileRepository::get(&db, owner.id).await.unwrap().unwrap();
        ProfileRepository::update(&db, &profile, Some(&[role.id][..]))
            .await
            .unwrap();
        let mine = item(owner.id, "mine");
        let theirs = item(other.id, "theirs");
        ItemRepository::insert(&db, &mine).await.unwrap();
        ItemRepository::insert(&db, &theirs).await.unwrap();

        UserRepository::delete(&db, owner.id).await.unwrap();

        assert!(ProfileRepository::get(&db, owner.id).await.unwrap().is_none());
        assert!(db.roles_for(owner.id).await.unwrap().is_empty());
        assert!(ItemRepository::get(&db, mine.id).await.unwrap().is_none());
        assert!(ItemRepository::get(&db, theirs.id).await.unwrap().is_some());
        assert!(RoleRepository::get(&db, role.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deleting_role_keeps_profiles() {
        let db = InMemoryDatabase::new();
        let u = seeded(&db, "u@b.io").await;
        let admin = RoleRepository::insert(&db, "admin").await.unwrap();
        let editor = RoleRepository::insert(&db, "editor").await.unwrap();
        let profile = ProfileRepository::get(&db, u.id).await.unwrap().unwrap();
        ProfileRepository::update(&db, &profile, Some(&[admin.id, editor.id][..]))
            .await
            .unwrap();

        RoleRepository::delete(&db, admin.id).await.unwrap();

        assert!(ProfileRepository::get(&db, u.id).await.unwrap().is_some());
        assert_eq!(db.roles_for(u.id).await.unwrap(), vec![editor]);
    }

    #[tokio::test]
    async fn role_set_is_replaced_not_merged() {
        let db = InMemoryDatabase::new();
        let u = seeded(&db, "u@b.io").await;
        let a = RoleRepository::insert(&db, "a").await.unwrap();
        let b = RoleRepository::insert(&db, "b").await.unwrap();
        let profile = ProfileRepository::get(&db, u.id).await.unwrap().unwrap();

        ProfileRepository::update(&db, &profile, Some(&[a.id][..])).await.unwrap();
        ProfileRepository::update(&db, &profile, Some(&[b.id][..])).await.unwrap();
        assert_eq!(db.roles_for(u.id).await.unwrap(), vec![b.clone()]);

        ProfileRepository::update(&db, &profile, None).await.unwrap();
        assert_eq!(db.roles_for(u.id).await.unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn unknown_role_leaves_set_untouched() {
        let db = InMemoryDatabase::new();
        let u = seeded(&db, "u@b.io").await;
        let a = RoleRepository::insert(&db, "a").await.unwrap();
        let profile = ProfileRepository::get(&db, u.id).await.unwrap().unwrap();
        ProfileRepository::update(&db, &profile, Some(&[a.id][..])).await.unwrap();

        let err = ProfileRepository::update(&db, &profile, Some(&[RoleId::new(99)][..]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("Role")));
        assert_eq!(db.roles_for(u.id).await.unwrap(), vec![a]);
    }

    #[tokio::test]
    async fn one_profile_per_user() {
        let db = InMemoryDatabase::new();
        let u = seeded(&db, "u@b.io").await;
        let err = ProfileRepository::insert(&db, &Profile::empty(u.id, Utc::now()), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let ghost = Profile::empty(UserId::new(), Utc::now());
        assert!(matches!(
            ProfileRepository::insert(&db, &ghost, &[]).await,
            Err(StoreError::NotFound("User"))
        ));
    }

    #[tokio::test]
    async fn role_names_are_unique_and_ids_increase() {
        let db = InMemoryDatabase::new();
        let first = RoleRepository::insert(&db, "admin").await.unwrap();
        let second = RoleRepository::insert(&db, "editor").await.unwrap();
        assert!(first.id < second.id);

        assert!(matches!(
            RoleRepository::insert(&db, "admin").await,
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            db.rename(second.id, "admin").await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(db.rename(second.id, "editor").await.unwrap().name, "editor");
    }

    #[tokio::test]
    async fn list_by_owner_pages_and_counts() {
        let db = InMemoryDatabase::new();
        let u = seeded(&db, "u@b.io").await;
        for n in 0..5 {
            ItemRepository::insert(&db, &item(u.id, &format!("item {n}")))
                .await
                .unwrap();
        }

        let (page, total) = db.list_by_owner(u.id, Page::new(1, 2)).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);

        let (none, total) = db.list_by_owner(UserId::new(), Page::default()).await.unwrap();
        assert!(none.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn get_many_ignores_unknown_and_duplicates() {
        let db = InMemoryDatabase::new();
        let a = RoleRepository::insert(&db, "a").await.unwrap();
        let found = db
            .get_many(&[a.id, a.id, RoleId::new(42)])
            .await
            .unwrap();
        assert_eq!(found, vec![a]);
    }
}
