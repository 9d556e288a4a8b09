//! Postgres-backed repositories.
//!
//! Queries target the schema as of the latest migration: profiles keyed by
//! `user_id`, association rows in `profile_roles(profile_user_id, role_id)`,
//! and cascading foreign keys from users to items and profiles.
//!
//! ## Error Mapping
//!
//! | PostgreSQL code | StoreError | Scenario |
//! |---|---|---|
//! | `23505` | `Conflict` | duplicate email, role name or profile |
//! | `23503` | `NotFound` | the referenced user or role does not exist (mapped at the call site) |
//! | other | `Database` | anything else |

mod items;
mod profiles;
mod roles;
mod users;

pub use items::PgItemRepository;
pub use profiles::PgProfileRepository;
pub use roles::PgRoleRepository;
pub use users::PgUserRepository;

use profilehub_core::Page;

use super::StoreError;

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    if is_unique_violation(&err) {
        let constraint = match &err {
            sqlx::Error::Database(db_err) => db_err.constraint().unwrap_or("unique").to_string(),
            _ => "unique".to_string(),
        };
        return StoreError::Conflict(format!("{operation}: {constraint} violated"));
    }
    tracing::debug!(operation, error = %err, "database error");
    StoreError::Database(err)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    has_code(err, "23505")
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    has_code(err, "23503")
}

fn has_code(err: &sqlx::Error, wanted: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(wanted),
        _ => false,
    }
}

fn page_bounds(page: Page) -> (i64, i64) {
    (page.offset() as i64, page.len() as i64)
}

fn count(total: i64) -> u64 {
    u64::try_from(total).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    //! Runs only when `TEST_DATABASE_URL` points at a disposable database.

    use chrono::{TimeZone, Utc};

    use profilehub_core::{ItemId, RoleId, UserId};
    use profilehub_items::{Item, ItemCreate};
    use profilehub_profiles::{Profile, ProfileFields};
    use profilehub_users::{User, UserCreate};

    use crate::migrations::Migrator;
    use crate::repository::{StoreError, Store};

    async fn test_pool() -> Option<sqlx::PgPool> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        Some(sqlx::PgPool::connect(&url).await.expect("connect TEST_DATABASE_URL"))
    }

    fn user(email: &str) -> User {
        User::new(
            UserId::new(),
            UserCreate {
                email: email.into(),
                password: "irrelevant".into(),
                is_active: true,
                is_superuser: false,
                full_name: Some("Test".into()),
            },
            "hash".into(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn schema_history_and_cascades() {
        let Some(pool) = test_pool().await else {
            eprintln!("TEST_DATABASE_URL not set; skipping");
            return;
        };

        let migrator = Migrator::new(pool.clone());
        migrator.rollback_to(0).await.unwrap();

        // Two instances starting together apply each migration exactly once.
        let other = Migrator::new(pool.clone());
        let (first, second) = tokio::join!(migrator.migrate(), other.migrate());
        let mut applied = first.unwrap();
        applied.extend(second.unwrap());
        applied.sort_unstable();
        assert_eq!(applied, vec![1, 2, 3, 4]);
        assert!(migrator.pending().await.unwrap().is_empty());

        let store = Store::postgres(pool.clone());

        // Unique email.
        let alice = user("alice@example.com");
        let profile = Profile::new(
            alice.id,
            ProfileFields {
                first_name: Some("Alice".into()),
                birth_date: Some(Utc.with_ymd_and_hms(1990, 1, 2, 0, 0, 0).unwrap()),
                ..Default::default()
            },
            Utc::now(),
        );
        store.users.insert_with_profile(&alice, &profile).await.unwrap();
        let dupe = user("alice@example.com");
        assert!(matches!(
            store
                .users
                .insert_with_profile(&dupe, &Profile::empty(dupe.id, Utc::now()))
                .await,
            Err(StoreError::Conflict(_))
        ));

        // Roles and the association table.
        let admin = store.roles.insert("admin").await.unwrap();
        let editor = store.roles.insert("editor").await.unwrap();
        assert!(matches!(store.roles.insert("admin").await, Err(StoreError::Conflict(_))));
        store
            .profiles
            .update(&profile, Some(&[admin.id, editor.id][..]))
            .await
            .unwrap();
        assert_eq!(store.profiles.roles_for(alice.id).await.unwrap().len(), 2);
        assert!(matches!(
            store.profiles.update(&profile, Some(&[RoleId::new(9999)][..])).await,
            Err(StoreError::NotFound("Role"))
        ));
        assert_eq!(store.profiles.roles_for(alice.id).await.unwrap().len(), 2);

        // Key move survives a down/up round trip with data in place.
        assert_eq!(migrator.rollback_to(2).await.unwrap(), vec![4, 3]);
        assert_eq!(migrator.migrate().await.unwrap(), vec![3, 4]);
        assert_eq!(
            store.profiles.roles_for(alice.id).await.unwrap(),
            vec![admin.clone(), editor.clone()]
        );

        // Deleting a role removes associations only.
        store.roles.delete(admin.id).await.unwrap();
        assert_eq!(store.profiles.roles_for(alice.id).await.unwrap(), vec![editor]);
        assert!(store.profiles.get(alice.id).await.unwrap().is_some());

        // Deleting the user cascades to items and the profile.
        let item = Item::new(
            ItemId::new(),
            alice.id,
            ItemCreate {
                title: "thing".into(),
                description: None,
            },
            Utc::now(),
        );
        store.items.insert(&item).await.unwrap();
        store.users.delete(alice.id).await.unwrap();
        assert!(store.items.get(item.id).await.unwrap().is_none());
        assert!(store.profiles.get(alice.id).await.unwrap().is_none());
        assert!(store.profiles.roles_for(alice.id).await.unwrap().is_empty());

        migrator.rollback_to(0).await.unwrap();
    }
}
