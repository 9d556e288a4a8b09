//! Versioned schema migrations with `up` and `down` steps.
//!
//! Applied versions are recorded in `schema_migrations`. Each migration (and
//! its bookkeeping row) runs inside a single transaction, so a failed step
//! leaves the schema at the previous version. `migrate` and `rollback_to`
//! hold a session advisory lock for their whole run, so instances starting
//! together apply each migration once.

use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres, Row};
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Advisory lock key shared by every process migrating this schema.
const LOCK_KEY: i64 = 0x7072_6f66_696c_6568;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub up: &'static [&'static str],
    pub down: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("unknown migration version {0}")]
    UnknownVersion(i64),

    #[error("database has version {0} applied which this build does not know")]
    UnknownApplied(i64),

    #[error("migration {version} ({name}) failed: {source}")]
    Step {
        version: i64,
        name: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("migration bookkeeping failed: {0}")]
    Database(#[from] sqlx::Error),
}

const INITIAL: Migration = Migration {
    version: 1,
    name: "initial",
    up: &[
        r#"CREATE TABLE users (
            id UUID PRIMARY KEY,
            email VARCHAR(255) NOT NULL,
            hashed_password TEXT NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            is_superuser BOOLEAN NOT NULL DEFAULT FALSE,
            full_name VARCHAR(255),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT users_email_key UNIQUE (email)
        )"#,
        r#"CREATE TABLE items (
            id UUID PRIMARY KEY,
            title VARCHAR(255) NOT NULL,
            description VARCHAR(255),
            owner_id UUID NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT items_owner_id_fkey FOREIGN KEY (owner_id) REFERENCES users (id)
        )"#,
        r#"CREATE TABLE profiles (
            id UUID NOT NULL DEFAULT gen_random_uuid(),
            user_id UUID NOT NULL,
            role VARCHAR,
            avatar_url VARCHAR,
            bio VARCHAR,
            birth_date TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT profiles_pkey PRIMARY KEY (id),
            CONSTRAINT profiles_user_id_key UNIQUE (user_id),
            CONSTRAINT profiles_user_id_fkey FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
        )"#,
    ],
    down: &[
        "DROP TABLE profiles",
        "DROP TABLE items",
        "DROP TABLE users",
    ],
};

const ROLES: Migration = Migration {
    version: 2,
    name: "roles",
    up: &[
        r#"CREATE TABLE roles (
            id SERIAL PRIMARY KEY,
            name VARCHAR(64) NOT NULL,
            CONSTRAINT roles_name_key UNIQUE (name)
        )"#,
        r#"CREATE TABLE profile_roles (
            profile_id UUID NOT NULL,
            role_id INTEGER NOT NULL,
            CONSTRAINT profile_roles_pkey PRIMARY KEY (profile_id, role_id),
            CONSTRAINT profile_roles_profile_id_fkey FOREIGN KEY (profile_id) REFERENCES profiles (id) ON DELETE CASCADE,
            CONSTRAINT profile_roles_role_id_fkey FOREIGN KEY (role_id) REFERENCES roles (id) ON DELETE CASCADE
        )"#,
        "ALTER TABLE profiles ADD COLUMN first_name VARCHAR(100), ADD COLUMN last_name VARCHAR(100)",
        "ALTER TABLE profiles DROP COLUMN role",
    ],
    down: &[
        "ALTER TABLE profiles ADD COLUMN role VARCHAR",
        "ALTER TABLE profiles DROP COLUMN first_name, DROP COLUMN last_name",
        "DROP TABLE profile_roles",
        "DROP TABLE roles",
    ],
};

/// Re-key profiles by `user_id` and point the association table at it.
const PROFILES_KEYED_BY_USER: Migration = Migration {
    version: 3,
    name: "profiles_keyed_by_user",
    up: &[
        "ALTER TABLE profile_roles ADD COLUMN profile_user_id UUID",
        r#"UPDATE profile_roles pr
            SET profile_user_id = p.user_id
            FROM profiles p
            WHERE p.id = pr.profile_id"#,
        "ALTER TABLE profile_roles ALTER COLUMN profile_user_id SET NOT NULL",
        "ALTER TABLE profile_roles DROP CONSTRAINT profile_roles_profile_id_fkey",
        "ALTER TABLE profile_roles DROP CONSTRAINT profile_roles_pkey",
        "ALTER TABLE profile_roles DROP COLUMN profile_id",
        "ALTER TABLE profiles DROP CONSTRAINT profiles_user_id_key CASCADE",
        "ALTER TABLE profiles DROP COLUMN id",
        "ALTER TABLE profiles ADD CONSTRAINT profiles_pkey PRIMARY KEY (user_id)",
        r#"ALTER TABLE profile_roles
            ADD CONSTRAINT profile_roles_profile_user_id_fkey
            FOREIGN KEY (profile_user_id) REFERENCES profiles (user_id) ON DELETE CASCADE"#,
        "ALTER TABLE profile_roles ADD CONSTRAINT profile_roles_pkey PRIMARY KEY (profile_user_id, role_id)",
    ],
    down: &[
        "ALTER TABLE profile_roles DROP CONSTRAINT profile_roles_pkey",
        "ALTER TABLE profile_roles DROP CONSTRAINT profile_roles_profile_user_id_fkey",
        "ALTER TABLE profiles DROP CONSTRAINT profiles_pkey",
        "ALTER TABLE profiles ADD COLUMN id UUID NOT NULL DEFAULT gen_random_uuid()",
        "ALTER TABLE profiles ADD CONSTRAINT profiles_pkey PRIMARY KEY (id)",
        "ALTER TABLE profiles ADD CONSTRAINT profiles_user_id_key UNIQUE (user_id)",
        "ALTER TABLE profile_roles ADD COLUMN profile_id UUID",
        r#"UPDATE profile_roles pr
            SET profile_id = p.id
            FROM profiles p
            WHERE p.user_id = pr.profile_user_id"#,
        "ALTER TABLE profile_roles ALTER COLUMN profile_id SET NOT NULL",
        r#"ALTER TABLE profile_roles
            ADD CONSTRAINT profile_roles_profile_id_fkey
            FOREIGN KEY (profile_id) REFERENCES profiles (id) ON DELETE CASCADE"#,
        "ALTER TABLE profile_roles DROP COLUMN profile_user_id",
        "ALTER TABLE profile_roles ADD CONSTRAINT profile_roles_pkey PRIMARY KEY (profile_id, role_id)",
    ],
};

const ITEM_OWNER_CASCADE: Migration = Migration {
    version: 4,
    name: "item_owner_cascade",
    up: &[
        "ALTER TABLE items DROP CONSTRAINT items_owner_id_fkey",
        r#"ALTER TABLE items
            ADD CONSTRAINT items_owner_id_fkey
            FOREIGN KEY (owner_id) REFERENCES users (id) ON DELETE CASCADE"#,
        "CREATE INDEX ix_items_owner_id ON items (owner_id)",
    ],
    down: &[
        "DROP INDEX ix_items_owner_id",
        "ALTER TABLE items DROP CONSTRAINT items_owner_id_fkey",
        r#"ALTER TABLE items
            ADD CONSTRAINT items_owner_id_fkey
            FOREIGN KEY (owner_id) REFERENCES users (id)"#,
    ],
};

/// Every migration this build knows, oldest first.
pub const MIGRATIONS: &[Migration] = &[INITIAL, ROLES, PROFILES_KEYED_BY_USER, ITEM_OWNER_CASCADE];

pub fn latest_version() -> i64 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Migrations not yet in `applied`, in apply order.
pub fn plan_pending<'a>(all: &'a [Migration], applied: &[i64]) -> Vec<&'a Migration> {
    all.iter().filter(|m| !applied.contains(&m.version)).collect()
}

/// Applied migrations newer than `target`, newest first.
pub fn plan_rollback<'a>(
    all: &'a [Migration],
    applied: &[i64],
    target: i64,
) -> Result<Vec<&'a Migration>, MigrationError> {
    if target != 0 && !all.iter().any(|m| m.version == target) {
        return Err(MigrationError::UnknownVersion(target));
    }
    let mut plan = Vec::new();
    for version in applied.iter().copied().filter(|v| *v > target) {
        let migration = all
            .iter()
            .find(|m| m.version == version)
            .ok_or(MigrationError::UnknownApplied(version))?;
        plan.push(migration);
    }
    plan.sort_by(|a, b| b.version.cmp(&a.version));
    Ok(plan)
}

/// Runs [`MIGRATIONS`] against a Postgres pool.
#[derive(Debug, Clone)]
pub struct Migrator {
    pool: PgPool,
    migrations: &'static [Migration],
}

impl Migrator {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            migrations: MIGRATIONS,
        }
    }

    async fn ensure_table(&self) -> Result<(), MigrationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version BIGINT PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn applied(&self) -> Result<Vec<AppliedMigration>, MigrationError> {
        self.ensure_table().await?;
        let rows = sqlx::query(
            "SELECT version, name, applied_at FROM schema_migrations ORDER BY version ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut applied = Vec::with_capacity(rows.len());
        for row in rows {
            applied.push(AppliedMigration {
                version: row.try_get("version")?,
                name: row.try_get("name")?,
                applied_at: row.try_get("applied_at")?,
            });
        }
        Ok(applied)
    }

    pub async fn applied_versions(&self) -> Result<Vec<i64>, MigrationError> {
        Ok(self.applied().await?.into_iter().map(|m| m.version).collect())
    }

    pub async fn pending(&self) -> Result<Vec<&'static Migration>, MigrationError> {
        let applied = self.applied_versions().await?;
        Ok(plan_pending(self.migrations, &applied))
    }

    /// Apply every pending migration. Returns the versions applied.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<Vec<i64>, MigrationError> {
        let conn = self.lock().await?;
        let result = self.migrate_locked().await;
        Self::unlock(conn).await;
        result
    }

    async fn migrate_locked(&self) -> Result<Vec<i64>, MigrationError> {
        let pending = self.pending().await?;
        let mut done = Vec::with_capacity(pending.len());
        for migration in pending {
            self.run(migration, Direction::Up).await?;
            done.push(migration.version);
        }
        if done.is_empty() {
            info!("schema is up to date");
        }
        Ok(done)
    }

    /// Undo applied migrations newer than `target`, newest first. `0` empties the schema.
    #[instrument(skip(self), err)]
    pub async fn rollback_to(&self, target: i64) -> Result<Vec<i64>, MigrationError> {
        let conn = self.lock().await?;
        let result = self.rollback_locked(target).await;
        Self::unlock(conn).await;
        result
    }

    async fn rollback_locked(&self, target: i64) -> Result<Vec<i64>, MigrationError> {
        let applied = self.applied_versions().await?;
        let plan = plan_rollback(self.migrations, &applied, target)?;
        let mut done = Vec::with_capacity(plan.len());
        for migration in plan {
            self.run(migration, Direction::Down).await?;
            done.push(migration.version);
        }
        Ok(done)
    }

    /// Blocks until no other session holds the migration lock.
    async fn lock(&self) -> Result<PoolConnection<Postgres>, MigrationError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(LOCK_KEY)
            .execute(&mut *conn)
            .await?;
        Ok(conn)
    }

    async fn unlock(mut conn: PoolConnection<Postgres>) {
        let released = sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(LOCK_KEY)
            .execute(&mut *conn)
            .await;
        if let Err(err) = released {
            // Closing the session drops the lock with it.
            warn!(error = %err, "failed to release migration lock");
            drop(conn.detach());
        }
    }

    async fn run(&self, migration: &'static Migration, direction: Direction) -> Result<(), MigrationError> {
        let step_err = |source| MigrationError::Step {
            version: migration.version,
            name: migration.name,
            source,
        };

        let mut tx = self.pool.begin().await?;
        let statements = match direction {
            Direction::Up => migration.up,
            Direction::Down => migration.down,
        };
        for statement in statements.iter().copied() {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(step_err)?;
        }

        match direction {
            Direction::Up => {
                sqlx::query("INSERT INTO schema_migrations (version, name) VALUES ($1, $2)")
                    .bind(migration.version)
                    .bind(migration.name)
                    .execute(&mut *tx)
                    .await?;
            }
            Direction::Down => {
                sqlx::query("DELETE FROM schema_migrations WHERE version = $1")
                    .bind(migration.version)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        info!(
            version = migration.version,
            name = migration.name,
            direction = ?direction,
            "migration applied"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Up,
    Down,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_strictly_increasing() {
        assert!(MIGRATIONS.windows(2).all(|w| w[0].version < w[1].version));
        assert_eq!(MIGRATIONS[0].version, 1);
        assert_eq!(latest_version(), 4);
    }

    #[test]
    fn every_migration_is_reversible() {
        for m in MIGRATIONS {
            assert!(!m.up.is_empty(), "{} has no up", m.name);
            assert!(!m.down.is_empty(), "{} has no down", m.name);
        }
    }

    #[test]
    fn pending_skips_applied() {
        let plan = plan_pending(MIGRATIONS, &[1, 2]);
        let versions: Vec<i64> = plan.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![3, 4]);
        assert!(plan_pending(MIGRATIONS, &[1, 2, 3, 4]).is_empty());
    }

    #[test]
    fn rollback_runs_newest_first() {
        let plan = plan_rollback(MIGRATIONS, &[1, 2, 3, 4], 2).unwrap();
        let versions: Vec<i64> = plan.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![4, 3]);

        let all = plan_rollback(MIGRATIONS, &[1, 2, 3, 4], 0).unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[3].version, 1);
    }

    #[test]
    fn rollback_rejects_unknown_versions() {
        assert!(matches!(
            plan_rollback(MIGRATIONS, &[1, 2], 9),
            Err(MigrationError::UnknownVersion(9))
        ));
        assert!(matches!(
            plan_rollback(MIGRATIONS, &[1, 7], 1),
            Err(MigrationError::UnknownApplied(7))
        ));
    }

    fn position(statements: &[&str], needle: &str) -> usize {
        statements
            .iter()
            .position(|s| s.contains(needle))
            .unwrap_or_else(|| panic!("no statement contains {needle:?}"))
    }

    #[test]
    fn key_move_backfills_before_not_null() {
        let up = PROFILES_KEYED_BY_USER.up;
        let add = position(up, "ADD COLUMN profile_user_id");
        let backfill = position(up, "SET profile_user_id = p.user_id");
        let not_null = position(up, "profile_user_id SET NOT NULL");
        assert!(add < backfill && backfill < not_null);
    }

    #[test]
    fn key_move_drops_old_fk_before_old_key() {
        let up = PROFILES_KEYED_BY_USER.up;
        let drop_fk = position(up, "DROP CONSTRAINT profile_roles_profile_id_fkey");
        let drop_unique = position(up, "DROP CONSTRAINT profiles_user_id_key CASCADE");
        let drop_id = position(up, "profiles DROP COLUMN id");
        let new_pk = position(up, "profiles_pkey PRIMARY KEY (user_id)");
        let new_fk = position(up, "ADD CONSTRAINT profile_roles_profile_user_id_fkey");
        assert!(drop_fk < drop_unique);
        assert!(drop_unique < drop_id);
        assert!(drop_id < new_pk);
        assert!(new_pk < new_fk);
        assert!(up[new_fk].contains("ON DELETE CASCADE"));
    }

    #[test]
    fn key_move_down_restores_original_names() {
        let down = PROFILES_KEYED_BY_USER.down;
        position(down, "ADD CONSTRAINT profiles_user_id_key UNIQUE (user_id)");
        position(down, "ADD CONSTRAINT profile_roles_profile_id_fkey");
        position(down, "PRIMARY KEY (profile_id, role_id)");
        let backfill = position(down, "SET profile_id = p.id");
        let not_null = position(down, "profile_id SET NOT NULL");
        assert!(backfill < not_null);
    }

    #[test]
    fn item_owner_fk_cascades_after_last_migration() {
        let up = ITEM_OWNER_CASCADE.up;
        assert!(up[position(up, "ADD CONSTRAINT items_owner_id_fkey")].contains("ON DELETE CASCADE"));
        position(up, "CREATE INDEX ix_items_owner_id");
    }
}
