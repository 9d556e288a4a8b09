//! Operational commands: wait for the database, run or roll back migrations,
//! show migration status and seed the first superuser.

use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use sqlx::PgPool;
use tracing::{debug, info};

use profilehub_infra::{
    Settings, Store,
    config::load_dotenv,
    db::{RetryPolicy, connect_with_retry},
    migrations::{MIGRATIONS, Migrator},
    seed::ensure_first_superuser,
};

#[derive(Parser)]
#[command(name = "profilehub-admin")]
#[command(about = "profilehub database administration", long_about = None)]
#[command(version)]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Connection attempts before giving up
    #[arg(long, env = "DB_CONNECT_MAX_TRIES", default_value_t = 300, global = true)]
    max_tries: u32,

    /// Seconds to wait between attempts
    #[arg(long, env = "DB_CONNECT_WAIT_SECONDS", default_value_t = 1, global = true)]
    wait_seconds: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Block until the database accepts connections
    WaitDb,

    /// Apply every pending migration
    Migrate,

    /// Revert applied migrations newer than the target version
    Rollback {
        /// Version to keep (0 reverts everything)
        #[arg(long)]
        to: i64,
    },

    /// List known migrations and whether they are applied
    Status,

    /// Apply migrations, then create the first superuser if missing
    Seed,
}

impl Cli {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_tries: self.max_tries,
            wait: Duration::from_secs(self.wait_seconds),
        }
    }

    async fn connect(&self) -> anyhow::Result<PgPool> {
        let Some(url) = self.database_url.as_deref() else {
            bail!("DATABASE_URL is required");
        };
        connect_with_retry(url, self.retry_policy())
            .await
            .context("database unreachable")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = load_dotenv();
    profilehub_observability::init();
    if let Some(path) = dotenv {
        debug!(path = %path.display(), "loaded .env");
    }

    let cli = Cli::parse();
    match &cli.command {
        Commands::WaitDb => {
            cli.connect().await?;
            info!("database is ready");
        }
        Commands::Migrate => {
            let migrator = Migrator::new(cli.connect().await?);
            let applied = migrator.migrate().await?;
            info!(?applied, "migrations applied");
        }
        Commands::Rollback { to } => {
            let migrator = Migrator::new(cli.connect().await?);
            let reverted = migrator.rollback_to(*to).await?;
            info!(?reverted, target = *to, "migrations reverted");
        }
        Commands::Status => {
            let migrator = Migrator::new(cli.connect().await?);
            let applied = migrator.applied().await?;
            for migration in MIGRATIONS {
                let state = match applied.iter().find(|a| a.version == migration.version) {
                    Some(a) => format!("applied {}", a.applied_at.to_rfc3339()),
                    None => "pending".to_string(),
                };
                println!("{:04} {:<32} {}", migration.version, migration.name, state);
            }
        }
        Commands::Seed => {
            let settings = Settings::from_env().context("invalid configuration")?;
            let pool = cli.connect().await?;
            Migrator::new(pool.clone()).migrate().await?;
            let store = Store::postgres(pool);
            let created = ensure_first_superuser(
                &store,
                &settings.first_superuser,
                &settings.first_superuser_password,
            )
            .await?;
            info!(created, "first superuser ensured");
        }
    }

    Ok(())
}
