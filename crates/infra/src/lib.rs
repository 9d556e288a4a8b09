//! Infrastructure layer: configuration, database access, migrations and the
//! repository implementations behind the API.

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod migrations;
pub mod repository;
pub mod seed;

pub use bootstrap::{BootstrapError, prepare_store};
pub use config::{ConfigError, Environment, Settings};
pub use repository::{Store, StoreError, StoreResult};
