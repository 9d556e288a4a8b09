//! `profilehub-core`: shared building blocks for the profilehub domain crates.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod page;

pub use entity::{Entity, Timestamps};
pub use error::{DomainError, DomainResult};
pub use id::{ItemId, RoleId, UserId};
pub use page::Page;
