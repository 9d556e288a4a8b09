//! Items: short owned records (title + optional description).
pub mod item;

pub use item::{DESCRIPTION_MAX_LEN, Item, ItemCreate, ItemUpdate, TITLE_MAX_LEN};
