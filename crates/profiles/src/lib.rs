//! Profiles (1:1 with users, keyed by `user_id`) and the roles attached to them.

pub mod profile;
pub mod role;

pub use profile::{
    AVATAR_URL_MAX_LEN, BIO_MAX_LEN, NAME_MAX_LEN, Profile, ProfileCreate, ProfileFields,
    ProfileUpdate,
};
pub use role::{ROLE_NAME_MAX_LEN, Role, RoleCreate, RoleUpdate, dedup_role_ids, ensure_all_found};
