//! User accounts: the stored model and the inputs that create or change it.

pub mod user;

pub use user::{
    EMAIL_MAX_LEN, FULL_NAME_MAX_LEN, PASSWORD_MAX_LEN, PASSWORD_MIN_LEN, UpdatePassword, User,
    UserChanges, UserCreate, UserRegister, UserUpdate, UserUpdateMe, normalize_email,
    validate_password,
};
