//! User account model.
//!
//! Inputs are validated and normalized here so repositories and handlers only
//! ever see well-formed emails and bounded passwords. Password *hashing* is not
//! done here; callers hand over the already-hashed value.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use profilehub_core::error::{ensure_max_len, ensure_not_blank};
use profilehub_core::{DomainError, DomainResult, Entity, Timestamps, UserId};

pub const EMAIL_MAX_LEN: usize = 255;
pub const FULL_NAME_MAX_LEN: usize = 255;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 40;

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A stored user account.
///
/// # Invariants
/// - `email` is normalized (trimmed, lowercase) and unique across accounts.
/// - `hashed_password` is a PHC string, never plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub hashed_password: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub full_name: Option<String>,
    pub timestamps: Timestamps,
}

impl User {
    /// Build a new account from a validated [`UserCreate`].
    pub fn new(id: UserId, input: UserCreate, hashed_password: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            email: input.email,
            hashed_password,
            is_active: input.is_active,
            is_superuser: input.is_superuser,
            full_name: input.full_name,
            timestamps: Timestamps::new(now),
        }
    }

    /// Apply already-validated changes and bump `updated_at`.
    pub fn apply(&mut self, changes: UserChanges, now: DateTime<Utc>) {
        if let Some(email) = changes.email {
            self.email = email;
        }
        if let Some(hashed) = changes.hashed_password {
            self.hashed_password = hashed;
        }
        if let Some(full_name) = changes.full_name {
            self.full_name = Some(full_name);
        }
        if let Some(is_active) = changes.is_active {
            self.is_active = is_active;
        }
        if let Some(is_superuser) = changes.is_superuser {
            self.is_superuser = is_superuser;
        }
        self.timestamps.touch(now);
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inputs
// ─────────────────────────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

/// Admin-side account creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserCreate {
    pub email: String,
    pub password: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl UserCreate {
    pub fn validated(mut self) -> DomainResult<Self> {
        self.email = normalize_email(&self.email)?;
        validate_password(&self.password)?;
        self.full_name = normalize_full_name(self.full_name)?;
        Ok(self)
    }
}

/// Public self-registration. Never grants superuser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserRegister {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl From<UserRegister> for UserCreate {
    fn from(value: UserRegister) -> Self {
        Self {
            email: value.email,
            password: value.password,
            is_active: true,
            is_superuser: false,
            full_name: value.full_name,
        }
    }
}

/// Admin-side partial update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_superuser: Option<bool>,
}

impl UserUpdate {
    pub fn validated(mut self) -> DomainResult<Self> {
        if let Some(email) = &self.email {
            self.email = Some(normalize_email(email)?);
        }
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        self.full_name = normalize_full_name(self.full_name)?;
        Ok(self)
    }
}

/// Self-service update of the caller's own profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserUpdateMe {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl From<UserUpdateMe> for UserUpdate {
    fn from(value: UserUpdateMe) -> Self {
        Self {
            email: value.email,
            full_name: value.full_name,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdatePassword {
    pub current_password: String,
    pub new_password: String,
}

impl UpdatePassword {
    /// Length checks plus the "must actually change" guard.
    ///
    /// Verifying `current_password` against the stored hash is the caller's job.
    pub fn validated(self) -> DomainResult<Self> {
        validate_password(&self.current_password)?;
        validate_password(&self.new_password)?;
        if self.current_password == self.new_password {
            return Err(DomainError::validation("New password must be different"));
        }
        Ok(self)
    }
}

/// Storage-ready changes: email normalized, password already hashed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub email: Option<String>,
    pub hashed_password: Option<String>,
    pub full_name: Option<String>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
}

impl UserChanges {
    /// `hashed_password` must be the hash of `update.password` when it is set.
    pub fn from_update(update: UserUpdate, hashed_password: Option<String>) -> Self {
        Self {
            email: update.email,
            hashed_password,
            full_name: update.full_name,
            is_active: update.is_active,
            is_superuser: update.is_superuser,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────────────────────

/// Trim, lowercase and sanity-check an email address.
pub fn normalize_email(raw: &str) -> DomainResult<String> {
    let email = raw.trim().to_lowercase();
    ensure_max_len("email", &email, EMAIL_MAX_LEN)?;

    let invalid = || DomainError::validation("invalid email format");
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }
    Ok(email)
}

pub fn validate_password(password: &str) -> DomainResult<()> {
    let len = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return Err(DomainError::validation(format!(
            "password must be between {PASSWORD_MIN_LEN} and {PASSWORD_MAX_LEN} characters"
        )));
    }
    Ok(())
}

fn normalize_full_name(full_name: Option<String>) -> DomainResult<Option<String>> {
    match full_name {
        Some(name) => {
            let name = name.trim().to_string();
            ensure_not_blank("full_name", &name)?;
            ensure_max_len("full_name", &name, FULL_NAME_MAX_LEN)?;
            Ok(Some(name))
        }
        None => Ok(None),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn create(email: &str, password: &str) -> UserCreate {
        UserCreate {
            email: email.to_string(),
            password: password.to_string(),
            is_active: true,
            is_superuser: false,
            full_name: None,
        }
    }

    #[test]
    fn create_normalizes_email() {
        let input = create("  Alice@Example.COM ", "longenough").validated().unwrap();
        assert_eq!(input.email, "alice@example.com");
    }

    #[test]
    fn create_rejects_bad_email() {
        for bad in ["", "alice", "alice@", "@example.com", "a@b", "a@@b.com", "a b@c.com", "a@.com"] {
            assert!(create(bad, "longenough").validated().is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn create_enforces_password_bounds() {
        assert!(create("a@b.io", "short").validated().is_err());
        assert!(create("a@b.io", &"x".repeat(41)).validated().is_err());
        assert!(create("a@b.io", &"x".repeat(40)).validated().is_ok());
        assert!(create("a@b.io", &"x".repeat(8)).validated().is_ok());
    }

    #[test]
    fn create_defaults_from_json() {
        let input: UserCreate =
            serde_json::from_str(r#"{"email": "a@b.io", "password": "password1"}"#).unwrap();
        assert!(input.is_active);
        assert!(!input.is_superuser);
        assert_eq!(input.full_name, None);
    }

    #[test]
    fn register_never_grants_superuser() {
        let reg: UserRegister = serde_json::from_str(
            r#"{"email": "a@b.io", "password": "password1", "is_superuser": true}"#,
        )
        .unwrap();
        let create = UserCreate::from(reg);
        assert!(!create.is_superuser);
        assert!(create.is_active);
    }

    #[test]
    fn blank_full_name_is_rejected() {
        let mut input = create("a@b.io", "password1");
        input.full_name = Some("   ".into());
        assert!(input.validated().is_err());
    }

    #[test]
    fn update_password_must_change() {
        let same = UpdatePassword {
            current_password: "password1".into(),
            new_password: "password1".into(),
        };
        assert_eq!(
            same.validated(),
            Err(DomainError::validation("New password must be different"))
        );
    }

    #[test]
    fn apply_leaves_absent_fields_alone() {
        let now = Utc::now();
        let mut user = User::new(
            UserId::new(),
            create("a@b.io", "password1").validated().unwrap(),
            "hash".into(),
            now,
        );
        user.full_name = Some("Alice".into());

        user.apply(
            UserChanges {
                hashed_password: Some("new-hash".into()),
                ..Default::default()
            },
            now,
        );

        assert_eq!(user.hashed_password, "new-hash");
        assert_eq!(user.email, "a@b.io");
        assert_eq!(user.full_name.as_deref(), Some("Alice"));
        assert!(user.is_active);
    }

    #[test]
    fn update_me_cannot_touch_privileges() {
        let me: UserUpdateMe =
            serde_json::from_str(r#"{"full_name": "Bob", "is_superuser": true}"#).unwrap();
        let update = UserUpdate::from(me);
        assert_eq!(update.is_superuser, None);
        assert_eq!(update.full_name.as_deref(), Some("Bob"));
    }

    proptest! {
        #[test]
        fn normalized_emails_are_idempotent(local in "[a-z0-9._]{1,20}", domain in "[a-z]{1,10}\\.[a-z]{2,5}") {
            let raw = format!("{}@{}", local.to_uppercase(), domain);
            let once = normalize_email(&raw).unwrap();
            prop_assert_eq!(normalize_email(&once).unwrap(), once.clone());
            prop_assert_eq!(once, raw.to_lowercase());
        }

        #[test]
        fn password_length_rule(len in 0usize..64) {
            let ok = validate_password(&"p".repeat(len)).is_ok();
            prop_assert_eq!(ok, (PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len));
        }
    }
}
