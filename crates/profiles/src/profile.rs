use chrono::{DateTime, Utc};
use serde::Deserialize;

use profilehub_core::error::ensure_max_len;
use profilehub_core::{DomainResult, Entity, RoleId, Timestamps, UserId};

pub const NAME_MAX_LEN: usize = 100;
pub const AVATAR_URL_MAX_LEN: usize = 2048;
pub const BIO_MAX_LEN: usize = 1000;

/// Extended per-user attributes.
///
/// The user's id is the profile's primary key, so there is at most one profile
/// per user and it is removed together with the user. Role membership lives in
/// the association table and is loaded separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub user_id: UserId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub birth_date: Option<DateTime<Utc>>,
    pub timestamps: Timestamps,
}

impl Profile {
    pub fn new(user_id: UserId, fields: ProfileFields, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            first_name: fields.first_name,
            last_name: fields.last_name,
            avatar_url: fields.avatar_url,
            bio: fields.bio,
            birth_date: fields.birth_date,
            timestamps: Timestamps::new(now),
        }
    }

    /// Profile created alongside a new account.
    pub fn empty(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self::new(user_id, ProfileFields::default(), now)
    }

    /// Overwrite the fields that are present in `fields`; absent ones are kept.
    pub fn apply(&mut self, fields: ProfileFields, now: DateTime<Utc>) {
        if fields.first_name.is_some() {
            self.first_name = fields.first_name;
        }
        if fields.last_name.is_some() {
            self.last_name = fields.last_name;
        }
        if fields.avatar_url.is_some() {
            self.avatar_url = fields.avatar_url;
        }
        if fields.bio.is_some() {
            self.bio = fields.bio;
        }
        if fields.birth_date.is_some() {
            self.birth_date = fields.birth_date;
        }
        self.timestamps.touch(now);
    }
}

impl Entity for Profile {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.user_id
    }
}

/// The editable attribute set shared by create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileFields {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub birth_date: Option<DateTime<Utc>>,
}

impl ProfileFields {
    pub fn validated(self) -> DomainResult<Self> {
        if let Some(v) = &self.first_name {
            ensure_max_len("first_name", v, NAME_MAX_LEN)?;
        }
        if let Some(v) = &self.last_name {
            ensure_max_len("last_name", v, NAME_MAX_LEN)?;
        }
        if let Some(v) = &self.avatar_url {
            ensure_max_len("avatar_url", v, AVATAR_URL_MAX_LEN)?;
        }
        if let Some(v) = &self.bio {
            ensure_max_len("bio", v, BIO_MAX_LEN)?;
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileCreate {
    pub user_id: UserId,
    #[serde(flatten)]
    pub fields: ProfileFields,
    #[serde(default)]
    pub role_ids: Option<Vec<RoleId>>,
}

impl ProfileCreate {
    pub fn validated(mut self) -> DomainResult<Self> {
        self.fields = self.fields.validated()?;
        Ok(self)
    }
}

/// `role_ids`, when present, replaces the whole role set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileUpdate {
    #[serde(flatten)]
    pub fields: ProfileFields,
    #[serde(default)]
    pub role_ids: Option<Vec<RoleId>>,
}

impl ProfileUpdate {
    pub fn validated(mut self) -> DomainResult<Self> {
        self.fields = self.fields.validated()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn create_parses_flat_body() {
        let input: ProfileCreate = serde_json::from_str(
            r#"{
                "user_id": "0192b3a0-0000-7000-8000-000000000001",
                "first_name": "Ada",
                "birth_date": "1990-12-10T00:00:00Z",
                "role_ids": [1, 2]
            }"#,
        )
        .unwrap();

        assert_eq!(input.fields.first_name.as_deref(), Some("Ada"));
        assert_eq!(input.fields.last_name, None);
        assert_eq!(
            input.fields.birth_date,
            Some(Utc.with_ymd_and_hms(1990, 12, 10, 0, 0, 0).unwrap())
        );
        assert_eq!(input.role_ids, Some(vec![RoleId::new(1), RoleId::new(2)]));
    }

    #[test]
    fn update_without_role_ids_leaves_roles_alone() {
        let update: ProfileUpdate = serde_json::from_str(r#"{"bio": "hi"}"#).unwrap();
        assert_eq!(update.role_ids, None);
        assert_eq!(update.fields.bio.as_deref(), Some("hi"));
    }

    #[test]
    fn overlong_fields_are_rejected() {
        let fields = ProfileFields {
            bio: Some("b".repeat(BIO_MAX_LEN + 1)),
            ..Default::default()
        };
        assert!(fields.validated().is_err());

        let fields = ProfileFields {
            first_name: Some("n".repeat(NAME_MAX_LEN + 1)),
            ..Default::default()
        };
        assert!(fields.validated().is_err());
    }

    #[test]
    fn apply_merges_present_fields() {
        let now = Utc::now();
        let user = UserId::new();
        let mut profile = Profile::new(
            user,
            ProfileFields {
                first_name: Some("Ada".into()),
                last_name: Some("Lovelace".into()),
                ..Default::default()
            },
            now,
        );

        profile.apply(
            ProfileFields {
                last_name: Some("King".into()),
                ..Default::default()
            },
            now,
        );

        assert_eq!(profile.first_name.as_deref(), Some("Ada"));
        assert_eq!(profile.last_name.as_deref(), Some("King"));
        assert_eq!(*profile.id(), user);
    }

    #[test]
    fn empty_profile_has_no_attributes() {
        let profile = Profile::empty(UserId::new(), Utc::now());
        assert_eq!(profile.first_name, None);
        assert_eq!(profile.bio, None);
        assert_eq!(profile.timestamps.created_at, profile.timestamps.updated_at);
    }

    proptest! {
        #[test]
        fn names_are_bounded_by_character_count(name in "\\PC{0,130}") {
            let fields = ProfileFields {
                first_name: Some(name.clone()),
                last_name: Some(name.clone()),
                ..Default::default()
            };
            let fits = name.chars().count() <= NAME_MAX_LEN;
            prop_assert_eq!(fields.validated().is_ok(), fits);
        }

        #[test]
        fn bio_is_bounded(len in 900usize..1100) {
            let fields = ProfileFields {
                bio: Some("é".repeat(len)),
                ..Default::default()
            };
            prop_assert_eq!(fields.validated().is_ok(), len <= BIO_MAX_LEN);
        }
    }
}
