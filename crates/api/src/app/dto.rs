use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use profilehub_core::{ItemId, RoleId, UserId};
use profilehub_items::Item;
use profilehub_profiles::{Profile, Role};
use profilehub_users::{User, UserCreate};

// -------------------------
// Request DTOs
// -------------------------

/// OAuth2 password-flow form body; `username` carries the email.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Unauthenticated account creation, local environment only.
#[derive(Debug, Deserialize)]
pub struct PrivateUserCreate {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

impl From<PrivateUserCreate> for UserCreate {
    fn from(value: PrivateUserCreate) -> Self {
        UserCreate {
            email: value.email,
            password: value.password,
            is_active: true,
            is_superuser: false,
            full_name: Some(value.full_name),
        }
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: &'static str,
}

impl Token {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A page of results plus the total across all pages.
#[derive(Debug, Serialize)]
pub struct Listing<T> {
    pub data: Vec<T>,
    pub count: u64,
}

impl<T> Listing<T> {
    pub fn new(data: Vec<T>, count: u64) -> Self {
        Self { data, count }
    }
}

#[derive(Debug, Serialize)]
pub struct RolePublic {
    pub id: RoleId,
    pub name: String,
}

impl From<Role> for RolePublic {
    fn from(role: Role) -> Self {
        Self {
            id: role.id,
            name: role.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemPublic {
    pub id: ItemId,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Item> for ItemPublic {
    fn from(item: Item) -> Self {
        Self {
            id: item.id,
            title: item.title,
            description: item.description,
            owner_id: item.owner_id,
            created_at: item.timestamps.created_at,
            updated_at: item.timestamps.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfilePublic {
    pub user_id: UserId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub birth_date: Option<DateTime<Utc>>,
    pub roles: Vec<RolePublic>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfilePublic {
    pub fn new(profile: Profile, roles: Vec<Role>) -> Self {
        Self {
            user_id: profile.user_id,
            first_name: profile.first_name,
            last_name: profile.last_name,
            avatar_url: profile.avatar_url,
            bio: profile.bio,
            birth_date: profile.birth_date,
            roles: roles.into_iter().map(RolePublic::from).collect(),
            created_at: profile.timestamps.created_at,
            updated_at: profile.timestamps.updated_at,
        }
    }
}

/// Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct UserPublic {
    pub id: UserId,
    pub email: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfilePublic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ItemPublic>>,
}

impl UserPublic {
    pub fn with_relations(
        user: User,
        profile: Option<ProfilePublic>,
        items: Vec<ItemPublic>,
    ) -> Self {
        Self {
            profile,
            items: Some(items),
            ..Self::from(user)
        }
    }
}

impl From<User> for UserPublic {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            is_active: user.is_active,
            is_superuser: user.is_superuser,
            full_name: user.full_name,
            created_at: user.timestamps.created_at,
            updated_at: user.timestamps.updated_at,
            profile: None,
            items: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use profilehub_core::Timestamps;

    fn user() -> User {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        User {
            id: UserId::new(),
            email: "a@example.com".into(),
            hashed_password: "$argon2id$secret".into(),
            is_active: true,
            is_superuser: false,
            full_name: None,
            timestamps: Timestamps::new(now),
        }
    }

    #[test]
    fn user_public_hides_hash_and_absent_relations() {
        let json = serde_json::to_value(UserPublic::from(user())).unwrap();
        assert!(json.get("hashed_password").is_none());
        assert!(json.get("profile").is_none());
        assert!(json.get("items").is_none());
        assert_eq!(json["email"], "a@example.com");
    }

    #[test]
    fn relations_are_serialized_when_loaded() {
        let json = serde_json::to_value(UserPublic::with_relations(user(), None, Vec::new())).unwrap();
        assert_eq!(json["items"], serde_json::json!([]));
        assert!(json.get("profile").is_none());
    }

    #[test]
    fn token_is_bearer() {
        let json = serde_json::to_value(Token::bearer("abc".into())).unwrap();
        assert_eq!(json, serde_json::json!({"access_token": "abc", "token_type": "bearer"}));
    }
}
