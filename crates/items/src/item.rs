use chrono::{DateTime, Utc};
use serde::Deserialize;

use profilehub_core::error::{ensure_max_len, ensure_not_blank};
use profilehub_core::{DomainResult, Entity, ItemId, Timestamps, UserId};

pub const TITLE_MAX_LEN: usize = 255;
pub const DESCRIPTION_MAX_LEN: usize = 255;

/// An item owned by exactly one user. Deleted together with its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub timestamps: Timestamps,
}

impl Item {
    pub fn new(id: ItemId, owner_id: UserId, input: ItemCreate, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: input.title,
            description: input.description,
            owner_id,
            timestamps: Timestamps::new(now),
        }
    }

    pub fn apply(&mut self, update: ItemUpdate, now: DateTime<Utc>) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        self.timestamps.touch(now);
    }

    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner_id == user
    }
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemCreate {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl ItemCreate {
    pub fn validated(mut self) -> DomainResult<Self> {
        self.title = validate_title(&self.title)?;
        if let Some(description) = &self.description {
            ensure_max_len("description", description, DESCRIPTION_MAX_LEN)?;
        }
        Ok(self)
    }
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ItemUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ItemUpdate {
    pub fn validated(mut self) -> DomainResult<Self> {
        if let Some(title) = &self.title {
            self.title = Some(validate_title(title)?);
        }
        if let Some(description) = &self.description {
            ensure_max_len("description", description, DESCRIPTION_MAX_LEN)?;
        }
        Ok(self)
    }
}

fn validate_title(raw: &str) -> DomainResult<String> {
    let title = raw.trim();
    ensure_not_blank("title", title)?;
    ensure_max_len("title", title, TITLE_MAX_LEN)?;
    Ok(title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(title: &str) -> ItemCreate {
        ItemCreate {
            title: title.into(),
            description: None,
        }
    }

    #[test]
    fn title_is_trimmed_and_required() {
        assert_eq!(create("  Widget ").validated().unwrap().title, "Widget");
        assert!(create("").validated().is_err());
        assert!(create("   ").validated().is_err());
    }

    #[test]
    fn title_length_is_bounded() {
        assert!(create(&"t".repeat(TITLE_MAX_LEN)).validated().is_ok());
        assert!(create(&"t".repeat(TITLE_MAX_LEN + 1)).validated().is_err());
    }

    #[test]
    fn description_length_is_bounded() {
        let input = ItemCreate {
            title: "ok".into(),
            description: Some("d".repeat(DESCRIPTION_MAX_LEN + 1)),
        };
        assert!(input.validated().is_err());
    }

    #[test]
    fn update_rejects_blank_title_but_allows_absent() {
        assert!(ItemUpdate::default().validated().is_ok());
        let blank = ItemUpdate {
            title: Some(" ".into()),
            description: None,
        };
        assert!(blank.validated().is_err());
    }

    #[test]
    fn apply_keeps_owner_and_untouched_fields() {
        let owner = UserId::new();
        let now = Utc::now();
        let mut item = Item::new(
            ItemId::new(),
            owner,
            ItemCreate {
                title: "a".into(),
                description: Some("first".into()),
            },
            now,
        );

        item.apply(
            ItemUpdate {
                title: Some("b".into()),
                description: None,
            },
            now,
        );

        assert_eq!(item.title, "b");
        assert_eq!(item.description.as_deref(), Some("first"));
        assert!(item.is_owned_by(owner));
        assert!(!item.is_owned_by(UserId::new()));
    }

    #[test]
    fn create_deserializes_without_description() {
        let input: ItemCreate = serde_json::from_str(r#"{"title": "x"}"#).unwrap();
        assert_eq!(input.description, None);
    }
}
