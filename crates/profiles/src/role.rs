//! Roles: named groupings attached to profiles (M:N).

use std::collections::BTreeSet;

use serde::Deserialize;

use profilehub_core::error::{ensure_max_len, ensure_not_blank};
use profilehub_core::{DomainError, DomainResult, Entity, RoleId};

pub const ROLE_NAME_MAX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

impl Entity for Role {
    type Id = RoleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoleCreate {
    pub name: String,
}

impl RoleCreate {
    pub fn validated(self) -> DomainResult<Self> {
        Ok(Self {
            name: validate_name(&self.name)?,
        })
    }
}

/// Rename. Roles carry nothing else that can change.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoleUpdate {
    pub name: String,
}

impl RoleUpdate {
    pub fn validated(self) -> DomainResult<Self> {
        Ok(Self {
            name: validate_name(&self.name)?,
        })
    }
}

fn validate_name(raw: &str) -> DomainResult<String> {
    let name = raw.trim();
    ensure_not_blank("name", name)?;
    ensure_max_len("name", name, ROLE_NAME_MAX_LEN)?;
    Ok(name.to_string())
}

/// Sorted, duplicate-free copy of the requested role ids.
pub fn dedup_role_ids(requested: &[RoleId]) -> Vec<RoleId> {
    requested
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Every id in `requested` (already deduplicated) must have resolved to a role.
pub fn ensure_all_found(requested: &[RoleId], found: &[Role]) -> DomainResult<()> {
    if found.len() != requested.len() {
        return Err(DomainError::validation("Invalid role IDs provided"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn name_is_trimmed_and_bounded() {
        let ok = RoleCreate { name: " admin ".into() }.validated().unwrap();
        assert_eq!(ok.name, "admin");
        assert!(RoleCreate { name: "".into() }.validated().is_err());
        assert!(
            RoleUpdate {
                name: "r".repeat(ROLE_NAME_MAX_LEN + 1)
            }
            .validated()
            .is_err()
        );
    }

    #[test]
    fn missing_roles_are_rejected() {
        let requested = dedup_role_ids(&[RoleId::new(1), RoleId::new(2), RoleId::new(1)]);
        let found = vec![Role {
            id: RoleId::new(1),
            name: "admin".into(),
        }];
        assert_eq!(
            ensure_all_found(&requested, &found),
            Err(DomainError::validation("Invalid role IDs provided"))
        );
    }

    #[test]
    fn empty_request_is_fine() {
        assert!(ensure_all_found(&dedup_role_ids(&[]), &[]).is_ok());
    }

    proptest! {
        #[test]
        fn dedup_is_sorted_and_unique(ids in proptest::collection::vec(0i32..20, 0..40)) {
            let ids: Vec<RoleId> = ids.into_iter().map(RoleId::new).collect();
            let out = dedup_role_ids(&ids);
            prop_assert!(out.windows(2).all(|w| w[0] < w[1]));
            for id in &ids {
                prop_assert!(out.contains(id));
            }
        }
    }
}
