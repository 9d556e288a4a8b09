//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Failures raised by input validation and entity rules.
///
/// Lookups and uniqueness belong to `StoreError` in `profilehub-infra`; the
/// API maps both.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Carries the client-facing message.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unparseable id string.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

/// Reject `value` if it is longer than `max` characters.
pub fn ensure_max_len(field: &str, value: &str, max: usize) -> DomainResult<()> {
    if value.chars().count() > max {
        return Err(DomainError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// Reject `value` if it is blank after trimming.
pub fn ensure_not_blank(field: &str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_len_counts_characters_not_bytes() {
        assert!(ensure_max_len("name", "ééé", 3).is_ok());
        assert!(ensure_max_len("name", "éééé", 3).is_err());
    }

    #[test]
    fn blank_values_are_rejected() {
        assert_eq!(
            ensure_not_blank("title", "   "),
            Err(DomainError::validation("title cannot be empty"))
        );
        assert!(ensure_not_blank("title", "x").is_ok());
    }
}
