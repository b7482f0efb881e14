//! Error taxonomy for dictionary operations
//!
//! Every core operation reports failure as a [`DictionaryError`] value. The
//! HTTP layer and the metrics collector both classify errors through
//! [`DictionaryError::code`] and [`DictionaryError::category`], so the two
//! views never disagree.

use crate::model::EntityKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, DictionaryError>;

// =============================================================================
// CONSTRAINTS
// =============================================================================

/// Storage rule that rejected a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// A natural key is already taken
    Unique,
    /// A column value is outside its allowed domain
    Check,
    /// A referenced row does not exist or has the wrong shape
    ForeignKey,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Unique => write!(f, "unique"),
            Constraint::Check => write!(f, "check"),
            Constraint::ForeignKey => write!(f, "foreign key"),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DictionaryError {
    /// Lookup target is absent
    #[error("{entity} not found: {key}")]
    NotFound { entity: EntityKind, key: String },

    /// Discriminant outside its closed set (currently only language tags)
    #[error("unsupported language '{value}', expected one of: pl, en")]
    UnsupportedDomain { value: String },

    /// Write rejected by a storage rule
    #[error("{constraint} constraint violated: {detail}")]
    ConstraintViolation {
        constraint: Constraint,
        detail: String,
    },

    /// At least one concurrent child lookup failed; carries no per-item detail
    #[error("one or more {entity} lookups failed")]
    AggregateFetch { entity: EntityKind },

    /// Backend failure surfaced as-is
    #[error("storage error: {message}")]
    Storage { message: String },
}

impl DictionaryError {
    pub fn not_found(entity: EntityKind, key: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn unique(detail: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            constraint: Constraint::Unique,
            detail: detail.into(),
        }
    }

    pub fn check(detail: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            constraint: Constraint::Check,
            detail: detail.into(),
        }
    }

    pub fn foreign_key(detail: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            constraint: Constraint::ForeignKey,
            detail: detail.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True only for natural-key collisions, the one violation a racing
    /// create can resolve by re-reading.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::ConstraintViolation {
                constraint: Constraint::Unique,
                ..
            }
        )
    }

    /// A write referenced a row that no longer exists
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(
            self,
            Self::ConstraintViolation {
                constraint: Constraint::ForeignKey,
                ..
            }
        )
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::UnsupportedDomain { .. } => "unsupported_domain",
            Self::ConstraintViolation { .. } => "constraint_violation",
            Self::AggregateFetch { .. } => "aggregate_fetch",
            Self::Storage { .. } => "storage",
        }
    }

    /// Coarse grouping for metrics labels
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "resource_not_found",
            Self::UnsupportedDomain { .. } | Self::ConstraintViolation { .. } => {
                "validation_error"
            }
            Self::AggregateFetch { .. } | Self::Storage { .. } => "server_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_is_distinguished_from_other_constraints() {
        assert!(DictionaryError::unique("dup").is_unique_violation());
        assert!(!DictionaryError::check("bad").is_unique_violation());
        assert!(!DictionaryError::foreign_key("missing").is_unique_violation());
        assert!(DictionaryError::foreign_key("missing").is_foreign_key_violation());
        assert!(!DictionaryError::unique("dup").is_foreign_key_violation());
    }

    #[test]
    fn display_includes_entity_and_key() {
        let err = DictionaryError::not_found(EntityKind::Word, "kot");
        assert_eq!(err.to_string(), "word not found: kot");
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn aggregate_error_hides_item_detail() {
        let err = DictionaryError::AggregateFetch {
            entity: EntityKind::Example,
        };
        assert_eq!(err.to_string(), "one or more example lookups failed");
        assert_eq!(err.category(), "server_error");
    }
}
