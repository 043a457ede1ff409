//! Error types for timeline reconstruction
//!
//! Only structural problems with a record are errors. Unparseable milestone
//! dates are not: they normalize to "unknown" and simply drop out.

use crate::record::EntityId;
use chrono::{DateTime, Utc};

/// Per-entity reconstruction failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimelineError {
    /// Creation anchor absent or unparseable
    #[error("entity {entity}: creation date missing or unparseable")]
    MissingCreatedAt {
        /// Offending entity
        entity: EntityId,
    },

    /// Creation anchor lies after the evaluation instant
    #[error("entity {entity}: created at {created_at} which is after {now}")]
    CreatedInFuture {
        /// Offending entity
        entity: EntityId,
        /// Normalized creation instant
        created_at: DateTime<Utc>,
        /// Evaluation instant
        now: DateTime<Utc>,
    },
}

impl TimelineError {
    /// Entity the failure belongs to
    #[inline]
    #[must_use]
    pub fn entity(&self) -> &EntityId {
        match self {
            Self::MissingCreatedAt { entity } | Self::CreatedInFuture { entity, .. } => entity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_entity() {
        let err = TimelineError::MissingCreatedAt {
            entity: EntityId::new("e-9"),
        };
        assert!(err.to_string().contains("e-9"));
        assert_eq!(err.entity(), &EntityId::new("e-9"));
    }
}
