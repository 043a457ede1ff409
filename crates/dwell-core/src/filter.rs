//! Interest filters
//!
//! Narrow a retrieved population to the entities a caller cares about. The
//! orchestrator applies its filter only when `grouping_filter_enabled` is set.

use dwell_timeline::{GroupKey, StatusRecord};
use std::collections::BTreeSet;

/// Decides whether a retrieved record takes part in analysis
pub trait InterestFilter: Send + Sync {
    /// Check a record
    fn accepts(&self, record: &StatusRecord) -> bool;
}

impl<F> InterestFilter for F
where
    F: Fn(&StatusRecord) -> bool + Send + Sync,
{
    fn accepts(&self, record: &StatusRecord) -> bool {
        self(record)
    }
}

/// Accepts records whose group is on the list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupAllowList {
    groups: BTreeSet<GroupKey>,
}

impl GroupAllowList {
    /// Create allow list
    #[must_use]
    pub fn new(groups: impl IntoIterator<Item = impl Into<GroupKey>>) -> Self {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of allowed groups
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Check if nothing is allowed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl InterestFilter for GroupAllowList {
    fn accepts(&self, record: &StatusRecord) -> bool {
        record
            .group_key
            .as_ref()
            .is_some_and(|group| self.groups.contains(group))
    }
}
