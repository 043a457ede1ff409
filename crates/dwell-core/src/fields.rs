//! Field negotiation
//!
//! Sources differ in which milestone fields they expose. The orchestrator asks
//! once per session which of the fields it wants are available, then requests
//! only those.

use dwell_timeline::{StatusRecord, StatusVocabulary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Entity identifier field
pub const ID: &str = "id";
/// Current status field
pub const CURRENT_STATUS: &str = "currentStatus";
/// Creation anchor field
pub const CREATED_AT: &str = "createdAt";
/// Last modification anchor field
pub const LAST_MODIFIED_AT: &str = "lastModifiedAt";
/// Grouping value field
pub const GROUP_KEY: &str = "groupKey";

const REQUIRED: [&str; 4] = [ID, CURRENT_STATUS, CREATED_AT, LAST_MODIFIED_AT];

/// Ordered set of field names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSet(BTreeSet<String>);

impl FieldSet {
    /// Identity, status and anchors only
    #[must_use]
    pub fn minimal() -> Self {
        REQUIRED.into_iter().collect()
    }

    /// Everything the vocabulary can use: anchors, milestones, group
    #[must_use]
    pub fn standard(vocabulary: &StatusVocabulary) -> Self {
        let mut set = Self::minimal();
        for rule in &vocabulary.milestones {
            set.insert(rule.field.clone());
        }
        set.insert(GROUP_KEY);
        set
    }

    /// Add a field
    pub fn insert(&mut self, field: impl Into<String>) {
        self.0.insert(field.into());
    }

    /// Check membership
    #[inline]
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    /// Fields present in both sets
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        Self(self.0.intersection(&other.0).cloned().collect())
    }

    /// First field of `self` missing from `other`
    #[must_use]
    pub fn first_missing_from(&self, other: &Self) -> Option<&str> {
        self.0
            .iter()
            .find(|field| !other.0.contains(*field))
            .map(String::as_str)
    }

    /// Iterate field names in order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop every value the set does not cover
    ///
    /// Milestones outside the set are removed and the group key is cleared
    /// unless [`GROUP_KEY`] is included. Identity and status always survive.
    pub fn project(&self, record: &mut StatusRecord) {
        record.milestones.retain(|field, _| self.contains(field));
        if !self.contains(GROUP_KEY) {
            record.group_key = None;
        }
    }
}

impl<S: Into<String>> FromIterator<S> for FieldSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Fields a source confirmed it can serve
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupportedFields {
    fields: FieldSet,
}

impl SupportedFields {
    /// Wrap a negotiated set
    #[inline]
    #[must_use]
    pub fn new(fields: FieldSet) -> Self {
        Self { fields }
    }

    /// Negotiated fields
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// Narrow a request to what is supported
    #[must_use]
    pub fn restrict(&self, requested: &FieldSet) -> FieldSet {
        requested.intersection(&self.fields)
    }

    /// Check if a field is served
    #[inline]
    #[must_use]
    pub fn supports(&self, field: &str) -> bool {
        self.fields.contains(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_includes_every_milestone() {
        let vocab = StatusVocabulary::default();
        let set = FieldSet::standard(&vocab);
        for rule in &vocab.milestones {
            assert!(set.contains(&rule.field));
        }
        assert!(set.contains(GROUP_KEY));
        assert!(set.contains(CREATED_AT));
    }

    #[test]
    fn minimal_is_anchors_only() {
        let set = FieldSet::minimal();
        assert_eq!(set.len(), 4);
        assert!(!set.contains("appliedDate"));
        assert!(!set.contains(GROUP_KEY));
    }

    #[test]
    fn restrict_keeps_common_fields() {
        let supported = SupportedFields::new(FieldSet::minimal());
        let requested = FieldSet::standard(&StatusVocabulary::default());
        assert_eq!(supported.restrict(&requested), FieldSet::minimal());
        assert_eq!(
            requested.first_missing_from(supported.fields()),
            Some("appliedDate")
        );
    }

    #[test]
    fn first_missing_outlives_the_compared_set() {
        let requested = FieldSet::standard(&StatusVocabulary::default());
        let missing = {
            let served = FieldSet::minimal();
            requested.first_missing_from(&served)
        };
        assert_eq!(missing, Some("appliedDate"));
        assert_eq!(requested.first_missing_from(&requested.clone()), None);
    }

    #[test]
    fn projection_strips_uncovered_values() {
        let mut record = StatusRecord::new("a-1", "Qualified")
            .with_milestone("appliedDate", "2024-01-02")
            .with_milestone("qualifiedDate", "2024-01-05")
            .with_group("Atlas");

        let mut set = FieldSet::minimal();
        set.insert("qualifiedDate");
        set.project(&mut record);

        assert!(record.milestone("appliedDate").is_missing());
        assert!(!record.milestone("qualifiedDate").is_missing());
        assert!(record.group_key.is_none());
    }
}
