//! Input record model

use crate::date::RawDate;
use crate::status::StatusLabel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque entity identifier, unique within a batch
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Create new entity ID
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Grouping dimension value (project, objective, or account name)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKey(pub String);

impl GroupKey {
    /// Create new group key
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// One entity as supplied by the record source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    /// Entity identifier
    pub id: EntityId,
    /// Current (mutable) status
    pub current_status: StatusLabel,
    /// Named milestone dates; any subset may be absent
    #[serde(default)]
    pub milestones: BTreeMap<String, RawDate>,
    /// Creation instant, the primary anchor
    #[serde(default)]
    pub created_at: RawDate,
    /// Last modification instant, the fallback anchor
    #[serde(default)]
    pub last_modified_at: RawDate,
    /// Grouping value supplied by the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_key: Option<GroupKey>,
}

impl StatusRecord {
    /// Create a record with no dates
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<EntityId>, current_status: impl Into<StatusLabel>) -> Self {
        Self {
            id: id.into(),
            current_status: current_status.into(),
            milestones: BTreeMap::new(),
            created_at: RawDate::Missing,
            last_modified_at: RawDate::Missing,
            group_key: None,
        }
    }

    /// With creation instant
    #[inline]
    #[must_use]
    pub fn with_created_at(mut self, at: impl Into<RawDate>) -> Self {
        self.created_at = at.into();
        self
    }

    /// With last modification instant
    #[inline]
    #[must_use]
    pub fn with_last_modified_at(mut self, at: impl Into<RawDate>) -> Self {
        self.last_modified_at = at.into();
        self
    }

    /// With a milestone value
    #[inline]
    #[must_use]
    pub fn with_milestone(mut self, field: impl Into<String>, at: impl Into<RawDate>) -> Self {
        self.milestones.insert(field.into(), at.into());
        self
    }

    /// With group key
    #[inline]
    #[must_use]
    pub fn with_group(mut self, key: impl Into<GroupKey>) -> Self {
        self.group_key = Some(key.into());
        self
    }

    /// Raw milestone value, `Missing` when the field is absent
    #[inline]
    #[must_use]
    pub fn milestone(&self, field: &str) -> &RawDate {
        static MISSING: RawDate = RawDate::Missing;
        self.milestones.get(field).unwrap_or(&MISSING)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<String> for GroupKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_deserializes_from_camel_case_json() {
        let json = r#"{
            "id": "a-1",
            "currentStatus": "Qualified",
            "milestones": {"appliedDate": "2024-01-02", "qualifiedDate": null},
            "createdAt": "2024-01-01T00:00:00Z",
            "groupKey": "Atlas"
        }"#;
        let record: StatusRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.id, EntityId::new("a-1"));
        assert_eq!(record.current_status.as_str(), "Qualified");
        assert_eq!(record.milestone("appliedDate"), &RawDate::text("2024-01-02"));
        assert!(record.milestone("qualifiedDate").is_missing());
        assert!(record.milestone("onboardedDate").is_missing());
        assert!(record.last_modified_at.is_missing());
        assert_eq!(record.group_key, Some(GroupKey::new("Atlas")));
    }
}
