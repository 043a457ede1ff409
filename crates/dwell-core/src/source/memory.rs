//! In-memory record source
//!
//! Serves a snapshot of records with offset page tokens and an exact total.
//! Backs the CLI (records loaded from a JSON file) and the test suites.

use super::{EntityFilter, GroupingDimension, Page, PageQuery, RecordSource};
use crate::error::SourceError;
use crate::fields::{FieldSet, SupportedFields};
use async_trait::async_trait;
use dwell_timeline::{GroupKey, StatusRecord, StatusVocabulary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A record plus its value in each grouping dimension
///
/// In JSON the record fields sit at the top level next to an optional
/// `groups` object, e.g. `{"id": "a-1", ..., "groups": {"project": "Atlas"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    /// The record itself
    #[serde(flatten)]
    pub record: StatusRecord,
    /// Group value per dimension
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<GroupingDimension, GroupKey>,
}

impl SourceEntry {
    /// Wrap a record with no dimension values
    #[inline]
    #[must_use]
    pub fn new(record: StatusRecord) -> Self {
        Self {
            record,
            groups: BTreeMap::new(),
        }
    }

    /// With a dimension value
    #[inline]
    #[must_use]
    pub fn with_group(mut self, dimension: GroupingDimension, key: impl Into<GroupKey>) -> Self {
        self.groups.insert(dimension, key.into());
        self
    }

    /// Record as seen under `grouping`
    ///
    /// The dimension value replaces the record's own group key when present.
    fn resolve(&self, grouping: Option<GroupingDimension>) -> StatusRecord {
        let mut record = self.record.clone();
        if let Some(key) = grouping.and_then(|dim| self.groups.get(&dim)) {
            record.group_key = Some(key.clone());
        }
        record
    }
}

impl From<StatusRecord> for SourceEntry {
    fn from(record: StatusRecord) -> Self {
        Self::new(record)
    }
}

/// Paginating source over an in-memory snapshot
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    entries: Vec<SourceEntry>,
    vocabulary: StatusVocabulary,
    supported: Option<FieldSet>,
}

impl InMemorySource {
    /// Create source from records
    #[must_use]
    pub fn new(records: impl IntoIterator<Item = StatusRecord>) -> Self {
        Self::from_entries(records.into_iter().map(SourceEntry::new))
    }

    /// Create source from entries carrying dimension values
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = SourceEntry>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
            vocabulary: StatusVocabulary::default(),
            supported: None,
        }
    }

    /// Parse a JSON array of entries
    ///
    /// # Errors
    /// Returns `SourceError::Load` if the JSON is not an array of entries
    pub fn from_json_str(json: &str) -> Result<Self, SourceError> {
        let entries: Vec<SourceEntry> =
            serde_json::from_str(json).map_err(|e| SourceError::Load(e.to_string()))?;
        Ok(Self::from_entries(entries))
    }

    /// Load a JSON array of entries from disk
    ///
    /// # Errors
    /// Returns `SourceError::Load` if the file cannot be read or parsed
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| SourceError::Load(format!("{}: {e}", path.display())))?;
        let source = Self::from_json_str(&json)?;
        tracing::debug!(path = %path.display(), entities = source.len(), "loaded record snapshot");
        Ok(source)
    }

    /// With vocabulary used for status filtering
    #[inline]
    #[must_use]
    pub fn with_vocabulary(mut self, vocabulary: StatusVocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    /// Serve only these fields; requests for others fail with a schema mismatch
    #[inline]
    #[must_use]
    pub fn with_supported_fields(mut self, fields: FieldSet) -> Self {
        self.supported = Some(fields);
        self
    }

    /// Number of entities held
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn matching(&self, filter: &EntityFilter, grouping: Option<GroupingDimension>) -> Vec<StatusRecord> {
        self.entries
            .iter()
            .map(|entry| entry.resolve(grouping))
            .filter(|record| filter.matches(record, &self.vocabulary))
            .collect()
    }
}

fn parse_offset(token: Option<&str>) -> Result<usize, SourceError> {
    token.map_or(Ok(0), |t| {
        t.parse::<usize>()
            .map_err(|_| SourceError::InvalidPageToken(t.to_string()))
    })
}

#[async_trait]
impl RecordSource for InMemorySource {
    async fn negotiate_fields(&self, requested: &FieldSet) -> Result<SupportedFields, SourceError> {
        let fields = match &self.supported {
            Some(supported) => requested.intersection(supported),
            None => requested.clone(),
        };
        Ok(SupportedFields::new(fields))
    }

    async fn list_entities(&self, query: &PageQuery) -> Result<Page, SourceError> {
        if let Some(supported) = &self.supported {
            if let Some(field) = query.fields.first_missing_from(supported) {
                return Err(SourceError::SchemaMismatch {
                    field: field.to_string(),
                });
            }
        }

        let offset = parse_offset(query.page_token.as_deref())?;
        let matching = self.matching(&query.filter, query.grouping);
        if offset > matching.len() {
            return Err(SourceError::InvalidPageToken(offset.to_string()));
        }

        let end = offset.saturating_add(query.page_size.max(1)).min(matching.len());
        let total = matching.len();
        let records = matching
            .into_iter()
            .skip(offset)
            .take(end - offset)
            .map(|mut record| {
                query.fields.project(&mut record);
                record
            })
            .collect();

        Ok(Page {
            records,
            next_page_token: (end < total).then(|| end.to_string()),
            total_hint: Some(total as u64),
        })
    }
}
