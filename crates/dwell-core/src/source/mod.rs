//! Record source contract
//!
//! A record source hands out status records page by page. It may be slow,
//! flaky, or unable to serve some fields; the orchestrator copes with all
//! three.

mod memory;

pub use memory::{InMemorySource, SourceEntry};

use crate::error::SourceError;
use crate::fields::{FieldSet, SupportedFields};
use async_trait::async_trait;
use dwell_timeline::{GroupKey, StatusLabel, StatusRecord, StatusVocabulary};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dimension used to group entities for bottleneck analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingDimension {
    /// Owning project
    Project,
    /// Business objective
    Objective,
    /// Customer account
    Account,
}

impl GroupingDimension {
    /// Lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Objective => "objective",
            Self::Account => "account",
        }
    }
}

impl fmt::Display for GroupingDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GroupingDimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "project" => Ok(Self::Project),
            "objective" => Ok(Self::Objective),
            "account" => Ok(Self::Account),
            other => Err(format!("unknown grouping dimension: {other}")),
        }
    }
}

/// Which entities a request covers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntityFilter {
    /// Allowed current statuses; empty allows all
    pub statuses: Vec<StatusLabel>,
    /// Allowed group values; empty allows all
    pub group_values: Vec<GroupKey>,
}

impl EntityFilter {
    /// Filter that allows everything
    #[inline]
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// With an allowed status
    #[must_use]
    pub fn with_status(mut self, status: impl Into<StatusLabel>) -> Self {
        self.statuses.push(status.into());
        self
    }

    /// With an allowed group value
    #[must_use]
    pub fn with_group_value(mut self, group: impl Into<GroupKey>) -> Self {
        self.group_values.push(group.into());
        self
    }

    /// Check a record against the filter
    ///
    /// Statuses compare through the vocabulary, so `"app received"` matches
    /// `"App Received"`. A group restriction rejects ungrouped records.
    #[must_use]
    pub fn matches(&self, record: &StatusRecord, vocabulary: &StatusVocabulary) -> bool {
        let status_ok = self.statuses.is_empty() || {
            let current = vocabulary.canonicalize(record.current_status.as_str());
            self.statuses
                .iter()
                .any(|s| vocabulary.canonicalize(s.as_str()) == current)
        };
        let group_ok = self.group_values.is_empty()
            || record
                .group_key
                .as_ref()
                .is_some_and(|g| self.group_values.contains(g));
        status_ok && group_ok
    }
}

/// One page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    /// Entities to include
    pub filter: EntityFilter,
    /// Dimension whose value fills `group_key`
    pub grouping: Option<GroupingDimension>,
    /// Fields to return
    pub fields: FieldSet,
    /// Continuation token from the previous page
    pub page_token: Option<String>,
    /// Maximum records per page
    pub page_size: usize,
}

/// One page of records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Records in this page
    pub records: Vec<StatusRecord>,
    /// Token for the next page; `None` on the last page
    pub next_page_token: Option<String>,
    /// Total matching entities, if the source knows; may be approximate
    pub total_hint: Option<u64>,
}

impl Page {
    /// Check if more pages follow
    #[inline]
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.next_page_token.is_some()
    }
}

/// Paged access to status records
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Report which of `requested` the source can serve
    ///
    /// # Errors
    /// Returns an error if the source cannot be queried at all
    async fn negotiate_fields(&self, requested: &FieldSet) -> Result<SupportedFields, SourceError>;

    /// Fetch one page
    ///
    /// # Errors
    /// - `SourceError::SchemaMismatch` if a requested field is not served
    /// - `SourceError::InvalidPageToken` if the token is not recognized
    /// - `SourceError::Transient` / `Unavailable` on transport failures
    async fn list_entities(&self, query: &PageQuery) -> Result<Page, SourceError>;
}

#[async_trait]
impl<S: RecordSource + ?Sized> RecordSource for std::sync::Arc<S> {
    async fn negotiate_fields(&self, requested: &FieldSet) -> Result<SupportedFields, SourceError> {
        (**self).negotiate_fields(requested).await
    }

    async fn list_entities(&self, query: &PageQuery) -> Result<Page, SourceError> {
        (**self).list_entities(query).await
    }
}
