//! Testing utilities for the Dwell workspace
//!
//! Shared fixtures and a scriptable record source.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as Days, TimeZone, Utc};
use dwell_core::{
    FieldSet, InMemorySource, Page, PageQuery, RecordSource, SourceEntry, SourceError,
    SupportedFields,
};
use dwell_timeline::StatusRecord;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

/// Midnight UTC, `n` days after 2024-01-01
pub fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Days::days(n)
}

/// Reference "now" used across suites: 2024-03-01
pub fn reference_now() -> DateTime<Utc> {
    day(60)
}

/// Record with only anchors
pub fn anchored(id: &str, status: &str, created: i64, modified: i64) -> StatusRecord {
    StatusRecord::new(id, status)
        .with_created_at(day(created))
        .with_last_modified_at(day(modified))
}

/// Record moving through applied/qualified/onboarded milestones
pub fn applicant(id: &str, status: &str, applied: i64, qualified: i64, onboarded: Option<i64>) -> StatusRecord {
    let record = anchored(id, status, 0, onboarded.unwrap_or(qualified))
        .with_milestone("appliedDate", day(applied))
        .with_milestone("qualifiedDate", day(qualified));
    match onboarded {
        Some(d) => record.with_milestone("onboardedDate", day(d)),
        None => record,
    }
}

/// `n` anchored Draft records
pub fn drafts(n: usize) -> Vec<StatusRecord> {
    (0..n)
        .map(|i| anchored(&format!("draft-{i}"), "Draft", 0, 5))
        .collect()
}

/// Record source with scripted misbehaviour
///
/// Wraps an [`InMemorySource`]; every knob is off by default.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    inner: InMemorySource,
    page_delay: Option<Duration>,
    negotiation_delay: Option<Duration>,
    transient_failures: AtomicU32,
    fail_after_pages: Option<usize>,
    unavailable: bool,
    overclaim_fields: bool,
    pages_served: AtomicUsize,
    list_calls: AtomicUsize,
    negotiations: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(records: impl IntoIterator<Item = StatusRecord>) -> Self {
        Self::wrap(InMemorySource::new(records))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = SourceEntry>) -> Self {
        Self::wrap(InMemorySource::from_entries(entries))
    }

    pub fn wrap(inner: InMemorySource) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Sleep this long before answering each page
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = Some(delay);
        self
    }

    /// Sleep this long before answering field negotiation
    pub fn with_negotiation_delay(mut self, delay: Duration) -> Self {
        self.negotiation_delay = Some(delay);
        self
    }

    /// Fail the next `n` page calls with a transient error
    pub fn with_transient_failures(self, n: u32) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Serve `n` pages, then report the source unavailable
    pub fn failing_after(mut self, pages: usize) -> Self {
        self.fail_after_pages = Some(pages);
        self
    }

    /// Fail every call
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Serve only `fields`
    ///
    /// With `overclaim`, negotiation still reports every requested field, so
    /// the mismatch only surfaces when a page is requested.
    pub fn serving_only(mut self, fields: FieldSet, overclaim: bool) -> Self {
        self.inner = self.inner.with_supported_fields(fields);
        self.overclaim_fields = overclaim;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn negotiations(&self) -> usize {
        self.negotiations.load(Ordering::SeqCst)
    }

    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSource for ScriptedSource {
    async fn negotiate_fields(&self, requested: &FieldSet) -> Result<SupportedFields, SourceError> {
        self.negotiations.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.negotiation_delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable {
            return Err(SourceError::Unavailable("scripted outage".to_string()));
        }
        if self.overclaim_fields {
            return Ok(SupportedFields::new(requested.clone()));
        }
        self.inner.negotiate_fields(requested).await
    }

    async fn list_entities(&self, query: &PageQuery) -> Result<Page, SourceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.page_delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable {
            return Err(SourceError::Unavailable("scripted outage".to_string()));
        }
        if self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SourceError::Transient("scripted blip".to_string()));
        }
        if self
            .fail_after_pages
            .is_some_and(|limit| self.pages_served() >= limit)
        {
            return Err(SourceError::Unavailable("scripted outage".to_string()));
        }

        let page = self.inner.list_entities(query).await?;
        self.pages_served.fetch_add(1, Ordering::SeqCst);
        Ok(page)
    }
}
