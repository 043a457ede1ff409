//! Status periods and reconstructed timelines

use crate::date::{calendar_date, whole_days_between};
use crate::status::StatusLabel;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// A contiguous span an entity spent in one status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPeriod {
    /// Status held during the span
    pub status: StatusLabel,
    /// Inclusive start
    #[serde(rename = "startDate", with = "calendar_date")]
    pub start: DateTime<Utc>,
    /// Exclusive end
    #[serde(rename = "endDate", with = "calendar_date")]
    pub end: DateTime<Utc>,
    /// Whole days, floored, never negative
    pub days: i64,
}

impl StatusPeriod {
    /// Build a period, or `None` when `end` precedes `start`
    #[must_use]
    pub fn between(status: StatusLabel, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        let days = whole_days_between(start, end)?;
        Some(Self {
            status,
            start,
            end,
            days,
        })
    }
}

/// Ordered, gap-free, deduplicated status periods for one entity
///
/// Invariants: ascending by `start`, no overlap, and no two consecutive
/// periods share a status. The only way to build one is [`Timeline::from_periods`],
/// which enforces all three.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Timeline {
    periods: Vec<StatusPeriod>,
}

impl Timeline {
    /// Empty timeline (entity could not be reconstructed)
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sort by start and merge consecutive same-status periods
    ///
    /// Merged periods sum their `days` and take the later `end`.
    #[must_use]
    pub fn from_periods(mut periods: Vec<StatusPeriod>) -> Self {
        periods.sort_by_key(|p| p.start);

        let mut merged: Vec<StatusPeriod> = Vec::with_capacity(periods.len());
        for period in periods {
            match merged.last_mut() {
                Some(last) if last.status == period.status => {
                    last.days += period.days;
                    last.end = last.end.max(period.end);
                }
                _ => merged.push(period),
            }
        }

        Self { periods: merged }
    }

    /// Periods in chronological order
    #[inline]
    #[must_use]
    pub fn periods(&self) -> &[StatusPeriod] {
        &self.periods
    }

    /// Number of periods
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    /// Whether no period survived reconstruction
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Sum of all period days
    #[inline]
    #[must_use]
    pub fn total_days(&self) -> i64 {
        self.periods.iter().map(|p| p.days).sum()
    }

    /// Days of the latest period carrying `status`, 0 when it never appears
    #[must_use]
    pub fn days_in_status(&self, status: &StatusLabel) -> i64 {
        self.periods
            .iter()
            .rev()
            .find(|p| &p.status == status)
            .map_or(0, |p| p.days)
    }

    /// Days per status within this timeline
    ///
    /// A status visited in several non-adjacent periods is summed.
    #[must_use]
    pub fn status_totals(&self) -> BTreeMap<&StatusLabel, i64> {
        let mut totals = BTreeMap::new();
        for period in &self.periods {
            *totals.entry(&period.status).or_insert(0) += period.days;
        }
        totals
    }

    /// Consume into the period list
    #[inline]
    #[must_use]
    pub fn into_periods(self) -> Vec<StatusPeriod> {
        self.periods
    }
}
