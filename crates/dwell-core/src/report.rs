//! Result shapes handed to presentation layers
//!
//! Field names serialize in camelCase; maps are ordered so identical input
//! always renders identical JSON.

use dwell_metrics::{Heatmap, RankedBottleneck, StatusMetrics, TransitionStatsMap};
use dwell_timeline::{EntityId, StatusLabel, Timeline};
use serde::Serialize;
use std::collections::BTreeMap;

/// A result plus how complete it is
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis<T> {
    /// The result
    pub data: T,
    /// True when retrieval stopped early
    pub partial: bool,
    /// Why the result is partial or degraded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Retrieval and reconstruction counters
    pub stats: AnalysisStats,
}

impl<T> Analysis<T> {
    /// Transform the payload, keeping completeness and stats
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Analysis<U> {
        Analysis {
            data: f(self.data),
            partial: self.partial,
            warning: self.warning,
            stats: self.stats,
        }
    }
}

/// Counters describing one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStats {
    /// Records returned by the source, after de-duplication
    pub entities_retrieved: usize,
    /// Entities with a non-empty timeline
    pub entities_analyzed: usize,
    /// Entities whose timeline could not be reconstructed
    pub entities_skipped: usize,
    /// Entities dropped by the interest filter
    pub entities_filtered: usize,
    /// Entities carrying a removal date while no longer removed
    pub reinstated_after_removal: usize,
    /// Pages fetched successfully
    pub pages_fetched: usize,
    /// Source-reported total, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_hint: Option<u64>,
    /// True when the field set had to be narrowed
    pub fields_narrowed: bool,
    /// Wall-clock time spent
    pub elapsed_ms: u64,
}

/// Population overview
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    /// Dwell statistics per status
    pub average_time_by_status: BTreeMap<StatusLabel, StatusMetrics>,
    /// Share of all tracked time per status
    pub total_time_distribution_percent: BTreeMap<StatusLabel, f64>,
    /// Dwell statistics per transition
    pub status_transitions: TransitionStatsMap,
    /// Entities per current status
    pub current_status_counts: BTreeMap<StatusLabel, usize>,
    /// Entities per configured funnel stage
    pub funnel_counts: BTreeMap<StatusLabel, usize>,
}

/// One entity's timeline for display
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTimeline {
    /// Entity identifier
    pub entity_id: EntityId,
    /// Canonical current status
    pub current_status: StatusLabel,
    /// Days in the most recent period of the current status
    pub days_in_current_status: i64,
    /// Reconstructed periods
    pub status_timeline: Timeline,
    /// Days from creation to now (or removal)
    pub total_time_in_project: i64,
}

/// Requested page of entity timelines, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Page number, starting at 1
    pub page: usize,
    /// Entities per page
    pub page_size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 50,
        }
    }
}

impl PageRequest {
    /// Create request; zero values are raised to 1
    #[inline]
    #[must_use]
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    /// Index range into a list of `total` items
    #[must_use]
    pub fn range(&self, total: usize) -> std::ops::Range<usize> {
        let start = self
            .page
            .max(1)
            .saturating_sub(1)
            .saturating_mul(self.page_size.max(1))
            .min(total);
        let end = start.saturating_add(self.page_size.max(1)).min(total);
        start..end
    }

    /// Pages needed for `total` items
    #[must_use]
    pub fn total_pages(&self, total: usize) -> usize {
        total.div_ceil(self.page_size.max(1))
    }
}

/// One page of entity timelines
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePage {
    /// Entities on this page
    pub entities: Vec<EntityTimeline>,
    /// Page number, starting at 1
    pub page: usize,
    /// Entities per page
    pub page_size: usize,
    /// Entities across all pages
    pub total_entities: usize,
    /// Number of pages
    pub total_pages: usize,
}

/// Bottleneck analysis result
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BottleneckReport {
    /// Ranked statuses
    pub top_bottlenecks: Vec<RankedBottleneck>,
    /// Sparse group x status average days
    pub heatmap_data: Heatmap,
}
