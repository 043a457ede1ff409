//! Bottleneck ranking
//!
//! Combines population status totals with a grouping dimension (project,
//! objective, account) to rank where time goes and to build a sparse
//! group x status heatmap.

use crate::stats::ratio;
use crate::status::StatusAggregate;
use dwell_timeline::{GroupKey, StatusLabel, Timeline};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Per-group, per-status running totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellTotals {
    /// Days summed over the group's entities
    pub total_days: i64,
    /// Group entities that held the status
    pub entities: usize,
}

/// Group x status totals, accumulated entity by entity
#[derive(Debug, Clone, Default)]
pub struct GroupedStatusTotals {
    cells: BTreeMap<GroupKey, BTreeMap<StatusLabel, CellTotals>>,
}

impl GroupedStatusTotals {
    /// Create empty totals
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate over `(group, timeline)` pairs
    #[must_use]
    pub fn fold<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Option<&'a GroupKey>, &'a Timeline)>,
    {
        let mut totals = Self::new();
        for (group, timeline) in entries {
            totals.add(group, timeline);
        }
        totals
    }

    /// Fold one entity; ungrouped entities are not tracked here
    pub fn add(&mut self, group: Option<&GroupKey>, timeline: &Timeline) {
        let Some(group) = group else {
            return;
        };
        if timeline.is_empty() {
            return;
        }
        let row = self.cells.entry(group.clone()).or_default();
        for (status, days) in timeline.status_totals() {
            let cell = row.entry(status.clone()).or_default();
            cell.total_days += days;
            cell.entities += 1;
        }
    }

    /// Combine with another set of totals
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        for (group, row) in other.cells {
            let target = self.cells.entry(group).or_default();
            for (status, cell) in row {
                let t = target.entry(status).or_default();
                t.total_days += cell.total_days;
                t.entities += cell.entities;
            }
        }
        self
    }

    /// Totals for one cell
    #[inline]
    #[must_use]
    pub fn cell(&self, group: &GroupKey, status: &StatusLabel) -> Option<CellTotals> {
        self.cells.get(group).and_then(|row| row.get(status)).copied()
    }

    /// Distinct groups in which `status` appears, sorted
    #[must_use]
    pub fn groups_for(&self, status: &StatusLabel) -> Vec<GroupKey> {
        self.cells
            .iter()
            .filter(|(_, row)| row.contains_key(status))
            .map(|(group, _)| group.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Sparse `group -> status -> average days` matrix
    ///
    /// Cells without signal (no days) and groups left without cells are
    /// omitted rather than zero-filled.
    #[must_use]
    pub fn heatmap(&self) -> Heatmap {
        self.cells
            .iter()
            .filter_map(|(group, row)| {
                let cells: BTreeMap<StatusLabel, f64> = row
                    .iter()
                    .filter(|(_, cell)| cell.total_days > 0 && cell.entities > 0)
                    .map(|(status, cell)| (status.clone(), ratio(cell.total_days, cell.entities)))
                    .collect();
                (!cells.is_empty()).then(|| (group.clone(), cells))
            })
            .collect()
    }

    /// Number of groups seen
    #[inline]
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.cells.len()
    }
}

/// Sparse heatmap: group -> status -> average days
pub type Heatmap = BTreeMap<GroupKey, BTreeMap<StatusLabel, f64>>;

/// Ranking options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RankOptions {
    /// Statuses below this many total days are not ranked
    pub min_days_threshold: i64,
    /// Keep only the top `n` bottlenecks
    pub limit: Option<usize>,
}

impl RankOptions {
    /// With minimum total days
    #[inline]
    #[must_use]
    pub fn with_min_days(mut self, days: i64) -> Self {
        self.min_days_threshold = days;
        self
    }

    /// With result limit
    #[inline]
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One ranked bottleneck
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedBottleneck {
    /// Status
    pub status: StatusLabel,
    /// Days summed over the population
    pub total_days: i64,
    /// Total days per entity in the whole population
    pub average_days: f64,
    /// Entities whose timeline touches the status
    pub entities_affected: usize,
    /// Share of all tracked time
    pub percent_of_total_time: f64,
    /// Groups in which the status appears
    pub groups: Vec<GroupKey>,
}

/// Ranked bottlenecks plus heatmap
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BottleneckRanking {
    /// Statuses sorted by descending average days
    pub top_bottlenecks: Vec<RankedBottleneck>,
    /// Sparse group x status matrix
    pub heatmap: Heatmap,
}

/// Rank bottleneck statuses
///
/// `average_days` divides by the whole contributing population, not by the
/// entities that touched the status: it answers "how much of everyone's time
/// does this status eat".
#[must_use]
pub fn rank(
    statuses: &StatusAggregate,
    grouped: &GroupedStatusTotals,
    options: &RankOptions,
) -> BottleneckRanking {
    let mut top_bottlenecks: Vec<RankedBottleneck> = statuses
        .by_status
        .iter()
        .filter(|(_, metrics)| metrics.total_days >= options.min_days_threshold)
        .map(|(status, metrics)| RankedBottleneck {
            status: status.clone(),
            total_days: metrics.total_days,
            average_days: ratio(metrics.total_days, statuses.entities),
            entities_affected: metrics.count,
            percent_of_total_time: statuses.percent_of(status),
            groups: grouped.groups_for(status),
        })
        .collect();

    top_bottlenecks.sort_by(|a, b| {
        b.average_days
            .total_cmp(&a.average_days)
            .then_with(|| b.total_days.cmp(&a.total_days))
            .then_with(|| a.status.cmp(&b.status))
    });

    if let Some(limit) = options.limit {
        top_bottlenecks.truncate(limit);
    }

    BottleneckRanking {
        top_bottlenecks,
        heatmap: grouped.heatmap(),
    }
}
