//! Status aggregation
//!
//! Folds many timelines into per-status dwell statistics. Each entity's
//! timeline is first collapsed to per-status sums, so an entity that visited a
//! status twice counts once with the combined duration.

use crate::stats::{percent, ratio};
use dwell_timeline::{StatusLabel, Timeline};
use serde::Serialize;
use std::collections::BTreeMap;

/// Dwell statistics for one status across the population
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMetrics {
    /// Days summed over every entity
    pub total_days: i64,
    /// Entities that ever held the status
    pub count: usize,
    /// Smallest per-entity sum
    pub min_days: i64,
    /// Largest per-entity sum
    pub max_days: i64,
    /// `total_days / count`, one decimal
    pub average_days: f64,
}

/// Population-level status statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusAggregate {
    /// Per-status statistics
    pub by_status: BTreeMap<StatusLabel, StatusMetrics>,
    /// Share of the grand total per status, one decimal
    pub percent_of_total_time: BTreeMap<StatusLabel, f64>,
    /// Entities that contributed a non-empty timeline
    pub entities: usize,
    /// Days summed over every status and entity
    pub grand_total_days: i64,
}

impl StatusAggregate {
    /// Metrics for one status
    #[inline]
    #[must_use]
    pub fn get(&self, status: &StatusLabel) -> Option<&StatusMetrics> {
        self.by_status.get(status)
    }

    /// Percentage share for one status, 0.0 when absent
    #[inline]
    #[must_use]
    pub fn percent_of(&self, status: &StatusLabel) -> f64 {
        self.percent_of_total_time.get(status).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Running {
    total_days: i64,
    count: usize,
    min_days: i64,
    max_days: i64,
}

impl Running {
    fn single(days: i64) -> Self {
        Self {
            total_days: days,
            count: 1,
            min_days: days,
            max_days: days,
        }
    }

    fn absorb(&mut self, other: Self) {
        self.total_days += other.total_days;
        self.count += other.count;
        self.min_days = self.min_days.min(other.min_days);
        self.max_days = self.max_days.max(other.max_days);
    }
}

/// Mergeable accumulator behind [`aggregate`]
///
/// Folding order does not matter, so partial accumulators built on separate
/// chunks can be combined with [`StatusAccumulator::merge`].
#[derive(Debug, Clone, Default)]
pub struct StatusAccumulator {
    running: BTreeMap<StatusLabel, Running>,
    entities: usize,
}

impl StatusAccumulator {
    /// Create empty accumulator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one entity's timeline
    ///
    /// Empty timelines are ignored: unknown is absence, not zero.
    pub fn add(&mut self, timeline: &Timeline) {
        if timeline.is_empty() {
            return;
        }
        self.entities += 1;
        for (status, days) in timeline.status_totals() {
            let entry = Running::single(days);
            self.running
                .entry(status.clone())
                .and_modify(|r| r.absorb(entry))
                .or_insert(entry);
        }
    }

    /// Combine with another accumulator
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.entities += other.entities;
        for (status, running) in other.running {
            self.running
                .entry(status)
                .and_modify(|r| r.absorb(running))
                .or_insert(running);
        }
        self
    }

    /// Finalize averages and percentages
    #[must_use]
    pub fn finish(self) -> StatusAggregate {
        let grand_total_days: i64 = self.running.values().map(|r| r.total_days).sum();

        let percent_of_total_time = self
            .running
            .iter()
            .map(|(status, r)| (status.clone(), percent(r.total_days, grand_total_days)))
            .collect();

        let by_status = self
            .running
            .into_iter()
            .map(|(status, r)| {
                let metrics = StatusMetrics {
                    total_days: r.total_days,
                    count: r.count,
                    min_days: r.min_days,
                    max_days: r.max_days,
                    average_days: ratio(r.total_days, r.count),
                };
                (status, metrics)
            })
            .collect();

        StatusAggregate {
            by_status,
            percent_of_total_time,
            entities: self.entities,
            grand_total_days,
        }
    }
}

/// Aggregate per-status dwell statistics over a population of timelines
#[must_use]
pub fn aggregate<'a, I>(timelines: I) -> StatusAggregate
where
    I: IntoIterator<Item = &'a Timeline>,
{
    let mut acc = StatusAccumulator::new();
    for timeline in timelines {
        acc.add(timeline);
    }
    acc.finish()
}
