//! Transition analysis
//!
//! Counts how entities move between statuses and how long they dwelt in the
//! source status before moving on.

use crate::stats::{lower_median, ratio};
use dwell_timeline::{StatusLabel, Timeline};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A directed status change, rendered `"from → to"`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransitionKey {
    /// Status left
    pub from: StatusLabel,
    /// Status entered
    pub to: StatusLabel,
}

impl TransitionKey {
    /// Create new key
    #[inline]
    #[must_use]
    pub fn new(from: impl Into<StatusLabel>, to: impl Into<StatusLabel>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl fmt::Display for TransitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.from, self.to)
    }
}

impl Serialize for TransitionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Duration statistics for one transition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionStats {
    /// Observed transitions
    pub count: usize,
    /// Dwell days summed
    pub total_days: i64,
    /// Mean dwell, one decimal
    pub average_days: f64,
    /// Lower-middle median dwell
    pub median_days: i64,
    /// Shortest dwell
    pub min_days: i64,
    /// Longest dwell
    pub max_days: i64,
}

/// Transition statistics keyed by transition
pub type TransitionStatsMap = BTreeMap<TransitionKey, TransitionStats>;

/// Mergeable accumulator behind [`analyze_transitions`]
#[derive(Debug, Clone)]
pub struct TransitionAccumulator {
    start_label: StatusLabel,
    durations: BTreeMap<TransitionKey, Vec<i64>>,
}

impl TransitionAccumulator {
    /// Create empty accumulator
    ///
    /// `start_label` names the synthetic source status used for entities
    /// that never left their only status.
    #[inline]
    #[must_use]
    pub fn new(start_label: StatusLabel) -> Self {
        Self {
            start_label,
            durations: BTreeMap::new(),
        }
    }

    /// Fold one entity's timeline
    pub fn add(&mut self, timeline: &Timeline) {
        let periods = timeline.periods();

        if let [only] = periods {
            if only.status != self.start_label {
                let key = TransitionKey::new(self.start_label.clone(), only.status.clone());
                self.durations.entry(key).or_default().push(only.days);
            }
            return;
        }

        for pair in periods.windows(2) {
            let (from, to) = (&pair[0], &pair[1]);
            if from.status == to.status {
                continue;
            }
            let key = TransitionKey::new(from.status.clone(), to.status.clone());
            self.durations.entry(key).or_default().push(from.days);
        }
    }

    /// Combine with another accumulator
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        for (key, mut durations) in other.durations {
            self.durations.entry(key).or_default().append(&mut durations);
        }
        self
    }

    /// Compute per-transition statistics
    #[must_use]
    pub fn finish(self) -> TransitionStatsMap {
        self.durations
            .into_iter()
            .filter_map(|(key, mut durations)| {
                durations.sort_unstable();
                let total_days: i64 = durations.iter().sum();
                let stats = TransitionStats {
                    count: durations.len(),
                    total_days,
                    average_days: ratio(total_days, durations.len()),
                    median_days: lower_median(&durations)?,
                    min_days: *durations.first()?,
                    max_days: *durations.last()?,
                };
                Some((key, stats))
            })
            .collect()
    }
}

/// Analyze status transitions over a population of timelines
///
/// Self transitions are skipped. An entity with a single period contributes
/// `start_label → status` so single-status entities stay visible.
#[must_use]
pub fn analyze_transitions<'a, I>(timelines: I, start_label: &StatusLabel) -> TransitionStatsMap
where
    I: IntoIterator<Item = &'a Timeline>,
{
    let mut acc = TransitionAccumulator::new(start_label.clone());
    for timeline in timelines {
        acc.add(timeline);
    }
    acc.finish()
}
