//! Timeline reconstruction
//!
//! Rebuilds one entity's status history from its current status and whatever
//! milestone dates survived normalization. Three tiers, in priority order:
//!
//! 1. Explicit milestones, sorted by date (never by declaration order).
//! 2. A leading `Start` period and a trailing current-status period around
//!    the milestone periods when needed.
//! 3. With no usable milestone, a fallback built from the creation and last
//!    modification anchors.
//!
//! Every tier ends in [`Timeline::from_periods`], which sorts and merges.

use crate::date::normalize;
use crate::error::TimelineError;
use crate::period::{StatusPeriod, Timeline};
use crate::record::StatusRecord;
use crate::status::{StatusLabel, StatusVocabulary};
use chrono::{DateTime, Utc};

/// Valid instants for one entity: `[created_at, now]`
#[derive(Debug, Clone, Copy)]
struct Window {
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
}

impl Window {
    fn clamp(self, at: DateTime<Utc>) -> DateTime<Utc> {
        at.clamp(self.created_at, self.now)
    }
}

/// Reconstruct the timeline of one entity as of `now`
///
/// # Errors
/// - `TimelineError::MissingCreatedAt` if the creation anchor is unusable
/// - `TimelineError::CreatedInFuture` if the entity was created after `now`
pub fn reconstruct(
    record: &StatusRecord,
    vocabulary: &StatusVocabulary,
    now: DateTime<Utc>,
) -> Result<Timeline, TimelineError> {
    let created_at =
        normalize(&record.created_at).ok_or_else(|| TimelineError::MissingCreatedAt {
            entity: record.id.clone(),
        })?;

    if created_at > now {
        return Err(TimelineError::CreatedInFuture {
            entity: record.id.clone(),
            created_at,
            now,
        });
    }

    let window = Window { created_at, now };
    let current = vocabulary.canonicalize(record.current_status.as_str());
    let milestones = collect_milestones(record, vocabulary, &current, window);

    let periods = if milestones.is_empty() {
        fallback_periods(record, &current, window)
    } else {
        milestone_periods(record, vocabulary, &current, &milestones, window)
    };

    Ok(Timeline::from_periods(periods))
}

/// Reconstruct, substituting an empty timeline on failure
///
/// One malformed record must not abort a batch; the failure is logged and the
/// entity simply contributes nothing downstream.
#[must_use]
pub fn reconstruct_or_empty(
    record: &StatusRecord,
    vocabulary: &StatusVocabulary,
    now: DateTime<Utc>,
) -> Timeline {
    match reconstruct(record, vocabulary, now) {
        Ok(timeline) => timeline,
        Err(error) => {
            tracing::warn!(entity = %record.id, %error, "skipping entity: timeline reconstruction failed");
            Timeline::empty()
        }
    }
}

/// Surviving `(date, label)` pairs, ascending by date
fn collect_milestones(
    record: &StatusRecord,
    vocabulary: &StatusVocabulary,
    current: &StatusLabel,
    window: Window,
) -> Vec<(DateTime<Utc>, StatusLabel)> {
    let mut pairs: Vec<(DateTime<Utc>, StatusLabel)> = vocabulary
        .milestones
        .iter()
        .filter_map(|rule| {
            let at = normalize(record.milestone(&rule.field))?;
            let label = vocabulary.label_for(rule, current)?;
            Some((window.clamp(at), label))
        })
        .collect();

    // Stable: rules declared earlier win ties on the same instant.
    pairs.sort_by_key(|(at, _)| *at);
    pairs
}

fn milestone_periods(
    record: &StatusRecord,
    vocabulary: &StatusVocabulary,
    current: &StatusLabel,
    milestones: &[(DateTime<Utc>, StatusLabel)],
    window: Window,
) -> Vec<StatusPeriod> {
    let mut periods = Vec::with_capacity(milestones.len() + 2);

    let first = milestones[0].0;
    if first > window.created_at {
        periods.extend(StatusPeriod::between(
            vocabulary.start_label.clone(),
            window.created_at,
            first,
        ));
    }

    let terminal_end = if vocabulary.is_removed(current) {
        vocabulary
            .removal_field()
            .and_then(|field| normalize(record.milestone(field)))
            .map(|at| window.clamp(at))
    } else {
        None
    };

    for (i, (start, label)) in milestones.iter().enumerate() {
        let end = milestones
            .get(i + 1)
            .map_or_else(|| terminal_end.unwrap_or(window.now), |(next, _)| *next);
        // A reversed span means corrupt input: drop it rather than clamp to zero.
        periods.extend(StatusPeriod::between(label.clone(), *start, end));
    }

    if !periods.iter().any(|p| &p.status == current) {
        let last_end = periods.last().map_or(window.created_at, |p| p.end);
        if window.now > last_end {
            periods.extend(StatusPeriod::between(current.clone(), last_end, window.now));
        }
    }

    periods
}

fn fallback_periods(record: &StatusRecord, current: &StatusLabel, window: Window) -> Vec<StatusPeriod> {
    let mut periods = Vec::with_capacity(2);

    match normalize(&record.last_modified_at).map(|at| window.clamp(at)) {
        Some(last_modified) => {
            periods.extend(StatusPeriod::between(
                current.clone(),
                window.created_at,
                last_modified,
            ));
            if last_modified < window.now {
                periods.extend(StatusPeriod::between(
                    current.clone(),
                    last_modified,
                    window.now,
                ));
            }
        }
        None => {
            periods.extend(StatusPeriod::between(
                current.clone(),
                window.created_at,
                window.now,
            ));
        }
    }

    periods
}
