//! Status vocabulary
//!
//! Status values come from an external system as free-form strings. The
//! vocabulary knows a set of display labels and how milestone fields map onto
//! them, but any label it has never seen passes through untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A status label (opaque, display-ready string)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusLabel(String);

impl StatusLabel {
    /// Create a label verbatim
    #[inline]
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Borrow the label text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case- and whitespace-insensitive comparison key
    #[inline]
    #[must_use]
    pub fn match_key(&self) -> String {
        match_key(&self.0)
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StatusLabel {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for StatusLabel {
    fn from(label: String) -> Self {
        Self(label)
    }
}

impl AsRef<str> for StatusLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn match_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// How a milestone field maps to a status label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum MilestoneLabel {
    /// Always this label
    Fixed(StatusLabel),
    /// The entity's current status when it is one of the vocabulary's
    /// onboarded statuses, otherwise the given default
    CurrentStatusDependent(StatusLabel),
    /// Only counted when the entity currently sits in this status
    TerminalOnly(StatusLabel),
}

/// One entry in the milestone priority list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneRule {
    /// Milestone field name on the record
    pub field: String,
    /// Label assignment
    pub label: MilestoneLabel,
}

impl MilestoneRule {
    /// Create new rule
    #[inline]
    #[must_use]
    pub fn new(field: impl Into<String>, label: MilestoneLabel) -> Self {
        Self {
            field: field.into(),
            label,
        }
    }
}

/// Configurable status vocabulary
///
/// The same vocabulary drives milestone labelling and funnel matching, so the
/// two can never disagree about what a status is called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusVocabulary {
    /// Known display labels
    pub known: Vec<StatusLabel>,
    /// Label of the synthetic leading period
    pub start_label: StatusLabel,
    /// Terminal removal status
    pub removed_label: StatusLabel,
    /// Milestone priority list
    pub milestones: Vec<MilestoneRule>,
    /// Statuses a current-status-dependent milestone may take verbatim
    pub onboarded_statuses: Vec<StatusLabel>,
    /// Ordered funnel stages
    pub funnel_stages: Vec<StatusLabel>,
}

impl Default for StatusVocabulary {
    fn default() -> Self {
        let known = [
            "Draft",
            "Invite",
            "App Received",
            "Matched",
            "Qualified",
            "Active",
            "Production",
            "Removed",
        ]
        .into_iter()
        .map(StatusLabel::from)
        .collect();

        Self {
            known,
            start_label: StatusLabel::from("Start"),
            removed_label: StatusLabel::from("Removed"),
            milestones: vec![
                MilestoneRule::new(
                    "appliedDate",
                    MilestoneLabel::Fixed(StatusLabel::from("App Received")),
                ),
                MilestoneRule::new(
                    "qualifiedDate",
                    MilestoneLabel::Fixed(StatusLabel::from("Qualified")),
                ),
                MilestoneRule::new(
                    "onboardedDate",
                    MilestoneLabel::CurrentStatusDependent(StatusLabel::from("Active")),
                ),
                MilestoneRule::new(
                    "removedDate",
                    MilestoneLabel::TerminalOnly(StatusLabel::from("Removed")),
                ),
            ],
            onboarded_statuses: vec![StatusLabel::from("Active"), StatusLabel::from("Production")],
            funnel_stages: vec![
                StatusLabel::from("Invite"),
                StatusLabel::from("App Received"),
                StatusLabel::from("Matched"),
            ],
        }
    }
}

impl StatusVocabulary {
    /// Map a raw status onto its display label
    ///
    /// Known labels match case- and whitespace-insensitively. Unknown values
    /// pass through trimmed but otherwise unchanged.
    #[must_use]
    pub fn canonicalize(&self, raw: &str) -> StatusLabel {
        let key = match_key(raw);
        self.known
            .iter()
            .chain(std::iter::once(&self.start_label))
            .chain(std::iter::once(&self.removed_label))
            .find(|label| label.match_key() == key)
            .cloned()
            .unwrap_or_else(|| StatusLabel::new(raw.trim()))
    }

    /// Whether `status` is the terminal removal status
    #[inline]
    #[must_use]
    pub fn is_removed(&self, status: &StatusLabel) -> bool {
        status.match_key() == self.removed_label.match_key()
    }

    /// Resolve the label a milestone rule assigns, given the current status
    ///
    /// Returns `None` when the rule does not apply to this entity.
    #[must_use]
    pub fn label_for(&self, rule: &MilestoneRule, current: &StatusLabel) -> Option<StatusLabel> {
        match &rule.label {
            MilestoneLabel::Fixed(label) => Some(self.canonicalize(label.as_str())),
            MilestoneLabel::CurrentStatusDependent(default) => {
                let onboarded = self
                    .onboarded_statuses
                    .iter()
                    .any(|s| s.match_key() == current.match_key());
                if onboarded {
                    Some(self.canonicalize(current.as_str()))
                } else {
                    Some(self.canonicalize(default.as_str()))
                }
            }
            MilestoneLabel::TerminalOnly(label) => {
                (label.match_key() == current.match_key()).then(|| self.canonicalize(label.as_str()))
            }
        }
    }

    /// Field name of the terminal removal milestone, if configured
    #[must_use]
    pub fn removal_field(&self) -> Option<&str> {
        self.milestones.iter().find_map(|rule| match &rule.label {
            MilestoneLabel::TerminalOnly(label)
                if label.match_key() == self.removed_label.match_key() =>
            {
                Some(rule.field.as_str())
            }
            _ => None,
        })
    }

    /// Count current statuses per funnel stage
    ///
    /// Every configured stage appears in the output, including stages with a
    /// zero count, so funnels render with stable columns.
    #[must_use]
    pub fn funnel_counts<'a, I>(&self, statuses: I) -> BTreeMap<StatusLabel, usize>
    where
        I: IntoIterator<Item = &'a StatusLabel>,
    {
        let mut counts: BTreeMap<StatusLabel, usize> = self
            .funnel_stages
            .iter()
            .map(|stage| (self.canonicalize(stage.as_str()), 0))
            .collect();

        for status in statuses {
            let canonical = self.canonicalize(status.as_str());
            if let Some(count) = counts.get_mut(&canonical) {
                *count += 1;
            }
        }

        counts
    }
}
