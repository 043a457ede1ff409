//! Dwell Timeline - per-entity status history reconstruction
//!
//! Turns a record carrying one mutable status and a sparse set of milestone
//! dates into an ordered, gap-free, deduplicated sequence of status periods:
//! - Date normalization that never fails (unknown is `None`, not epoch zero)
//! - A configurable status vocabulary with opaque pass-through labels
//! - Three-tier reconstruction (milestones, synthetic edges, anchor fallback)
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use dwell_timeline::{reconstruct, StatusRecord, StatusVocabulary};
//!
//! let record = StatusRecord::new("a-1", "Draft")
//!     .with_created_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
//!     .with_last_modified_at(Utc.with_ymd_and_hms(2024, 1, 6, 0, 0, 0).unwrap());
//! let now = Utc.with_ymd_and_hms(2024, 1, 13, 0, 0, 0).unwrap();
//!
//! let timeline = reconstruct(&record, &StatusVocabulary::default(), now).unwrap();
//! assert_eq!(timeline.len(), 1);
//! assert_eq!(timeline.total_days(), 12);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod date;
pub mod error;
pub mod period;
pub mod reconstruct;
pub mod record;
pub mod status;

pub use date::{format_calendar_date, normalize, whole_days_between, RawDate};
pub use error::TimelineError;
pub use period::{StatusPeriod, Timeline};
pub use reconstruct::{reconstruct, reconstruct_or_empty};
pub use record::{EntityId, GroupKey, StatusRecord};
pub use status::{MilestoneLabel, MilestoneRule, StatusLabel, StatusVocabulary};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with timelines
    pub use crate::{
        normalize, reconstruct, reconstruct_or_empty, EntityId, GroupKey, RawDate, StatusLabel,
        StatusPeriod, StatusRecord, StatusVocabulary, Timeline,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
