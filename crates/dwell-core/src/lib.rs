//! Dwell Core - batch orchestration over a paged record source
//!
//! Wires the timeline and metrics crates to a record source:
//! - Record source contract with capability negotiation
//! - Page-level retry and a per-request execution budget
//! - Optional interest filtering of the retrieved population
//! - Result shapes for overview, per-entity timelines and bottlenecks
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use dwell_core::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let record = StatusRecord::new("a-1", "Draft")
//!     .with_created_at("2024-01-01")
//!     .with_last_modified_at("2024-01-06");
//! let now = Utc.with_ymd_and_hms(2024, 1, 13, 0, 0, 0).unwrap();
//!
//! let orchestrator = Orchestrator::new(InMemorySource::new([record]), EngineConfig::default())
//!     .unwrap()
//!     .with_clock(FixedClock(now));
//!
//! let overview = orchestrator.overview(&EntityFilter::all()).await.unwrap();
//! assert!(!overview.partial);
//! assert_eq!(overview.stats.entities_analyzed, 1);
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod clock;
pub mod config;
pub mod deadline;
pub mod error;
pub mod fields;
pub mod filter;
pub mod orchestrator;
pub mod report;
pub mod retry;
pub mod source;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{EngineConfig, RetrySettings};
pub use deadline::Deadline;
pub use error::{ConfigError, EngineError, SourceError};
pub use fields::{FieldSet, SupportedFields};
pub use filter::{GroupAllowList, InterestFilter};
pub use orchestrator::{Orchestrator, Retrieval};
pub use report::{
    Analysis, AnalysisStats, BottleneckReport, EntityTimeline, Overview, PageRequest,
    TimelinePage,
};
pub use retry::{retry_with_policy, RetryPolicy, Retryable};
pub use source::{
    EntityFilter, GroupingDimension, InMemorySource, Page, PageQuery, RecordSource, SourceEntry,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running analyses
    pub use crate::{
        Analysis, EngineConfig, EngineError, EntityFilter, FixedClock, GroupingDimension,
        InMemorySource, Orchestrator, PageRequest, RecordSource,
    };
    pub use dwell_timeline::{StatusLabel, StatusRecord, StatusVocabulary};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
