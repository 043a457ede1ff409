//! Dwell Metrics - population-level reductions over status timelines
//!
//! Three independent folds over a list of reconstructed timelines:
//! - Status aggregation (total/min/max/average dwell, share of total time)
//! - Transition analysis (per `from → to` dwell statistics)
//! - Bottleneck ranking (population averages plus a sparse group heatmap)
//!
//! Every fold is associative and order-independent; each exposes an
//! accumulator with `add`/`merge`/`finish` so work can be chunked freely.
//! Results use ordered maps, so identical input always yields identical output.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod bottleneck;
pub mod stats;
pub mod status;
pub mod transition;

pub use bottleneck::{
    rank, BottleneckRanking, CellTotals, GroupedStatusTotals, Heatmap, RankOptions,
    RankedBottleneck,
};
pub use status::{aggregate, StatusAccumulator, StatusAggregate, StatusMetrics};
pub use transition::{
    analyze_transitions, TransitionAccumulator, TransitionKey, TransitionStats,
    TransitionStatsMap,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
