//! Execution budget
//!
//! Every request runs against a wall-clock budget. The budget is checked
//! cooperatively between pages and also bounds each individual page fetch.

use std::time::Duration;
use tokio::time::Instant;

/// Wall-clock budget started at construction
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    /// Start a budget now
    #[inline]
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    /// Time spent so far
    #[inline]
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left; zero once expired
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    /// Check if the budget is spent
    #[inline]
    #[must_use]
    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Budget this deadline was started with
    #[inline]
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.budget
    }
}
