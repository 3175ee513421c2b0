//! Absolute deadlines threaded through each suspension point of a call.

use std::{future::Future, time::Duration};

use tokio::time::Instant;

use crate::error::{ClientError, Phase, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// A deadline `budget` from now.
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    #[must_use]
    pub const fn instant(&self) -> Instant {
        self.at
    }

    /// The full budget this deadline was created with.
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Runs `fut`, failing with [`ClientError::Timeout`] for `phase` if the
    /// deadline passes first.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Timeout`] when the deadline expires.
    pub async fn within<F: Future>(&self, phase: Phase, fut: F) -> Result<F::Output> {
        tokio::time::timeout_at(self.at, fut)
            .await
            .map_err(|_| ClientError::Timeout {
                phase,
                after: self.budget,
            })
    }
}
