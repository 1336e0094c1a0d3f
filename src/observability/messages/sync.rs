// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the sync barrier.

use crate::errors::AggregatedError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Sync started draining every rank queue.
///
/// # Log Level
/// `info!` - Important operational event
pub struct SyncStarted {
    pub rank_count: usize,
}

impl Display for SyncStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Sync started on {} ranks", self.rank_count)
    }
}

impl StructuredLog for SyncStarted {
    fn log(&self) {
        tracing::info!(rank_count = self.rank_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("sync", span_name = name, rank_count = self.rank_count)
    }
}

/// Sync completed and every rank succeeded.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use dpu_queue::observability::messages::sync::SyncCompleted;
/// use std::time::Duration;
///
/// let msg = SyncCompleted {
///     rank_count: 4,
///     duration: Duration::from_millis(12),
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct SyncCompleted {
    pub rank_count: usize,
    pub duration: Duration,
}

impl Display for SyncCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Sync completed: {} ranks succeeded in {:?}",
            self.rank_count, self.duration
        )
    }
}

impl StructuredLog for SyncCompleted {
    fn log(&self) {
        tracing::info!(
            rank_count = self.rank_count,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "sync_completed",
            span_name = name,
            rank_count = self.rank_count,
            duration = ?self.duration,
        )
    }
}

/// Sync completed with at least one failed rank.
///
/// # Log Level
/// `warn!` - The caller receives the same error
pub struct SyncFailed<'a> {
    pub error: &'a AggregatedError,
    pub discarded: usize,
    pub duration: Duration,
}

impl Display for SyncFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Sync failed after {:?} ({} operations discarded): {}",
            self.duration, self.discarded, self.error
        )
    }
}

impl StructuredLog for SyncFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            rank = self.error.rank.index(),
            failed_ranks = self.error.failed_ranks.len(),
            discarded = self.discarded,
            duration_ms = self.duration.as_millis() as u64,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "sync_failed",
            span_name = name,
            rank = self.error.rank.index(),
            error = %self.error,
        )
    }
}
