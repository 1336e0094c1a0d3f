// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for per-rank queue events.
//!
//! This module contains message types for logging events related to:
//! * Queue worker lifecycle
//! * Operation enqueue, failure and discard
//! * Non-blocking and single-call callback scheduling

use crate::engine::{OperationId, OperationKind, RankId};
use crate::errors::RankFailure;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A rank's queue worker started draining.
///
/// # Log Level
/// `debug!` - Lifecycle detail
pub struct RankWorkerStarted {
    pub rank: RankId,
}

impl Display for RankWorkerStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Queue worker for {} started", self.rank)
    }
}

impl StructuredLog for RankWorkerStarted {
    fn log(&self) {
        tracing::debug!(rank = self.rank.index(), "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("rank_worker", span_name = name, rank = self.rank.index())
    }
}

/// A rank's queue worker exited.
///
/// # Log Level
/// `debug!` - Lifecycle detail
pub struct RankWorkerStopped {
    pub rank: RankId,
    pub processed: u64,
}

impl Display for RankWorkerStopped {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Queue worker for {} stopped after {} operations",
            self.rank, self.processed
        )
    }
}

impl StructuredLog for RankWorkerStopped {
    fn log(&self) {
        tracing::debug!(rank = self.rank.index(), processed = self.processed, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "rank_worker_stopped",
            span_name = name,
            rank = self.rank.index(),
            processed = self.processed,
        )
    }
}

/// An operation was appended to every rank queue of a set.
///
/// # Log Level
/// `debug!` - Emitted once per fan-out, not once per rank
///
/// # Example
/// ```
/// use dpu_queue::engine::{OperationId, OperationKind};
/// use dpu_queue::observability::messages::queue::OperationEnqueued;
///
/// let msg = OperationEnqueued {
///     id: OperationId(7),
///     kind: OperationKind::ScatterIn,
///     rank_count: 4,
/// };
/// assert_eq!(msg.to_string(), "Enqueued op#7 (scatter_in) on 4 ranks");
/// ```
pub struct OperationEnqueued {
    pub id: OperationId,
    pub kind: OperationKind,
    pub rank_count: usize,
}

impl Display for OperationEnqueued {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Enqueued {} ({}) on {} ranks",
            self.id, self.kind, self.rank_count
        )
    }
}

impl StructuredLog for OperationEnqueued {
    fn log(&self) {
        tracing::debug!(
            operation = self.id.0,
            kind = %self.kind,
            rank_count = self.rank_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "operation",
            span_name = name,
            operation = self.id.0,
            kind = %self.kind,
        )
    }
}

/// An operation failed and its rank entered the failed state.
///
/// # Log Level
/// `warn!` - The failure is reported again, once, at the next sync
pub struct OperationFailed<'a> {
    pub rank: RankId,
    pub id: OperationId,
    pub failure: &'a RankFailure,
}

impl Display for OperationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} failed on {}; remaining operations will be discarded until sync: {}",
            self.id, self.rank, self.failure
        )
    }
}

impl StructuredLog for OperationFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            rank = self.rank.index(),
            operation = self.id.0,
            kind = %self.failure.kind(),
            error = %self.failure,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "operation_failed",
            span_name = name,
            rank = self.rank.index(),
            operation = self.id.0,
        )
    }
}

/// An operation was dropped because its rank had already failed.
///
/// # Log Level
/// `debug!`
pub struct OperationDiscarded {
    pub rank: RankId,
    pub id: OperationId,
    pub kind: OperationKind,
}

impl Display for OperationDiscarded {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Discarded {} ({}) on failed {}",
            self.id, self.kind, self.rank
        )
    }
}

impl StructuredLog for OperationDiscarded {
    fn log(&self) {
        tracing::debug!(
            rank = self.rank.index(),
            operation = self.id.0,
            kind = %self.kind,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "operation_discarded",
            span_name = name,
            rank = self.rank.index(),
            operation = self.id.0,
        )
    }
}

/// A non-blocking callback was handed off; the queue moves on without it.
///
/// # Log Level
/// `debug!`
pub struct CallbackDetached<'a> {
    pub rank: RankId,
    pub id: OperationId,
    pub callback: &'a str,
}

impl Display for CallbackDetached<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Callback '{}' ({}) detached from {} queue",
            self.callback, self.id, self.rank
        )
    }
}

impl StructuredLog for CallbackDetached<'_> {
    fn log(&self) {
        tracing::debug!(
            rank = self.rank.index(),
            operation = self.id.0,
            callback = self.callback,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "callback_detached",
            span_name = name,
            rank = self.rank.index(),
            callback = self.callback,
        )
    }
}

/// Every rank reached a single-call callback's position.
///
/// `abandoned` is set when at least one rank discarded the position instead of
/// reaching it, in which case the callback was not run.
///
/// # Log Level
/// `debug!`
pub struct SingleCallReleased<'a> {
    pub callback: &'a str,
    pub rank_count: usize,
    pub abandoned: bool,
}

impl Display for SingleCallReleased<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.abandoned {
            write!(
                f,
                "Single-call callback '{}' skipped: a rank failed before reaching it ({} ranks released)",
                self.callback, self.rank_count
            )
        } else {
            write!(
                f,
                "Single-call callback '{}' ran once for {} ranks",
                self.callback, self.rank_count
            )
        }
    }
}

impl StructuredLog for SingleCallReleased<'_> {
    fn log(&self) {
        tracing::debug!(
            callback = self.callback,
            rank_count = self.rank_count,
            abandoned = self.abandoned,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "single_call",
            span_name = name,
            callback = self.callback,
            rank_count = self.rank_count,
        )
    }
}
