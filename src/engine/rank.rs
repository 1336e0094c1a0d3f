// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::queue::RankQueue;
use crate::errors::RankFailure;

/// Identity of one rank, stable for the lifetime of its device set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RankId(pub usize);

impl RankId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rank#{}", self.0)
    }
}

/// Where a rank stands in the current enqueue/sync cycle.
///
/// ```text
/// Idle --enqueue--> Running --all done--> Succeeded --sync--> Idle
///                   Running --failure---> Failed    --sync--> Idle
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionState {
    Idle,
    Running,
    Succeeded,
    Failed(RankFailure),
}

impl CompletionState {
    pub fn is_failed(&self) -> bool {
        matches!(self, CompletionState::Failed(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionState::Idle => "idle",
            CompletionState::Running => "running",
            CompletionState::Succeeded => "succeeded",
            CompletionState::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for CompletionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionState::Failed(failure) => write!(f, "failed: {}", failure),
            other => f.write_str(other.as_str()),
        }
    }
}

/// One execution unit attached to a device set: its id plus its queue.
pub struct Rank {
    id: RankId,
    queue: RankQueue,
}

impl Rank {
    pub(crate) fn new(id: RankId, queue: RankQueue) -> Self {
        Self { id, queue }
    }

    pub fn id(&self) -> RankId {
        self.id
    }

    pub fn state(&self) -> CompletionState {
        self.queue.state()
    }

    /// Operations enqueued on this rank that have not finished or been discarded.
    pub fn pending_operations(&self) -> usize {
        self.queue.pending()
    }

    pub(crate) fn queue(&self) -> &RankQueue {
        &self.queue
    }
}

impl fmt::Debug for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rank")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("pending", &self.pending_operations())
            .finish()
    }
}
