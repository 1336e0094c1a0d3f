// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Shared completion gate for single-call callbacks.
//!
//! A single-call callback is enqueued on every rank at the same logical
//! position. Each rank that reaches the position arrives at the gate; the last
//! one to arrive runs the callback, and every rank stays parked until it has
//! finished. A rank that discards the position (because it already failed)
//! abandons the gate instead, and the callback is skipped.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::engine::operation::{join_callback, spawn_callback};
use crate::engine::RankId;
use crate::observability::messages::queue::SingleCallReleased;
use crate::observability::messages::StructuredLog;
use crate::traits::{CallbackInvocation, RankCallback, TransportDriver};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GateOutcome {
    Completed(Result<(), String>),
    Abandoned,
}

pub struct SingleCallGate {
    callback: Arc<dyn RankCallback>,
    ranks: Vec<RankId>,
    remaining: AtomicUsize,
    abandoned: AtomicBool,
    outcome: watch::Sender<Option<GateOutcome>>,
}

impl SingleCallGate {
    pub(crate) fn new(callback: Arc<dyn RankCallback>, ranks: Vec<RankId>) -> Arc<Self> {
        let (outcome, _) = watch::channel(None);
        Arc::new(Self {
            callback,
            remaining: AtomicUsize::new(ranks.len()),
            ranks,
            abandoned: AtomicBool::new(false),
            outcome,
        })
    }

    pub fn name(&self) -> &str {
        self.callback.name()
    }

    /// Ranks that have neither arrived nor abandoned yet.
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// Arrive at the gate and wait for it to be released.
    pub(crate) async fn arrive(&self, driver: Arc<dyn TransportDriver>, cancel: &CancellationToken) -> GateOutcome {
        let mut outcome = self.outcome.subscribe();

        if self.count_down() {
            if self.abandoned.load(Ordering::SeqCst) {
                self.release(GateOutcome::Abandoned);
            } else {
                let invocation = CallbackInvocation::new(None, self.ranks.clone(), driver);
                let result = join_callback(spawn_callback(Arc::clone(&self.callback), invocation)).await;
                self.release(GateOutcome::Completed(result));
            }
        }

        tokio::select! {
            released = outcome.wait_for(Option::is_some) => match released {
                Ok(released) => (*released).clone().unwrap_or(GateOutcome::Abandoned),
                Err(_) => GateOutcome::Abandoned,
            },
            _ = cancel.cancelled() => GateOutcome::Abandoned,
        }
    }

    /// Give up this rank's position without waiting.
    pub(crate) fn abandon(&self) {
        self.abandoned.store(true, Ordering::SeqCst);
        if self.count_down() {
            self.release(GateOutcome::Abandoned);
        }
    }

    /// True for the rank that takes the count to zero.
    fn count_down(&self) -> bool {
        self.remaining.fetch_sub(1, Ordering::SeqCst) == 1
    }

    fn release(&self, outcome: GateOutcome) {
        SingleCallReleased {
            callback: self.name(),
            rank_count: self.ranks.len(),
            abandoned: outcome == GateOutcome::Abandoned,
        }
        .log();
        self.outcome.send_replace(Some(outcome));
    }
}

impl std::fmt::Debug for SingleCallGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleCallGate")
            .field("callback", &self.name())
            .field("ranks", &self.ranks)
            .field("remaining", &self.remaining())
            .field("abandoned", &self.abandoned.load(Ordering::SeqCst))
            .finish()
    }
}
