// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-rank FIFO operation queue.
//!
//! Each rank owns one unbounded channel and one worker task draining it. The
//! worker runs entries strictly in the order they were sent: transfers and
//! launches are awaited to completion on the driver, blocking callbacks are
//! awaited before the next entry starts, and non-blocking callbacks are
//! detached and only joined at the next barrier.
//!
//! The first failure moves the rank to [`CompletionState::Failed`]. From then
//! on every entry up to the next barrier is discarded without touching the
//! driver.
//!
//! At a barrier the worker files its [`RankReport`] in a store shared with the
//! device set and only then acknowledges the marker, so a report outlives a
//! sync that stopped waiting for it.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::barrier::RankReport;
use crate::engine::gate::GateOutcome;
use crate::engine::operation::{join_callback, spawn_callback, CallbackScope, Operation, OperationId, OperationKind, QueueEntry};
use crate::engine::{CompletionState, RankId};
use crate::errors::{DpuError, RankFailure};
use crate::observability::messages::queue::{
    CallbackDetached, OperationDiscarded, OperationFailed, RankWorkerStarted, RankWorkerStopped,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{CallbackInvocation, TransportDriver};

/// Reports filed at barriers and not yet collected by a completed sync.
pub(crate) type ReportStore = Arc<Mutex<Vec<RankReport>>>;

/// State shared between the enqueue side, the worker and detached callbacks,
/// always updated under one lock.
#[derive(Debug)]
pub(crate) struct RankStatus {
    pub(crate) state: CompletionState,
    pub(crate) pending: usize,
    /// Non-blocking callbacks handed off and still running.
    pub(crate) detached: usize,
    pub(crate) detached_failure: Option<RankFailure>,
}

impl RankStatus {
    /// `Running` becomes `Succeeded` once nothing is queued or detached and no
    /// detached callback failed.
    fn settle(&mut self) {
        if self.state == CompletionState::Running
            && self.pending == 0
            && self.detached == 0
            && self.detached_failure.is_none()
        {
            self.state = CompletionState::Succeeded;
        }
    }
}

impl Default for RankStatus {
    fn default() -> Self {
        Self {
            state: CompletionState::Idle,
            pending: 0,
            detached: 0,
            detached_failure: None,
        }
    }
}

/// Enqueue side of a rank's queue.
pub(crate) struct RankQueue {
    rank: RankId,
    sender: mpsc::UnboundedSender<QueueEntry>,
    status: Arc<Mutex<RankStatus>>,
}

impl RankQueue {
    /// Create the queue and spawn its worker on the current tokio runtime.
    pub(crate) fn spawn(
        rank: RankId,
        driver: Arc<dyn TransportDriver>,
        reports: ReportStore,
        cancel: CancellationToken,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let status = Arc::new(Mutex::new(RankStatus::default()));

        let worker = RankWorker {
            rank,
            receiver,
            status: Arc::clone(&status),
            driver,
            reports,
            cancel,
            detached: Vec::new(),
            processed: 0,
            discarded: 0,
        };
        tokio::spawn(worker.run());

        Self { rank, sender, status }
    }

    /// Append an operation. Never waits.
    pub(crate) fn push(&self, id: OperationId, op: Operation) -> Result<(), DpuError> {
        let mut status = self.status.lock();
        if self.sender.send(QueueEntry::Operation { id, op }).is_err() {
            return Err(DpuError::WorkerStopped { rank: self.rank });
        }
        status.pending += 1;
        if matches!(status.state, CompletionState::Idle | CompletionState::Succeeded) {
            status.state = CompletionState::Running;
        }
        Ok(())
    }

    /// Append a sync marker. The acknowledgement arrives once everything before
    /// it is done and the rank's report sits in the report store.
    pub(crate) fn push_barrier(&self) -> Result<oneshot::Receiver<()>, DpuError> {
        let (reply, report) = oneshot::channel();
        self.sender
            .send(QueueEntry::Barrier(reply))
            .map_err(|_| DpuError::WorkerStopped { rank: self.rank })?;
        Ok(report)
    }

    pub(crate) fn state(&self) -> CompletionState {
        self.status.lock().state.clone()
    }

    /// Queued entries plus detached callbacks that have not returned yet.
    pub(crate) fn pending(&self) -> usize {
        let status = self.status.lock();
        status.pending + status.detached
    }
}

/// Drain side of a rank's queue.
struct RankWorker {
    rank: RankId,
    receiver: mpsc::UnboundedReceiver<QueueEntry>,
    status: Arc<Mutex<RankStatus>>,
    driver: Arc<dyn TransportDriver>,
    reports: ReportStore,
    cancel: CancellationToken,
    detached: Vec<JoinHandle<()>>,
    processed: u64,
    discarded: usize,
}

impl RankWorker {
    async fn run(mut self) {
        RankWorkerStarted { rank: self.rank }.log();

        loop {
            // Only checked between entries: an operation that started runs to completion.
            let entry = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                entry = self.receiver.recv() => match entry {
                    Some(entry) => entry,
                    None => break,
                },
            };

            match entry {
                QueueEntry::Operation { id, op } => self.process(id, op).await,
                QueueEntry::Barrier(reply) => self.barrier(reply).await,
            }
        }

        RankWorkerStopped {
            rank: self.rank,
            processed: self.processed,
        }
        .log();
    }

    async fn process(&mut self, id: OperationId, op: Operation) {
        let failed = self.status.lock().state.is_failed();
        if failed {
            self.discard(id, op);
            self.finish(None);
            return;
        }

        let result = self.execute(id, op).await;
        self.processed += 1;
        if let Err(failure) = &result {
            OperationFailed {
                rank: self.rank,
                id,
                failure,
            }
            .log();
        }
        self.finish(result.err());
    }

    async fn execute(&mut self, id: OperationId, op: Operation) -> Result<(), RankFailure> {
        let rank = self.rank;
        match op {
            Operation::BroadcastIn { symbol, buffer } => self
                .driver
                .transfer_in(rank, symbol.address(), &buffer)
                .await
                .map_err(|source| RankFailure::Transfer {
                    rank,
                    kind: OperationKind::BroadcastIn,
                    symbol,
                    source,
                }),
            Operation::ScatterIn { symbol, buffer } => self
                .driver
                .transfer_in(rank, symbol.address(), &buffer)
                .await
                .map_err(|source| RankFailure::Transfer {
                    rank,
                    kind: OperationKind::ScatterIn,
                    symbol,
                    source,
                }),
            Operation::GatherOut {
                symbol,
                mut buffer,
                reply,
            } => {
                let result = self.driver.transfer_out(rank, symbol.address(), &mut buffer).await;
                match result {
                    Ok(()) => {
                        // The caller may have dropped its gather handle.
                        let _ = reply.send(buffer);
                        Ok(())
                    }
                    Err(source) => Err(RankFailure::Transfer {
                        rank,
                        kind: OperationKind::GatherOut,
                        symbol,
                        source,
                    }),
                }
            }
            Operation::Launch => self
                .driver
                .launch(rank)
                .await
                .map_err(|source| RankFailure::Launch { rank, source }),
            Operation::Callback {
                callback,
                blocking,
                scope,
            } => match scope {
                CallbackScope::PerRank => {
                    let name = callback.name().to_string();
                    let invocation = CallbackInvocation::new(Some(rank), vec![rank], Arc::clone(&self.driver));
                    let handle = spawn_callback(callback, invocation);
                    if !blocking {
                        CallbackDetached {
                            rank,
                            id,
                            callback: &name,
                        }
                        .log();
                        self.detach(name, handle);
                        return Ok(());
                    }
                    join_callback(handle).await.map_err(|message| RankFailure::Callback {
                        rank,
                        callback: name,
                        message,
                    })
                }
                CallbackScope::SingleCall(gate) => {
                    match gate.arrive(Arc::clone(&self.driver), &self.cancel).await {
                        GateOutcome::Completed(Err(message)) => Err(RankFailure::Callback {
                            rank,
                            callback: gate.name().to_string(),
                            message,
                        }),
                        GateOutcome::Completed(Ok(())) | GateOutcome::Abandoned => Ok(()),
                    }
                }
            },
        }
    }

    /// Drop an entry queued behind a failure. Dropping a gather reply tells its
    /// handle the buffer is gone; a single-call position is abandoned so the
    /// other ranks are not left waiting for this one.
    fn discard(&mut self, id: OperationId, op: Operation) {
        OperationDiscarded {
            rank: self.rank,
            id,
            kind: op.kind(),
        }
        .log();
        self.discarded += 1;

        if let Operation::Callback {
            scope: CallbackScope::SingleCall(gate),
            ..
        } = op
        {
            gate.abandon();
        }
    }

    /// Hand a non-blocking callback off. It keeps the rank `Running` until it
    /// returns and records its failure for the next barrier.
    fn detach(&mut self, callback: String, handle: JoinHandle<Result<(), String>>) {
        let rank = self.rank;
        let status = Arc::clone(&self.status);
        status.lock().detached += 1;

        self.detached.push(tokio::spawn(async move {
            let result = join_callback(handle).await;
            let mut status = status.lock();
            status.detached -= 1;
            if let Err(message) = result {
                status.detached_failure.get_or_insert(RankFailure::Callback {
                    rank,
                    callback,
                    message,
                });
            }
            status.settle();
        }));
    }

    fn finish(&self, failure: Option<RankFailure>) {
        let mut status = self.status.lock();
        status.pending = status.pending.saturating_sub(1);
        match failure {
            Some(failure) => status.state = CompletionState::Failed(failure),
            None => status.settle(),
        }
    }

    async fn barrier(&mut self, reply: oneshot::Sender<()>) {
        for handle in std::mem::take(&mut self.detached) {
            // The task only updates the status; its outcome is recorded there.
            let _ = handle.await;
        }

        let report = {
            let mut status = self.status.lock();
            let queue_failure = match std::mem::replace(&mut status.state, CompletionState::Idle) {
                CompletionState::Failed(failure) => Some(failure),
                _ => None,
            };
            let detached_failure = status.detached_failure.take();
            // Entries sent after this barrier are already counted.
            if status.pending > 0 {
                status.state = CompletionState::Running;
            }
            RankReport {
                rank: self.rank,
                failure: queue_failure.or(detached_failure),
                discarded: std::mem::take(&mut self.discarded),
            }
        };
        self.reports.lock().push(report);

        // Nobody is waiting if the sync future was dropped; the report stays
        // in the store for the next sync.
        let _ = reply.send(());
    }
}
