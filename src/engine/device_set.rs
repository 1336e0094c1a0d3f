// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The device set: an ordered group of ranks driven collectively.
//!
//! Every enqueue method validates its arguments first and only then appends
//! to the rank queues, so a rejected call leaves no entry anywhere. Appends
//! happen under a set-wide sequence lock. That gives each logical operation
//! one [`OperationId`] and the same queue position relative to every other
//! operation on every rank, which is what lets a single-call callback see the
//! same prefix on all ranks.
//!
//! # Example
//!
//! ```no_run
//! use dpu_queue::backends::LoopbackDriver;
//! use dpu_queue::symbols::ProgramImage;
//! use dpu_queue::DeviceSet;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), dpu_queue::DpuError> {
//! let program = ProgramImage::from_symbols([("input", 0x0800_0000, 64)])?;
//! let set = DeviceSet::new(4, Arc::new(LoopbackDriver::default()), Arc::new(program))?;
//!
//! set.scatter_in("input", (0..4).map(|i| vec![i as u8; 64]).collect())?;
//! set.launch()?;
//! let gathered = set.gather_out("input", vec![vec![0; 64]; 4])?;
//! set.sync().await?;
//!
//! let buffers = gathered.buffers().await?;
//! assert_eq!(buffers[2], vec![2; 64]);
//! # Ok(())
//! # }
//! ```

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::engine::barrier::{aggregate, merge_reports};
use crate::engine::gate::SingleCallGate;
use crate::engine::handle::{ExecHandle, GatherHandle, OperationHandle};
use crate::engine::operation::{CallbackScope, Operation, OperationId, OperationKind};
use crate::engine::queue::{RankQueue, ReportStore};
use crate::engine::{CompletionState, Rank, RankId};
use crate::errors::DpuError;
use crate::observability::messages::queue::OperationEnqueued;
use crate::observability::messages::runtime::DeviceSetCreated;
use crate::observability::messages::sync::{SyncCompleted, SyncFailed, SyncStarted};
use crate::observability::messages::StructuredLog;
use crate::observability::sinks::LogForwarder;
use crate::symbols::{Symbol, SymbolRef, SymbolResolver};
use crate::traits::{LogSink, ProgramLoader, RankCallback, TransportDriver};

pub struct DeviceSet {
    ranks: Vec<Rank>,
    driver: Arc<dyn TransportDriver>,
    resolver: SymbolResolver,
    log_sink: Option<Arc<dyn LogSink>>,
    sequence: Mutex<u64>,
    reports: ReportStore,
    cancel: CancellationToken,
}

impl DeviceSet {
    /// Attach ranks `0..nr_ranks`. Must be called from inside a tokio runtime.
    pub fn new(
        nr_ranks: usize,
        driver: Arc<dyn TransportDriver>,
        loader: Arc<dyn ProgramLoader>,
    ) -> Result<Self, DpuError> {
        Self::with_ranks((0..nr_ranks).map(RankId).collect(), driver, loader)
    }

    /// Attach an explicit, ordered list of ranks. Set order decides which
    /// scatter/gather buffer each rank gets and which failure a sync reports.
    pub fn with_ranks(
        ranks: Vec<RankId>,
        driver: Arc<dyn TransportDriver>,
        loader: Arc<dyn ProgramLoader>,
    ) -> Result<Self, DpuError> {
        if ranks.is_empty() {
            return Err(DpuError::EmptySet);
        }
        let mut seen = HashSet::new();
        if let Some(rank) = ranks.iter().find(|rank| !seen.insert(**rank)) {
            return Err(DpuError::DuplicateRank { rank: *rank });
        }

        let cancel = CancellationToken::new();
        let reports = ReportStore::default();
        let ranks: Vec<Rank> = ranks
            .into_iter()
            .map(|id| {
                let queue = RankQueue::spawn(id, Arc::clone(&driver), Arc::clone(&reports), cancel.clone());
                Rank::new(id, queue)
            })
            .collect();

        DeviceSetCreated {
            rank_count: ranks.len(),
            driver: driver.name(),
        }
        .log();

        Ok(Self {
            ranks,
            driver,
            resolver: SymbolResolver::new(loader),
            log_sink: None,
            sequence: Mutex::new(0),
            reports,
            cancel,
        })
    }

    /// Sink that `exec()` forwards rank output to.
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn ranks(&self) -> &[Rank] {
        &self.ranks
    }

    pub fn rank_ids(&self) -> Vec<RankId> {
        self.ranks.iter().map(Rank::id).collect()
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    /// Always false: a set holds at least one rank.
    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    pub fn driver(&self) -> &Arc<dyn TransportDriver> {
        &self.driver
    }

    pub fn resolver(&self) -> &SymbolResolver {
        &self.resolver
    }

    pub fn rank_states(&self) -> Vec<(RankId, CompletionState)> {
        self.ranks.iter().map(|rank| (rank.id(), rank.state())).collect()
    }

    /// Operations enqueued on any rank that have not finished yet.
    pub fn pending_operations(&self) -> usize {
        self.ranks.iter().map(Rank::pending_operations).sum()
    }

    /// Copy the same buffer to `symbol` on every rank.
    pub fn broadcast_in(
        &self,
        symbol: impl Into<SymbolRef>,
        buffer: impl Into<Arc<[u8]>>,
    ) -> Result<OperationHandle, DpuError> {
        let symbol = self.resolve(symbol.into())?;
        let buffer: Arc<[u8]> = buffer.into();
        symbol.check_access(0, buffer.len())?;

        let ops = self
            .ranks
            .iter()
            .map(|_| Operation::BroadcastIn {
                symbol: symbol.clone(),
                buffer: Arc::clone(&buffer),
            })
            .collect();
        self.fan_out(OperationKind::BroadcastIn, ops)
    }

    /// Copy `buffers[i]` to `symbol` on the i-th rank of the set.
    pub fn scatter_in(&self, symbol: impl Into<SymbolRef>, buffers: Vec<Vec<u8>>) -> Result<OperationHandle, DpuError> {
        self.check_arity(buffers.len())?;
        let symbol = self.resolve(symbol.into())?;
        for buffer in &buffers {
            symbol.check_access(0, buffer.len())?;
        }

        let ops = buffers
            .into_iter()
            .map(|buffer| Operation::ScatterIn {
                symbol: symbol.clone(),
                buffer,
            })
            .collect();
        self.fan_out(OperationKind::ScatterIn, ops)
    }

    /// Fill `buffers[i]` from `symbol` on the i-th rank of the set.
    ///
    /// The buffers are moved into the queues and come back through the
    /// returned handle once each rank has run the transfer.
    pub fn gather_out(&self, symbol: impl Into<SymbolRef>, buffers: Vec<Vec<u8>>) -> Result<GatherHandle, DpuError> {
        self.check_arity(buffers.len())?;
        let symbol = self.resolve(symbol.into())?;
        for buffer in &buffers {
            symbol.check_access(0, buffer.len())?;
        }

        let mut replies = Vec::with_capacity(buffers.len());
        let ops = buffers
            .into_iter()
            .zip(&self.ranks)
            .map(|(buffer, rank)| {
                let (reply, receiver) = oneshot::channel();
                replies.push((rank.id(), receiver));
                Operation::GatherOut {
                    symbol: symbol.clone(),
                    buffer,
                    reply,
                }
            })
            .collect();

        let handle = self.fan_out(OperationKind::GatherOut, ops)?;
        Ok(GatherHandle::new(handle, replies))
    }

    /// Boot the loaded program on every rank.
    pub fn launch(&self) -> Result<OperationHandle, DpuError> {
        let ops = self.ranks.iter().map(|_| Operation::Launch).collect();
        self.fan_out(OperationKind::Launch, ops)
    }

    /// Enqueue a host callback.
    ///
    /// With `single_call` the callback runs once for the whole set, after
    /// every rank has reached this position, and every rank waits for it
    /// whatever `blocking` says. Otherwise one invocation runs per rank;
    /// `blocking` decides whether that rank's queue waits for it or moves on.
    pub fn register_callback(
        &self,
        callback: Arc<dyn RankCallback>,
        blocking: bool,
        single_call: bool,
    ) -> Result<OperationHandle, DpuError> {
        let ops = self.callback_ops(callback, blocking, single_call);
        self.fan_out(OperationKind::Callback, ops)
    }

    /// Blocking, per-rank callback.
    pub fn call(&self, callback: Arc<dyn RankCallback>) -> Result<OperationHandle, DpuError> {
        self.register_callback(callback, true, false)
    }

    /// Launch, then forward each rank's output to the configured sink.
    pub fn exec(&self) -> Result<ExecHandle, DpuError> {
        self.exec_with(self.log_sink.clone())
    }

    /// Launch, then forward each rank's output to `sink`. Without a sink
    /// nothing but the launch is enqueued.
    ///
    /// The log read lands right behind the launch on every rank, whatever
    /// other callers enqueue concurrently.
    pub fn exec_with(&self, sink: Option<Arc<dyn LogSink>>) -> Result<ExecHandle, DpuError> {
        let mut sequence = self.sequence.lock();
        let launch = self.push_locked(
            &mut sequence,
            OperationKind::Launch,
            self.ranks.iter().map(|_| Operation::Launch).collect(),
        )?;
        let log = match sink {
            Some(sink) => {
                let ops = self.callback_ops(Arc::new(LogForwarder::new(sink)), true, false);
                Some(self.push_locked(&mut sequence, OperationKind::Callback, ops)?)
            }
            None => None,
        };
        Ok(ExecHandle { launch, log })
    }

    /// Wait for every queue to drain and every detached callback to finish.
    ///
    /// Reports the first failure in set order. Whatever the outcome, every
    /// rank is back to `Idle` with an empty queue afterwards, unless other
    /// callers enqueued concurrently.
    pub async fn sync(&self) -> Result<(), DpuError> {
        let started = Instant::now();
        SyncStarted {
            rank_count: self.ranks.len(),
        }
        .log();

        let acks = {
            let _sequence = self.sequence.lock();
            self.ranks
                .iter()
                .map(|rank| rank.queue().push_barrier().map(|ack| (rank.id(), ack)))
                .collect::<Result<Vec<_>, DpuError>>()?
        };

        for (rank, ack) in acks {
            ack.await.map_err(|_| DpuError::WorkerStopped { rank })?;
        }
        // Also picks up reports filed for a sync that was dropped before it
        // collected them.
        let filed = std::mem::take(&mut *self.reports.lock());
        let reports = merge_reports(&self.rank_ids(), filed);

        let duration = started.elapsed();
        match aggregate(&reports) {
            Ok(()) => {
                SyncCompleted {
                    rank_count: reports.len(),
                    duration,
                }
                .log();
                Ok(())
            }
            Err(error) => {
                SyncFailed {
                    error: &error,
                    discarded: reports.iter().map(|report| report.discarded).sum(),
                    duration,
                }
                .log();
                Err(error.into())
            }
        }
    }

    fn resolve(&self, symbol: SymbolRef) -> Result<Symbol, DpuError> {
        self.resolver.resolve(&symbol)
    }

    fn check_arity(&self, actual: usize) -> Result<(), DpuError> {
        if actual != self.ranks.len() {
            return Err(DpuError::ArityMismatch {
                expected: self.ranks.len(),
                actual,
            });
        }
        Ok(())
    }

    fn callback_ops(&self, callback: Arc<dyn RankCallback>, blocking: bool, single_call: bool) -> Vec<Operation> {
        let scope = if single_call {
            CallbackScope::SingleCall(SingleCallGate::new(Arc::clone(&callback), self.rank_ids()))
        } else {
            CallbackScope::PerRank
        };

        self.ranks
            .iter()
            .map(|_| Operation::Callback {
                callback: Arc::clone(&callback),
                blocking: blocking || single_call,
                scope: scope.clone(),
            })
            .collect()
    }

    /// Append one operation per rank, `ops[i]` to the i-th rank, at one
    /// logical position.
    fn fan_out(&self, kind: OperationKind, ops: Vec<Operation>) -> Result<OperationHandle, DpuError> {
        let mut sequence = self.sequence.lock();
        self.push_locked(&mut sequence, kind, ops)
    }

    fn push_locked(&self, sequence: &mut u64, kind: OperationKind, ops: Vec<Operation>) -> Result<OperationHandle, DpuError> {
        let id = OperationId(*sequence);
        *sequence += 1;

        for (rank, op) in self.ranks.iter().zip(ops) {
            rank.queue().push(id, op)?;
        }

        OperationEnqueued {
            id,
            kind,
            rank_count: self.ranks.len(),
        }
        .log();
        Ok(OperationHandle {
            id,
            kind,
            ranks: self.ranks.len(),
        })
    }
}

impl Drop for DeviceSet {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for DeviceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSet")
            .field("ranks", &self.ranks)
            .field("driver", &self.driver.name())
            .field("log_sink", &self.log_sink.is_some())
            .finish()
    }
}
