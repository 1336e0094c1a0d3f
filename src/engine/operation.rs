// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::engine::gate::SingleCallGate;
use crate::symbols::Symbol;
use crate::traits::{CallbackInvocation, RankCallback};

/// The operation variants a rank queue accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    BroadcastIn,
    ScatterIn,
    GatherOut,
    Launch,
    Callback,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::BroadcastIn => "broadcast_in",
            OperationKind::ScatterIn => "scatter_in",
            OperationKind::GatherOut => "gather_out",
            OperationKind::Launch => "launch",
            OperationKind::Callback => "callback",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set-wide logical queue position. Every rank entry of one fan-out shares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OperationId(pub u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// Which queues a callback entry is bound to.
#[derive(Clone)]
pub enum CallbackScope {
    /// One independent invocation per rank.
    PerRank,
    /// One invocation for the whole set, released by the shared gate.
    SingleCall(Arc<SingleCallGate>),
}

/// One rank's share of an enqueued operation.
///
/// Buffers are owned by the entry until it runs: broadcast data is shared
/// read-only between ranks, scatter data is moved per rank, and gather
/// buffers travel back to the caller through `reply`.
pub enum Operation {
    BroadcastIn {
        symbol: Symbol,
        buffer: Arc<[u8]>,
    },
    ScatterIn {
        symbol: Symbol,
        buffer: Vec<u8>,
    },
    GatherOut {
        symbol: Symbol,
        buffer: Vec<u8>,
        reply: oneshot::Sender<Vec<u8>>,
    },
    Launch,
    Callback {
        callback: Arc<dyn RankCallback>,
        blocking: bool,
        scope: CallbackScope,
    },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::BroadcastIn { .. } => OperationKind::BroadcastIn,
            Operation::ScatterIn { .. } => OperationKind::ScatterIn,
            Operation::GatherOut { .. } => OperationKind::GatherOut,
            Operation::Launch => OperationKind::Launch,
            Operation::Callback { .. } => OperationKind::Callback,
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::BroadcastIn { symbol, buffer } => f
                .debug_struct("BroadcastIn")
                .field("symbol", symbol)
                .field("len", &buffer.len())
                .finish(),
            Operation::ScatterIn { symbol, buffer } => f
                .debug_struct("ScatterIn")
                .field("symbol", symbol)
                .field("len", &buffer.len())
                .finish(),
            Operation::GatherOut { symbol, buffer, .. } => f
                .debug_struct("GatherOut")
                .field("symbol", symbol)
                .field("len", &buffer.len())
                .finish(),
            Operation::Launch => f.write_str("Launch"),
            Operation::Callback {
                callback,
                blocking,
                scope,
            } => f
                .debug_struct("Callback")
                .field("name", &callback.name())
                .field("blocking", blocking)
                .field("single_call", &matches!(scope, CallbackScope::SingleCall(_)))
                .finish(),
        }
    }
}

/// What actually travels through a rank channel.
pub(crate) enum QueueEntry {
    Operation { id: OperationId, op: Operation },
    /// Sync marker: the worker joins its detached callbacks, files its report
    /// and resets, then acknowledges.
    Barrier(oneshot::Sender<()>),
}

/// Run a callback on its own task so a panic comes back as an error.
pub(crate) fn spawn_callback(
    callback: Arc<dyn RankCallback>,
    invocation: CallbackInvocation,
) -> JoinHandle<Result<(), String>> {
    tokio::spawn(async move { callback.call(invocation).await })
}

pub(crate) async fn join_callback(handle: JoinHandle<Result<(), String>>) -> Result<(), String> {
    match handle.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(format!("callback panicked: {}", e)),
        Err(e) => Err(format!("callback did not complete: {}", e)),
    }
}
