// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors surfaced by the device set and its per-rank queues.
//!
//! Two families live here. [`DpuError`] is what callers see: immediate
//! enqueue-time rejections (unknown symbol, arity mismatch, bad access) and the
//! aggregated outcome of a sync. [`RankFailure`] is what a rank records when one
//! of its queued operations fails; it stays on the rank until the next sync
//! reports it inside an [`AggregatedError`].

use thiserror::Error;

use crate::engine::{OperationKind, RankId};
use crate::errors::TransportError;
use crate::symbols::{MemoryKind, Symbol};

/// Errors returned by the public device set API.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DpuError {
    /// The program loader has no symbol with this name.
    #[error("unknown symbol '{name}'")]
    SymbolNotFound { name: String },

    /// A symbol was described with a zero size.
    #[error("invalid symbol at 0x{address:08x}: size must be greater than zero")]
    InvalidSymbol { address: u32 },

    /// A transfer would run past the end of the symbol.
    #[error("invalid symbol access (offset:{offset} + length:{length} > size:{size})")]
    InvalidSymbolAccess { offset: u32, length: usize, size: u32 },

    /// A transfer violates the alignment rules of the memory it targets.
    #[error("invalid {kind} access (address:0x{address:08x}, length:{length}): {alignment}-byte alignment required")]
    InvalidMemoryAccess {
        kind: MemoryKind,
        address: u32,
        length: usize,
        alignment: u32,
    },

    /// A scatter or gather was given a buffer count that differs from the rank count.
    #[error("expected {expected} buffers (one per rank), got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// Two symbols in one program image share a name.
    #[error("duplicate symbol '{name}' in program image")]
    DuplicateSymbol { name: String },

    /// The same rank was attached twice to one device set.
    #[error("{rank} is attached more than once")]
    DuplicateRank { rank: RankId },

    /// A device set was built over zero ranks.
    #[error("a device set needs at least one rank")]
    EmptySet,

    /// At least one rank failed since the previous sync.
    #[error(transparent)]
    Sync(#[from] AggregatedError),

    /// A gather buffer never came back because its rank failed first.
    #[error("gather buffer for {rank} was not filled: the rank failed before or during the transfer")]
    BufferUnavailable { rank: RankId },

    /// The worker draining a rank queue is gone (the set was dropped).
    #[error("queue worker for {rank} has stopped")]
    WorkerStopped { rank: RankId },
}

/// The failure a rank records for the first operation that went wrong.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RankFailure {
    #[error("{kind} of {symbol} on {rank} failed: {source}")]
    Transfer {
        rank: RankId,
        kind: OperationKind,
        symbol: Symbol,
        #[source]
        source: TransportError,
    },

    #[error("launch on {rank} failed: {source}")]
    Launch {
        rank: RankId,
        #[source]
        source: TransportError,
    },

    #[error("callback '{callback}' on {rank} failed: {message}")]
    Callback {
        rank: RankId,
        callback: String,
        message: String,
    },
}

impl RankFailure {
    /// The rank that recorded this failure.
    pub fn rank(&self) -> RankId {
        match self {
            RankFailure::Transfer { rank, .. }
            | RankFailure::Launch { rank, .. }
            | RankFailure::Callback { rank, .. } => *rank,
        }
    }

    /// The kind of operation that failed.
    pub fn kind(&self) -> OperationKind {
        match self {
            RankFailure::Transfer { kind, .. } => *kind,
            RankFailure::Launch { .. } => OperationKind::Launch,
            RankFailure::Callback { .. } => OperationKind::Callback,
        }
    }
}

/// Outcome of a failed sync.
///
/// `failure` belongs to the lowest-indexed failing rank in set order, never to
/// whichever rank happened to fail first in wall-clock time.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{failure} ({} of {total} ranks failed)", .failed_ranks.len())]
pub struct AggregatedError {
    pub rank: RankId,
    pub failure: RankFailure,
    pub failed_ranks: Vec<RankId>,
    pub total: usize,
}
