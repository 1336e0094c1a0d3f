// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Serialize;
use tokio::sync::oneshot;

use crate::engine::{OperationId, OperationKind, RankId};
use crate::errors::DpuError;

/// Receipt for an enqueued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperationHandle {
    pub id: OperationId,
    pub kind: OperationKind,
    /// Number of rank queues the operation was appended to.
    pub ranks: usize,
}

/// Receipt for a gather; hands the filled buffers back.
#[derive(Debug)]
pub struct GatherHandle {
    handle: OperationHandle,
    replies: Vec<(RankId, oneshot::Receiver<Vec<u8>>)>,
}

impl GatherHandle {
    pub(crate) fn new(handle: OperationHandle, replies: Vec<(RankId, oneshot::Receiver<Vec<u8>>)>) -> Self {
        Self { handle, replies }
    }

    pub fn handle(&self) -> OperationHandle {
        self.handle
    }

    /// Wait for every rank's transfer and return the buffers in set order.
    ///
    /// Fails with [`DpuError::BufferUnavailable`] for the first rank whose
    /// entry failed or was discarded. The rank failure itself is reported by
    /// the next sync.
    pub async fn buffers(self) -> Result<Vec<Vec<u8>>, DpuError> {
        let mut buffers = Vec::with_capacity(self.replies.len());
        for (rank, reply) in self.replies {
            buffers.push(reply.await.map_err(|_| DpuError::BufferUnavailable { rank })?);
        }
        Ok(buffers)
    }
}

/// Receipt for `exec()`: the launch, plus the log forwarding callback when a
/// sink was configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecHandle {
    pub launch: OperationHandle,
    pub log: Option<OperationHandle>,
}
