// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod barrier;
pub mod device_set;
pub mod gate;
pub mod handle;
pub mod operation;
mod queue;
pub mod rank;
#[cfg(test)]
pub mod integration_tests;

pub use barrier::{aggregate, merge_reports, RankReport};
pub use device_set::DeviceSet;
pub use gate::SingleCallGate;
pub use handle::{ExecHandle, GatherHandle, OperationHandle};
pub use operation::{CallbackScope, Operation, OperationId, OperationKind};
pub use rank::{CompletionState, Rank, RankId};
