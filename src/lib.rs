// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;      // transport drivers
pub mod config;        // config + runtime builder
pub mod engine;        // per-rank queues, device set, sync barrier
pub mod errors;        // error handling
pub mod observability;
pub mod symbols;       // symbol resolution and memory regions
pub mod traits;        // seams to the outside world

pub use engine::{CompletionState, DeviceSet, OperationHandle, RankId};
pub use errors::DpuError;
pub use symbols::{Symbol, SymbolRef};
