// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod device;
mod transport;

pub use config::{ConfigError, ValidationError};
pub use device::{AggregatedError, DpuError, RankFailure};
pub use transport::TransportError;
