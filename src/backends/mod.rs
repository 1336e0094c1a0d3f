// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Transport drivers.
//!
//! Every backend implements [`TransportDriver`] and can be built from
//! configuration through [`DriverFactory`].
//!
//! # Available Backends
//!
//! ## Loopback
//! Per-rank in-memory banks. A gather reads back exactly what a scatter or
//! broadcast wrote, which makes it the default for demos and tests.
//!
//! ## Stub
//! Accepts every call and touches no memory.
//!
//! ## Test drivers
//! Wrappers around another driver:
//! - **FaultyDriver**: fails a chosen call on a chosen rank
//! - **RecordingDriver**: records every call with a shared logical clock,
//!   optionally delaying a rank
//!
//! # Example
//! ```rust
//! use dpu_queue::backends::{DriverFactory, MemoryLayout};
//! use dpu_queue::config::BackendType;
//!
//! let driver = DriverFactory::create(&BackendType::Loopback, MemoryLayout::default());
//! assert_eq!(driver.name(), "loopback");
//! ```

pub mod loopback;
pub mod recording;
pub mod stub;

pub use loopback::{LoopbackDriver, MemoryLayout};
pub use recording::{DriverEvent, RecordingDriver};
pub use stub::{FaultyDriver, StubDriver};

use std::sync::Arc;

use crate::config::{BackendType, Config};
use crate::traits::TransportDriver;

/// Builds drivers from configuration.
pub struct DriverFactory;

impl DriverFactory {
    pub fn create(backend: &BackendType, layout: MemoryLayout) -> Arc<dyn TransportDriver> {
        match backend {
            BackendType::Loopback => Arc::new(LoopbackDriver::new(layout)),
            BackendType::Stub => Arc::new(StubDriver::new()),
        }
    }

    pub fn from_config(config: &Config) -> Arc<dyn TransportDriver> {
        Self::create(&config.backend, config.memory.layout())
    }

    /// List all backend names accepted in configuration
    pub fn list_available_backends() -> Vec<&'static str> {
        vec!["loopback", "stub"]
    }
}
