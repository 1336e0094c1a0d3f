// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::backends::DriverFactory;
use crate::config::Config;
use crate::engine::DeviceSet;
use crate::errors::ConfigError;
use crate::observability::sinks::TracingSink;
use crate::traits::TransportDriver;

/// Device set builder: wires driver, program image and log sink from configuration.
///
/// # Examples
///
/// ```
/// use dpu_queue::config::{parse_config, ConfigFormat, RuntimeBuilder};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let config = parse_config("ranks: 2\nbackend: stub\n", ConfigFormat::Yaml).unwrap();
/// let set = RuntimeBuilder::from_config(&config).unwrap();
///
/// assert_eq!(set.len(), 2);
/// # }
/// ```
pub struct RuntimeBuilder;

impl RuntimeBuilder {
    /// Build a device set with the driver named by `cfg.backend`.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn from_config(cfg: &Config) -> Result<DeviceSet, ConfigError> {
        Self::with_driver(cfg, DriverFactory::from_config(cfg))
    }

    /// Build a device set over a caller-supplied driver.
    pub fn with_driver(cfg: &Config, driver: Arc<dyn TransportDriver>) -> Result<DeviceSet, ConfigError> {
        let program = cfg.program.image()?;
        let set = DeviceSet::new(cfg.ranks, driver, Arc::new(program))?;
        Ok(if cfg.log_launches {
            set.with_log_sink(Arc::new(TracingSink))
        } else {
            set
        })
    }
}
