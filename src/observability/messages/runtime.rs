// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for configuration and runtime construction.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A configuration file was loaded and validated.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ConfigLoaded<'a> {
    pub path: &'a str,
    pub ranks: usize,
    pub backend: &'a str,
    pub symbol_count: usize,
}

impl Display for ConfigLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded config '{}': {} ranks on {} backend, {} program symbols",
            self.path, self.ranks, self.backend, self.symbol_count
        )
    }
}

impl StructuredLog for ConfigLoaded<'_> {
    fn log(&self) {
        tracing::info!(
            path = self.path,
            ranks = self.ranks,
            backend = self.backend,
            symbol_count = self.symbol_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("config", span_name = name, path = self.path)
    }
}

/// A device set attached its ranks and started their queue workers.
///
/// # Log Level
/// `info!` - Important operational event
pub struct DeviceSetCreated<'a> {
    pub rank_count: usize,
    pub driver: &'a str,
}

impl Display for DeviceSetCreated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Device set created: {} ranks on '{}' driver",
            self.rank_count, self.driver
        )
    }
}

impl StructuredLog for DeviceSetCreated<'_> {
    fn log(&self) {
        tracing::info!(
            rank_count = self.rank_count,
            driver = self.driver,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "device_set",
            span_name = name,
            rank_count = self.rank_count,
            driver = self.driver,
        )
    }
}

/// A symbol name was resolved through the program loader (cache miss).
///
/// # Log Level
/// `trace!`
pub struct SymbolResolved<'a> {
    pub name: &'a str,
    pub address: u32,
    pub size: u32,
}

impl Display for SymbolResolved<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Resolved symbol '{}' to 0x{:08x} ({} bytes)",
            self.name, self.address, self.size
        )
    }
}

impl StructuredLog for SymbolResolved<'_> {
    fn log(&self) {
        tracing::trace!(
            symbol = self.name,
            address = self.address,
            size = self.size,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!("symbol", span_name = name, symbol = self.name)
    }
}
