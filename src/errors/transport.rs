// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use crate::symbols::MemoryKind;

/// Errors reported by a transport driver for a single rank.
///
/// The queue never retries; whatever the driver returns is recorded on the rank
/// and reported at the next sync.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The hardware (or its kernel driver) rejected the request.
    #[error("hardware error: {0}")]
    Hardware(String),

    /// The access falls outside the memory bank backing the symbol.
    #[error("{kind} access out of bounds (offset:0x{offset:x}, length:{length}, bank size:{bank_size})")]
    OutOfBounds {
        kind: MemoryKind,
        offset: u32,
        length: usize,
        bank_size: usize,
    },

    /// A fault injected on purpose by a test driver.
    #[error("injected fault: {0}")]
    Injected(String),
}
