// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message implements `Display` for the human-readable line and
//! [`StructuredLog`] to emit it at its level with structured fields attached.

use tracing::Span;

pub mod queue;
pub mod runtime;
pub mod sync;

/// A log event that knows its own level and fields.
pub trait StructuredLog {
    /// Emit the event at its level.
    fn log(&self);

    /// Open a span carrying the same fields.
    fn span(&self, name: &str) -> Span;
}
