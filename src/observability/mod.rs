// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and program log forwarding.
//!
//! Message types follow a struct-based pattern with a `Display` implementation
//! plus [`messages::StructuredLog`], so every event is emitted with the same
//! text and the same structured fields wherever it is raised.
//!
//! # Organization
//!
//! * `messages::queue` - per-rank worker and operation lifecycle
//! * `messages::sync` - sync barrier start, completion and failure
//! * `messages::runtime` - configuration, runtime construction, symbol resolution
//! * `sinks` - [`LogSink`](crate::traits::LogSink) implementations used by `exec()`
//!
//! # Usage
//!
//! ```rust
//! use dpu_queue::observability::messages::StructuredLog;
//! use dpu_queue::observability::messages::sync::SyncStarted;
//!
//! SyncStarted { rank_count: 4 }.log();
//! ```

pub mod messages;
pub mod sinks;
