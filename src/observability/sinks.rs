// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Log sinks for the program output fetched by `exec()`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::RankId;
use crate::traits::{CallbackInvocation, LogSink, RankCallback};

/// Emits one `tracing::info!` event per line of rank output.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, rank: RankId, log: &[u8]) -> Result<(), String> {
        for line in String::from_utf8_lossy(log).lines() {
            tracing::info!(rank = rank.index(), "[{}] {}", rank, line);
        }
        Ok(())
    }
}

/// Collects rank output in memory, keyed by rank.
#[derive(Debug, Default)]
pub struct MemorySink {
    logs: Mutex<HashMap<RankId, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written for `rank` so far, or an empty buffer.
    pub fn contents(&self, rank: RankId) -> Vec<u8> {
        self.logs.lock().get(&rank).cloned().unwrap_or_default()
    }

    pub fn contents_string(&self, rank: RankId) -> String {
        String::from_utf8_lossy(&self.contents(rank)).into_owned()
    }

    /// Ranks that received at least one write.
    pub fn ranks(&self) -> Vec<RankId> {
        let mut ranks: Vec<RankId> = self.logs.lock().keys().copied().collect();
        ranks.sort();
        ranks
    }
}

impl LogSink for MemorySink {
    fn write(&self, rank: RankId, log: &[u8]) -> Result<(), String> {
        self.logs.lock().entry(rank).or_default().extend_from_slice(log);
        Ok(())
    }
}

/// Fetch the output of `rank` from the driver and hand it to `sink`.
pub async fn read_log(invocation: &CallbackInvocation, rank: RankId, sink: &dyn LogSink) -> Result<(), String> {
    let log = invocation
        .driver()
        .read_log(rank)
        .await
        .map_err(|e| format!("failed to read log: {}", e))?;
    if log.is_empty() {
        return Ok(());
    }
    sink.write(rank, &log)
}

/// The per-rank callback `exec()` enqueues after a launch.
pub struct LogForwarder {
    sink: Arc<dyn LogSink>,
}

impl LogForwarder {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl RankCallback for LogForwarder {
    async fn call(&self, invocation: CallbackInvocation) -> Result<(), String> {
        for rank in invocation.ranks().to_vec() {
            read_log(&invocation, rank, self.sink.as_ref()).await?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
