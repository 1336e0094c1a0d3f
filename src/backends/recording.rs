// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::engine::RankId;
use crate::errors::TransportError;
use crate::traits::{DriverCall, TransportDriver};

/// One driver call as seen by a [`RecordingDriver`].
///
/// `started` and `finished` are ticks of the driver's logical clock, which
/// test callbacks can share through [`RecordingDriver::clock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverEvent {
    pub rank: RankId,
    pub call: DriverCall,
    pub address: Option<u32>,
    pub length: usize,
    pub started: u64,
    pub finished: u64,
    pub ok: bool,
}

/// Wraps another driver and records every call it forwards.
pub struct RecordingDriver {
    inner: Arc<dyn TransportDriver>,
    clock: Arc<AtomicU64>,
    events: Mutex<Vec<DriverEvent>>,
    delays: Mutex<HashMap<RankId, Duration>>,
}

impl RecordingDriver {
    pub fn new(inner: Arc<dyn TransportDriver>) -> Self {
        Self {
            inner,
            clock: Arc::new(AtomicU64::new(0)),
            events: Mutex::new(Vec::new()),
            delays: Mutex::new(HashMap::new()),
        }
    }

    /// Slow every call on `rank` down by `delay`.
    pub fn with_delay(self, rank: RankId, delay: Duration) -> Self {
        self.delays.lock().insert(rank, delay);
        self
    }

    /// The logical clock stamped into events.
    pub fn clock(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.clock)
    }

    pub fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst)
    }

    /// Completed calls, in completion order.
    pub fn events(&self) -> Vec<DriverEvent> {
        self.events.lock().clone()
    }

    pub fn events_for(&self, rank: RankId) -> Vec<DriverEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.rank == rank)
            .cloned()
            .collect()
    }

    pub fn count(&self, call: DriverCall) -> usize {
        self.events.lock().iter().filter(|event| event.call == call).count()
    }

    async fn delay(&self, rank: RankId) {
        let delay = self.delays.lock().get(&rank).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn record(&self, rank: RankId, call: DriverCall, address: Option<u32>, length: usize, started: u64, ok: bool) {
        let finished = self.tick();
        self.events.lock().push(DriverEvent {
            rank,
            call,
            address,
            length,
            started,
            finished,
            ok,
        });
    }
}

#[async_trait]
impl TransportDriver for RecordingDriver {
    async fn transfer_in(&self, rank: RankId, address: u32, data: &[u8]) -> Result<(), TransportError> {
        let started = self.tick();
        self.delay(rank).await;
        let result = self.inner.transfer_in(rank, address, data).await;
        self.record(rank, DriverCall::TransferIn, Some(address), data.len(), started, result.is_ok());
        result
    }

    async fn transfer_out(&self, rank: RankId, address: u32, data: &mut [u8]) -> Result<(), TransportError> {
        let started = self.tick();
        self.delay(rank).await;
        let result = self.inner.transfer_out(rank, address, data).await;
        self.record(rank, DriverCall::TransferOut, Some(address), data.len(), started, result.is_ok());
        result
    }

    async fn launch(&self, rank: RankId) -> Result<(), TransportError> {
        let started = self.tick();
        self.delay(rank).await;
        let result = self.inner.launch(rank).await;
        self.record(rank, DriverCall::Launch, None, 0, started, result.is_ok());
        result
    }

    async fn read_log(&self, rank: RankId) -> Result<Vec<u8>, TransportError> {
        let started = self.tick();
        let result = self.inner.read_log(rank).await;
        let length = result.as_ref().map(Vec::len).unwrap_or(0);
        self.record(rank, DriverCall::ReadLog, None, length, started, result.is_ok());
        result
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
