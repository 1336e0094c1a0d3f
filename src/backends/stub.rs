// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::RankId;
use crate::errors::TransportError;
use crate::traits::{DriverCall, TransportDriver};

/// A driver that accepts every call and moves no data.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubDriver;

impl StubDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransportDriver for StubDriver {
    async fn transfer_in(&self, _rank: RankId, _address: u32, _data: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }

    async fn transfer_out(&self, _rank: RankId, _address: u32, _data: &mut [u8]) -> Result<(), TransportError> {
        Ok(())
    }

    async fn launch(&self, _rank: RankId) -> Result<(), TransportError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    Always,
    Once,
}

/// Wraps another driver and fails selected calls on selected ranks.
pub struct FaultyDriver {
    inner: Arc<dyn TransportDriver>,
    faults: Mutex<HashMap<(RankId, DriverCall), Fault>>,
}

impl FaultyDriver {
    pub fn new(inner: Arc<dyn TransportDriver>) -> Self {
        Self {
            inner,
            faults: Mutex::new(HashMap::new()),
        }
    }

    /// Fail every `call` on `rank` from now on.
    pub fn fail(&self, rank: RankId, call: DriverCall) {
        self.faults.lock().insert((rank, call), Fault::Always);
    }

    /// Fail the next `call` on `rank` only.
    pub fn fail_once(&self, rank: RankId, call: DriverCall) {
        self.faults.lock().insert((rank, call), Fault::Once);
    }

    pub fn clear(&self) {
        self.faults.lock().clear();
    }

    fn check(&self, rank: RankId, call: DriverCall) -> Result<(), TransportError> {
        let mut faults = self.faults.lock();
        match faults.get(&(rank, call)).copied() {
            None => Ok(()),
            Some(fault) => {
                if fault == Fault::Once {
                    faults.remove(&(rank, call));
                }
                Err(TransportError::Injected(format!("{} on {}", call, rank)))
            }
        }
    }
}

#[async_trait]
impl TransportDriver for FaultyDriver {
    async fn transfer_in(&self, rank: RankId, address: u32, data: &[u8]) -> Result<(), TransportError> {
        self.check(rank, DriverCall::TransferIn)?;
        self.inner.transfer_in(rank, address, data).await
    }

    async fn transfer_out(&self, rank: RankId, address: u32, data: &mut [u8]) -> Result<(), TransportError> {
        self.check(rank, DriverCall::TransferOut)?;
        self.inner.transfer_out(rank, address, data).await
    }

    async fn launch(&self, rank: RankId) -> Result<(), TransportError> {
        self.check(rank, DriverCall::Launch)?;
        self.inner.launch(rank).await
    }

    async fn read_log(&self, rank: RankId) -> Result<Vec<u8>, TransportError> {
        self.check(rank, DriverCall::ReadLog)?;
        self.inner.read_log(rank).await
    }

    fn name(&self) -> &'static str {
        "faulty"
    }
}
