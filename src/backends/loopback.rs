// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::consts::{DEFAULT_IRAM_SIZE, DEFAULT_MRAM_SIZE, DEFAULT_WRAM_SIZE};
use crate::engine::RankId;
use crate::errors::TransportError;
use crate::symbols::MemoryKind;
use crate::traits::TransportDriver;

/// Bank sizes of one simulated rank, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLayout {
    pub iram_size: usize,
    pub wram_size: usize,
    pub mram_size: usize,
}

impl MemoryLayout {
    pub fn size(&self, kind: MemoryKind) -> usize {
        match kind {
            MemoryKind::Iram => self.iram_size,
            MemoryKind::Wram => self.wram_size,
            MemoryKind::Mram => self.mram_size,
        }
    }
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self {
            iram_size: DEFAULT_IRAM_SIZE,
            wram_size: DEFAULT_WRAM_SIZE,
            mram_size: DEFAULT_MRAM_SIZE,
        }
    }
}

#[derive(Debug, Default)]
struct RankMemory {
    iram: Vec<u8>,
    wram: Vec<u8>,
    mram: Vec<u8>,
    launches: u64,
    log: Vec<u8>,
}

impl RankMemory {
    fn bank(&mut self, kind: MemoryKind) -> &mut Vec<u8> {
        match kind {
            MemoryKind::Iram => &mut self.iram,
            MemoryKind::Wram => &mut self.wram,
            MemoryKind::Mram => &mut self.mram,
        }
    }
}

/// In-memory driver: banks are allocated on first touch and grow up to the
/// configured layout. Bytes never written read back as zero.
#[derive(Debug, Default)]
pub struct LoopbackDriver {
    layout: MemoryLayout,
    ranks: Mutex<HashMap<RankId, RankMemory>>,
}

impl LoopbackDriver {
    pub fn new(layout: MemoryLayout) -> Self {
        Self {
            layout,
            ranks: Mutex::new(HashMap::new()),
        }
    }

    pub fn layout(&self) -> MemoryLayout {
        self.layout
    }

    /// Read `length` bytes at `address` on `rank` without going through a queue.
    pub fn peek(&self, rank: RankId, address: u32, length: usize) -> Vec<u8> {
        let mut buffer = vec![0; length];
        // Out-of-range peeks return zeros.
        let _ = self.read(rank, address, &mut buffer);
        buffer
    }

    pub fn launch_count(&self, rank: RankId) -> u64 {
        self.ranks.lock().get(&rank).map(|memory| memory.launches).unwrap_or(0)
    }

    /// Bank and byte range touched by an access, checked against the layout.
    fn locate(&self, address: u32, length: usize) -> Result<(MemoryKind, usize), TransportError> {
        let kind = MemoryKind::from_address(address);
        let offset = kind.offset(address);
        let bank_size = self.layout.size(kind);
        if offset as usize + length > bank_size {
            return Err(TransportError::OutOfBounds {
                kind,
                offset,
                length,
                bank_size,
            });
        }
        Ok((kind, offset as usize))
    }

    fn write(&self, rank: RankId, address: u32, data: &[u8]) -> Result<(), TransportError> {
        let (kind, offset) = self.locate(address, data.len())?;
        let end = offset + data.len();

        let mut ranks = self.ranks.lock();
        let bank = ranks.entry(rank).or_default().bank(kind);
        if bank.len() < end {
            bank.resize(end, 0);
        }
        bank[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, rank: RankId, address: u32, data: &mut [u8]) -> Result<(), TransportError> {
        let (kind, offset) = self.locate(address, data.len())?;
        data.fill(0);

        let mut ranks = self.ranks.lock();
        if let Some(memory) = ranks.get_mut(&rank) {
            let bank = memory.bank(kind);
            if offset < bank.len() {
                let available = (bank.len() - offset).min(data.len());
                data[..available].copy_from_slice(&bank[offset..offset + available]);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TransportDriver for LoopbackDriver {
    async fn transfer_in(&self, rank: RankId, address: u32, data: &[u8]) -> Result<(), TransportError> {
        self.write(rank, address, data)
    }

    async fn transfer_out(&self, rank: RankId, address: u32, data: &mut [u8]) -> Result<(), TransportError> {
        self.read(rank, address, data)
    }

    async fn launch(&self, rank: RankId) -> Result<(), TransportError> {
        let mut ranks = self.ranks.lock();
        let memory = ranks.entry(rank).or_default();
        memory.launches += 1;
        let line = format!("launch #{} on {}\n", memory.launches, rank);
        memory.log.extend_from_slice(line.as_bytes());
        Ok(())
    }

    /// Drains the output collected since the previous read.
    async fn read_log(&self, rank: RankId) -> Result<Vec<u8>, TransportError> {
        Ok(self
            .ranks
            .lock()
            .get_mut(&rank)
            .map(|memory| std::mem::take(&mut memory.log))
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "loopback"
    }
}
