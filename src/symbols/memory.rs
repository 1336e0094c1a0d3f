// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address bit selecting instruction memory.
pub const IRAM_MASK: u32 = 0x8000_0000;
/// Address bit selecting the main (DRAM-backed) memory.
pub const MRAM_MASK: u32 = 0x0800_0000;

const IRAM_ALIGN: u32 = 8;
const WRAM_ALIGN: u32 = 4;

/// The memory a symbol address points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Iram,
    Wram,
    Mram,
}

impl MemoryKind {
    /// Classify a symbol address. The IRAM bit wins over the MRAM bit.
    pub fn from_address(address: u32) -> Self {
        if address & IRAM_MASK == IRAM_MASK {
            MemoryKind::Iram
        } else if address & MRAM_MASK == MRAM_MASK {
            MemoryKind::Mram
        } else {
            MemoryKind::Wram
        }
    }

    /// Required alignment in bytes for both address and length.
    pub fn alignment(self) -> u32 {
        match self {
            MemoryKind::Iram => IRAM_ALIGN,
            MemoryKind::Wram => WRAM_ALIGN,
            MemoryKind::Mram => 1,
        }
    }

    /// Byte offset of `address` inside its bank, with the selector bit stripped.
    pub fn offset(self, address: u32) -> u32 {
        match self {
            MemoryKind::Iram => address & !IRAM_MASK,
            MemoryKind::Mram => address & !MRAM_MASK,
            MemoryKind::Wram => address,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MemoryKind::Iram => "iram",
            MemoryKind::Wram => "wram",
            MemoryKind::Mram => "mram",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MemoryKind::Iram => "IRAM",
            MemoryKind::Wram => "WRAM",
            MemoryKind::Mram => "MRAM",
        })
    }
}
