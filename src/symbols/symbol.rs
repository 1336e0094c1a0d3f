// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

use crate::errors::DpuError;
use crate::symbols::MemoryKind;

/// A memory region inside a rank's program image.
///
/// Immutable once built. The size is always non-zero; overlap between symbols
/// is the program loader's business, not this type's.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    address: u32,
    size: u32,
    name: Option<String>,
}

impl Symbol {
    /// Create a symbol carrying the name it was resolved from.
    pub fn named(address: u32, size: u32, name: impl Into<String>) -> Result<Self, DpuError> {
        Self::build(address, size, Some(name.into()))
    }

    /// Create an anonymous symbol. It skips resolution and is trusted as-is.
    pub fn anonymous(address: u32, size: u32) -> Result<Self, DpuError> {
        Self::build(address, size, None)
    }

    fn build(address: u32, size: u32, name: Option<String>) -> Result<Self, DpuError> {
        if size == 0 {
            return Err(DpuError::InvalidSymbol { address });
        }
        Ok(Self { address, size, name })
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn memory_kind(&self) -> MemoryKind {
        MemoryKind::from_address(self.address)
    }

    /// Check that `length` bytes starting `offset` bytes into the symbol stay
    /// inside it and respect the alignment of the memory it lives in.
    pub fn check_access(&self, offset: u32, length: usize) -> Result<(), DpuError> {
        if u64::from(offset) + length as u64 > u64::from(self.size) {
            return Err(DpuError::InvalidSymbolAccess {
                offset,
                length,
                size: self.size,
            });
        }

        let kind = self.memory_kind();
        let alignment = kind.alignment();
        let address = self.address.wrapping_add(offset);
        if address % alignment != 0 || length as u64 % u64::from(alignment) != 0 {
            return Err(DpuError::InvalidMemoryAccess {
                kind,
                address,
                length,
                alignment,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "'{}'@0x{:08x}[{}]", name, self.address, self.size),
            None => write!(f, "<anonymous>@0x{:08x}[{}]", self.address, self.size),
        }
    }
}

/// Either a symbol name still to be resolved, or a ready-made symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolRef {
    Name(String),
    Resolved(Symbol),
}

impl From<&str> for SymbolRef {
    fn from(name: &str) -> Self {
        SymbolRef::Name(name.to_string())
    }
}

impl From<String> for SymbolRef {
    fn from(name: String) -> Self {
        SymbolRef::Name(name)
    }
}

impl From<Symbol> for SymbolRef {
    fn from(symbol: Symbol) -> Self {
        SymbolRef::Resolved(symbol)
    }
}

impl From<&Symbol> for SymbolRef {
    fn from(symbol: &Symbol) -> Self {
        SymbolRef::Resolved(symbol.clone())
    }
}
