// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

use crate::errors::DpuError;
use crate::traits::ProgramLoader;

/// Symbol table of a loaded program, kept in memory.
#[derive(Debug, Clone, Default)]
pub struct ProgramImage {
    symbols: HashMap<String, (u32, u32)>,
}

impl ProgramImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an image from `(name, address, size)` triples, rejecting repeated names.
    pub fn from_symbols<I, S>(symbols: I) -> Result<Self, DpuError>
    where
        I: IntoIterator<Item = (S, u32, u32)>,
        S: Into<String>,
    {
        symbols
            .into_iter()
            .try_fold(Self::new(), |image, (name, address, size)| {
                image.with_symbol(name, address, size)
            })
    }

    pub fn with_symbol(mut self, name: impl Into<String>, address: u32, size: u32) -> Result<Self, DpuError> {
        let name = name.into();
        if size == 0 {
            return Err(DpuError::InvalidSymbol { address });
        }
        if self.symbols.contains_key(&name) {
            return Err(DpuError::DuplicateSymbol { name });
        }
        self.symbols.insert(name, (address, size));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }
}

impl ProgramLoader for ProgramImage {
    fn resolve(&self, name: &str) -> Result<(u32, u32), DpuError> {
        self.symbols
            .get(name)
            .copied()
            .ok_or_else(|| DpuError::SymbolNotFound {
                name: name.to_string(),
            })
    }
}
