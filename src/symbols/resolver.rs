// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::DpuError;
use crate::observability::messages::runtime::SymbolResolved;
use crate::observability::messages::StructuredLog;
use crate::symbols::{Symbol, SymbolRef};
use crate::traits::ProgramLoader;

/// Turns [`SymbolRef`]s into validated [`Symbol`]s, memoizing lookups by name.
pub struct SymbolResolver {
    loader: Arc<dyn ProgramLoader>,
    cache: Mutex<HashMap<String, Symbol>>,
}

impl SymbolResolver {
    pub fn new(loader: Arc<dyn ProgramLoader>) -> Self {
        Self {
            loader,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a reference. Anonymous and pre-built symbols are returned untouched.
    pub fn resolve(&self, symbol: &SymbolRef) -> Result<Symbol, DpuError> {
        match symbol {
            SymbolRef::Resolved(symbol) => Ok(symbol.clone()),
            SymbolRef::Name(name) => self.resolve_name(name),
        }
    }

    pub fn resolve_name(&self, name: &str) -> Result<Symbol, DpuError> {
        if let Some(symbol) = self.cache.lock().get(name) {
            return Ok(symbol.clone());
        }

        let (address, size) = self.loader.resolve(name)?;
        let symbol = Symbol::named(address, size, name)?;
        SymbolResolved {
            name,
            address,
            size,
        }
        .log();

        self.cache.lock().insert(name.to_string(), symbol.clone());
        Ok(symbol)
    }

    pub fn cached(&self) -> usize {
        self.cache.lock().len()
    }
}

impl std::fmt::Debug for SymbolResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolResolver")
            .field("cached", &self.cached())
            .finish()
    }
}
