// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Configuration validation.
//!
//! All checks run and every problem is collected, so a broken config is
//! reported in one pass:
//!
//! 1. **Ranks**: at least one rank
//! 2. **Memory**: configured bank sizes are non-zero
//! 3. **Symbols**: unique names, non-zero sizes, and each symbol accessible
//!    over its full size under the alignment rules of its memory

use std::collections::HashSet;

use crate::config::Config;
use crate::errors::ValidationError;
use crate::symbols::Symbol;

pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.ranks == 0 {
        errors.push(ValidationError::NoRanks);
    }

    let banks = [
        ("iram", config.memory.iram_size),
        ("wram", config.memory.wram_size),
        ("mram", config.memory.mram_size),
    ];
    for (bank, size) in banks {
        if size == Some(0) {
            errors.push(ValidationError::EmptyMemoryBank { bank });
        }
    }

    errors.extend(validate_symbols(config));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_symbols(config: &Config) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for symbol in &config.program.symbols {
        if !seen.insert(symbol.name.as_str()) {
            errors.push(ValidationError::DuplicateSymbol {
                name: symbol.name.clone(),
            });
            continue;
        }

        let checked = Symbol::named(symbol.address, symbol.size, symbol.name.as_str())
            .and_then(|resolved| resolved.check_access(0, symbol.size as usize));
        match checked {
            Ok(()) => {}
            Err(crate::errors::DpuError::InvalidSymbol { .. }) => errors.push(ValidationError::EmptySymbol {
                name: symbol.name.clone(),
            }),
            Err(e) => errors.push(ValidationError::InvalidSymbolAccess {
                name: symbol.name.clone(),
                reason: e.to_string(),
            }),
        }
    }

    errors
}
