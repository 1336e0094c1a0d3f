// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use thiserror::Error;

use crate::errors::DpuError;

/// Errors that can occur while validating a runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The configuration asks for a device set with no ranks
    NoRanks,
    /// Two program symbols share the same name
    DuplicateSymbol {
        /// The duplicated symbol name
        name: String,
    },
    /// A program symbol has a zero size
    EmptySymbol {
        /// The offending symbol name
        name: String,
    },
    /// A program symbol cannot be accessed over its full size
    InvalidSymbolAccess {
        /// The offending symbol name
        name: String,
        /// Why the access is rejected
        reason: String,
    },
    /// A loopback memory bank was configured with a zero size
    EmptyMemoryBank {
        /// The bank name (iram, wram, mram)
        bank: &'static str,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::NoRanks => write!(f, "'ranks' must be at least 1"),
            ValidationError::DuplicateSymbol { name } => {
                write!(f, "Duplicate program symbol: '{}'", name)
            }
            ValidationError::EmptySymbol { name } => {
                write!(f, "Program symbol '{}' has a zero size", name)
            }
            ValidationError::InvalidSymbolAccess { name, reason } => {
                write!(f, "Program symbol '{}' is not accessible: {}", name, reason)
            }
            ValidationError::EmptyMemoryBank { bank } => {
                write!(f, "Memory bank '{}' must have a non-zero size", bank)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised while loading a configuration or building a runtime from it.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unsupported config format '{0}' (expected .yaml, .yml or .toml)")]
    UnsupportedFormat(String),

    #[error("Configuration validation failed:\n{}", join_lines(.0))]
    Invalid(Vec<ValidationError>),

    #[error(transparent)]
    Device(#[from] DpuError),
}

fn join_lines(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
