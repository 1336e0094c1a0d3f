// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::backends::MemoryLayout;
use crate::config::consts::{DEFAULT_LOG_FILTER, DEFAULT_RANKS};
use crate::errors::{ConfigError, DpuError};
use crate::observability::messages::runtime::ConfigLoaded;
use crate::observability::messages::StructuredLog;
use crate::symbols::ProgramImage;

/// Main configuration structure for a device set runtime.
///
/// # Fields
/// * `ranks` - Number of ranks to attach (defaults to 1)
/// * `backend` - Transport driver to build (defaults to loopback)
/// * `log_launches` - Whether `exec()` forwards rank output to the tracing log
/// * `memory` - Loopback bank sizes (optional)
/// * `program` - Symbol table of the loaded program
/// * `logging` - Tracing filter used by the binary (optional)
///
/// # Example
/// ```yaml
/// ranks: 4
/// backend: loopback
/// log_launches: true
/// memory:
///   mram_size: 1048576
/// program:
///   symbols:
///     - name: input
///       address: 134217728   # 0x08000000, MRAM
///       size: 4096
/// logging:
///   filter: debug
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default = "default_ranks")]
    pub ranks: usize,
    #[serde(default)]
    pub backend: BackendType,
    #[serde(default)]
    pub log_launches: bool,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub program: ProgramConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_ranks() -> usize {
    DEFAULT_RANKS
}

/// Transport driver implementation selected by configuration.
///
/// # Variants
/// * `Loopback` - In-memory banks per rank; gathers read back what was written
/// * `Stub` - Accepts every call, moves no data
#[derive(Debug, Default, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum BackendType {
    #[default]
    Loopback,
    Stub,
}

impl BackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::Loopback => "loopback",
            BackendType::Stub => "stub",
        }
    }
}

/// Loopback bank sizes in bytes. Unset sizes use the built-in defaults.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct MemoryConfig {
    pub iram_size: Option<usize>,
    pub wram_size: Option<usize>,
    pub mram_size: Option<usize>,
}

impl MemoryConfig {
    pub fn layout(&self) -> MemoryLayout {
        let defaults = MemoryLayout::default();
        MemoryLayout {
            iram_size: self.iram_size.unwrap_or(defaults.iram_size),
            wram_size: self.wram_size.unwrap_or(defaults.wram_size),
            mram_size: self.mram_size.unwrap_or(defaults.mram_size),
        }
    }
}

/// Symbol table of the program loaded on every rank.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct ProgramConfig {
    #[serde(default)]
    pub symbols: Vec<SymbolConfig>,
}

impl ProgramConfig {
    pub fn image(&self) -> Result<ProgramImage, DpuError> {
        ProgramImage::from_symbols(
            self.symbols
                .iter()
                .map(|symbol| (symbol.name.clone(), symbol.address, symbol.size)),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SymbolConfig {
    pub name: String,
    pub address: u32,
    pub size: u32,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    pub filter: Option<String>,
}

impl LoggingConfig {
    pub fn filter(&self) -> &str {
        self.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

/// Serialization format of a config file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Parse config text in the given format.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
    Ok(match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        ConfigFormat::Toml => toml::from_str(content)?,
    })
}

/// Load a config from a YAML or TOML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let content = fs::read_to_string(path)?;
    parse_config(&content, format)
}

/// Load a config and validate it, reporting every problem found at once.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let cfg = load_config(path)?;
    crate::config::validate_config(&cfg).map_err(ConfigError::Invalid)?;

    ConfigLoaded {
        path: &path.display().to_string(),
        ranks: cfg.ranks,
        backend: cfg.backend.as_str(),
        symbol_count: cfg.program.symbols.len(),
    }
    .log();
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic_yaml_config() {
        let yaml = r#"
ranks: 4
backend: stub
program:
  symbols:
    - name: input
      address: 134217728
      size: 256
"#;

        let cfg = parse_config(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(cfg.ranks, 4);
        assert_eq!(cfg.backend, BackendType::Stub);
        assert!(!cfg.log_launches);
        assert_eq!(cfg.program.symbols[0].address, 0x0800_0000);
        assert_eq!(cfg.logging.filter(), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn parse_toml_with_hex_addresses() {
        let toml = r#"
ranks = 2
log_launches = true

[memory]
mram_size = 4096

[[program.symbols]]
name = "input"
address = 0x08000000
size = 64
"#;

        let cfg = parse_config(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(cfg.backend, BackendType::Loopback);
        assert_eq!(cfg.memory.layout().mram_size, 4096);
        assert_eq!(cfg.memory.layout().wram_size, MemoryLayout::default().wram_size);
        assert_eq!(cfg.program.image().unwrap().len(), 1);
    }

    #[test]
    fn defaults_apply_to_an_empty_document() {
        let cfg = parse_config("{}", ConfigFormat::Yaml).unwrap();
        assert_eq!(cfg.ranks, DEFAULT_RANKS);
        assert!(cfg.program.symbols.is_empty());
    }

    #[test]
    fn unknown_backend_is_a_parse_error() {
        let result = parse_config("backend: fpga", ConfigFormat::Yaml);
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn format_follows_the_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.TOML")).unwrap(), ConfigFormat::Toml);
        assert!(matches!(
            ConfigFormat::from_path(Path::new("a.json")),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
