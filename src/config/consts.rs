// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Default IRAM bank size in bytes (4096 instructions of 48 bits)
pub const DEFAULT_IRAM_SIZE: usize = 24 * 1024;
/// Default WRAM bank size in bytes
pub const DEFAULT_WRAM_SIZE: usize = 64 * 1024;
/// Default MRAM bank size in bytes
pub const DEFAULT_MRAM_SIZE: usize = 64 * 1024 * 1024;
/// Rank count used when a config omits `ranks`
pub const DEFAULT_RANKS: usize = 1;
/// Tracing filter used when neither the config nor RUST_LOG set one
pub const DEFAULT_LOG_FILTER: &str = "info";
