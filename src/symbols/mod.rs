// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Symbol descriptors and their resolution against a loaded program.
//!
//! A [`Symbol`] names a memory region inside a rank's program image. Named
//! symbols go through a [`SymbolResolver`] before any transfer uses them;
//! anonymous ones are built directly from an address and a size and are used
//! verbatim.

mod memory;
mod program;
mod resolver;
mod symbol;

pub use memory::{MemoryKind, IRAM_MASK, MRAM_MASK};
pub use program::ProgramImage;
pub use resolver::SymbolResolver;
pub use symbol::{Symbol, SymbolRef};
