use crate::errors::DpuError;

/// Resolves symbol names inside a loaded accelerator program.
///
/// Resolution must be pure: equal names give equal `(address, size)` pairs for
/// the lifetime of the loader, which is what lets [`SymbolResolver`] memoize it.
///
/// [`SymbolResolver`]: crate::symbols::SymbolResolver
pub trait ProgramLoader: Send + Sync {
    /// Look up `name`, failing with [`DpuError::SymbolNotFound`].
    fn resolve(&self, name: &str) -> Result<(u32, u32), DpuError>;
}
