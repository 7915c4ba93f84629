//! Error types for library loading and symbol resolution

/// Error type for symbol resolution operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The shared library could not be opened
    #[error("Library not found: {library} ({reason})")]
    LibraryNotFound { library: String, reason: String },

    /// The library is loaded but does not export the symbol
    #[error("Symbol missing: {symbol} in {library}")]
    SymbolMissing { library: String, symbol: String },

    /// Library or symbol name contains an interior NUL byte
    #[error("Invalid name: {0}")]
    InvalidName(String),
}
