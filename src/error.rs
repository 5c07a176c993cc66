//! Error types for the rarefind application layer.

/// Top-level error type for configuration loading and CLI setup.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration file or value error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised by the search library.
    #[error(transparent)]
    Search(#[from] rare_search::SearchError),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AppError>;
