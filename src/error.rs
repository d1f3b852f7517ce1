use thiserror::Error;

/// Main error type for termgraph
#[derive(Error, Debug)]
pub enum TermgraphError {
    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote terminology service unreachable or persistently failing
    #[error("Remote service error: {0}")]
    Remote(String),

    /// Checkpoint missing, unreadable, or corrupt
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Seed spreadsheet parse errors
    #[error("Seed parse error: {0}")]
    Seed(String),

    /// Output rendering errors
    #[error("Render error: {0}")]
    Render(String),
}

/// Convenient Result type using TermgraphError
pub type Result<T> = std::result::Result<T, TermgraphError>;
