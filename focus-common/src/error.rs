//! Common error types for the focus workspace

use thiserror::Error;

/// Common result type for focus-common operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the focus crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML file could not be parsed
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML file could not be written
    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
