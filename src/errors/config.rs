use std::env::VarError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable was present but unreadable (not valid unicode).
    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] VarError),

    /// A variable or default could not be parsed into its typed value.
    #[error("Parse error: {0}")]
    ParseError(String),
}
