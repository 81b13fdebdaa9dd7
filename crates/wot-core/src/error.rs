use thiserror::Error;

/// Top-level error type shared by the wot crates.
#[derive(Error, Debug)]
pub enum WotError {
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for WotError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
