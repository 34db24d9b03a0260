
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommentqlError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Parse error: {message}")]
    Parse { message: String, clause: Option<String> },
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, CommentqlError>;

// Helper conversions
impl From<config::ConfigError> for CommentqlError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
