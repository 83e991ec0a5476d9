use thiserror::Error;

#[derive(Error, Debug)]
pub enum WherewithError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Usage error in {combinator}(): {message}")]
    Usage { combinator: &'static str, message: String },
    #[error("Unsupported expression: {0}")]
    Unsupported(String),
    #[error("Translation error: {0}")]
    Translation(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl WherewithError {
    pub fn usage(combinator: &'static str, message: impl Into<String>) -> Self {
        Self::Usage { combinator, message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, WherewithError>;

// Helper conversions
impl From<rusqlite::Error> for WherewithError {
    fn from(e: rusqlite::Error) -> Self { Self::Persistence(e.to_string()) }
}
impl From<config::ConfigError> for WherewithError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
