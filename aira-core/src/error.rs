use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiraError {
    #[error("{0}")]
    Validation(String),

    #[error("Provider not supported: {0}")]
    UnsupportedProvider(String),

    #[error("{provider} API error: {detail}")]
    ProviderCall { provider: String, detail: String },

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Internal(String),
}

impl AiraError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True for failures of the backing store, whose detail stays server-side.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Migration(_))
    }
}

pub type Result<T> = std::result::Result<T, AiraError>;
