use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZenithError {
    #[error("{0}")]
    ValidationError(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u32 },
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },
    #[error("not logged in: run `zenith login` first")]
    Unauthenticated,
    #[error("{0}")]
    Unsupported(String),
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    ConfigError(#[from] Box<figment::Error>),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl ZenithError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for ZenithError {
    fn from(err: rocksdb::Error) -> Self {
        Self::InternalError(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ZenithError>;
