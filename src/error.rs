use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcilerError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid group name: {0}")]
    InvalidGroupName(String),

    #[error("No items selected for group '{0}'")]
    EmptySelection(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReconcilerError>;
