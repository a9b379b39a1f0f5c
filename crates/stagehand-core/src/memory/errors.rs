use crate::errors::StageError;

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("Failed to read '{path}': {message}")]
    ReadFailed { path: String, message: String },

    #[error("Malformed '{path}': {message}")]
    Malformed { path: String, message: String },
}

impl StageError for MemoryError {
    fn error_code(&self) -> &'static str {
        match self {
            MemoryError::ReadFailed { .. } => "MEMORY_READ_FAILED",
            MemoryError::Malformed { .. } => "MEMORY_MALFORMED",
        }
    }
}
