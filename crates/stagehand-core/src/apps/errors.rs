use crate::errors::StageError;
use crate::process::ProcessError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to read appdef '{path}': {message}")]
    DefinitionRead { path: String, message: String },

    #[error("Failed to parse appdef '{path}': {message}")]
    DefinitionParse { path: String, message: String },

    #[error("Appdef '{path}' is missing required field '{field}'")]
    MissingField { path: String, field: &'static str },

    #[error("Executable '{exec}' for '{name}' not found or not executable")]
    ExecutableNotFound { name: String, exec: String },

    #[error("Application '{name}' is already registered")]
    Duplicate { name: String },

    #[error("Application '{name}' not found")]
    NotFound { name: String },

    #[error("Application '{name}' is shutting down")]
    Stopping { name: String },

    #[error("No instance with pid {pid}")]
    InstanceNotFound { pid: u32 },

    #[error("Failed to read apps folder '{path}': {message}")]
    FolderRead { path: String, message: String },

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),
}

impl StageError for AppError {
    fn error_code(&self) -> &'static str {
        match self {
            AppError::DefinitionRead { .. } => "APP_DEFINITION_READ",
            AppError::DefinitionParse { .. } => "APP_DEFINITION_PARSE",
            AppError::MissingField { .. } => "APP_MISSING_FIELD",
            AppError::ExecutableNotFound { .. } => "APP_EXECUTABLE_NOT_FOUND",
            AppError::Duplicate { .. } => "APP_DUPLICATE",
            AppError::NotFound { .. } => "APP_NOT_FOUND",
            AppError::Stopping { .. } => "APP_STOPPING",
            AppError::InstanceNotFound { .. } => "APP_INSTANCE_NOT_FOUND",
            AppError::FolderRead { .. } => "APP_FOLDER_READ",
            AppError::Process(e) => e.error_code(),
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(
            self,
            AppError::DefinitionParse { .. }
                | AppError::MissingField { .. }
                | AppError::ExecutableNotFound { .. }
                | AppError::NotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let error = AppError::NotFound {
            name: "Browser".to_string(),
        };
        assert_eq!(error.to_string(), "Application 'Browser' not found");
        assert_eq!(error.error_code(), "APP_NOT_FOUND");
        assert!(error.is_user_error());
    }

    #[test]
    fn test_process_error_code_passes_through() {
        let error: AppError = ProcessError::SpawnFailed {
            path: "/bin/x".to_string(),
            message: "denied".to_string(),
        }
        .into();
        assert_eq!(error.error_code(), "PROCESS_SPAWN_FAILED");
    }
}
