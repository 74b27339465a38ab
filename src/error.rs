use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Registry error kinds, one per failure class in the error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Invalid version selector: {0}")]
    InvalidVersion(String),

    #[error("Subject not found: {0}")]
    SubjectNotFound(String),

    #[error("Schema not found: {0}")]
    SchemaNotFound(String),

    #[error("Version not found: {0}")]
    VersionNotFound(String),

    #[error("Incompatible schema: {0}")]
    IncompatibleSchema(String),

    #[error("Not primary: {0}")]
    NotPrimary(String),

    #[error("Log unavailable: {0}")]
    LogUnavailable(String),

    #[error("Fatal error, halting: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

impl RegistryError {
    /// Machine-readable error code surfaced to callers per the propagation policy.
    pub fn error_code(&self) -> &'static str {
        match self {
            RegistryError::InvalidSchema(_) => "INVALID_SCHEMA",
            RegistryError::InvalidVersion(_) => "INVALID_VERSION",
            RegistryError::SubjectNotFound(_) => "SUBJECT_NOT_FOUND",
            RegistryError::SchemaNotFound(_) => "SCHEMA_NOT_FOUND",
            RegistryError::VersionNotFound(_) => "VERSION_NOT_FOUND",
            RegistryError::IncompatibleSchema(_) => "INCOMPATIBLE_SCHEMA",
            RegistryError::NotPrimary(_) => "NOT_PRIMARY",
            RegistryError::LogUnavailable(_) => "LOG_UNAVAILABLE",
            RegistryError::Fatal(_) => "FATAL",
        }
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, RegistryError::NotPrimary(_) | RegistryError::LogUnavailable(_))
    }
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = match &self {
            RegistryError::SubjectNotFound(_)
            | RegistryError::SchemaNotFound(_)
            | RegistryError::VersionNotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::InvalidVersion(_) | RegistryError::InvalidSchema(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            RegistryError::IncompatibleSchema(_) => StatusCode::CONFLICT,
            RegistryError::NotPrimary(_) | RegistryError::LogUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            RegistryError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error_code": self.error_code(),
            "message": self.to_string(),
            "retriable": self.is_retriable(),
        });

        (status, axum::Json(body)).into_response()
    }
}
