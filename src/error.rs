use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Backend error: {0}")]
    BackendError(#[from] BackendError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Message suitable for a user-facing notification.
    pub fn user_message(&self) -> String {
        match self {
            AppError::BackendError(e) => e.message.clone(),
            AppError::AuthError(AuthError::Rejected(msg)) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::InternalError(format!("Invalid backend response: {}", err))
        } else {
            AppError::ConnectionError(err.to_string())
        }
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::ConfigError(format!("Invalid URL: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::ConfigError(format!("Invalid API key: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email not confirmed")]
    EmailNotConfirmed,

    #[error("No active session")]
    NoSession,

    #[error("Session expired")]
    SessionExpired,

    #[error("Service role key required")]
    MissingServiceRole,

    #[error("Email {0} is already registered")]
    AlreadyRegistered(String),

    #[error("{0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,
}

/// Non-success reply from the hosted backend.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{status}: {message}")]
pub struct BackendError {
    pub status: u16,
    pub message: String,
    pub code: Option<String>,
}

// The identity provider and the REST layer disagree on where the message lives.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    code: Option<serde_json::Value>,
    error_code: Option<String>,
}

impl BackendError {
    pub fn from_response_body(status: StatusCode, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed
            .msg
            .or(parsed.message)
            .or(parsed.error_description)
            .or(parsed.error)
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_string()
                } else {
                    body.trim().to_string()
                }
            });
        let code = parsed.error_code.or_else(|| {
            parsed.code.map(|c| match c {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
        });

        Self {
            status: status.as_u16(),
            message,
            code,
        }
    }

    /// Postgres unique violation as reported through the REST layer.
    pub fn is_unique_violation(&self) -> bool {
        self.status == StatusCode::CONFLICT.as_u16() || self.code.as_deref() == Some("23505")
    }
}

impl From<BackendError> for DatabaseError {
    fn from(err: BackendError) -> Self {
        if err.is_unique_violation() {
            DatabaseError::Duplicate
        } else {
            DatabaseError::QueryError(err.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::InternalError(_)));

        let config_err = config::ConfigError::NotFound(String::from("key not found"));
        let app_err: AppError = config_err.into();
        assert!(matches!(app_err, AppError::ConfigError(_)));

        let url_err = url::Url::parse("not a url").unwrap_err();
        let app_err: AppError = url_err.into();
        assert!(matches!(app_err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_backend_error_message_sources() {
        let err = BackendError::from_response_body(
            StatusCode::BAD_REQUEST,
            r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#,
        );
        assert_eq!(err.status, 400);
        assert_eq!(err.message, "Invalid login credentials");
        assert_eq!(err.code.as_deref(), Some("invalid_credentials"));

        let err = BackendError::from_response_body(
            StatusCode::CONFLICT,
            r#"{"code":"23505","message":"duplicate key value violates unique constraint","details":null,"hint":null}"#,
        );
        assert!(err.is_unique_violation());
        assert_eq!(err.message, "duplicate key value violates unique constraint");

        let err = BackendError::from_response_body(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Email not confirmed"}"#,
        );
        assert_eq!(err.message, "Email not confirmed");
    }

    #[test]
    fn test_backend_error_without_json_body() {
        let err = BackendError::from_response_body(StatusCode::BAD_GATEWAY, "");
        assert_eq!(err.message, "Bad Gateway");

        let err = BackendError::from_response_body(StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded");
        assert_eq!(err.message, "upstream exploded");
        assert!(!err.is_unique_violation());
    }

    #[test]
    fn test_duplicate_maps_to_database_error() {
        let err = BackendError::from_response_body(StatusCode::CONFLICT, r#"{"code":"23505","message":"dup"}"#);
        assert!(matches!(DatabaseError::from(err), DatabaseError::Duplicate));
    }

    #[test]
    fn test_error_display() {
        let err = AppError::ValidationError("test error".to_string());
        assert_eq!(err.to_string(), "Validation error: test error");

        let err = AppError::AuthError(AuthError::InvalidCredentials);
        assert_eq!(err.to_string(), "Authentication error: Invalid credentials");

        let err = AppError::DatabaseError(DatabaseError::NotFound);
        assert_eq!(err.to_string(), "Database error: Record not found");
    }

    #[test]
    fn test_user_message_prefers_backend_text() {
        let err = AppError::BackendError(BackendError {
            status: 422,
            message: "Password should be at least 6 characters".into(),
            code: None,
        });
        assert_eq!(err.user_message(), "Password should be at least 6 characters");
    }
}
