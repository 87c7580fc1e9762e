//! Error types for the graph RAG backend

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Graph database error: {0}")]
    GraphError(String),

    #[error("Model provider error: {0}")]
    ProviderError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Document error: {0}")]
    DocumentError(String),

    #[error("Retries exhausted for {operation} after {attempts} attempts: {last_error}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    #[error("HTTP error: {0}")]
    HttpError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Short machine-readable kind used in the HTTP error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ConnectionError(_) => "connection",
            Error::GraphError(_) => "graph",
            Error::ProviderError(_) => "provider",
            Error::SerializationError(_) => "serialization",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::IoError(_) => "io",
            Error::DocumentError(_) => "document",
            Error::RetryExhausted { .. } => "retry_exhausted",
            Error::HttpError(_) => "http",
        }
    }

    /// HTTP status code a request-time failure maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidArgument(_) | Error::SerializationError(_) => 400,
            Error::ConnectionError(_) | Error::RetryExhausted { .. } => 503,
            _ => 500,
        }
    }

    /// Uniform error envelope body.
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::new(self.kind(), self.to_string())
    }
}

/// `{"error": {"kind": ..., "message": ...}}`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                kind: kind.into(),
                message: message.into(),
            },
        }
    }
}

impl From<neo4rs::Error> for Error {
    fn from(err: neo4rs::Error) -> Self {
        Error::GraphError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::ProviderError(err.to_string())
    }
}

impl From<async_openai::error::OpenAIError> for Error {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        Error::ProviderError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_connection_error() {
        let err = Error::ConnectionError("refused".to_string());
        let msg = err.to_string();
        assert!(msg.contains("Connection error"));
        assert!(msg.contains("refused"));
    }

    #[test]
    fn test_error_display_provider_error() {
        let err = Error::ProviderError("rate limit exceeded".to_string());
        assert!(err.to_string().contains("Model provider error"));
        assert!(err.to_string().contains("rate limit"));
    }

    #[test]
    fn test_error_display_retry_exhausted() {
        let err = Error::RetryExhausted {
            operation: "neo4j connect".to_string(),
            attempts: 3,
            last_error: "refused".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("neo4j connect"));
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("refused"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::IoError(_)));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();

        assert!(matches!(err, Error::SerializationError(_)));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_status_codes_by_kind() {
        assert_eq!(Error::InvalidArgument("x".into()).status_code(), 400);
        assert_eq!(Error::ProviderError("x".into()).status_code(), 500);
        assert_eq!(Error::GraphError("x".into()).status_code(), 500);
        assert_eq!(Error::ConnectionError("x".into()).status_code(), 503);
    }

    #[test]
    fn test_envelope_serializes_kind_and_message() {
        let err = Error::GraphError("index missing".to_string());
        let json = serde_json::to_value(err.envelope()).unwrap();

        assert_eq!(json["error"]["kind"], "graph");
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("index missing"));
    }

    #[test]
    fn test_error_all_variants_have_kind() {
        let variants: Vec<Error> = vec![
            Error::ConnectionError("conn".to_string()),
            Error::GraphError("graph".to_string()),
            Error::ProviderError("provider".to_string()),
            Error::SerializationError("serial".to_string()),
            Error::InvalidArgument("arg".to_string()),
            Error::DocumentError("doc".to_string()),
            Error::HttpError("http".to_string()),
        ];

        for err in variants {
            assert!(!err.kind().is_empty());
            assert!(!format!("{:?}", err).is_empty());
        }
    }
}
