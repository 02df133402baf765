use serde::Serialize;
use thiserror::Error;

/// Structured error type for the engine. Serialises as `{"code": ..., "detail": ...}`
/// so hosts can match on error codes.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", content = "detail")]
pub enum FlameError {
    /// The system definition itself is malformed (empty formula list, bad weights,
    /// ill-typed expression, unbound parameter detected at bind time).
    #[error("configuration error: {message}")]
    Configuration { message: String },
    /// A `Parameter` node referenced an index the bound parameter set does not have.
    #[error("missing parameter #{index} (parameter set has {available} entries)")]
    MissingParameter { index: u32, available: usize },
    #[error("I/O error: {message}")]
    Io { message: String },
    #[error("JSON error: {message}")]
    Json { message: String },
}

impl FlameError {
    pub fn configuration(message: impl Into<String>) -> Self {
        FlameError::Configuration {
            message: message.into(),
        }
    }

    /// True for errors that mean the system definition is unusable as-is.
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            FlameError::Configuration { .. } | FlameError::MissingParameter { .. }
        )
    }
}

impl From<std::io::Error> for FlameError {
    fn from(e: std::io::Error) -> Self {
        FlameError::Io {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for FlameError {
    fn from(e: serde_json::Error) -> Self {
        FlameError::Json {
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FlameError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_code_and_detail() {
        let err = FlameError::MissingParameter {
            index: 3,
            available: 2,
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "MissingParameter");
        assert_eq!(json["detail"]["index"], 3);
        assert_eq!(json["detail"]["available"], 2);
    }

    #[test]
    fn display_mentions_index() {
        let err = FlameError::MissingParameter {
            index: 7,
            available: 0,
        };
        assert!(err.to_string().contains("#7"));
        assert!(err.is_definition_error());
    }

    #[test]
    fn io_errors_are_not_definition_errors() {
        let err: FlameError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(!err.is_definition_error());
        assert!(err.to_string().starts_with("I/O error"));
    }
}
