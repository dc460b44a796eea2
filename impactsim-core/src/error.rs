//! Engine error kinds (§7) and their JSON-facing shape.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Bad input: {details}")]
    BadInput { details: String },

    #[error("Unknown scenario: {scenario}")]
    UnknownScenario { scenario: String },

    #[error("Missing required anchor of type {required_anchor_type}")]
    MissingAnchor { required_anchor_type: String },

    #[error("Not found: {details}")]
    NotFound { details: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// The `error` field of the `{error, details?, required_anchor?}`
    /// response shape (§7).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadInput { .. } => "BAD_INPUT",
            Self::UnknownScenario { .. } => "UNKNOWN_SCENARIO",
            Self::MissingAnchor { .. } => "MISSING_ANCHOR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Database(_) | Self::Serialization(_) | Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn details(&self) -> String {
        self.to_string()
    }

    /// Present only for `MISSING_ANCHOR` responses.
    pub fn required_anchor(&self) -> Option<&str> {
        match self {
            Self::MissingAnchor { required_anchor_type } => Some(required_anchor_type),
            _ => None,
        }
    }

    pub fn not_found(details: impl Into<String>) -> Self {
        Self::NotFound { details: details.into() }
    }

    pub fn bad_input(details: impl Into<String>) -> Self {
        Self::BadInput { details: details.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_anchor_carries_required_anchor_type() {
        let err = EngineError::MissingAnchor { required_anchor_type: "EPICENTER".into() };
        assert_eq!(err.kind(), "MISSING_ANCHOR");
        assert_eq!(err.required_anchor(), Some("EPICENTER"));
    }

    #[test]
    fn not_found_has_no_required_anchor() {
        let err = EngineError::not_found("instance xyz");
        assert_eq!(err.kind(), "NOT_FOUND");
        assert_eq!(err.required_anchor(), None);
    }
}
