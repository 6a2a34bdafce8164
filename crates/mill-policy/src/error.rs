//! Error types for policy loading

use mill_expr::ParseError;
use thiserror::Error;

/// A policy document that cannot be represented by the model
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelValidationError {
    #[error("Action table must not be empty")]
    EmptyTable,

    #[error("Wildcard may only be the last table segment: {0}")]
    MisplacedWildcard(String),

    #[error("Row filter on {0} needs an expression or rawExpression")]
    MissingExpression(String),

    #[error("Row filter on {0} has both a plain-string expression and rawExpression")]
    ConflictingExpression(String),

    #[error("Column access on {0} needs columns")]
    MissingColumns(String),

    #[error("Column access on {0} needs columns-mode")]
    MissingColumnsMode(String),

    #[error("Policy name must not be blank")]
    EmptyPolicyName,

    #[error("Duplicate policy name: {0}")]
    DuplicatePolicy(String),

    #[error("Invalid action #{index} in policy '{policy}': {source}")]
    InvalidAction {
        policy: String,
        index: usize,
        source: Box<ModelValidationError>,
    },
}

/// Stream or syntax failure while reading or writing a policy document
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error("Invalid expression in action #{index} of policy '{policy}': {source}")]
    InvalidExpression {
        policy: String,
        index: usize,
        source: ParseError,
    },

    #[error(transparent)]
    Model(#[from] ModelValidationError),
}

impl From<std::io::Error> for PolicyError {
    fn from(e: std::io::Error) -> Self {
        PolicyError::Serialization(e.into())
    }
}

impl From<serde_json::Error> for PolicyError {
    fn from(e: serde_json::Error) -> Self {
        PolicyError::Serialization(e.into())
    }
}

impl From<serde_yaml::Error> for PolicyError {
    fn from(e: serde_yaml::Error) -> Self {
        PolicyError::Serialization(e.into())
    }
}
