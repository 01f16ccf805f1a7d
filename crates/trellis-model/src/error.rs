//! Model error types.

use thiserror::Error;

/// Errors raised by value and identity conversions.
///
/// These are per-item runtime errors: a value that fails conversion is
/// skipped by the action handling it, never escalated to the pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    /// A value does not conform to an attribute type's declared syntax.
    #[error("value '{value}' does not conform to {syntax} syntax")]
    ValueSyntax {
        /// The offending raw value.
        value: String,
        /// The syntax it was checked against.
        syntax: String,
    },

    /// A raw string could not be converted into an identity value.
    #[error("invalid {type_name} identity value: {reason}")]
    InvalidIdentityValue {
        /// Identity type name.
        type_name: String,
        /// Why the conversion failed.
        reason: String,
    },
}

impl ModelError {
    /// Creates a value-syntax conversion error.
    #[must_use]
    pub fn value_syntax(value: impl Into<String>, syntax: impl Into<String>) -> Self {
        Self::ValueSyntax {
            value: value.into(),
            syntax: syntax.into(),
        }
    }

    /// Creates an identity conversion error.
    #[must_use]
    pub fn invalid_identity(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentityValue {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}
