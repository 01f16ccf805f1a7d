//! Translation pipeline error types.
//!
//! Two classes, kept deliberately apart: [`ConfigError`] is raised once, at
//! action construction / profile load time, and is fatal to that rule only
//! (the load boundary coerces it into a blind stopper). [`ActionError`] is
//! the only error an action invocation may surface; the executor treats it
//! as "this rule contributed nothing" and continues.

use thiserror::Error;

use crate::action::Direction;
use trellis_expr::{CompileError, EvalError};

/// Configuration errors, raised at action construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configured action kind is not registered.
    #[error("unknown action type '{0}'")]
    UnknownActionType(String),

    /// The parameter array does not match the action's schema.
    #[error("action '{kind}' takes {expected} parameters, got {actual}")]
    WrongParameterCount {
        /// Action kind.
        kind: String,
        /// Expected count, rendered as `2` or `1..=2`.
        expected: String,
        /// Actual count.
        actual: usize,
    },

    /// A referenced attribute type does not exist.
    #[error("unknown attribute type '{0}'")]
    UnknownAttributeType(String),

    /// A referenced identity type does not exist.
    #[error("unknown identity type '{0}'")]
    UnknownIdentityType(String),

    /// An enum parameter holds a token outside its closed set.
    #[error("invalid value '{token}' for parameter '{parameter}'")]
    InvalidEnumToken {
        /// Parameter name.
        parameter: String,
        /// The offending token.
        token: String,
    },

    /// An expression parameter failed to compile.
    #[error("parameter '{parameter}' failed to compile: {source}")]
    Expression {
        /// Parameter name (or `condition` for a rule condition).
        parameter: String,
        /// The compile failure.
        #[source]
        source: CompileError,
    },

    /// A multi-map mapping line does not have exactly three tokens.
    #[error("mapping line {line_no} is malformed: '{line}'")]
    MalformedMappingLine {
        /// 1-based line number within the mapping text.
        line_no: usize,
        /// The offending line.
        line: String,
    },

    /// A days parameter is not a non-negative integer.
    #[error("invalid day count '{0}'")]
    InvalidDays(String),

    /// A persistent creation targets an instance-immutable attribute type.
    #[error("attribute type '{0}' is instance-immutable and cannot be created by translation")]
    ImmutableAttributeType(String),

    /// A persisted creation targets a dynamic identity type.
    #[error("identity type '{0}' is dynamic and cannot be persisted")]
    DynamicIdentityType(String),

    /// A regular-expression parameter failed to compile.
    #[error("parameter '{parameter}' is not a valid pattern: {source}")]
    InvalidPattern {
        /// Parameter name.
        parameter: String,
        /// The regex compile failure.
        #[source]
        source: regex::Error,
    },

    /// An action of one direction was bound into a profile of the other.
    #[error("action '{kind}' is an {actual} action and cannot join an {expected} profile")]
    DirectionMismatch {
        /// Action kind.
        kind: String,
        /// The action's direction.
        actual: Direction,
        /// The profile's direction.
        expected: Direction,
    },
}

impl ConfigError {
    /// Checks whether this error names a missing external type reference.
    #[must_use]
    pub const fn is_unknown_reference(&self) -> bool {
        matches!(
            self,
            Self::UnknownAttributeType(_) | Self::UnknownIdentityType(_)
        )
    }
}

/// The designated runtime failure of a single action invocation.
///
/// Per-item conversion problems are handled inside the action (the item is
/// skipped with a debug diagnostic); only an expression that fails to
/// evaluate surfaces here, and the executor degrades the rule to a no-op.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    /// An action expression failed to evaluate.
    #[error("expression '{expression}' failed to evaluate: {source}")]
    Evaluation {
        /// The expression source text.
        expression: String,
        /// The evaluation failure.
        #[source]
        source: EvalError,
    },
}

impl ActionError {
    /// Creates an evaluation error for the given expression source.
    #[must_use]
    pub fn evaluation(expression: impl Into<String>, source: EvalError) -> Self {
        Self::Evaluation {
            expression: expression.into(),
            source,
        }
    }
}

/// Errors raised by the pipeline executors themselves.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecuteError {
    /// A profile was handed to the executor of the other direction.
    #[error("profile '{profile}' has direction {actual}, expected {expected}")]
    DirectionMismatch {
        /// Profile name.
        profile: String,
        /// The profile's direction.
        actual: Direction,
        /// The executor's direction.
        expected: Direction,
    },
}
