//! The action catalog.
//!
//! An action is constructed exactly once, from its persisted kind name and
//! ordered string parameters, against the registry schema and the external
//! type resolvers. Construction is the single validation point: everything
//! that can be checked up front (arity, type references, expression and
//! pattern compilation, enum tokens) is checked here and surfaces as a
//! [`ConfigError`]. A constructed action is immutable and safe to invoke
//! concurrently.

mod input;
mod output;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diagnostics::RunDiagnostics;
use crate::error::ConfigError;
use crate::registry::ActionTypeRegistry;
use trellis_expr::CompiledExpr;
use trellis_model::{AttributeTypeResolver, IdentityTypeResolver};

pub use input::{AttributeMapping, InputAction};
pub use output::OutputAction;

/// Which pipeline an action or profile belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// Remote assertion to proposed local changes.
    Input,
    /// Local entity to released data.
    Output,
}

impl Direction {
    /// Returns the configuration token for this direction.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "INPUT",
            Self::Output => "OUTPUT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The external type resolvers action construction reads from.
///
/// Borrowed for the duration of a profile load; the pipeline never stores
/// or mutates type definitions.
#[derive(Clone, Copy)]
pub struct TypeResolvers<'a> {
    /// Attribute type lookup.
    pub attribute_types: &'a dyn AttributeTypeResolver,
    /// Identity type lookup.
    pub identity_types: &'a dyn IdentityTypeResolver,
}

/// The no-op stand-in for an action that failed to construct.
///
/// Holds the original kind name and the construction error text; invoking
/// it pushes exactly one warning diagnostic and contributes nothing, so a
/// single misconfigured rule never takes its profile down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlindStopper {
    /// Kind name of the action that failed to construct.
    pub kind: String,
    /// Text of the construction error.
    pub error: String,
}

impl BlindStopper {
    /// Creates a stopper for a failed construction.
    #[must_use]
    pub fn new(kind: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            error: error.into(),
        }
    }

    /// Records the single warning a tripped stopper emits.
    pub(crate) fn trip(&self, diag: &mut RunDiagnostics) {
        diag.warn(format!(
            "action '{}' is misconfigured and was skipped: {}",
            self.kind, self.error
        ));
    }
}

/// A constructed action of either direction.
#[derive(Debug, Clone)]
pub enum Action {
    /// An action of the INPUT pipeline.
    Input(InputAction),
    /// An action of the OUTPUT pipeline.
    Output(OutputAction),
}

impl Action {
    /// Constructs an action from its persisted form.
    ///
    /// ## Errors
    ///
    /// Returns a [`ConfigError`] for unknown kinds, arity violations, and
    /// any parameter the kind's constructor rejects.
    pub fn construct(
        kind: &str,
        parameters: &[String],
        registry: &ActionTypeRegistry,
        resolvers: &TypeResolvers<'_>,
    ) -> Result<Self, ConfigError> {
        let descriptor = registry
            .get(kind)
            .ok_or_else(|| ConfigError::UnknownActionType(kind.to_string()))?;
        descriptor.validate_arity(parameters.len())?;
        match descriptor.direction {
            Direction::Input => {
                InputAction::construct(kind, parameters, resolvers).map(Self::Input)
            }
            Direction::Output => {
                OutputAction::construct(kind, parameters, resolvers).map(Self::Output)
            }
        }
    }

    /// The direction this action runs in.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        match self {
            Self::Input(_) => Direction::Input,
            Self::Output(_) => Direction::Output,
        }
    }

    /// The kind name this action was constructed from.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Input(action) => action.kind(),
            Self::Output(action) => action.kind(),
        }
    }
}

// ============================================================================
// Parameter Helpers
// ============================================================================

/// Reads a mandatory positional parameter. Arity is validated before any
/// constructor runs, so the index is always present.
fn required_param(parameters: &[String], index: usize) -> &str {
    parameters.get(index).map_or("", String::as_str)
}

/// Reads an optional positional parameter: missing or empty means absent.
fn optional_param(parameters: &[String], index: usize) -> Option<&str> {
    parameters
        .get(index)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Compiles a mandatory expression parameter.
fn expression_param(
    parameters: &[String],
    index: usize,
    name: &str,
) -> Result<CompiledExpr, ConfigError> {
    trellis_expr::compile(required_param(parameters, index)).map_err(|source| {
        ConfigError::Expression {
            parameter: name.to_string(),
            source,
        }
    })
}

/// Parses an optional enum-token parameter, falling back to the default.
fn enum_param<T: Default>(
    token: Option<&str>,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, ConfigError> {
    match token {
        None => Ok(T::default()),
        Some(token) => parse(token).ok_or_else(|| ConfigError::InvalidEnumToken {
            parameter: name.to_string(),
            token: token.to_string(),
        }),
    }
}

/// Compiles a regular-expression parameter.
fn pattern_param(token: &str, name: &str) -> Result<regex::Regex, ConfigError> {
    regex::Regex::new(token).map_err(|source| ConfigError::InvalidPattern {
        parameter: name.to_string(),
        source,
    })
}
