//! Expression engine error types.

use thiserror::Error;

/// Errors raised while compiling an expression source string.
///
/// Compile errors are configuration errors: they are reported once, when an
/// action or rule condition is constructed, and never during evaluation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    /// The source contained a character the lexer does not recognize.
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar {
        /// The offending character.
        ch: char,
        /// Byte offset into the source.
        offset: usize,
    },

    /// A string literal was opened but never closed.
    #[error("unterminated string literal")]
    UnterminatedString,

    /// An integer literal does not fit in 64 bits.
    #[error("integer literal out of range: {0}")]
    IntOutOfRange(String),

    /// The parser hit a token it did not expect.
    #[error("unexpected token `{0}`")]
    UnexpectedToken(String),

    /// The source ended mid-expression.
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    /// A call referenced a function the engine does not provide.
    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    /// The expression source was empty or whitespace only.
    #[error("empty expression")]
    Empty,
}

/// Errors raised while evaluating a compiled expression.
///
/// Evaluation errors are runtime errors scoped to a single pipeline run;
/// callers degrade the affected rule rather than aborting the run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvalError {
    /// An operator or accessor was applied to a value of the wrong type.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A condition produced a non-boolean, non-null final value.
    #[error("condition evaluated to a non-boolean value: {0}")]
    NotABoolean(String),

    /// A builtin function was called with the wrong number of arguments.
    #[error("wrong number of arguments to {function}: expected {expected}, got {actual}")]
    WrongArgCount {
        /// Function name.
        function: String,
        /// Expected argument count.
        expected: usize,
        /// Actual argument count.
        actual: usize,
    },
}

impl EvalError {
    /// Creates a type-mismatch error.
    #[must_use]
    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::TypeMismatch(msg.into())
    }
}
