//! # trellis-expr
//!
//! Expression engine for Trellis translation profiles.
//!
//! Translation rules and actions are parameterized with small textual
//! expressions ("input.attributes['mail']", "input.idp == 'corp-idp'").
//! This crate compiles such an expression once into an immutable
//! [`CompiledExpr`] and evaluates it many times against a read-only
//! [`EvalContext`] of [`Value`] bindings.
//!
//! ## Design
//!
//! - Compilation and evaluation are split: configuration errors surface at
//!   [`compile`] time, never during an authentication event.
//! - A [`CompiledExpr`] holds no interior state and is safe to share across
//!   concurrent evaluations.
//! - Absent bindings and absent map keys evaluate to [`Value::Null`];
//!   absence is a normal outcome, not an error.

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

mod compile;
mod error;
mod eval;
mod token;
mod value;

pub use compile::{CompiledExpr, compile};
pub use error::{CompileError, EvalError};
pub use eval::EvalContext;
pub use value::Value;
