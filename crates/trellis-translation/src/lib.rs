//! # trellis-translation
//!
//! The Trellis translation pipeline: the trust boundary where federation
//! semantics are decided.
//!
//! An INPUT profile converts an externally authenticated assertion
//! (a [`RemotelyAuthenticatedInput`](trellis_model::RemotelyAuthenticatedInput))
//! into a proposed set of local changes (a
//! [`MappingResult`](trellis_model::MappingResult)); an OUTPUT profile
//! converts a resolved local entity into the data actually released to a
//! relying party (a [`TranslationResult`](trellis_model::TranslationResult)).
//! Every protocol front-end (SAML, OAuth, ...) is a thin adapter over these
//! two executors.
//!
//! ## Design
//!
//! - [`ActionTypeRegistry`] holds the declarative parameter schema of every
//!   action kind; construction of an [`Action`] from its persisted string
//!   array is the single validation point.
//! - A misconfigured action never takes a profile down: [`Profile::load`]
//!   coerces any [`ConfigError`] into a no-op blind stopper and keeps the
//!   remaining rules functional.
//! - Profiles, rules, actions, and compiled expressions are immutable after
//!   load and safe for unsynchronized concurrent reads; reload replaces the
//!   whole `Arc<Profile>`, never a live field.
//! - Executors return a per-run [`RunDiagnostics`] event list instead of
//!   logging from inside actions, keeping evaluation a pure function of
//!   (action, context).

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

mod action;
mod bindings;
mod diagnostics;
mod error;
mod executor;
mod profile;
mod registry;

pub use action::{
    Action, AttributeMapping, BlindStopper, Direction, InputAction, OutputAction, TypeResolvers,
};
pub use bindings::{input_eval_context, output_eval_context};
pub use diagnostics::{DiagnosticEvent, DiagnosticLevel, RunDiagnostics};
pub use error::{ActionError, ConfigError, ExecuteError};
pub use executor::{InputRunOutcome, OutputRunOutcome, RunState, execute_input, execute_output};
pub use profile::{ActionConfig, Profile, ProfileConfig, Rule, RuleConfig};
pub use registry::{
    ActionParameterSchema, ActionTypeDescriptor, ActionTypeRegistry, SemanticType, kinds,
};
