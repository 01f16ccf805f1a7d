//! # trellis-model
//!
//! Domain model for the Trellis translation pipeline.
//!
//! This crate defines the read-only type system the pipeline consumes
//! (attribute types with value syntaxes, identity type definitions, the
//! resolver contracts that look them up), the per-run context objects
//! ([`RemotelyAuthenticatedInput`], [`TranslationInput`]), and the two
//! result accumulators ([`MappingResult`], [`TranslationResult`]).

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

mod attribute;
mod context;
mod error;
mod identity;
mod resolver;
mod result;

pub use attribute::{Attribute, AttributeType, ValueSyntax, Visibility};
pub use context::{RemoteAttribute, RemotelyAuthenticatedInput, TranslationInput};
pub use error::ModelError;
pub use identity::{
    EmailIdentityType, Identity, IdentityTypeDefinition, TransientIdentityType,
    UsernameIdentityType,
};
pub use resolver::{
    AttributeTypeResolver, IdentityTypeResolver, StaticAttributeTypeResolver,
    StaticIdentityTypeResolver,
};
pub use result::{
    AttributeEffectMode, EntityChange, GroupEffectMode, IdentityEffectMode, MappedAttribute,
    MappedGroup, MappedIdentity, MappingResult, ScheduledOperation, TranslationResult,
};
