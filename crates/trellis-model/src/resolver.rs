//! Read-only resolution contracts for attribute and identity types.
//!
//! Type *storage* belongs to an external collaborator; the pipeline only
//! resolves names to definitions, once, at action construction time. The
//! map-backed implementations here serve wiring and tests; a production
//! deployment adapts its type store behind the same traits.

use std::collections::HashMap;
use std::sync::Arc;

use crate::attribute::AttributeType;
use crate::identity::{
    EmailIdentityType, IdentityTypeDefinition, TransientIdentityType, UsernameIdentityType,
};

/// Resolves attribute type names to definitions.
pub trait AttributeTypeResolver: Send + Sync {
    /// Looks up an attribute type by name.
    fn resolve(&self, name: &str) -> Option<AttributeType>;
}

/// Resolves identity type names to definitions.
pub trait IdentityTypeResolver: Send + Sync {
    /// Looks up an identity type by name.
    fn resolve(&self, name: &str) -> Option<Arc<dyn IdentityTypeDefinition>>;
}

/// Map-backed attribute type resolver.
#[derive(Debug, Clone, Default)]
pub struct StaticAttributeTypeResolver {
    types: HashMap<String, AttributeType>,
}

impl StaticAttributeTypeResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an attribute type, replacing any previous definition of
    /// the same name.
    pub fn register(&mut self, attribute_type: AttributeType) {
        self.types
            .insert(attribute_type.name.clone(), attribute_type);
    }

    /// Registers an attribute type, builder style.
    #[must_use]
    pub fn with_type(mut self, attribute_type: AttributeType) -> Self {
        self.register(attribute_type);
        self
    }
}

impl AttributeTypeResolver for StaticAttributeTypeResolver {
    fn resolve(&self, name: &str) -> Option<AttributeType> {
        self.types.get(name).cloned()
    }
}

/// Map-backed identity type resolver.
#[derive(Clone, Default)]
pub struct StaticIdentityTypeResolver {
    types: HashMap<String, Arc<dyn IdentityTypeDefinition>>,
}

impl StaticIdentityTypeResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver with the built-in identity types registered.
    #[must_use]
    pub fn with_builtin_types() -> Self {
        let mut resolver = Self::new();
        resolver.register(Arc::new(UsernameIdentityType));
        resolver.register(Arc::new(EmailIdentityType));
        resolver.register(Arc::new(TransientIdentityType));
        resolver
    }

    /// Registers an identity type definition.
    pub fn register(&mut self, definition: Arc<dyn IdentityTypeDefinition>) {
        self.types.insert(definition.name().to_string(), definition);
    }
}

impl IdentityTypeResolver for StaticIdentityTypeResolver {
    fn resolve(&self, name: &str) -> Option<Arc<dyn IdentityTypeDefinition>> {
        self.types.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::ValueSyntax;

    #[test]
    fn attribute_resolver_round_trip() {
        let resolver = StaticAttributeTypeResolver::new()
            .with_type(AttributeType::new("email", ValueSyntax::Email));

        let resolved = resolver.resolve("email").unwrap();
        assert_eq!(resolved.value_syntax, ValueSyntax::Email);
        assert!(resolver.resolve("unknown").is_none());
    }

    #[test]
    fn builtin_identity_types_are_registered() {
        let resolver = StaticIdentityTypeResolver::with_builtin_types();
        assert!(resolver.resolve("username").is_some());
        assert!(resolver.resolve("email").is_some());
        assert!(resolver.resolve("transient").unwrap().is_dynamic());
        assert!(resolver.resolve("unknown").is_none());
    }
}
