//! Per-run pipeline contexts.
//!
//! Protocol adapters (SAML, OAuth, ...) build these objects from the wire
//! message or the resolved local entity and hand them to an executor. Both
//! are read-only for the duration of a pipeline run.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attribute::Attribute;
use crate::identity::Identity;

/// An attribute as asserted by the remote identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAttribute {
    /// Attribute name in the remote assertion.
    pub name: String,
    /// Raw asserted values, untouched by any local syntax.
    pub values: Vec<String>,
}

impl RemoteAttribute {
    /// Creates a single-valued remote attribute.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: vec![value.into()],
        }
    }

    /// Creates a multi-valued remote attribute.
    #[must_use]
    pub fn multi(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// The externally authenticated input an INPUT profile runs against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemotelyAuthenticatedInput {
    /// Name of the identity provider that authenticated the principal.
    pub idp_name: String,
    /// Remote attributes by name.
    pub attributes: HashMap<String, RemoteAttribute>,
    /// Remote group memberships.
    pub groups: Vec<String>,
    /// Raw assertion fields the protocol adapter chose to expose
    /// (subject format, authentication context class, ...).
    pub raw_assertion: HashMap<String, String>,
}

impl RemotelyAuthenticatedInput {
    /// Creates an input for the given identity provider.
    #[must_use]
    pub fn new(idp_name: impl Into<String>) -> Self {
        Self {
            idp_name: idp_name.into(),
            ..Self::default()
        }
    }

    /// Adds a remote attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: RemoteAttribute) -> Self {
        self.attributes.insert(attribute.name.clone(), attribute);
        self
    }

    /// Adds a remote group membership.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    /// Adds a raw assertion field.
    #[must_use]
    pub fn with_assertion_field(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.raw_assertion.insert(name.into(), value.into());
        self
    }

    /// Looks up a remote attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&RemoteAttribute> {
        self.attributes.get(name)
    }
}

/// The resolved local entity an OUTPUT profile runs against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationInput {
    /// The entity's local identities.
    pub identities: Vec<Identity>,
    /// The entity's local attributes.
    pub attributes: Vec<Attribute>,
    /// The entity's local group memberships (full paths).
    pub groups: Vec<String>,
}

impl TranslationInput {
    /// Creates an empty input.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a local identity.
    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identities.push(identity);
        self
    }

    /// Adds a local attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Adds a local group membership.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }
}
