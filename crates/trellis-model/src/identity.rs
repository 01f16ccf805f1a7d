//! Identity instances and identity type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

// ============================================================================
// Identity Instance
// ============================================================================

/// An identity flowing through the pipeline.
///
/// The `value` is the canonical stored form produced by the owning type's
/// [`IdentityTypeDefinition::convert_from_string`]; equality semantics
/// beyond plain string comparison go through
/// [`IdentityTypeDefinition::comparable_value`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Identity type name.
    pub type_name: String,
    /// Identity value in canonical stored form.
    pub value: String,
    /// Identity provider that asserted this identity, for mapped identities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_idp: Option<String>,
    /// Translation profile that produced this identity, when mapped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_profile: Option<String>,
}

impl Identity {
    /// Creates an identity.
    #[must_use]
    pub fn new(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            value: value.into(),
            source_idp: None,
            source_profile: None,
        }
    }

    /// Records the asserting identity provider.
    #[must_use]
    pub fn with_source_idp(mut self, idp: impl Into<String>) -> Self {
        self.source_idp = Some(idp.into());
        self
    }

    /// Records the producing translation profile.
    #[must_use]
    pub fn with_source_profile(mut self, profile: impl Into<String>) -> Self {
        self.source_profile = Some(profile.into());
        self
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.type_name, self.value)
    }
}

// ============================================================================
// Identity Type Definition
// ============================================================================

/// Behavior of one identity type.
///
/// Implementations are registered outside the pipeline and consumed through
/// [`IdentityTypeResolver`](crate::IdentityTypeResolver). They must be
/// stateless and safe to share across concurrent authentication events.
pub trait IdentityTypeDefinition: Send + Sync + fmt::Debug {
    /// Type name, the key used in action configuration.
    fn name(&self) -> &str;

    /// Whether values of this type are generated per session rather than
    /// stored. Dynamic types cannot be targeted by persisted-identity
    /// creation.
    fn is_dynamic(&self) -> bool {
        false
    }

    /// Converts a raw asserted string into the canonical stored form.
    ///
    /// ## Errors
    ///
    /// Returns [`ModelError::InvalidIdentityValue`] when the raw string is
    /// not a valid value of this type.
    fn convert_from_string(&self, raw: &str) -> Result<String, ModelError>;

    /// Returns the comparable form of a stored value: two values are the
    /// same identity exactly when their comparable forms are equal,
    /// independent of surface string formatting.
    fn comparable_value(&self, value: &str) -> String {
        value.to_string()
    }
}

// ============================================================================
// Built-in Identity Types
// ============================================================================

/// Username identities. Comparison ignores case and surrounding whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsernameIdentityType;

impl IdentityTypeDefinition for UsernameIdentityType {
    fn name(&self) -> &str {
        "username"
    }

    fn convert_from_string(&self, raw: &str) -> Result<String, ModelError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ModelError::invalid_identity(self.name(), "empty value"));
        }
        Ok(trimmed.to_string())
    }

    fn comparable_value(&self, value: &str) -> String {
        value.trim().to_lowercase()
    }
}

/// Email identities, stored and compared lowercased.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailIdentityType;

impl IdentityTypeDefinition for EmailIdentityType {
    fn name(&self) -> &str {
        "email"
    }

    fn convert_from_string(&self, raw: &str) -> Result<String, ModelError> {
        let normalized = raw.trim().to_lowercase();
        let mut parts = normalized.splitn(2, '@');
        let local = parts.next().unwrap_or_default();
        let domain = parts.next().unwrap_or_default();
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(ModelError::invalid_identity(self.name(), "not an email"));
        }
        Ok(normalized)
    }

    fn comparable_value(&self, value: &str) -> String {
        value.trim().to_lowercase()
    }
}

/// Session-scoped identities generated per authentication event.
///
/// Dynamic: values never reach the store, so persisted-identity creation
/// refuses this type at construction time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransientIdentityType;

impl IdentityTypeDefinition for TransientIdentityType {
    fn name(&self) -> &str {
        "transient"
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn convert_from_string(&self, raw: &str) -> Result<String, ModelError> {
        Ok(raw.to_string())
    }
}
