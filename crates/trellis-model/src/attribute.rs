//! Attribute types, value syntaxes, and attribute instances.
//!
//! Attribute *types* are configured outside the pipeline and consumed here
//! through a read-only resolver contract; the pipeline only needs a type's
//! declared value syntax (to convert mapped values) and its mutability flag
//! (persistent creation refuses instance-immutable types).

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

// ============================================================================
// Value Syntax
// ============================================================================

/// The declared syntax of an attribute type's values.
///
/// Conversion normalizes the raw string into the canonical stored form;
/// a failed conversion makes the action skip the whole attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueSyntax {
    /// Free-form string; any value converts.
    #[default]
    String,
    /// 64-bit integer, stored in normalized decimal form.
    Integer,
    /// Boolean, stored as `true`/`false`.
    Boolean,
    /// Email address, stored lowercased.
    Email,
}

impl ValueSyntax {
    /// Returns the syntax name used in error messages and configuration.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Email => "email",
        }
    }

    /// Converts a raw value into the canonical stored form.
    ///
    /// ## Errors
    ///
    /// Returns [`ModelError::ValueSyntax`] when the value does not conform.
    pub fn convert(&self, raw: &str) -> Result<String, ModelError> {
        match self {
            Self::String => Ok(raw.to_string()),
            Self::Integer => raw
                .trim()
                .parse::<i64>()
                .map(|n| n.to_string())
                .map_err(|_| ModelError::value_syntax(raw, self.as_str())),
            Self::Boolean => raw
                .trim()
                .parse::<bool>()
                .map(|b| b.to_string())
                .map_err(|_| ModelError::value_syntax(raw, self.as_str())),
            Self::Email => {
                let normalized = raw.trim().to_lowercase();
                let mut parts = normalized.splitn(2, '@');
                let local = parts.next().unwrap_or_default();
                let domain = parts.next().unwrap_or_default();
                if local.is_empty() || domain.is_empty() || domain.contains('@') {
                    return Err(ModelError::value_syntax(raw, self.as_str()));
                }
                Ok(normalized)
            }
        }
    }
}

// ============================================================================
// Attribute Type
// ============================================================================

/// A resolved attribute type handle.
///
/// Obtained once, at action construction time, from an
/// [`AttributeTypeResolver`](crate::AttributeTypeResolver); immutable
/// thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeType {
    /// Type name (the key actions reference in configuration).
    pub name: String,
    /// Declared value syntax.
    pub value_syntax: ValueSyntax,
    /// Whether instances of this type may never be created or modified by
    /// translation (system-managed attributes).
    pub is_instance_immutable: bool,
}

impl AttributeType {
    /// Creates a mutable attribute type with the given syntax.
    #[must_use]
    pub fn new(name: impl Into<String>, value_syntax: ValueSyntax) -> Self {
        Self {
            name: name.into(),
            value_syntax,
            is_instance_immutable: false,
        }
    }

    /// Marks the type as instance-immutable.
    #[must_use]
    pub const fn instance_immutable(mut self) -> Self {
        self.is_instance_immutable = true;
        self
    }
}

// ============================================================================
// Visibility
// ============================================================================

/// Visibility of a mapped attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    /// Released to relying parties and visible locally.
    #[default]
    Full,
    /// Kept local; never released to relying parties.
    Local,
}

impl Visibility {
    /// Parses a configured visibility token (case-insensitive).
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "full" => Some(Self::Full),
            "local" => Some(Self::Local),
            _ => None,
        }
    }
}

// ============================================================================
// Attribute Instance
// ============================================================================

/// An attribute instance flowing through the pipeline.
///
/// Values are always multi-valued strings in their canonical stored form
/// (the owning type's syntax governs conversion on the way in).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Group path the attribute lives under ("/" for the root group).
    pub group_path: String,
    /// Attribute values.
    pub values: Vec<String>,
    /// Visibility of the attribute.
    #[serde(default)]
    pub visibility: Visibility,
    /// Name of the translation profile that produced the attribute, when it
    /// was created by translation rather than read from the store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_profile: Option<String>,
}

impl Attribute {
    /// Creates an attribute with no values under the given group path.
    #[must_use]
    pub fn new(name: impl Into<String>, group_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group_path: group_path.into(),
            values: Vec::new(),
            visibility: Visibility::default(),
            source_profile: None,
        }
    }

    /// Sets the values.
    #[must_use]
    pub fn with_values(mut self, values: Vec<String>) -> Self {
        self.values = values;
        self
    }

    /// Sets the visibility.
    #[must_use]
    pub const fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Records the profile that produced this attribute.
    #[must_use]
    pub fn with_source_profile(mut self, profile: impl Into<String>) -> Self {
        self.source_profile = Some(profile.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_syntax_accepts_anything() {
        assert_eq!(ValueSyntax::String.convert("  raw "), Ok("  raw ".to_string()));
    }

    #[test]
    fn integer_syntax_normalizes() {
        assert_eq!(ValueSyntax::Integer.convert(" 042 "), Ok("42".to_string()));
        assert!(ValueSyntax::Integer.convert("forty-two").is_err());
    }

    #[test]
    fn boolean_syntax_is_strict() {
        assert_eq!(ValueSyntax::Boolean.convert("true"), Ok("true".to_string()));
        assert!(ValueSyntax::Boolean.convert("yes").is_err());
    }

    #[test]
    fn email_syntax_lowercases_and_checks_shape() {
        assert_eq!(
            ValueSyntax::Email.convert("Alice@Example.ORG"),
            Ok("alice@example.org".to_string())
        );
        assert!(ValueSyntax::Email.convert("not-an-email").is_err());
        assert!(ValueSyntax::Email.convert("a@b@c").is_err());
        assert!(ValueSyntax::Email.convert("@example.org").is_err());
    }

    #[test]
    fn visibility_parses_case_insensitively() {
        assert_eq!(Visibility::parse("FULL"), Some(Visibility::Full));
        assert_eq!(Visibility::parse("local"), Some(Visibility::Local));
        assert_eq!(Visibility::parse("hidden"), None);
    }
}
