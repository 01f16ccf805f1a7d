//! Declarative catalog of action types.
//!
//! Every configurable action kind is described once, at startup, by an
//! [`ActionTypeDescriptor`]: its direction and the ordered schema of its
//! positional parameters. Descriptors never change after registration; the
//! registry is the first stop of action construction and the data source
//! for any management UI listing the available actions.

use std::collections::HashMap;
use std::fmt;

use crate::action::Direction;
use crate::error::ConfigError;

/// Well-known action kind names, as persisted in configuration.
pub mod kinds {
    /// Maps an expression result to local identities.
    pub const MAP_IDENTITY: &str = "map-identity";
    /// Maps an expression result to one local attribute.
    pub const MAP_ATTRIBUTE: &str = "map-attribute";
    /// Maps an expression result to group memberships.
    pub const MAP_GROUP: &str = "map-group";
    /// Maps many remote attributes through a mapping table.
    pub const MULTI_MAP_ATTRIBUTE: &str = "multi-map-attribute";
    /// Schedules a local entity state change.
    pub const CHANGE_ENTITY_STATUS: &str = "change-entity-status";
    /// Requests removal of data this idp no longer asserts.
    pub const REMOVE_STALE_DATA: &str = "remove-stale-data";
    /// Adds a release-only attribute to the output.
    pub const CREATE_ATTRIBUTE: &str = "create-attribute";
    /// Adds an attribute to the output and the persist list.
    pub const CREATE_PERSISTENT_ATTRIBUTE: &str = "create-persistent-attribute";
    /// Adds a release-only identity to the output.
    pub const CREATE_IDENTITY: &str = "create-identity";
    /// Adds an identity to the output and the persist list.
    pub const CREATE_PERSISTED_IDENTITY: &str = "create-persisted-identity";
    /// Removes a named attribute from the output.
    pub const FILTER_ATTRIBUTE: &str = "filter-attribute";
    /// Removes matching values of a named attribute from the output.
    pub const FILTER_ATTRIBUTE_VALUES: &str = "filter-attribute-values";
    /// Removes matching identities from the output.
    pub const FILTER_IDENTITY: &str = "filter-identity";
    /// Re-admits previously filtered attributes.
    pub const UNFILTER_ATTRIBUTE: &str = "unfilter-attribute";
    /// Aborts the run as a hard authentication failure.
    pub const FAIL_AUTHENTICATION: &str = "fail-authentication";
}

/// The semantic type of one action parameter, for validation and UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticType {
    /// Free-form string.
    String,
    /// Expression source, compiled at construction.
    Expression,
    /// Token of a closed enum set.
    EnumToken,
    /// Multi-line mapping text.
    LargeText,
    /// Non-negative day count.
    Days,
    /// Name of a configured attribute type.
    AttributeTypeRef,
    /// Group path.
    GroupRef,
    /// Name of a registered identity type.
    IdentityTypeRef,
    /// Name of a credential requirement.
    CredentialReqRef,
    /// Regular expression, compiled at construction.
    Pattern,
}

/// Schema of one positional action parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionParameterSchema {
    /// Parameter name, for error messages and UI.
    pub name: &'static str,
    /// What the parameter holds.
    pub semantic_type: SemanticType,
    /// Whether the parameter must be present. Mandatory parameters form a
    /// prefix; trailing optional parameters may be omitted, and an empty
    /// string for an optional parameter means "absent".
    pub mandatory: bool,
}

impl ActionParameterSchema {
    const fn required(name: &'static str, semantic_type: SemanticType) -> Self {
        Self {
            name,
            semantic_type,
            mandatory: true,
        }
    }

    const fn optional(name: &'static str, semantic_type: SemanticType) -> Self {
        Self {
            name,
            semantic_type,
            mandatory: false,
        }
    }
}

/// Immutable description of one action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTypeDescriptor {
    /// Kind name, as persisted in configuration.
    pub kind: &'static str,
    /// Which pipeline the action belongs to.
    pub direction: Direction,
    /// Ordered positional parameter schemas.
    pub parameters: &'static [ActionParameterSchema],
}

impl ActionTypeDescriptor {
    /// Number of mandatory (leading) parameters.
    #[must_use]
    pub fn required_count(&self) -> usize {
        self.parameters.iter().filter(|p| p.mandatory).count()
    }

    /// Validates a positional parameter count against this schema.
    ///
    /// ## Errors
    ///
    /// Returns [`ConfigError::WrongParameterCount`] when the count falls
    /// outside the mandatory-to-total range.
    pub fn validate_arity(&self, actual: usize) -> Result<(), ConfigError> {
        let min = self.required_count();
        let max = self.parameters.len();
        if (min..=max).contains(&actual) {
            Ok(())
        } else {
            Err(ConfigError::WrongParameterCount {
                kind: self.kind.to_string(),
                expected: Arity { min, max }.to_string(),
                actual,
            })
        }
    }
}

/// Renders a parameter-count range as `2` or `1..=2`.
struct Arity {
    min: usize,
    max: usize,
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}..={}", self.min, self.max)
        }
    }
}

// ============================================================================
// Built-in Descriptors
// ============================================================================

use self::ActionParameterSchema as P;

const BUILTIN_DESCRIPTORS: &[ActionTypeDescriptor] = &[
    ActionTypeDescriptor {
        kind: kinds::MAP_IDENTITY,
        direction: Direction::Input,
        parameters: &[
            P::required("identityType", SemanticType::IdentityTypeRef),
            P::required("expression", SemanticType::Expression),
            P::optional("credentialRequirement", SemanticType::CredentialReqRef),
            P::optional("effectMode", SemanticType::EnumToken),
        ],
    },
    ActionTypeDescriptor {
        kind: kinds::MAP_ATTRIBUTE,
        direction: Direction::Input,
        parameters: &[
            P::required("attributeType", SemanticType::AttributeTypeRef),
            P::required("group", SemanticType::GroupRef),
            P::required("expression", SemanticType::Expression),
            P::optional("visibility", SemanticType::EnumToken),
            P::optional("effectMode", SemanticType::EnumToken),
        ],
    },
    ActionTypeDescriptor {
        kind: kinds::MAP_GROUP,
        direction: Direction::Input,
        parameters: &[
            P::required("expression", SemanticType::Expression),
            P::optional("groupEffectMode", SemanticType::EnumToken),
        ],
    },
    ActionTypeDescriptor {
        kind: kinds::MULTI_MAP_ATTRIBUTE,
        direction: Direction::Input,
        parameters: &[
            P::required("mapping", SemanticType::LargeText),
            P::optional("visibility", SemanticType::EnumToken),
            P::optional("effectMode", SemanticType::EnumToken),
        ],
    },
    ActionTypeDescriptor {
        kind: kinds::CHANGE_ENTITY_STATUS,
        direction: Direction::Input,
        parameters: &[
            P::required("scheduledOperation", SemanticType::EnumToken),
            P::required("scheduledAfterDays", SemanticType::Days),
        ],
    },
    ActionTypeDescriptor {
        kind: kinds::REMOVE_STALE_DATA,
        direction: Direction::Input,
        parameters: &[],
    },
    ActionTypeDescriptor {
        kind: kinds::CREATE_ATTRIBUTE,
        direction: Direction::Output,
        parameters: &[
            P::required("attributeName", SemanticType::String),
            P::required("expression", SemanticType::Expression),
        ],
    },
    ActionTypeDescriptor {
        kind: kinds::CREATE_PERSISTENT_ATTRIBUTE,
        direction: Direction::Output,
        parameters: &[
            P::required("attributeType", SemanticType::AttributeTypeRef),
            P::required("expression", SemanticType::Expression),
            P::optional("group", SemanticType::GroupRef),
        ],
    },
    ActionTypeDescriptor {
        kind: kinds::CREATE_IDENTITY,
        direction: Direction::Output,
        parameters: &[
            P::required("identityType", SemanticType::IdentityTypeRef),
            P::required("expression", SemanticType::Expression),
        ],
    },
    ActionTypeDescriptor {
        kind: kinds::CREATE_PERSISTED_IDENTITY,
        direction: Direction::Output,
        parameters: &[
            P::required("identityType", SemanticType::IdentityTypeRef),
            P::required("expression", SemanticType::Expression),
        ],
    },
    ActionTypeDescriptor {
        kind: kinds::FILTER_ATTRIBUTE,
        direction: Direction::Output,
        parameters: &[P::required("attributeName", SemanticType::String)],
    },
    ActionTypeDescriptor {
        kind: kinds::FILTER_ATTRIBUTE_VALUES,
        direction: Direction::Output,
        parameters: &[
            P::required("attributeName", SemanticType::String),
            P::required("valueRegexp", SemanticType::Pattern),
        ],
    },
    ActionTypeDescriptor {
        kind: kinds::FILTER_IDENTITY,
        direction: Direction::Output,
        parameters: &[
            P::optional("identityType", SemanticType::IdentityTypeRef),
            P::optional("valueRegexp", SemanticType::Pattern),
        ],
    },
    ActionTypeDescriptor {
        kind: kinds::UNFILTER_ATTRIBUTE,
        direction: Direction::Output,
        parameters: &[P::required("attributeRegexp", SemanticType::Pattern)],
    },
    ActionTypeDescriptor {
        kind: kinds::FAIL_AUTHENTICATION,
        direction: Direction::Output,
        parameters: &[P::required("message", SemanticType::String)],
    },
];

// ============================================================================
// Registry
// ============================================================================

/// Lookup table of action type descriptors.
#[derive(Debug, Clone)]
pub struct ActionTypeRegistry {
    descriptors: HashMap<&'static str, &'static ActionTypeDescriptor>,
}

impl ActionTypeRegistry {
    /// Creates a registry holding every built-in action kind.
    #[must_use]
    pub fn builtin() -> Self {
        let mut descriptors = HashMap::with_capacity(BUILTIN_DESCRIPTORS.len());
        for descriptor in BUILTIN_DESCRIPTORS {
            descriptors.insert(descriptor.kind, descriptor);
        }
        Self { descriptors }
    }

    /// Looks up the descriptor of an action kind.
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<&'static ActionTypeDescriptor> {
        self.descriptors.get(kind).copied()
    }

    /// Names of all registered kinds, for the given direction.
    pub fn names(&self, direction: Direction) -> impl Iterator<Item = &'static str> + '_ {
        self.descriptors
            .values()
            .filter(move |d| d.direction == direction)
            .map(|d| d.kind)
    }
}

impl Default for ActionTypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_covers_both_directions() {
        let registry = ActionTypeRegistry::builtin();
        assert_eq!(registry.names(Direction::Input).count(), 6);
        assert_eq!(registry.names(Direction::Output).count(), 9);
        assert!(registry.get("no-such-action").is_none());
    }

    #[test]
    fn arity_accepts_omitted_trailing_optionals() {
        let registry = ActionTypeRegistry::builtin();
        let descriptor = registry.get(kinds::MAP_IDENTITY).unwrap();
        assert_eq!(descriptor.required_count(), 2);
        assert!(descriptor.validate_arity(2).is_ok());
        assert!(descriptor.validate_arity(4).is_ok());
        assert!(descriptor.validate_arity(1).is_err());
        assert!(descriptor.validate_arity(5).is_err());
    }

    #[test]
    fn fixed_arity_renders_as_single_count() {
        let registry = ActionTypeRegistry::builtin();
        let descriptor = registry.get(kinds::CHANGE_ENTITY_STATUS).unwrap();
        let err = descriptor.validate_arity(0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "action 'change-entity-status' takes 2 parameters, got 0"
        );
    }

    #[test]
    fn zero_parameter_action_rejects_any_argument() {
        let registry = ActionTypeRegistry::builtin();
        let descriptor = registry.get(kinds::REMOVE_STALE_DATA).unwrap();
        assert!(descriptor.validate_arity(0).is_ok());
        assert!(descriptor.validate_arity(1).is_err());
    }
}
