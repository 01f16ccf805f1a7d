//! OUTPUT pipeline actions: local entity to released data.
//!
//! Unlike INPUT actions, these mutate the shared [`TranslationResult`] in
//! place and run strictly in rule order. `fail-authentication` is the only
//! action that aborts a run; everything else degrades per item.

use std::sync::Arc;

use regex::Regex;

use crate::action::{
    BlindStopper, TypeResolvers, expression_param, optional_param, pattern_param, required_param,
};
use crate::diagnostics::RunDiagnostics;
use crate::error::{ActionError, ConfigError};
use crate::registry::kinds;
use trellis_expr::{CompiledExpr, EvalContext, Value};
use trellis_model::{
    Attribute, AttributeType, Identity, IdentityTypeDefinition, TranslationResult,
};

/// A constructed OUTPUT action.
#[derive(Debug, Clone)]
pub enum OutputAction {
    /// Adds a release-only attribute to the output.
    CreateAttribute {
        /// Name of the created attribute.
        name: String,
        /// Value expression.
        expression: CompiledExpr,
    },
    /// Adds an attribute to the output and the persist list.
    CreatePersistentAttribute {
        /// Target attribute type; must not be instance-immutable.
        attribute_type: AttributeType,
        /// Value expression.
        expression: CompiledExpr,
        /// Group path of the created attribute.
        group_path: String,
    },
    /// Adds a release-only identity to the output.
    CreateIdentity {
        /// Target identity type.
        identity_type: Arc<dyn IdentityTypeDefinition>,
        /// Value expression.
        expression: CompiledExpr,
    },
    /// Adds an identity to the output and the persist list.
    CreatePersistedIdentity {
        /// Target identity type; must not be dynamic.
        identity_type: Arc<dyn IdentityTypeDefinition>,
        /// Value expression.
        expression: CompiledExpr,
    },
    /// Removes a named attribute from the output.
    FilterAttribute {
        /// Exact attribute name to remove.
        name: String,
    },
    /// Removes matching values of a named attribute from the output.
    FilterAttributeValues {
        /// Exact attribute name whose values are filtered.
        name: String,
        /// Values matching this pattern are removed.
        pattern: Regex,
    },
    /// Removes matching identities from the output.
    FilterIdentity {
        /// Identity type to match; absent matches every type.
        type_name: Option<String>,
        /// Value pattern to match; absent matches every value.
        pattern: Option<Regex>,
    },
    /// Re-admits previously filtered attributes.
    UnfilterAttribute {
        /// Attributes whose name matches this pattern are restored.
        pattern: Regex,
    },
    /// Aborts the run as a hard authentication failure.
    FailAuthentication {
        /// Failure message reported to the caller.
        message: String,
    },
    /// Stand-in for an action that failed to construct.
    Stopper(BlindStopper),
}

impl OutputAction {
    /// Constructs an OUTPUT action from validated-arity parameters.
    pub(crate) fn construct(
        kind: &str,
        parameters: &[String],
        resolvers: &TypeResolvers<'_>,
    ) -> Result<Self, ConfigError> {
        match kind {
            kinds::CREATE_ATTRIBUTE => Ok(Self::CreateAttribute {
                name: required_param(parameters, 0).to_string(),
                expression: expression_param(parameters, 1, "expression")?,
            }),
            kinds::CREATE_PERSISTENT_ATTRIBUTE => {
                Self::create_persistent_attribute(parameters, resolvers)
            }
            kinds::CREATE_IDENTITY => {
                let identity_type = resolve_identity_type(parameters, resolvers)?;
                Ok(Self::CreateIdentity {
                    identity_type,
                    expression: expression_param(parameters, 1, "expression")?,
                })
            }
            kinds::CREATE_PERSISTED_IDENTITY => {
                let identity_type = resolve_identity_type(parameters, resolvers)?;
                if identity_type.is_dynamic() {
                    return Err(ConfigError::DynamicIdentityType(
                        identity_type.name().to_string(),
                    ));
                }
                Ok(Self::CreatePersistedIdentity {
                    identity_type,
                    expression: expression_param(parameters, 1, "expression")?,
                })
            }
            kinds::FILTER_ATTRIBUTE => Ok(Self::FilterAttribute {
                name: required_param(parameters, 0).to_string(),
            }),
            kinds::FILTER_ATTRIBUTE_VALUES => Ok(Self::FilterAttributeValues {
                name: required_param(parameters, 0).to_string(),
                pattern: pattern_param(required_param(parameters, 1), "valueRegexp")?,
            }),
            kinds::FILTER_IDENTITY => Ok(Self::FilterIdentity {
                type_name: optional_param(parameters, 0).map(str::to_string),
                pattern: optional_param(parameters, 1)
                    .map(|token| pattern_param(token, "valueRegexp"))
                    .transpose()?,
            }),
            kinds::UNFILTER_ATTRIBUTE => Ok(Self::UnfilterAttribute {
                pattern: pattern_param(required_param(parameters, 0), "attributeRegexp")?,
            }),
            kinds::FAIL_AUTHENTICATION => Ok(Self::FailAuthentication {
                message: required_param(parameters, 0).to_string(),
            }),
            other => Err(ConfigError::UnknownActionType(other.to_string())),
        }
    }

    fn create_persistent_attribute(
        parameters: &[String],
        resolvers: &TypeResolvers<'_>,
    ) -> Result<Self, ConfigError> {
        let type_name = required_param(parameters, 0);
        let attribute_type = resolvers
            .attribute_types
            .resolve(type_name)
            .ok_or_else(|| ConfigError::UnknownAttributeType(type_name.to_string()))?;
        if attribute_type.is_instance_immutable {
            return Err(ConfigError::ImmutableAttributeType(type_name.to_string()));
        }
        Ok(Self::CreatePersistentAttribute {
            attribute_type,
            expression: expression_param(parameters, 1, "expression")?,
            group_path: optional_param(parameters, 2).unwrap_or("/").to_string(),
        })
    }

    /// The kind name this action was constructed from.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::CreateAttribute { .. } => kinds::CREATE_ATTRIBUTE,
            Self::CreatePersistentAttribute { .. } => kinds::CREATE_PERSISTENT_ATTRIBUTE,
            Self::CreateIdentity { .. } => kinds::CREATE_IDENTITY,
            Self::CreatePersistedIdentity { .. } => kinds::CREATE_PERSISTED_IDENTITY,
            Self::FilterAttribute { .. } => kinds::FILTER_ATTRIBUTE,
            Self::FilterAttributeValues { .. } => kinds::FILTER_ATTRIBUTE_VALUES,
            Self::FilterIdentity { .. } => kinds::FILTER_IDENTITY,
            Self::UnfilterAttribute { .. } => kinds::UNFILTER_ATTRIBUTE,
            Self::FailAuthentication { .. } => kinds::FAIL_AUTHENTICATION,
            Self::Stopper(stopper) => &stopper.kind,
        }
    }

    /// Applies the action to the shared release set, in place.
    ///
    /// ## Errors
    ///
    /// Returns [`ActionError::Evaluation`] when the value expression fails
    /// to evaluate; the executor records it and moves on to the next rule.
    pub fn apply(
        &self,
        ctx: &EvalContext,
        profile_name: &str,
        result: &mut TranslationResult,
        diag: &mut RunDiagnostics,
    ) -> Result<(), ActionError> {
        match self {
            Self::CreateAttribute { name, expression } => {
                if result.has_attribute(name) {
                    diag.debug(format!("attribute '{name}' already present; not created"));
                    return Ok(());
                }
                let values = string_items(expression, ctx, diag)?;
                if !values.is_empty() {
                    result.add_attribute(
                        Attribute::new(name, "/")
                            .with_values(values)
                            .with_source_profile(profile_name),
                    );
                }
                Ok(())
            }
            Self::CreatePersistentAttribute {
                attribute_type,
                expression,
                group_path,
            } => {
                if result.has_attribute(&attribute_type.name) {
                    diag.debug(format!(
                        "attribute '{}' already present; not created",
                        attribute_type.name
                    ));
                    return Ok(());
                }
                let items = evaluate(expression, ctx)?.into_string_items();
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let raw = match item {
                        Some(raw) => raw,
                        None => {
                            diag.debug(format!(
                                "attribute '{}' not created: a value has no string form",
                                attribute_type.name
                            ));
                            return Ok(());
                        }
                    };
                    match attribute_type.value_syntax.convert(&raw) {
                        Ok(converted) => values.push(converted),
                        Err(err) => {
                            diag.debug(format!(
                                "attribute '{}' not created: {err}",
                                attribute_type.name
                            ));
                            return Ok(());
                        }
                    }
                }
                if !values.is_empty() {
                    result.add_persistent_attribute(
                        Attribute::new(&attribute_type.name, group_path)
                            .with_values(values)
                            .with_source_profile(profile_name),
                    );
                }
                Ok(())
            }
            Self::CreateIdentity {
                identity_type,
                expression,
            } => {
                for raw in string_items(expression, ctx, diag)? {
                    match identity_type.convert_from_string(&raw) {
                        // Dedup by exact stored value only.
                        Ok(value)
                            if result.identities().iter().any(|i| {
                                i.type_name == identity_type.name() && i.value == value
                            }) =>
                        {
                            diag.debug(format!(
                                "identity '{value}' already released; not created"
                            ));
                        }
                        Ok(value) => result.add_identity(
                            Identity::new(identity_type.name(), value)
                                .with_source_profile(profile_name),
                        ),
                        Err(err) => diag.debug(format!(
                            "skipping identity value '{raw}' of type '{}': {err}",
                            identity_type.name()
                        )),
                    }
                }
                Ok(())
            }
            Self::CreatePersistedIdentity {
                identity_type,
                expression,
            } => {
                for raw in string_items(expression, ctx, diag)? {
                    match identity_type.convert_from_string(&raw) {
                        // Dedup by comparable form: persisted identities must
                        // be canonically unique, not merely textually so.
                        Ok(value)
                            if result.identities().iter().any(|i| {
                                i.type_name == identity_type.name()
                                    && identity_type.comparable_value(&i.value)
                                        == identity_type.comparable_value(&value)
                            }) =>
                        {
                            diag.debug(format!(
                                "identity '{value}' already released; not persisted"
                            ));
                        }
                        Ok(value) => result.add_persisted_identity(
                            Identity::new(identity_type.name(), value)
                                .with_source_profile(profile_name),
                        ),
                        Err(err) => diag.debug(format!(
                            "skipping identity value '{raw}' of type '{}': {err}",
                            identity_type.name()
                        )),
                    }
                }
                Ok(())
            }
            Self::FilterAttribute { name } => {
                let removed = result.remove_attributes(|a| a.name == *name);
                diag.debug(format!("filtered {removed} attribute(s) named '{name}'"));
                Ok(())
            }
            Self::FilterAttributeValues { name, pattern } => {
                let removed = result.remove_attribute_values(name, |v| pattern.is_match(v));
                diag.debug(format!("filtered {removed} value(s) of '{name}'"));
                Ok(())
            }
            Self::FilterIdentity { type_name, pattern } => {
                let removed = result.remove_identities(|identity| {
                    type_name
                        .as_deref()
                        .is_none_or(|t| identity.type_name == t)
                        && pattern.as_ref().is_none_or(|p| p.is_match(&identity.value))
                });
                diag.debug(format!("filtered {removed} identity(ies)"));
                Ok(())
            }
            Self::UnfilterAttribute { pattern } => {
                let restored = result.unfilter_attributes(|name| pattern.is_match(name));
                diag.debug(format!("restored {restored} filtered attribute(s)"));
                Ok(())
            }
            Self::FailAuthentication { message } => {
                result.fail(message.clone());
                Ok(())
            }
            Self::Stopper(stopper) => {
                stopper.trip(diag);
                Ok(())
            }
        }
    }
}

fn resolve_identity_type(
    parameters: &[String],
    resolvers: &TypeResolvers<'_>,
) -> Result<Arc<dyn IdentityTypeDefinition>, ConfigError> {
    let type_name = required_param(parameters, 0);
    resolvers
        .identity_types
        .resolve(type_name)
        .ok_or_else(|| ConfigError::UnknownIdentityType(type_name.to_string()))
}

fn evaluate(expression: &CompiledExpr, ctx: &EvalContext) -> Result<Value, ActionError> {
    expression
        .evaluate(ctx)
        .map_err(|source| ActionError::evaluation(expression.source(), source))
}

/// Evaluates an expression into its string items, skipping (with a debug
/// event) any item without a string form.
fn string_items(
    expression: &CompiledExpr,
    ctx: &EvalContext,
    diag: &mut RunDiagnostics,
) -> Result<Vec<String>, ActionError> {
    let mut items = Vec::new();
    for item in evaluate(expression, ctx)?.into_string_items() {
        match item {
            Some(raw) => items.push(raw),
            None => diag.debug("skipping value without a string form"),
        }
    }
    Ok(items)
}
