//! INPUT pipeline actions: remote assertion to proposed local changes.
//!
//! Every invocation returns a fresh partial [`MappingResult`] the executor
//! merges into the run accumulator. A `Null` expression result is an empty
//! result, not an error; a value that fails conversion is skipped with a
//! debug diagnostic (attribute mappers skip the whole attribute, so a
//! half-converted value list never reaches the store).

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::action::{
    BlindStopper, TypeResolvers, enum_param, expression_param, optional_param, required_param,
};
use crate::diagnostics::RunDiagnostics;
use crate::error::{ActionError, ConfigError};
use crate::registry::kinds;
use trellis_expr::{CompiledExpr, EvalContext};
use trellis_model::{
    Attribute, AttributeEffectMode, AttributeType, EntityChange, GroupEffectMode, Identity,
    IdentityEffectMode, IdentityTypeDefinition, MappedAttribute, MappedGroup, MappedIdentity,
    MappingResult, RemotelyAuthenticatedInput, ScheduledOperation, Visibility,
};

/// One line of a multi-map mapping table.
#[derive(Debug, Clone)]
pub struct AttributeMapping {
    /// Remote attribute name to read.
    pub remote_name: String,
    /// Local attribute type to map into.
    pub attribute_type: AttributeType,
    /// Group path of the mapped attribute.
    pub group_path: String,
}

/// A constructed INPUT action.
#[derive(Debug, Clone)]
pub enum InputAction {
    /// Maps an expression result to local identities.
    MapIdentity {
        /// Target identity type.
        identity_type: Arc<dyn IdentityTypeDefinition>,
        /// Value expression.
        expression: CompiledExpr,
        /// Credential requirement for newly created entities.
        credential_requirement: Option<String>,
        /// Interaction with an existing local identity.
        effect_mode: IdentityEffectMode,
    },
    /// Maps an expression result to one local attribute.
    MapAttribute {
        /// Target attribute type.
        attribute_type: AttributeType,
        /// Group path of the mapped attribute.
        group_path: String,
        /// Value expression.
        expression: CompiledExpr,
        /// Visibility of the mapped attribute.
        visibility: Visibility,
        /// Interaction with an existing local attribute.
        effect_mode: AttributeEffectMode,
    },
    /// Maps an expression result to group memberships.
    MapGroup {
        /// Group path expression.
        expression: CompiledExpr,
        /// Whether missing groups may be created.
        effect_mode: GroupEffectMode,
    },
    /// Maps many remote attributes through a mapping table.
    MultiMapAttribute {
        /// Parsed mapping lines.
        mappings: Vec<AttributeMapping>,
        /// Visibility of every mapped attribute.
        visibility: Visibility,
        /// Interaction with existing local attributes.
        effect_mode: AttributeEffectMode,
    },
    /// Schedules a local entity state change.
    ChangeEntityStatus {
        /// The operation to schedule.
        operation: ScheduledOperation,
        /// Days from now until the operation becomes effective.
        after_days: i64,
    },
    /// Requests removal of data this idp no longer asserts.
    RemoveStaleData,
    /// Stand-in for an action that failed to construct.
    Stopper(BlindStopper),
}

impl InputAction {
    /// Constructs an INPUT action from validated-arity parameters.
    pub(crate) fn construct(
        kind: &str,
        parameters: &[String],
        resolvers: &TypeResolvers<'_>,
    ) -> Result<Self, ConfigError> {
        match kind {
            kinds::MAP_IDENTITY => Self::map_identity(parameters, resolvers),
            kinds::MAP_ATTRIBUTE => Self::map_attribute(parameters, resolvers),
            kinds::MAP_GROUP => Self::map_group(parameters),
            kinds::MULTI_MAP_ATTRIBUTE => Self::multi_map_attribute(parameters, resolvers),
            kinds::CHANGE_ENTITY_STATUS => Self::change_entity_status(parameters),
            kinds::REMOVE_STALE_DATA => Ok(Self::RemoveStaleData),
            other => Err(ConfigError::UnknownActionType(other.to_string())),
        }
    }

    fn map_identity(
        parameters: &[String],
        resolvers: &TypeResolvers<'_>,
    ) -> Result<Self, ConfigError> {
        let type_name = required_param(parameters, 0);
        let identity_type = resolvers
            .identity_types
            .resolve(type_name)
            .ok_or_else(|| ConfigError::UnknownIdentityType(type_name.to_string()))?;
        Ok(Self::MapIdentity {
            identity_type,
            expression: expression_param(parameters, 1, "expression")?,
            credential_requirement: optional_param(parameters, 2).map(str::to_string),
            effect_mode: enum_param(
                optional_param(parameters, 3),
                "effectMode",
                IdentityEffectMode::parse,
            )?,
        })
    }

    fn map_attribute(
        parameters: &[String],
        resolvers: &TypeResolvers<'_>,
    ) -> Result<Self, ConfigError> {
        let type_name = required_param(parameters, 0);
        let attribute_type = resolvers
            .attribute_types
            .resolve(type_name)
            .ok_or_else(|| ConfigError::UnknownAttributeType(type_name.to_string()))?;
        Ok(Self::MapAttribute {
            attribute_type,
            group_path: required_param(parameters, 1).to_string(),
            expression: expression_param(parameters, 2, "expression")?,
            visibility: enum_param(
                optional_param(parameters, 3),
                "visibility",
                Visibility::parse,
            )?,
            effect_mode: enum_param(
                optional_param(parameters, 4),
                "effectMode",
                AttributeEffectMode::parse,
            )?,
        })
    }

    fn map_group(parameters: &[String]) -> Result<Self, ConfigError> {
        Ok(Self::MapGroup {
            expression: expression_param(parameters, 0, "expression")?,
            effect_mode: enum_param(
                optional_param(parameters, 1),
                "groupEffectMode",
                GroupEffectMode::parse,
            )?,
        })
    }

    /// Parses the mapping table: one `remoteName attributeType groupPath`
    /// triple per line, blank lines ignored.
    fn multi_map_attribute(
        parameters: &[String],
        resolvers: &TypeResolvers<'_>,
    ) -> Result<Self, ConfigError> {
        let mut mappings = Vec::new();
        for (line_no, line) in required_param(parameters, 0).lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let &[remote_name, type_name, group_path] = tokens.as_slice() else {
                return Err(ConfigError::MalformedMappingLine {
                    line_no: line_no + 1,
                    line: line.to_string(),
                });
            };
            let attribute_type = resolvers
                .attribute_types
                .resolve(type_name)
                .ok_or_else(|| ConfigError::UnknownAttributeType(type_name.to_string()))?;
            mappings.push(AttributeMapping {
                remote_name: remote_name.to_string(),
                attribute_type,
                group_path: group_path.to_string(),
            });
        }
        Ok(Self::MultiMapAttribute {
            mappings,
            visibility: enum_param(
                optional_param(parameters, 1),
                "visibility",
                Visibility::parse,
            )?,
            effect_mode: enum_param(
                optional_param(parameters, 2),
                "effectMode",
                AttributeEffectMode::parse,
            )?,
        })
    }

    fn change_entity_status(parameters: &[String]) -> Result<Self, ConfigError> {
        let token = required_param(parameters, 0);
        let operation =
            ScheduledOperation::parse(token).ok_or_else(|| ConfigError::InvalidEnumToken {
                parameter: "scheduledOperation".to_string(),
                token: token.to_string(),
            })?;
        let days = required_param(parameters, 1);
        let after_days = days
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|d| *d >= 0)
            .ok_or_else(|| ConfigError::InvalidDays(days.to_string()))?;
        Ok(Self::ChangeEntityStatus {
            operation,
            after_days,
        })
    }

    /// The kind name this action was constructed from.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::MapIdentity { .. } => kinds::MAP_IDENTITY,
            Self::MapAttribute { .. } => kinds::MAP_ATTRIBUTE,
            Self::MapGroup { .. } => kinds::MAP_GROUP,
            Self::MultiMapAttribute { .. } => kinds::MULTI_MAP_ATTRIBUTE,
            Self::ChangeEntityStatus { .. } => kinds::CHANGE_ENTITY_STATUS,
            Self::RemoveStaleData => kinds::REMOVE_STALE_DATA,
            Self::Stopper(stopper) => &stopper.kind,
        }
    }

    /// Invokes the action, producing a fresh partial result.
    ///
    /// ## Errors
    ///
    /// Returns [`ActionError::Evaluation`] when the value expression fails
    /// to evaluate; the executor records it and drops the rule's
    /// contribution.
    pub fn invoke(
        &self,
        input: &RemotelyAuthenticatedInput,
        ctx: &EvalContext,
        profile_name: &str,
        diag: &mut RunDiagnostics,
    ) -> Result<MappingResult, ActionError> {
        match self {
            Self::MapIdentity {
                identity_type,
                expression,
                credential_requirement,
                effect_mode,
            } => Self::invoke_map_identity(
                identity_type.as_ref(),
                expression,
                credential_requirement.as_deref(),
                *effect_mode,
                input,
                ctx,
                profile_name,
                diag,
            ),
            Self::MapAttribute {
                attribute_type,
                group_path,
                expression,
                visibility,
                effect_mode,
            } => {
                let value = evaluate(expression, ctx)?;
                let mut result = MappingResult::new();
                if let Some(values) =
                    convert_values(attribute_type, value.into_string_items(), diag)
                    && !values.is_empty()
                {
                    result.attributes.push(MappedAttribute {
                        effect_mode: *effect_mode,
                        attribute: Attribute::new(&attribute_type.name, group_path)
                            .with_values(values)
                            .with_visibility(*visibility)
                            .with_source_profile(profile_name),
                    });
                }
                Ok(result)
            }
            Self::MapGroup {
                expression,
                effect_mode,
            } => {
                let value = evaluate(expression, ctx)?;
                let mut result = MappingResult::new();
                for item in value.into_string_items() {
                    match item {
                        Some(path) => result.groups.push(MappedGroup {
                            path,
                            effect_mode: *effect_mode,
                            source_idp: input.idp_name.clone(),
                            source_profile: profile_name.to_string(),
                        }),
                        None => diag.debug("skipping group path without a string form"),
                    }
                }
                Ok(result)
            }
            Self::MultiMapAttribute {
                mappings,
                visibility,
                effect_mode,
            } => {
                let mut result = MappingResult::new();
                for mapping in mappings {
                    let Some(remote) = input.attribute(&mapping.remote_name) else {
                        diag.debug(format!(
                            "remote attribute '{}' not asserted; mapping skipped",
                            mapping.remote_name
                        ));
                        continue;
                    };
                    let items = remote.values.iter().cloned().map(Some).collect();
                    if let Some(values) = convert_values(&mapping.attribute_type, items, diag)
                        && !values.is_empty()
                    {
                        result.attributes.push(MappedAttribute {
                            effect_mode: *effect_mode,
                            attribute: Attribute::new(
                                &mapping.attribute_type.name,
                                &mapping.group_path,
                            )
                            .with_values(values)
                            .with_visibility(*visibility)
                            .with_source_profile(profile_name),
                        });
                    }
                }
                Ok(result)
            }
            Self::ChangeEntityStatus {
                operation,
                after_days,
            } => {
                let mut result = MappingResult::new();
                result.entity_change = Some(EntityChange {
                    operation: *operation,
                    effective_at: Utc::now() + Duration::days(*after_days),
                });
                Ok(result)
            }
            Self::RemoveStaleData => {
                let mut result = MappingResult::new();
                result.clean_stale_attributes = true;
                result.clean_stale_groups = true;
                result.clean_stale_identities = true;
                Ok(result)
            }
            Self::Stopper(stopper) => {
                stopper.trip(diag);
                Ok(MappingResult::new())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn invoke_map_identity(
        identity_type: &dyn IdentityTypeDefinition,
        expression: &CompiledExpr,
        credential_requirement: Option<&str>,
        effect_mode: IdentityEffectMode,
        input: &RemotelyAuthenticatedInput,
        ctx: &EvalContext,
        profile_name: &str,
        diag: &mut RunDiagnostics,
    ) -> Result<MappingResult, ActionError> {
        let value = evaluate(expression, ctx)?;
        let mut result = MappingResult::new();
        for item in value.into_string_items() {
            let Some(raw) = item else {
                diag.debug("skipping identity value without a string form");
                continue;
            };
            match identity_type.convert_from_string(&raw) {
                Ok(canonical) => result.identities.push(MappedIdentity {
                    effect_mode,
                    identity: Identity::new(identity_type.name(), canonical)
                        .with_source_idp(&input.idp_name)
                        .with_source_profile(profile_name),
                    credential_requirement: credential_requirement.map(str::to_string),
                }),
                Err(err) => diag.debug(format!(
                    "skipping identity value '{raw}' of type '{}': {err}",
                    identity_type.name()
                )),
            }
        }
        Ok(result)
    }
}

fn evaluate(
    expression: &CompiledExpr,
    ctx: &EvalContext,
) -> Result<trellis_expr::Value, ActionError> {
    expression
        .evaluate(ctx)
        .map_err(|source| ActionError::evaluation(expression.source(), source))
}

/// Converts a value list into the type's canonical form. Any failure skips
/// the whole attribute (returns `None`) so a half-converted list never
/// reaches the result.
fn convert_values(
    attribute_type: &AttributeType,
    items: Vec<Option<String>>,
    diag: &mut RunDiagnostics,
) -> Option<Vec<String>> {
    let mut values = Vec::with_capacity(items.len());
    for item in items {
        let Some(raw) = item else {
            diag.debug(format!(
                "attribute '{}' skipped: a value has no string form",
                attribute_type.name
            ));
            return None;
        };
        match attribute_type.value_syntax.convert(&raw) {
            Ok(converted) => values.push(converted),
            Err(err) => {
                diag.debug(format!(
                    "attribute '{}' skipped: {err}",
                    attribute_type.name
                ));
                return None;
            }
        }
    }
    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::input_eval_context;
    use trellis_model::{
        RemoteAttribute, StaticAttributeTypeResolver, StaticIdentityTypeResolver, ValueSyntax,
    };

    fn resolvers() -> (StaticAttributeTypeResolver, StaticIdentityTypeResolver) {
        let attributes = StaticAttributeTypeResolver::new()
            .with_type(AttributeType::new("email", ValueSyntax::Email))
            .with_type(AttributeType::new("employeeNumber", ValueSyntax::Integer))
            .with_type(AttributeType::new("displayName", ValueSyntax::String));
        (attributes, StaticIdentityTypeResolver::with_builtin_types())
    }

    fn construct(kind: &str, parameters: &[&str]) -> Result<InputAction, ConfigError> {
        let (attributes, identities) = resolvers();
        let resolvers = TypeResolvers {
            attribute_types: &attributes,
            identity_types: &identities,
        };
        let parameters: Vec<String> = parameters.iter().map(|p| p.to_string()).collect();
        InputAction::construct(kind, &parameters, &resolvers)
    }

    fn sample_input() -> RemotelyAuthenticatedInput {
        RemotelyAuthenticatedInput::new("corp-idp")
            .with_attribute(RemoteAttribute::new("uid", "alice"))
            .with_attribute(RemoteAttribute::new("mail", "Alice@Example.ORG"))
            .with_attribute(RemoteAttribute::multi(
                "memberOf",
                vec!["/staff".to_string(), "/admins".to_string()],
            ))
    }

    fn run(action: &InputAction, input: &RemotelyAuthenticatedInput) -> (MappingResult, RunDiagnostics) {
        let ctx = input_eval_context(input);
        let mut diag = RunDiagnostics::new();
        let result = action.invoke(input, &ctx, "test-profile", &mut diag).unwrap();
        (result, diag)
    }

    #[test]
    fn map_identity_converts_and_tags_values() {
        let action = construct(
            kinds::MAP_IDENTITY,
            &["username", "input.attributes['uid']"],
        )
        .unwrap();
        let input = sample_input();
        let (result, diag) = run(&action, &input);

        assert_eq!(result.identities.len(), 1);
        let mapped = &result.identities[0];
        assert_eq!(mapped.identity.value, "alice");
        assert_eq!(mapped.identity.source_idp.as_deref(), Some("corp-idp"));
        assert_eq!(
            mapped.identity.source_profile.as_deref(),
            Some("test-profile")
        );
        assert_eq!(mapped.effect_mode, IdentityEffectMode::CreateOrUpdate);
        assert!(diag.is_empty());
    }

    #[test]
    fn map_identity_null_expression_is_an_empty_result() {
        let action = construct(
            kinds::MAP_IDENTITY,
            &["username", "input.attributes['missing']"],
        )
        .unwrap();
        let (result, diag) = run(&action, &sample_input());
        assert!(result.is_empty());
        assert!(diag.is_empty());
    }

    #[test]
    fn map_identity_skips_unconvertible_values() {
        let action = construct(kinds::MAP_IDENTITY, &["email", "input.attributes['uid']"])
            .unwrap();
        // "alice" is not an email; the value is skipped with a debug event.
        let (result, diag) = run(&action, &sample_input());
        assert!(result.identities.is_empty());
        assert_eq!(diag.events().len(), 1);
    }

    #[test]
    fn map_identity_optional_parameters() {
        let action = construct(
            kinds::MAP_IDENTITY,
            &["username", "input.attributes['uid']", "", "CREATE_ONLY"],
        )
        .unwrap();
        let (result, _) = run(&action, &sample_input());
        assert_eq!(result.identities[0].effect_mode, IdentityEffectMode::CreateOnly);
        assert!(result.identities[0].credential_requirement.is_none());

        assert!(matches!(
            construct(
                kinds::MAP_IDENTITY,
                &["username", "input.attributes['uid']", "", "upsert"],
            ),
            Err(ConfigError::InvalidEnumToken { .. })
        ));
    }

    #[test]
    fn map_identity_rejects_unknown_type_and_bad_expression() {
        assert!(matches!(
            construct(kinds::MAP_IDENTITY, &["x500", "input.attributes['uid']"]),
            Err(ConfigError::UnknownIdentityType(_))
        ));
        assert!(matches!(
            construct(kinds::MAP_IDENTITY, &["username", "input.attributes["]),
            Err(ConfigError::Expression { .. })
        ));
    }

    #[test]
    fn map_attribute_converts_through_the_type_syntax() {
        let action = construct(
            kinds::MAP_ATTRIBUTE,
            &["email", "/", "input.attributes['mail']", "full", "createOrUpdate"],
        )
        .unwrap();
        let (result, _) = run(&action, &sample_input());

        assert_eq!(result.attributes.len(), 1);
        let attribute = &result.attributes[0].attribute;
        assert_eq!(attribute.name, "email");
        assert_eq!(attribute.values, vec!["alice@example.org"]);
        assert_eq!(attribute.visibility, Visibility::Full);
        assert_eq!(attribute.source_profile.as_deref(), Some("test-profile"));
    }

    #[test]
    fn map_attribute_skips_the_whole_attribute_on_conversion_failure() {
        let action = construct(
            kinds::MAP_ATTRIBUTE,
            &["employeeNumber", "/", "input.attributes['uid']"],
        )
        .unwrap();
        let (result, diag) = run(&action, &sample_input());
        assert!(result.attributes.is_empty());
        assert_eq!(diag.events().len(), 1);
    }

    #[test]
    fn map_group_maps_every_path() {
        let action = construct(
            kinds::MAP_GROUP,
            &["input.attributes['memberOf']", "createGroupIfMissing"],
        )
        .unwrap();
        let (result, _) = run(&action, &sample_input());
        assert_eq!(result.groups.len(), 2);
        assert_eq!(result.groups[0].path, "/staff");
        assert_eq!(
            result.groups[0].effect_mode,
            GroupEffectMode::CreateGroupIfMissing
        );
    }

    #[test]
    fn multi_map_maps_present_attributes_only() {
        let mapping = "uid displayName /\nmail email /\nphone displayName /contact";
        let action = construct(kinds::MULTI_MAP_ATTRIBUTE, &[mapping]).unwrap();
        let (result, diag) = run(&action, &sample_input());

        // "phone" is not asserted; the other two lines map.
        assert_eq!(result.attributes.len(), 2);
        assert_eq!(result.attributes[0].attribute.name, "displayName");
        // Remote values pass through untransformed (only the syntax
        // conversion applies: email lowercases, string does not touch).
        assert_eq!(result.attributes[0].attribute.values, vec!["alice"]);
        assert_eq!(result.attributes[1].attribute.values, vec!["alice@example.org"]);
        assert_eq!(diag.events().len(), 1);
    }

    #[test]
    fn multi_map_rejects_malformed_lines() {
        assert!(matches!(
            construct(kinds::MULTI_MAP_ATTRIBUTE, &["uid displayName"]),
            Err(ConfigError::MalformedMappingLine { line_no: 1, .. })
        ));
        assert!(matches!(
            construct(kinds::MULTI_MAP_ATTRIBUTE, &["uid unknownType /"]),
            Err(ConfigError::UnknownAttributeType(_))
        ));
    }

    #[test]
    fn change_entity_status_schedules_in_the_future() {
        let action = construct(kinds::CHANGE_ENTITY_STATUS, &["DISABLE", "30"]).unwrap();
        let (result, _) = run(&action, &sample_input());
        let change = result.entity_change.unwrap();
        assert_eq!(change.operation, ScheduledOperation::Disable);
        assert!(change.effective_at > Utc::now() + Duration::days(29));

        assert!(matches!(
            construct(kinds::CHANGE_ENTITY_STATUS, &["DISABLE", "-1"]),
            Err(ConfigError::InvalidDays(_))
        ));
        assert!(matches!(
            construct(kinds::CHANGE_ENTITY_STATUS, &["archive", "30"]),
            Err(ConfigError::InvalidEnumToken { .. })
        ));
    }

    #[test]
    fn remove_stale_data_sets_all_three_flags() {
        let action = construct(kinds::REMOVE_STALE_DATA, &[]).unwrap();
        let (result, _) = run(&action, &sample_input());
        assert!(result.clean_stale_attributes);
        assert!(result.clean_stale_groups);
        assert!(result.clean_stale_identities);
        assert!(result.identities.is_empty());
    }

    #[test]
    fn stopper_warns_once_and_contributes_nothing() {
        let action = InputAction::Stopper(BlindStopper::new("map-identity", "boom"));
        let (result, diag) = run(&action, &sample_input());
        assert!(result.is_empty());
        assert_eq!(diag.warning_count(), 1);
        assert_eq!(diag.events().len(), 1);
    }
}
