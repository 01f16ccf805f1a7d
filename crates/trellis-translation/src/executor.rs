//! The two pipeline executors.
//!
//! INPUT runs are additive: every rule whose condition matches contributes
//! a fresh partial result that merges into the accumulator, and nothing
//! short-circuits the pass over the rule list. OUTPUT runs mutate one
//! shared release set in rule order, and only `fail-authentication` stops
//! the pass early.
//!
//! A failing condition or action never fails the run; the rule contributes
//! nothing and the failure is recorded in the run's diagnostics.

use crate::action::{Action, Direction};
use crate::bindings::{input_eval_context, output_eval_context};
use crate::diagnostics::RunDiagnostics;
use crate::error::ExecuteError;
use crate::profile::{Profile, Rule};
use trellis_expr::EvalContext;
use trellis_model::{MappingResult, RemotelyAuthenticatedInput, TranslationInput, TranslationResult};

/// Lifecycle state of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// Not started.
    #[default]
    Pending,
    /// Rules are being evaluated.
    Running,
    /// Every rule was evaluated.
    Completed,
    /// `fail-authentication` ended the run early.
    Aborted,
}

impl RunState {
    /// Checks whether the run has finished, successfully or not.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

/// Outcome of an INPUT run.
#[derive(Debug)]
pub struct InputRunOutcome {
    /// The accumulated proposed changes.
    pub result: MappingResult,
    /// Final run state (INPUT runs always complete).
    pub state: RunState,
    /// Events recorded during the run.
    pub diagnostics: RunDiagnostics,
}

/// Outcome of an OUTPUT run.
#[derive(Debug)]
pub struct OutputRunOutcome {
    /// The transformed release set.
    pub result: TranslationResult,
    /// Final run state.
    pub state: RunState,
    /// Events recorded during the run.
    pub diagnostics: RunDiagnostics,
}

/// Runs an INPUT profile over a remote authentication input.
///
/// ## Errors
///
/// Returns [`ExecuteError::DirectionMismatch`] when handed an OUTPUT
/// profile; everything else degrades per rule.
pub fn execute_input(
    profile: &Profile,
    input: &RemotelyAuthenticatedInput,
) -> Result<InputRunOutcome, ExecuteError> {
    check_direction(profile, Direction::Input)?;
    let ctx = input_eval_context(input);
    let mut diag = RunDiagnostics::new();
    let mut result = MappingResult::new();

    for (index, rule) in profile.rules().iter().enumerate() {
        diag.enter_rule(index);
        if !condition_matches(rule, &ctx, &mut diag) {
            continue;
        }
        let Action::Input(action) = &rule.action else {
            // Load coerces wrong-direction actions to stoppers, so this is
            // only reachable with a hand-assembled profile.
            diag.warn(format!(
                "rule holds an OUTPUT action '{}'; skipped",
                rule.action.kind()
            ));
            continue;
        };
        match action.invoke(input, &ctx, profile.name(), &mut diag) {
            Ok(partial) => result.merge(partial),
            Err(error) => diag.warn(format!(
                "action '{}' failed and contributed nothing: {error}",
                action.kind()
            )),
        }
    }

    Ok(InputRunOutcome {
        result,
        state: RunState::Completed,
        diagnostics: diag,
    })
}

/// Runs an OUTPUT profile over a resolved local entity.
///
/// ## Errors
///
/// Returns [`ExecuteError::DirectionMismatch`] when handed an INPUT
/// profile; everything else degrades per rule, except the abort raised by
/// `fail-authentication`.
pub fn execute_output(
    profile: &Profile,
    input: &TranslationInput,
) -> Result<OutputRunOutcome, ExecuteError> {
    check_direction(profile, Direction::Output)?;
    let ctx = output_eval_context(input);
    let mut diag = RunDiagnostics::new();
    let mut result = TranslationResult::from_input(input);
    let mut state = RunState::Completed;

    for (index, rule) in profile.rules().iter().enumerate() {
        diag.enter_rule(index);
        if !condition_matches(rule, &ctx, &mut diag) {
            continue;
        }
        let Action::Output(action) = &rule.action else {
            diag.warn(format!(
                "rule holds an INPUT action '{}'; skipped",
                rule.action.kind()
            ));
            continue;
        };
        if let Err(error) = action.apply(&ctx, profile.name(), &mut result, &mut diag) {
            diag.warn(format!(
                "action '{}' failed and changed nothing: {error}",
                action.kind()
            ));
            continue;
        }
        if result.is_aborted() {
            state = RunState::Aborted;
            break;
        }
    }

    Ok(OutputRunOutcome {
        result,
        state,
        diagnostics: diag,
    })
}

fn check_direction(profile: &Profile, expected: Direction) -> Result<(), ExecuteError> {
    if profile.direction() == expected {
        Ok(())
    } else {
        Err(ExecuteError::DirectionMismatch {
            profile: profile.name().to_string(),
            actual: profile.direction(),
            expected,
        })
    }
}

/// Evaluates a rule condition; an erroring condition reads as "not
/// triggered" and is recorded.
fn condition_matches(rule: &Rule, ctx: &EvalContext, diag: &mut RunDiagnostics) -> bool {
    match rule.condition.evaluate_bool(ctx) {
        Ok(matched) => matched,
        Err(error) => {
            diag.warn(format!(
                "condition '{}' failed; rule not triggered: {error}",
                rule.condition.source()
            ));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::TypeResolvers;
    use crate::profile::{ActionConfig, ProfileConfig, RuleConfig};
    use crate::registry::ActionTypeRegistry;
    use trellis_model::{
        Attribute, AttributeType, Identity, RemoteAttribute, StaticAttributeTypeResolver,
        StaticIdentityTypeResolver, ValueSyntax,
    };

    fn load(name: &str, direction: Direction, rules: Vec<RuleConfig>) -> Profile {
        let attributes = StaticAttributeTypeResolver::new()
            .with_type(AttributeType::new("email", ValueSyntax::Email))
            .with_type(AttributeType::new("displayName", ValueSyntax::String));
        let identities = StaticIdentityTypeResolver::with_builtin_types();
        let resolvers = TypeResolvers {
            attribute_types: &attributes,
            identity_types: &identities,
        };
        Profile::load(
            ProfileConfig {
                name: name.to_string(),
                direction,
                rules,
            },
            &ActionTypeRegistry::builtin(),
            &resolvers,
        )
    }

    fn remote_input() -> RemotelyAuthenticatedInput {
        RemotelyAuthenticatedInput::new("corp-idp")
            .with_attribute(RemoteAttribute::new("uid", "alice"))
            .with_attribute(RemoteAttribute::new("mail", "Alice@Example.ORG"))
            .with_group("/staff")
    }

    #[test]
    fn input_run_is_additive_with_no_early_exit() {
        let profile = load(
            "corp-in",
            Direction::Input,
            vec![
                RuleConfig::new(
                    "true",
                    ActionConfig::new("map-identity", &["username", "input.attributes['uid']"]),
                ),
                // Not triggered: contributes nothing, stops nothing.
                RuleConfig::new(
                    "input.idp == 'other-idp'",
                    ActionConfig::new("remove-stale-data", &[]),
                ),
                RuleConfig::new(
                    "contains(input.groups, '/staff')",
                    ActionConfig::new(
                        "map-attribute",
                        &["email", "/", "input.attributes['mail']"],
                    ),
                ),
            ],
        );

        let outcome = execute_input(&profile, &remote_input()).unwrap();
        assert_eq!(outcome.state, RunState::Completed);
        assert_eq!(outcome.result.identities.len(), 1);
        assert_eq!(outcome.result.attributes.len(), 1);
        assert!(!outcome.result.clean_stale_attributes);
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn erroring_condition_skips_only_its_rule() {
        let profile = load(
            "corp-in",
            Direction::Input,
            vec![
                // `input.idp` is a string, not a boolean: evaluation error.
                RuleConfig::new("input.idp", ActionConfig::new("remove-stale-data", &[])),
                RuleConfig::new(
                    "true",
                    ActionConfig::new("map-identity", &["username", "input.attributes['uid']"]),
                ),
            ],
        );

        let outcome = execute_input(&profile, &remote_input()).unwrap();
        assert!(!outcome.result.clean_stale_attributes);
        assert_eq!(outcome.result.identities.len(), 1);
        assert_eq!(outcome.diagnostics.warning_count(), 1);
        assert_eq!(outcome.diagnostics.events()[0].rule, Some(0));
    }

    #[test]
    fn stopper_rule_warns_but_the_run_completes() {
        let profile = load(
            "corp-in",
            Direction::Input,
            vec![
                RuleConfig::new(
                    "true",
                    ActionConfig::new("map-identity", &["no-such-type", "input.idp"]),
                ),
                RuleConfig::new("true", ActionConfig::new("remove-stale-data", &[])),
            ],
        );

        let outcome = execute_input(&profile, &remote_input()).unwrap();
        assert_eq!(outcome.state, RunState::Completed);
        assert!(outcome.result.clean_stale_identities);
        assert_eq!(outcome.diagnostics.warning_count(), 1);
    }

    #[test]
    fn output_abort_skips_remaining_rules() {
        let profile = load(
            "corp-out",
            Direction::Output,
            vec![
                RuleConfig::new(
                    "true",
                    ActionConfig::new("create-attribute", &["first", "'1'"]),
                ),
                RuleConfig::new(
                    "true",
                    ActionConfig::new("fail-authentication", &["policy violated"]),
                ),
                RuleConfig::new(
                    "true",
                    ActionConfig::new("create-attribute", &["second", "'2'"]),
                ),
            ],
        );

        let input = TranslationInput::new().with_identity(Identity::new("username", "alice"));
        let outcome = execute_output(&profile, &input).unwrap();
        assert_eq!(outcome.state, RunState::Aborted);
        assert!(outcome.state.is_terminal());
        assert_eq!(outcome.result.abort_message(), Some("policy violated"));
        assert!(outcome.result.has_attribute("first"));
        assert!(!outcome.result.has_attribute("second"));
    }

    #[test]
    fn output_rules_apply_in_order() {
        let profile = load(
            "corp-out",
            Direction::Output,
            vec![
                RuleConfig::new("true", ActionConfig::new("filter-attribute", &["email"])),
                RuleConfig::new(
                    "true",
                    ActionConfig::new("unfilter-attribute", &["^email$"]),
                ),
            ],
        );

        let input = TranslationInput::new().with_attribute(
            Attribute::new("email", "/").with_values(vec!["a@example.org".to_string()]),
        );
        let outcome = execute_output(&profile, &input).unwrap();
        assert_eq!(outcome.state, RunState::Completed);
        assert!(outcome.result.has_attribute("email"));
    }

    #[test]
    fn direction_mismatch_is_an_executor_error() {
        let profile = load("corp-out", Direction::Output, Vec::new());
        let err = execute_input(&profile, &remote_input()).unwrap_err();
        assert!(matches!(err, ExecuteError::DirectionMismatch { .. }));

        let profile = load("corp-in", Direction::Input, Vec::new());
        assert!(execute_output(&profile, &TranslationInput::new()).is_err());
    }
}
