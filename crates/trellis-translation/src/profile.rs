//! Translation profiles: named, ordered rule lists.
//!
//! A profile is loaded once from its persisted form and immutable
//! thereafter; concurrent runs share it behind an `Arc`, and reload means
//! swapping the whole pointer, never mutating a live field.
//!
//! [`Profile::load`] is the single coercion point of the error contract: a
//! rule whose condition or action fails to construct is kept in place as a
//! blind stopper (with one `tracing::warn!` at load time), so one
//! misconfigured rule never takes the rest of the profile down.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::{Action, BlindStopper, Direction, InputAction, OutputAction, TypeResolvers};
use crate::error::ConfigError;
use crate::registry::ActionTypeRegistry;
use trellis_expr::CompiledExpr;

// ============================================================================
// Persisted Form
// ============================================================================

/// Persisted form of one action: kind name plus ordered string parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Action kind name.
    pub kind: String,
    /// Ordered positional parameters.
    #[serde(default)]
    pub parameters: Vec<String>,
}

impl ActionConfig {
    /// Creates an action config.
    #[must_use]
    pub fn new(kind: impl Into<String>, parameters: &[&str]) -> Self {
        Self {
            kind: kind.into(),
            parameters: parameters.iter().map(|p| (*p).to_string()).collect(),
        }
    }
}

/// Persisted form of one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Condition expression source.
    pub condition: String,
    /// The rule's action.
    pub action: ActionConfig,
}

impl RuleConfig {
    /// Creates a rule config.
    #[must_use]
    pub fn new(condition: impl Into<String>, action: ActionConfig) -> Self {
        Self {
            condition: condition.into(),
            action,
        }
    }
}

/// Persisted form of a whole profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Profile name, unique per deployment.
    pub name: String,
    /// Which pipeline the profile runs in.
    pub direction: Direction,
    /// Ordered rules.
    pub rules: Vec<RuleConfig>,
}

// ============================================================================
// Loaded Form
// ============================================================================

/// A loaded rule: compiled condition plus constructed action.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Rule id, assigned at load.
    pub id: Uuid,
    /// Compiled condition.
    pub condition: CompiledExpr,
    /// Constructed action (possibly a blind stopper).
    pub action: Action,
}

/// A loaded, immutable translation profile.
#[derive(Debug, Clone)]
pub struct Profile {
    id: Uuid,
    name: String,
    direction: Direction,
    rules: Vec<Rule>,
}

impl Profile {
    /// Loads a profile from its persisted form.
    ///
    /// Never fails: any [`ConfigError`] raised while compiling a rule's
    /// condition or constructing its action (including an action of the
    /// wrong direction) degrades that rule to a blind stopper and emits one
    /// load-time warning.
    #[must_use]
    pub fn load(
        config: ProfileConfig,
        registry: &ActionTypeRegistry,
        resolvers: &TypeResolvers<'_>,
    ) -> Self {
        let mut rules = Vec::with_capacity(config.rules.len());
        for (index, rule) in config.rules.into_iter().enumerate() {
            rules.push(load_rule(&config.name, index, rule, config.direction, registry, resolvers));
        }
        Self {
            id: Uuid::now_v7(),
            name: config.name,
            direction: config.direction,
            rules,
        }
    }

    /// Profile id, assigned at load.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Profile name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Which pipeline the profile runs in.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// The loaded rules, in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

fn load_rule(
    profile: &str,
    index: usize,
    config: RuleConfig,
    direction: Direction,
    registry: &ActionTypeRegistry,
    resolvers: &TypeResolvers<'_>,
) -> Rule {
    match build_rule(&config, direction, registry, resolvers) {
        Ok(rule) => rule,
        Err(error) => {
            tracing::warn!(
                profile,
                rule = index,
                kind = %config.action.kind,
                %error,
                "rule is misconfigured; degrading it to a blind stopper"
            );
            Rule {
                id: Uuid::now_v7(),
                // The stopper must trip on every run, so the condition is
                // pinned to `true` even when the original failed to compile.
                condition: CompiledExpr::always_true(),
                action: stopper_action(direction, &config.action.kind, &error),
            }
        }
    }
}

fn build_rule(
    config: &RuleConfig,
    direction: Direction,
    registry: &ActionTypeRegistry,
    resolvers: &TypeResolvers<'_>,
) -> Result<Rule, ConfigError> {
    let condition =
        trellis_expr::compile(&config.condition).map_err(|source| ConfigError::Expression {
            parameter: "condition".to_string(),
            source,
        })?;
    let action = Action::construct(
        &config.action.kind,
        &config.action.parameters,
        registry,
        resolvers,
    )?;
    if action.direction() != direction {
        return Err(ConfigError::DirectionMismatch {
            kind: config.action.kind.clone(),
            actual: action.direction(),
            expected: direction,
        });
    }
    Ok(Rule {
        id: Uuid::now_v7(),
        condition,
        action,
    })
}

fn stopper_action(direction: Direction, kind: &str, error: &ConfigError) -> Action {
    let stopper = BlindStopper::new(kind, error.to_string());
    match direction {
        Direction::Input => Action::Input(InputAction::Stopper(stopper)),
        Direction::Output => Action::Output(OutputAction::Stopper(stopper)),
    }
}
