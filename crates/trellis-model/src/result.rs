//! Pipeline result accumulators.
//!
//! [`MappingResult`] is the additive accumulator an INPUT profile builds by
//! merging every triggered rule's fresh partial result. [`TranslationResult`]
//! is the shared, in-place-mutated release set an OUTPUT profile transforms
//! rule by rule. Both live for exactly one authentication event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attribute::Attribute;
use crate::context::TranslationInput;
use crate::identity::Identity;

// ============================================================================
// Effect Modes
// ============================================================================

/// Normalizes a configured enum token: case- and separator-insensitive, so
/// `createOrUpdate`, `CREATE_OR_UPDATE` and `create-or-update` all match.
fn normalize_token(token: &str) -> String {
    token
        .trim()
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// How a mapped attribute interacts with an existing local attribute of the
/// same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeEffectMode {
    /// Create the attribute only when absent; never touch an existing one.
    CreateOnly,
    /// Update an existing attribute only; never create one.
    UpdateOnly,
    /// Create when absent, update when present.
    #[default]
    CreateOrUpdate,
}

impl AttributeEffectMode {
    /// Parses a configured effect-mode token.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match normalize_token(token).as_str() {
            "createonly" => Some(Self::CreateOnly),
            "updateonly" => Some(Self::UpdateOnly),
            "createorupdate" => Some(Self::CreateOrUpdate),
            _ => None,
        }
    }
}

/// How a mapped identity interacts with an existing local identity of the
/// same type and comparable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityEffectMode {
    /// Create the identity only when absent.
    CreateOnly,
    /// Update (re-tag) an existing identity only.
    UpdateOnly,
    /// Create when absent, update when present.
    #[default]
    CreateOrUpdate,
}

impl IdentityEffectMode {
    /// Parses a configured effect-mode token.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match normalize_token(token).as_str() {
            "createonly" => Some(Self::CreateOnly),
            "updateonly" => Some(Self::UpdateOnly),
            "createorupdate" => Some(Self::CreateOrUpdate),
            _ => None,
        }
    }
}

/// How a mapped group membership interacts with the local group tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupEffectMode {
    /// Only add membership in groups that already exist locally.
    #[default]
    RequireExistingGroup,
    /// Create the group (and missing parents) when absent.
    CreateGroupIfMissing,
}

impl GroupEffectMode {
    /// Parses a configured group effect-mode token.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match normalize_token(token).as_str() {
            "requireexistinggroup" => Some(Self::RequireExistingGroup),
            "creategroupifmissing" => Some(Self::CreateGroupIfMissing),
            _ => None,
        }
    }
}

// ============================================================================
// Mapped Items (INPUT direction)
// ============================================================================

/// A proposed local identity change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedIdentity {
    /// How the identity interacts with an existing local one.
    pub effect_mode: IdentityEffectMode,
    /// The identity, already converted to canonical form and tagged with
    /// its source idp and profile.
    pub identity: Identity,
    /// Credential requirement to associate when the identity creates a new
    /// local entity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_requirement: Option<String>,
}

/// A proposed local attribute change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedAttribute {
    /// How the attribute interacts with an existing local one.
    pub effect_mode: AttributeEffectMode,
    /// The attribute, values already converted to the target syntax.
    pub attribute: Attribute,
}

/// A proposed local group membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedGroup {
    /// Full group path.
    pub path: String,
    /// Whether a missing group may be created.
    pub effect_mode: GroupEffectMode,
    /// Identity provider the membership came from.
    pub source_idp: String,
    /// Translation profile that mapped the membership.
    pub source_profile: String,
}

/// Scheduled entity state operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduledOperation {
    /// Disable the entity.
    Disable,
    /// Remove the entity.
    Remove,
}

impl ScheduledOperation {
    /// Parses a configured operation token.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match normalize_token(token).as_str() {
            "disable" => Some(Self::Disable),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }
}

/// A scheduled change of the local entity's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityChange {
    /// The operation to apply.
    pub operation: ScheduledOperation,
    /// When the operation becomes effective.
    pub effective_at: DateTime<Utc>,
}

// ============================================================================
// Mapping Result (INPUT accumulator)
// ============================================================================

/// The cumulative result of an INPUT profile run.
///
/// Merging is pure append: the accumulator never deduplicates; an action
/// that needs dedup performs it before contributing. The store-application
/// layer consuming this result interprets the effect modes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingResult {
    /// Proposed identities.
    pub identities: Vec<MappedIdentity>,
    /// Proposed attributes.
    pub attributes: Vec<MappedAttribute>,
    /// Proposed group memberships.
    pub groups: Vec<MappedGroup>,
    /// At most one scheduled entity state change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_change: Option<EntityChange>,
    /// Remove local attributes no longer asserted by this idp.
    pub clean_stale_attributes: bool,
    /// Remove local group memberships no longer asserted by this idp.
    pub clean_stale_groups: bool,
    /// Remove local identities no longer asserted by this idp.
    pub clean_stale_identities: bool,
}

impl MappingResult {
    /// Creates an empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges another partial result into this one.
    ///
    /// List fields append; the stale flags OR together; a later
    /// `entity_change` replaces an earlier one (the result carries at most
    /// one).
    pub fn merge(&mut self, other: Self) {
        self.identities.extend(other.identities);
        self.attributes.extend(other.attributes);
        self.groups.extend(other.groups);
        if other.entity_change.is_some() {
            self.entity_change = other.entity_change;
        }
        self.clean_stale_attributes |= other.clean_stale_attributes;
        self.clean_stale_groups |= other.clean_stale_groups;
        self.clean_stale_identities |= other.clean_stale_identities;
    }

    /// Checks whether the result proposes no change at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
            && self.attributes.is_empty()
            && self.groups.is_empty()
            && self.entity_change.is_none()
            && !self.clean_stale_attributes
            && !self.clean_stale_groups
            && !self.clean_stale_identities
    }
}

// ============================================================================
// Translation Result (OUTPUT accumulator)
// ============================================================================

/// The release set an OUTPUT profile transforms in place.
///
/// Seeded from the resolved local entity; filter actions remove, create
/// actions append, and `fail-authentication` marks the whole run aborted.
/// Attributes removed by a filter are retained in a side list so a later
/// `unfilter-attribute` can re-admit them; the retained superset is
/// discarded with the result when the run ends.
#[derive(Debug, Clone, Default)]
pub struct TranslationResult {
    attributes: Vec<Attribute>,
    identities: Vec<Identity>,
    attributes_to_persist: Vec<Attribute>,
    identities_to_persist: Vec<Identity>,
    filtered_attributes: Vec<Attribute>,
    aborted: Option<String>,
}

impl TranslationResult {
    /// Seeds the release set from the resolved local entity.
    #[must_use]
    pub fn from_input(input: &TranslationInput) -> Self {
        Self {
            attributes: input.attributes.clone(),
            identities: input.identities.clone(),
            ..Self::default()
        }
    }

    /// Attributes currently scheduled for release.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Identities currently scheduled for release.
    #[must_use]
    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    /// Released attributes that must also be written back to the store.
    #[must_use]
    pub fn attributes_to_persist(&self) -> &[Attribute] {
        &self.attributes_to_persist
    }

    /// Released identities that must also be written back to the store.
    #[must_use]
    pub fn identities_to_persist(&self) -> &[Identity] {
        &self.identities_to_persist
    }

    /// Checks whether an attribute with the given name is in the release set.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    /// Appends a release-only (transient) attribute.
    pub fn add_attribute(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    /// Appends an attribute to both the release set and the persist list.
    pub fn add_persistent_attribute(&mut self, attribute: Attribute) {
        self.attributes_to_persist.push(attribute.clone());
        self.attributes.push(attribute);
    }

    /// Appends a release-only (transient) identity.
    pub fn add_identity(&mut self, identity: Identity) {
        self.identities.push(identity);
    }

    /// Appends an identity to both the release set and the persist list.
    pub fn add_persisted_identity(&mut self, identity: Identity) {
        self.identities_to_persist.push(identity.clone());
        self.identities.push(identity);
    }

    /// Removes matching attributes from the release set (and the persist
    /// list), retaining them for a later unfilter. Returns how many were
    /// removed.
    pub fn remove_attributes(&mut self, matches: impl Fn(&Attribute) -> bool) -> usize {
        let mut removed = 0;
        let mut kept = Vec::with_capacity(self.attributes.len());
        for attribute in self.attributes.drain(..) {
            if matches(&attribute) {
                removed += 1;
                self.filtered_attributes.push(attribute);
            } else {
                kept.push(attribute);
            }
        }
        self.attributes = kept;
        self.attributes_to_persist.retain(|a| !matches(a));
        removed
    }

    /// Removes the values of the named attribute for which `matches` is
    /// true; an attribute left with no values is dropped from the release
    /// set (retained for unfilter). Returns how many values were removed.
    pub fn remove_attribute_values(
        &mut self,
        name: &str,
        matches: impl Fn(&str) -> bool,
    ) -> usize {
        let mut removed = 0;
        for attribute in self
            .attributes
            .iter_mut()
            .chain(self.attributes_to_persist.iter_mut())
            .filter(|a| a.name == name)
        {
            let before = attribute.values.len();
            attribute.values.retain(|v| !matches(v));
            removed += before - attribute.values.len();
        }
        if removed > 0 {
            self.remove_emptied(name);
        }
        removed
    }

    /// Drops emptied instances of the named attribute after value filtering.
    fn remove_emptied(&mut self, name: &str) {
        let mut kept = Vec::with_capacity(self.attributes.len());
        for attribute in self.attributes.drain(..) {
            if attribute.name == name && attribute.values.is_empty() {
                self.filtered_attributes.push(attribute);
            } else {
                kept.push(attribute);
            }
        }
        self.attributes = kept;
        self.attributes_to_persist
            .retain(|a| !(a.name == name && a.values.is_empty()));
    }

    /// Removes matching identities from the release set and the persist
    /// list. Returns how many were removed.
    pub fn remove_identities(&mut self, matches: impl Fn(&Identity) -> bool) -> usize {
        let before = self.identities.len();
        self.identities.retain(|i| !matches(i));
        self.identities_to_persist.retain(|i| !matches(i));
        before - self.identities.len()
    }

    /// Re-admits previously filtered attributes whose name matches,
    /// restoring them to the release set. Returns how many were restored.
    pub fn unfilter_attributes(&mut self, matches: impl Fn(&str) -> bool) -> usize {
        let mut restored = 0;
        let mut still_filtered = Vec::with_capacity(self.filtered_attributes.len());
        for attribute in self.filtered_attributes.drain(..) {
            if matches(&attribute.name) {
                restored += 1;
                self.attributes.push(attribute);
            } else {
                still_filtered.push(attribute);
            }
        }
        self.filtered_attributes = still_filtered;
        restored
    }

    /// Marks the run as a hard authentication failure.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.aborted = Some(message.into());
    }

    /// Checks whether the run was aborted by `fail-authentication`.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// The abort message, when the run was aborted.
    #[must_use]
    pub fn abort_message(&self) -> Option<&str> {
        self.aborted.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapped_attribute(name: &str) -> MappedAttribute {
        MappedAttribute {
            effect_mode: AttributeEffectMode::default(),
            attribute: Attribute::new(name, "/").with_values(vec!["v".to_string()]),
        }
    }

    #[test]
    fn merge_appends_without_dedup() {
        let mut left = MappingResult::new();
        left.attributes.push(mapped_attribute("email"));

        let mut right = MappingResult::new();
        right.attributes.push(mapped_attribute("email"));
        right.clean_stale_groups = true;

        left.merge(right);
        assert_eq!(left.attributes.len(), 2);
        assert!(left.clean_stale_groups);
        assert!(!left.clean_stale_attributes);
    }

    #[test]
    fn merge_keeps_latest_entity_change() {
        let mut left = MappingResult::new();
        left.entity_change = Some(EntityChange {
            operation: ScheduledOperation::Disable,
            effective_at: Utc::now(),
        });

        let mut right = MappingResult::new();
        right.entity_change = Some(EntityChange {
            operation: ScheduledOperation::Remove,
            effective_at: Utc::now(),
        });

        left.merge(right);
        assert_eq!(
            left.entity_change.map(|c| c.operation),
            Some(ScheduledOperation::Remove)
        );

        // Merging an empty result does not erase the change.
        left.merge(MappingResult::new());
        assert!(left.entity_change.is_some());
    }

    #[test]
    fn effect_mode_tokens_parse_across_spellings() {
        assert_eq!(
            AttributeEffectMode::parse("createOrUpdate"),
            Some(AttributeEffectMode::CreateOrUpdate)
        );
        assert_eq!(
            AttributeEffectMode::parse("CREATE_ONLY"),
            Some(AttributeEffectMode::CreateOnly)
        );
        assert_eq!(
            IdentityEffectMode::parse("update-only"),
            Some(IdentityEffectMode::UpdateOnly)
        );
        assert_eq!(
            GroupEffectMode::parse("requireExistingGroup"),
            Some(GroupEffectMode::RequireExistingGroup)
        );
        assert_eq!(AttributeEffectMode::parse("upsert"), None);
    }

    #[test]
    fn filtered_attributes_can_be_unfiltered() {
        let input = TranslationInput::new()
            .with_attribute(Attribute::new("email", "/").with_values(vec!["a@x".to_string()]))
            .with_attribute(Attribute::new("phone", "/").with_values(vec!["555".to_string()]));
        let mut result = TranslationResult::from_input(&input);

        assert_eq!(result.remove_attributes(|a| a.name == "email"), 1);
        assert!(!result.has_attribute("email"));

        assert_eq!(result.unfilter_attributes(|name| name == "email"), 1);
        assert!(result.has_attribute("email"));
        // A second unfilter finds nothing left to restore.
        assert_eq!(result.unfilter_attributes(|name| name == "email"), 0);
    }

    #[test]
    fn value_filtering_drops_emptied_attributes() {
        let input = TranslationInput::new().with_attribute(
            Attribute::new("mail", "/")
                .with_values(vec!["a@corp".to_string(), "a@home".to_string()]),
        );
        let mut result = TranslationResult::from_input(&input);

        assert_eq!(result.remove_attribute_values("mail", |v| v.ends_with("@corp")), 1);
        assert_eq!(result.attributes()[0].values, vec!["a@home"]);

        assert_eq!(result.remove_attribute_values("mail", |_| true), 1);
        assert!(!result.has_attribute("mail"));
        // The emptied attribute is retained and can be unfiltered back.
        assert_eq!(result.unfilter_attributes(|name| name == "mail"), 1);
    }

    #[test]
    fn persist_lists_track_removals() {
        let mut result = TranslationResult::default();
        result.add_persistent_attribute(
            Attribute::new("badge", "/").with_values(vec!["b-1".to_string()]),
        );
        result.add_persisted_identity(Identity::new("username", "alice"));

        assert_eq!(result.attributes_to_persist().len(), 1);
        result.remove_attributes(|a| a.name == "badge");
        assert!(result.attributes_to_persist().is_empty());

        result.remove_identities(|i| i.value == "alice");
        assert!(result.identities_to_persist().is_empty());
        assert!(result.identities().is_empty());
    }
}
