//! Expression variable bindings for the two pipeline directions.
//!
//! Both directions expose a single `input` binding so conditions read the
//! same in either profile kind. INPUT rules see the remote assertion;
//! OUTPUT rules see the resolved local entity.

use std::collections::BTreeMap;

use trellis_expr::{EvalContext, Value};
use trellis_model::{RemotelyAuthenticatedInput, TranslationInput};

/// Builds the evaluation context of an INPUT run.
///
/// The `input` binding is a map with:
/// - `idp`: the asserting identity provider's name,
/// - `attributes`: remote attribute name to value list,
/// - `groups`: remote group memberships,
/// - `assertion`: raw assertion fields the protocol adapter exposed.
#[must_use]
pub fn input_eval_context(input: &RemotelyAuthenticatedInput) -> EvalContext {
    let attributes: BTreeMap<String, Value> = input
        .attributes
        .iter()
        .map(|(name, attribute)| (name.clone(), Value::from(attribute.values.clone())))
        .collect();
    let assertion: BTreeMap<String, Value> = input
        .raw_assertion
        .iter()
        .map(|(name, value)| (name.clone(), Value::from(value.clone())))
        .collect();

    let mut root = BTreeMap::new();
    root.insert("idp".to_string(), Value::from(input.idp_name.clone()));
    root.insert("attributes".to_string(), Value::Map(attributes));
    root.insert("groups".to_string(), Value::from(input.groups.clone()));
    root.insert("assertion".to_string(), Value::Map(assertion));

    EvalContext::new().with_binding("input", Value::Map(root))
}

/// Builds the evaluation context of an OUTPUT run.
///
/// The `input` binding is a map with:
/// - `attributes`: local attribute name to value list,
/// - `identities`: identity type name to value list,
/// - `groups`: local group memberships (full paths).
#[must_use]
pub fn output_eval_context(input: &TranslationInput) -> EvalContext {
    let mut attributes: BTreeMap<String, Value> = BTreeMap::new();
    for attribute in &input.attributes {
        attributes.insert(
            attribute.name.clone(),
            Value::from(attribute.values.clone()),
        );
    }

    let mut identities: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for identity in &input.identities {
        identities
            .entry(identity.type_name.clone())
            .or_default()
            .push(Value::from(identity.value.clone()));
    }
    let identities: BTreeMap<String, Value> = identities
        .into_iter()
        .map(|(type_name, values)| (type_name, Value::List(values)))
        .collect();

    let mut root = BTreeMap::new();
    root.insert("attributes".to_string(), Value::Map(attributes));
    root.insert("identities".to_string(), Value::Map(identities));
    root.insert("groups".to_string(), Value::from(input.groups.clone()));

    EvalContext::new().with_binding("input", Value::Map(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_expr::compile;
    use trellis_model::{Attribute, Identity, RemoteAttribute};

    #[test]
    fn input_binding_exposes_the_remote_assertion() {
        let input = RemotelyAuthenticatedInput::new("corp-idp")
            .with_attribute(RemoteAttribute::new("uid", "alice"))
            .with_group("/staff")
            .with_assertion_field("subject-format", "persistent");
        let ctx = input_eval_context(&input);

        assert!(
            compile("input.idp == 'corp-idp' && contains(input.groups, '/staff')")
                .unwrap()
                .evaluate_bool(&ctx)
                .unwrap()
        );
        assert_eq!(
            compile("input.attributes['uid'][0]")
                .unwrap()
                .evaluate(&ctx)
                .unwrap(),
            Value::from("alice")
        );
        assert_eq!(
            compile("input.assertion['subject-format']")
                .unwrap()
                .evaluate(&ctx)
                .unwrap(),
            Value::from("persistent")
        );
    }

    #[test]
    fn output_binding_exposes_the_local_entity() {
        let input = TranslationInput::new()
            .with_identity(Identity::new("username", "alice"))
            .with_attribute(
                Attribute::new("email", "/").with_values(vec!["a@example.org".to_string()]),
            )
            .with_group("/staff");
        let ctx = output_eval_context(&input);

        assert!(
            compile("contains(input.identities['username'], 'alice')")
                .unwrap()
                .evaluate_bool(&ctx)
                .unwrap()
        );
        assert_eq!(
            compile("input.attributes['email'][0]")
                .unwrap()
                .evaluate(&ctx)
                .unwrap(),
            Value::from("a@example.org")
        );
        // Absent data reads as null, never as an error.
        assert_eq!(
            compile("input.attributes['phone']")
                .unwrap()
                .evaluate(&ctx)
                .unwrap(),
            Value::Null
        );
    }
}
