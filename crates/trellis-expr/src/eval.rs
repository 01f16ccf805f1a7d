//! Expression evaluation against a read-only variable context.

use std::collections::BTreeMap;

use crate::compile::{BinaryOp, CompiledExpr, Expr};
use crate::error::EvalError;
use crate::value::Value;

/// Read-only named bindings for one evaluation.
///
/// Built per pipeline run from the authentication input (or, for OUTPUT
/// profiles, from the resolved local entity) and shared by reference across
/// every rule of the run. Holds no mutable state.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    bindings: BTreeMap<String, Value>,
}

impl EvalContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding.
    #[must_use]
    pub fn with_binding(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    /// Looks up a binding. Absent bindings read as `Null` during evaluation.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }
}

impl CompiledExpr {
    /// Evaluates the expression against `ctx`.
    ///
    /// ## Errors
    ///
    /// Returns an [`EvalError`] when an operator or builtin is applied to
    /// values of the wrong type. Absent bindings and keys are not errors;
    /// they evaluate to [`Value::Null`].
    pub fn evaluate(&self, ctx: &EvalContext) -> Result<Value, EvalError> {
        eval(&self.root, ctx)
    }

    /// Evaluates the expression as a rule condition.
    ///
    /// `Null` coerces to `false` (an absent attribute simply does not
    /// trigger the rule); any other non-boolean result is an error.
    ///
    /// ## Errors
    ///
    /// Returns [`EvalError::NotABoolean`] for non-boolean, non-null results,
    /// or any underlying evaluation error.
    pub fn evaluate_bool(&self, ctx: &EvalContext) -> Result<bool, EvalError> {
        match self.evaluate(ctx)? {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(EvalError::NotABoolean(other.type_name().to_string())),
        }
    }
}

fn eval(expr: &Expr, ctx: &EvalContext) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Ident(name) => Ok(ctx.get(name).cloned().unwrap_or(Value::Null)),
        Expr::Member { object, field } => member(eval(object, ctx)?, field),
        Expr::Index { object, index } => {
            let container = eval(object, ctx)?;
            let key = eval(index, ctx)?;
            index_into(container, &key)
        }
        Expr::Not(operand) => {
            let truth = truthy(&eval(operand, ctx)?)?;
            Ok(Value::Bool(!truth))
        }
        Expr::Binary { op, left, right } => binary(*op, left, right, ctx),
        Expr::Call { function, args } => call(function, args, ctx),
    }
}

/// Member access. Null propagates so `input.missing.deeper` stays `Null`.
fn member(container: Value, field: &str) -> Result<Value, EvalError> {
    match container {
        Value::Map(mut entries) => Ok(entries.remove(field).unwrap_or(Value::Null)),
        Value::Null => Ok(Value::Null),
        other => Err(EvalError::type_mismatch(format!(
            "cannot access member `{field}` of {}",
            other.type_name()
        ))),
    }
}

/// Bracket indexing: maps by string key, lists by integer position.
fn index_into(container: Value, key: &Value) -> Result<Value, EvalError> {
    match (container, key) {
        (Value::Map(mut entries), Value::Str(name)) => {
            Ok(entries.remove(name).unwrap_or(Value::Null))
        }
        (Value::List(mut items), Value::Int(position)) => {
            let index = usize::try_from(*position).ok();
            Ok(match index {
                Some(i) if i < items.len() => items.swap_remove(i),
                _ => Value::Null,
            })
        }
        (Value::Null, _) => Ok(Value::Null),
        (container, key) => Err(EvalError::type_mismatch(format!(
            "cannot index {} with {}",
            container.type_name(),
            key.type_name()
        ))),
    }
}

fn binary(op: BinaryOp, left: &Expr, right: &Expr, ctx: &EvalContext) -> Result<Value, EvalError> {
    match op {
        // Short-circuiting boolean connectives.
        BinaryOp::And => {
            if !truthy(&eval(left, ctx)?)? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(truthy(&eval(right, ctx)?)?))
        }
        BinaryOp::Or => {
            if truthy(&eval(left, ctx)?)? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(truthy(&eval(right, ctx)?)?))
        }
        BinaryOp::Eq => Ok(Value::Bool(eval(left, ctx)? == eval(right, ctx)?)),
        BinaryOp::NotEq => Ok(Value::Bool(eval(left, ctx)? != eval(right, ctx)?)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            order(op, eval(left, ctx)?, eval(right, ctx)?)
        }
    }
}

/// Ordering comparisons over two ints or two strings.
fn order(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalError> {
    let ordering = match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        _ => {
            return Err(EvalError::type_mismatch(format!(
                "cannot order {} against {}",
                left.type_name(),
                right.type_name()
            )));
        }
    };
    let result = match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::And | BinaryOp::Or => unreachable!(),
    };
    Ok(Value::Bool(result))
}

/// Boolean coercion for conditions and connectives: `Null` is `false`,
/// anything other than a boolean is a type error.
fn truthy(value: &Value) -> Result<bool, EvalError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Null => Ok(false),
        other => Err(EvalError::type_mismatch(format!(
            "expected a boolean, got {}",
            other.type_name()
        ))),
    }
}

fn call(function: &str, args: &[Expr], ctx: &EvalContext) -> Result<Value, EvalError> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(eval(arg, ctx)?);
    }

    match function {
        "contains" => {
            expect_args(function, &values, 2)?;
            let item = values.pop().unwrap_or(Value::Null);
            let collection = values.pop().unwrap_or(Value::Null);
            contains(&collection, &item)
        }
        "length" => {
            expect_args(function, &values, 1)?;
            let value = values.pop().unwrap_or(Value::Null);
            let len = match &value {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Map(entries) => entries.len(),
                Value::Null => 0,
                other => {
                    return Err(EvalError::type_mismatch(format!(
                        "length() does not apply to {}",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::Int(i64::try_from(len).unwrap_or(i64::MAX)))
        }
        "lower" => {
            expect_args(function, &values, 1)?;
            match values.pop().unwrap_or(Value::Null) {
                Value::Str(s) => Ok(Value::Str(s.to_lowercase())),
                Value::Null => Ok(Value::Null),
                other => Err(EvalError::type_mismatch(format!(
                    "lower() does not apply to {}",
                    other.type_name()
                ))),
            }
        }
        // The parser only emits known builtins.
        _ => unreachable!("unknown builtin passed the compiler: {function}"),
    }
}

fn expect_args(function: &str, values: &[Value], expected: usize) -> Result<(), EvalError> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(EvalError::WrongArgCount {
            function: function.to_string(),
            expected,
            actual: values.len(),
        })
    }
}

/// Membership test: list element equality, substring for strings, key
/// presence for maps. `Null` collections contain nothing.
fn contains(collection: &Value, item: &Value) -> Result<Value, EvalError> {
    let result = match (collection, item) {
        (Value::List(items), needle) => items.contains(needle),
        (Value::Str(haystack), Value::Str(needle)) => haystack.contains(needle.as_str()),
        (Value::Map(entries), Value::Str(key)) => entries.contains_key(key),
        (Value::Null, _) => false,
        (collection, item) => {
            return Err(EvalError::type_mismatch(format!(
                "contains() does not apply to ({}, {})",
                collection.type_name(),
                item.type_name()
            )));
        }
    };
    Ok(Value::Bool(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;

    fn input_context() -> EvalContext {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            "uid".to_string(),
            Value::from(vec!["alice".to_string()]),
        );
        attributes.insert(
            "mail".to_string(),
            Value::from(vec!["alice@example.org".to_string()]),
        );
        let mut input = BTreeMap::new();
        input.insert("idp".to_string(), Value::from("corp-idp"));
        input.insert("attributes".to_string(), Value::Map(attributes));
        input.insert(
            "groups".to_string(),
            Value::from(vec!["/staff".to_string(), "/admins".to_string()]),
        );
        EvalContext::new().with_binding("input", Value::Map(input))
    }

    #[test]
    fn looks_up_remote_attribute_values() {
        let expr = compile("input.attributes['uid']").unwrap();
        let value = expr.evaluate(&input_context()).unwrap();
        assert_eq!(value, Value::from(vec!["alice".to_string()]));
    }

    #[test]
    fn absent_attribute_is_null_not_an_error() {
        let expr = compile("input.attributes['employeeNumber']").unwrap();
        assert_eq!(expr.evaluate(&input_context()).unwrap(), Value::Null);
    }

    #[test]
    fn null_propagates_through_access_chains() {
        let expr = compile("input.session.id").unwrap();
        assert_eq!(expr.evaluate(&input_context()).unwrap(), Value::Null);
    }

    #[test]
    fn condition_over_idp_name() {
        let ctx = input_context();
        assert!(compile("input.idp == 'corp-idp'")
            .unwrap()
            .evaluate_bool(&ctx)
            .unwrap());
        assert!(!compile("input.idp == 'other'")
            .unwrap()
            .evaluate_bool(&ctx)
            .unwrap());
    }

    #[test]
    fn null_condition_coerces_to_false() {
        let expr = compile("input.attributes['missing']").unwrap();
        assert!(!expr.evaluate_bool(&input_context()).unwrap());
    }

    #[test]
    fn non_boolean_condition_is_an_error() {
        let expr = compile("input.idp").unwrap();
        assert!(matches!(
            expr.evaluate_bool(&input_context()),
            Err(EvalError::NotABoolean(_))
        ));
    }

    #[test]
    fn connectives_short_circuit_over_null() {
        let ctx = input_context();
        // Right side would be a type error if evaluated.
        let expr = compile("input.idp == 'corp-idp' || length(42) > 0").unwrap();
        assert!(expr.evaluate_bool(&ctx).unwrap());
    }

    #[test]
    fn contains_over_groups_and_strings() {
        let ctx = input_context();
        assert!(compile("contains(input.groups, '/staff')")
            .unwrap()
            .evaluate_bool(&ctx)
            .unwrap());
        assert!(compile("contains(input.idp, 'corp')")
            .unwrap()
            .evaluate_bool(&ctx)
            .unwrap());
        assert!(!compile("contains(input.groups, '/unknown')")
            .unwrap()
            .evaluate_bool(&ctx)
            .unwrap());
    }

    #[test]
    fn length_and_lower_builtins() {
        let ctx = input_context();
        assert!(compile("length(input.groups) == 2")
            .unwrap()
            .evaluate_bool(&ctx)
            .unwrap());
        assert_eq!(
            compile("lower('ALICE')").unwrap().evaluate(&ctx).unwrap(),
            Value::from("alice")
        );
    }

    #[test]
    fn list_indexing_by_position() {
        let ctx = input_context();
        assert_eq!(
            compile("input.groups[0]").unwrap().evaluate(&ctx).unwrap(),
            Value::from("/staff")
        );
        assert_eq!(
            compile("input.groups[9]").unwrap().evaluate(&ctx).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn ordering_comparisons() {
        let ctx = EvalContext::new().with_binding("n", 5i64);
        assert!(compile("n >= 5").unwrap().evaluate_bool(&ctx).unwrap());
        assert!(compile("n < 10").unwrap().evaluate_bool(&ctx).unwrap());
        assert!(matches!(
            compile("n < 'x'").unwrap().evaluate_bool(&ctx),
            Err(EvalError::TypeMismatch(_))
        ));
    }
}
