//! Tree-walking evaluation of condition expressions.
//!
//! Names resolve in the module's own namespace first and fall back to the built-in globals.
//! Nothing here is cached; see [`crate::condition::ConditionEvaluator`] for that.

use std::cmp::Ordering;

use crate::condition::ast::{CmpOp, Expr, Span};
use crate::condition::error::ExprError;
use crate::condition::value::{Namespace, Value};

/// Name resolution environment for one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub locals: &'a Namespace,
    pub globals: &'a Namespace,
}

impl<'a> Scope<'a> {
    pub fn new(locals: &'a Namespace, globals: &'a Namespace) -> Self {
        Self { locals, globals }
    }

    pub fn lookup(&self, name: &str) -> Option<&'a Value> {
        self.locals.get(name).or_else(|| self.globals.get(name))
    }
}

pub fn evaluate(expr: &Expr, scope: &Scope<'_>) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(value, _) => Ok(value.clone()),

        Expr::Name(name, span) => scope.lookup(name).cloned().ok_or_else(|| ExprError::Name {
            name: name.clone(),
            span: *span,
        }),

        Expr::Attr { object, attr, span } => {
            let target = evaluate(object, scope)?;
            target
                .attr(attr)
                .cloned()
                .ok_or_else(|| ExprError::Attribute {
                    type_name: target.type_name().to_string(),
                    attr: attr.clone(),
                    span: *span,
                })
        }

        Expr::Seq(items, _) => items
            .iter()
            .map(|item| evaluate(item, scope))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Seq),

        Expr::Not(operand, _) => Ok(Value::Bool(!evaluate(operand, scope)?.truthy())),

        Expr::Neg(operand, span) => negate(evaluate(operand, scope)?, *span),

        // `and` / `or` yield the deciding operand, not a coerced bool.
        Expr::And(operands, _) => {
            let mut last = Value::Bool(true);
            for operand in operands {
                last = evaluate(operand, scope)?;
                if !last.truthy() {
                    break;
                }
            }
            Ok(last)
        }

        Expr::Or(operands, _) => {
            let mut last = Value::Bool(false);
            for operand in operands {
                last = evaluate(operand, scope)?;
                if last.truthy() {
                    break;
                }
            }
            Ok(last)
        }

        Expr::Compare { first, rest, span } => {
            let mut left = evaluate(first, scope)?;
            for (op, rhs) in rest {
                let right = evaluate(rhs, scope)?;
                if !compare(*op, &left, &right, *span)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
    }
}

fn negate(value: Value, span: Span) -> Result<Value, ExprError> {
    match value {
        Value::Int(i) => i.checked_neg().map(Value::Int).ok_or(ExprError::Type {
            message: "integer overflow in unary -".to_string(),
            span,
        }),
        Value::Bool(b) => Ok(Value::Int(-(b as i64))),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(ExprError::Type {
            message: format!("bad operand type for unary -: '{}'", other.type_name()),
            span,
        }),
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value, span: Span) -> Result<bool, ExprError> {
    match op {
        CmpOp::Eq => Ok(left.loose_eq(right)),
        CmpOp::NotEq => Ok(!left.loose_eq(right)),
        CmpOp::In | CmpOp::NotIn => {
            let found = Value::contains(right, left).ok_or_else(|| ExprError::Type {
                message: format!(
                    "argument of type '{}' is not iterable",
                    right.type_name()
                ),
                span,
            })?;
            Ok(found == (op == CmpOp::In))
        }
        CmpOp::Lt | CmpOp::LtE | CmpOp::Gt | CmpOp::GtE => {
            let ordering = left.try_cmp(right).ok_or_else(|| ExprError::Type {
                message: format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    op,
                    left.type_name(),
                    right.type_name()
                ),
                span,
            })?;
            Ok(match op {
                CmpOp::Lt => ordering == Ordering::Less,
                CmpOp::LtE => ordering != Ordering::Greater,
                CmpOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::parser::parse;

    fn eval_with(text: &str, locals: &Namespace) -> Result<Value, ExprError> {
        let globals = Namespace::new();
        evaluate(&parse(text).unwrap(), &Scope::new(locals, &globals))
    }

    #[test]
    fn locals_shadow_globals() {
        let mut locals = Namespace::new();
        locals.insert("skip".to_string(), Value::Bool(false));
        let mut globals = Namespace::new();
        globals.insert("skip".to_string(), Value::Bool(true));
        let scope = Scope::new(&locals, &globals);
        let value = evaluate(&parse("skip").unwrap(), &scope).unwrap();
        assert_eq!(value, Value::Bool(false));
    }

    #[test]
    fn boolean_operators_short_circuit() {
        let locals = Namespace::new();
        assert_eq!(
            eval_with("False and undefined", &locals).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(eval_with("0 or 'x'", &locals).unwrap(), Value::from("x"));
    }

    #[test]
    fn chained_comparison() {
        let locals = Namespace::new();
        assert_eq!(eval_with("1 < 2 <= 2", &locals).unwrap(), Value::Bool(true));
        assert_eq!(eval_with("1 < 2 > 3", &locals).unwrap(), Value::Bool(false));
    }

    #[test]
    fn unorderable_comparison_is_type_error() {
        let locals = Namespace::new();
        let err = eval_with("'a' < 1", &locals).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: '<' not supported between instances of 'str' and 'int'"
        );
    }

    #[test]
    fn undefined_name_carries_its_span() {
        let locals = Namespace::new();
        let err = eval_with("True and missing", &locals).unwrap_err();
        assert_eq!(err.span(), Span::new(9, 16));
    }
}
