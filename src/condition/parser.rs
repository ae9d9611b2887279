//! Condition parser.
//!
//! Converts condition text into an [`Expr`] tree with byte spans. Purely syntactic: names are
//! not resolved here, so a parsed tree can be shared between evaluation contexts.

use pest::error::InputLocation;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::condition::ast::{CmpOp, Expr, Span};
use crate::condition::error::ExprError;
use crate::condition::value::Value;

#[derive(Parser)]
#[grammar = "condition/grammar.pest"]
struct ConditionParser;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parse a condition expression.
pub fn parse(text: &str) -> Result<Expr, ExprError> {
    let mut pairs = ConditionParser::parse(Rule::condition, text).map_err(convert_parse_error)?;
    let condition = pairs
        .next()
        .ok_or_else(|| syntax_error("empty condition", Span::covering(text)))?;
    let expr = condition
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .ok_or_else(|| syntax_error("empty condition", Span::covering(text)))?;
    build(expr)
}

// ============================================================================
// TREE BUILDERS
// ============================================================================

fn build(pair: Pair<Rule>) -> Result<Expr, ExprError> {
    let span = get_span(&pair);

    match pair.as_rule() {
        Rule::expr => build(first_inner(pair)?),

        Rule::or_expr => build_chain(pair, span, Expr::Or),

        Rule::and_expr => build_chain(pair, span, Expr::And),

        Rule::not_expr => {
            let mut inner = pair.into_inner();
            let head = inner.next().ok_or_else(|| syntax_error("empty expression", span))?;
            if head.as_rule() != Rule::not_op {
                return build(head);
            }
            let operand = inner
                .next()
                .ok_or_else(|| syntax_error("expected expression after 'not'", span))?;
            Ok(Expr::Not(Box::new(build(operand)?), span))
        }

        Rule::comparison => {
            let mut inner = pair.into_inner();
            let first = build(
                inner
                    .next()
                    .ok_or_else(|| syntax_error("empty comparison", span))?,
            )?;
            let mut rest = Vec::new();
            while let Some(op) = inner.next() {
                let op = build_cmp_op(op)?;
                let rhs = inner
                    .next()
                    .ok_or_else(|| syntax_error("expected operand after comparison", span))?;
                rest.push((op, build(rhs)?));
            }
            if rest.is_empty() {
                return Ok(first);
            }
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
                span,
            })
        }

        Rule::unary => {
            let mut inner = pair.into_inner();
            let head = inner.next().ok_or_else(|| syntax_error("empty expression", span))?;
            if head.as_rule() != Rule::neg_op {
                return build(head);
            }
            let operand = inner
                .next()
                .ok_or_else(|| syntax_error("expected operand after '-'", span))?;
            Ok(Expr::Neg(Box::new(build(operand)?), span))
        }

        Rule::postfix => {
            let mut inner = pair.into_inner();
            let head = inner.next().ok_or_else(|| syntax_error("empty expression", span))?;
            let mut expr = build(head)?;
            for attr in inner {
                let attr_span = Span::new(span.start, attr.as_span().end());
                expr = Expr::Attr {
                    object: Box::new(expr),
                    attr: attr.as_str().to_string(),
                    span: attr_span,
                };
            }
            Ok(expr)
        }

        Rule::tuple | Rule::list => {
            let items = pair.into_inner().map(build).collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::Seq(items, span))
        }

        Rule::ident => Ok(Expr::Name(pair.as_str().to_string(), span)),

        Rule::none => Ok(Expr::Literal(Value::None, span)),

        Rule::boolean => Ok(Expr::Literal(Value::Bool(pair.as_str() == "True"), span)),

        Rule::int => {
            let text = pair.as_str();
            let value = text
                .parse::<i64>()
                .map_err(|_| syntax_error(format!("integer literal too large: {}", text), span))?;
            Ok(Expr::Literal(Value::Int(value), span))
        }

        Rule::float => {
            let text = pair.as_str();
            let value = text
                .parse::<f64>()
                .map_err(|_| syntax_error(format!("invalid float literal: {}", text), span))?;
            Ok(Expr::Literal(Value::Float(value), span))
        }

        Rule::string => {
            let inner = first_inner(pair)?;
            Ok(Expr::Literal(Value::Str(unescape(inner.as_str())), span))
        }

        rule => Err(syntax_error(format!("unsupported rule: {:?}", rule), span)),
    }
}

/// `a or b or c` / `a and b`: a single operand collapses to itself.
fn build_chain(
    pair: Pair<Rule>,
    span: Span,
    make: fn(Vec<Expr>, Span) -> Expr,
) -> Result<Expr, ExprError> {
    let mut operands = pair
        .into_inner()
        .filter(|p| !matches!(p.as_rule(), Rule::or_op | Rule::and_op))
        .map(build)
        .collect::<Result<Vec<_>, _>>()?;
    if operands.len() == 1 {
        return operands
            .pop()
            .ok_or_else(|| syntax_error("empty expression", span));
    }
    Ok(make(operands, span))
}

fn build_cmp_op(pair: Pair<Rule>) -> Result<CmpOp, ExprError> {
    let span = get_span(&pair);
    let op = first_inner(pair)?;
    match op.as_rule() {
        Rule::eq => Ok(CmpOp::Eq),
        Rule::ne => Ok(CmpOp::NotEq),
        Rule::lt => Ok(CmpOp::Lt),
        Rule::le => Ok(CmpOp::LtE),
        Rule::gt => Ok(CmpOp::Gt),
        Rule::ge => Ok(CmpOp::GtE),
        Rule::in_op => Ok(CmpOp::In),
        Rule::not_in => Ok(CmpOp::NotIn),
        rule => Err(syntax_error(format!("unknown operator: {:?}", rule), span)),
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn first_inner(pair: Pair<Rule>) -> Result<Pair<Rule>, ExprError> {
    let span = get_span(&pair);
    pair.into_inner()
        .next()
        .ok_or_else(|| syntax_error("malformed expression", span))
}

fn get_span(pair: &Pair<Rule>) -> Span {
    Span::new(pair.as_span().start(), pair.as_span().end())
}

fn syntax_error(message: impl Into<String>, span: Span) -> ExprError {
    ExprError::Syntax {
        message: message.into(),
        span,
    }
}

fn unescape(inner: &str) -> String {
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('\\') => result.push('\\'),
            Some('\'') => result.push('\''),
            Some('"') => result.push('"'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}

fn convert_parse_error(error: pest::error::Error<Rule>) -> ExprError {
    let span = match error.location {
        InputLocation::Pos(pos) => Span::new(pos, pos),
        InputLocation::Span((start, end)) => Span::new(start, end),
    };
    let message = match &error.variant {
        pest::error::ErrorVariant::CustomError { message } => message.clone(),
        pest::error::ErrorVariant::ParsingError { .. } => "invalid syntax".to_string(),
    };
    syntax_error(message, span)
}
