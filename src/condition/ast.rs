//! Syntax tree for condition expressions.

use std::fmt;

use miette::SourceSpan;

use crate::condition::value::Value;

/// Byte range of a node within the condition text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Span covering the whole of `text`.
    pub fn covering(text: &str) -> Self {
        Self::new(0, text.len())
    }

    /// Length for labelling; empty spans still get a one-column caret.
    pub fn label_len(&self) -> usize {
        self.end.saturating_sub(self.start).max(1)
    }
}

impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        (span.start, span.label_len()).into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        };
        f.write_str(op)
    }
}

/// A parsed condition expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value, Span),
    Name(String, Span),
    Attr {
        object: Box<Expr>,
        attr: String,
        span: Span,
    },
    Seq(Vec<Expr>, Span),
    Not(Box<Expr>, Span),
    Neg(Box<Expr>, Span),
    And(Vec<Expr>, Span),
    Or(Vec<Expr>, Span),
    Compare {
        first: Box<Expr>,
        rest: Vec<(CmpOp, Expr)>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, span)
            | Expr::Name(_, span)
            | Expr::Seq(_, span)
            | Expr::Not(_, span)
            | Expr::Neg(_, span)
            | Expr::And(_, span)
            | Expr::Or(_, span) => *span,
            Expr::Attr { span, .. } | Expr::Compare { span, .. } => *span,
        }
    }
}
