//! Condition evaluation failures.
//!
//! [`ExprError`] is what goes wrong inside an expression. [`ConditionError`] is what the rest of
//! the crate sees: the failure pinned to a marker, a condition text and the context it was
//! evaluated in, ready to be rendered with `miette`.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use thiserror::Error;

use crate::condition::ast::Span;
use crate::condition::context::{ConditionContext, ContextId};
use crate::repr::SafeRepr;

/// A failure raised while parsing or evaluating a single expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("SyntaxError: {message}")]
    Syntax { message: String, span: Span },

    #[error("NameError: name '{name}' is not defined")]
    Name { name: String, span: Span },

    #[error("AttributeError: '{type_name}' object has no attribute '{attr}'")]
    Attribute {
        type_name: String,
        attr: String,
        span: Span,
    },

    #[error("TypeError: {message}")]
    Type { message: String, span: Span },

    #[error("you need to specify reason=STRING when using booleans as conditions.")]
    MissingReason { span: Span },

    #[error("{kind}: {message}")]
    Panic {
        kind: String,
        message: String,
        span: Span,
    },
}

impl ExprError {
    pub fn span(&self) -> Span {
        match self {
            ExprError::Syntax { span, .. }
            | ExprError::Name { span, .. }
            | ExprError::Attribute { span, .. }
            | ExprError::Type { span, .. }
            | ExprError::MissingReason { span }
            | ExprError::Panic { span, .. } => *span,
        }
    }

    /// Exception-style kind, e.g. `NameError`.
    pub fn kind(&self) -> &str {
        match self {
            ExprError::Syntax { .. } => "SyntaxError",
            ExprError::Name { .. } => "NameError",
            ExprError::Attribute { .. } => "AttributeError",
            ExprError::Type { .. } => "TypeError",
            ExprError::MissingReason { .. } => "ValueError",
            ExprError::Panic { kind, .. } => kind,
        }
    }
}

/// A condition failed to evaluate. Attributable to one marker on one item.
#[derive(Debug, Clone)]
pub struct ConditionError {
    marker: String,
    condition: String,
    context: String,
    context_id: ContextId,
    error: ExprError,
    rendered: String,
    src: Arc<NamedSource<String>>,
}

impl ConditionError {
    pub fn new(condition: &str, ctx: &ConditionContext, error: ExprError) -> Self {
        let rendered = SafeRepr::default().display(&error);
        Self {
            marker: "condition".to_string(),
            condition: condition.to_string(),
            context: ctx.name().to_string(),
            context_id: ctx.id(),
            src: Arc::new(NamedSource::new(
                format!("{} condition", ctx.name()),
                condition.to_string(),
            )),
            error,
            rendered,
        }
    }

    /// Attributes the failure to a marker (`skipif`, `xfail`).
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn condition(&self) -> &str {
        &self.condition
    }

    /// Name of the context the condition was evaluated in.
    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    pub fn error(&self) -> &ExprError {
        &self.error
    }

    /// The triggering error, rendered through [`SafeRepr`].
    pub fn rendered_error(&self) -> &str {
        &self.rendered
    }

    /// Multi-line report text with a caret under the failing sub-expression.
    pub fn report_text(&self) -> String {
        let span = self.error.span();
        let caret_at = self.condition[..span.start.min(self.condition.len())]
            .chars()
            .count();
        format!(
            "Error evaluating '{}' condition\n    {}\n    {}^\n{}",
            self.marker,
            self.condition,
            " ".repeat(caret_at),
            self.rendered
        )
    }
}

impl fmt::Display for ConditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error evaluating '{}' condition '{}' in {} ({}): {}",
            self.marker, self.condition, self.context, self.context_id, self.rendered
        )
    }
}

impl std::error::Error for ConditionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl Diagnostic for ConditionError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new("verdict::condition") as Box<dyn fmt::Display + 'a>)
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match &self.error {
            ExprError::Name { name, .. } => {
                format!("bind '{}' in the namespace of {}", name, self.context)
            }
            ExprError::MissingReason { .. } => {
                "pass reason=\"...\" alongside the condition".to_string()
            }
            _ => return None,
        };
        Some(Box::new(help) as Box<dyn fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        Some(self.src.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.error.span();
        let start = span.start.min(self.condition.len());
        let label = LabeledSpan::new(Some(self.error.kind().to_string()), start, span.label_len());
        Some(Box::new(std::iter::once(label)))
    }
}
