//! Skip / xfail marker decisions.
//!
//! ## Decision table
//!
//! | skip path     | mode       | xfail path      | decision          |
//! |---------------|------------|-----------------|-------------------|
//! | applies       | any        | (not evaluated) | `Skip`            |
//! | does not apply| `RunXfail` | (not evaluated) | `Run`             |
//! | does not apply| `Normal`   | applies         | `ExpectedFailure` |
//! | does not apply| `Normal`   | does not apply  | `Run`             |
//!
//! The skip path never looks at the run mode. `RunXfail` exists to turn expected-failure
//! semantics off and must not change whether, why, or where an item is skipped.
//!
//! A decision (or the condition error that prevented one) is attached to its item once;
//! asking again returns what was attached without touching the evaluator.

pub mod outcome;

use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::condition::ast::Span;
use crate::condition::{
    Condition, ConditionContext, ConditionError, ConditionEvaluator, ExprError,
};
use crate::config::{RunMode, RunOptions};
use crate::location::{LocationResolver, RawFrame, ReportLocation};

pub use self::outcome::{apply, Failure, ReportOutcome, RunOutcome};

const UNCONDITIONAL_SKIP: &str = "unconditional skip";

/// A declarative annotation on a test item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Marker {
    Skip {
        #[serde(default)]
        reason: Option<String>,
    },
    SkipIf {
        #[serde(default)]
        conditions: Vec<Condition>,
        #[serde(default)]
        reason: Option<String>,
    },
    Xfail {
        #[serde(default)]
        conditions: Vec<Condition>,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        strict: Option<bool>,
        #[serde(default = "default_run")]
        run: bool,
        #[serde(default)]
        raises: Option<Vec<String>>,
    },
}

fn default_run() -> bool {
    true
}

impl Marker {
    pub fn skip(reason: impl Into<String>) -> Self {
        Marker::Skip {
            reason: Some(reason.into()),
        }
    }

    pub fn skipif(condition: impl Into<Condition>, reason: Option<&str>) -> Self {
        Marker::SkipIf {
            conditions: vec![condition.into()],
            reason: reason.map(str::to_string),
        }
    }

    /// An xfail marker with no conditions, non-strict unless the run defaults say otherwise.
    pub fn xfail(reason: impl Into<String>) -> Self {
        Marker::Xfail {
            conditions: Vec::new(),
            reason: Some(reason.into()),
            strict: None,
            run: true,
            raises: None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Marker::Skip { .. } => "skip",
            Marker::SkipIf { .. } => "skipif",
            Marker::Xfail { .. } => "xfail",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipDecision {
    pub reason: String,
    /// Always the item's own location.
    pub location: ReportLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XfailDecision {
    pub reason: String,
    pub strict: bool,
    /// `false` means the item is reported as xfailed without running.
    pub run: bool,
    /// Failure kinds that count as the expected failure; `None` accepts any.
    pub raises: Option<Vec<String>>,
}

/// Final disposition of a test item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum MarkerDecision {
    Run,
    Skip(SkipDecision),
    ExpectedFailure(XfailDecision),
}

/// A collected test item as seen by the marker machinery.
#[derive(Debug)]
pub struct TestItem {
    nodeid: String,
    frame: RawFrame,
    context: Arc<ConditionContext>,
    markers: Vec<Marker>,
    decision: OnceCell<Result<MarkerDecision, ConditionError>>,
}

impl TestItem {
    pub fn new(
        nodeid: impl Into<String>,
        frame: RawFrame,
        context: Arc<ConditionContext>,
        markers: Vec<Marker>,
    ) -> Self {
        Self {
            nodeid: nodeid.into(),
            frame,
            context,
            markers,
            decision: OnceCell::new(),
        }
    }

    pub fn nodeid(&self) -> &str {
        &self.nodeid
    }

    pub fn frame(&self) -> &RawFrame {
        &self.frame
    }

    pub fn context(&self) -> &ConditionContext {
        &self.context
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// The attached decision, if [`MarkerDecisionEngine::decide`] has run.
    pub fn decision(&self) -> Option<Result<&MarkerDecision, &ConditionError>> {
        self.decision.get().map(Result::as_ref)
    }
}

/// Orchestrates evaluation and location resolution into a [`MarkerDecision`].
#[derive(Debug)]
pub struct MarkerDecisionEngine {
    evaluator: ConditionEvaluator,
    resolver: LocationResolver,
    xfail_strict: bool,
}

impl MarkerDecisionEngine {
    pub fn new(
        evaluator: ConditionEvaluator,
        resolver: LocationResolver,
        options: &RunOptions,
    ) -> Self {
        Self {
            evaluator,
            resolver,
            xfail_strict: options.xfail_strict,
        }
    }

    pub fn evaluator(&self) -> &ConditionEvaluator {
        &self.evaluator
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    /// Decides `item`, attaching the result on first call.
    ///
    /// The mode only matters on the first call; afterwards the attached decision is returned.
    pub fn decide<'i>(
        &self,
        item: &'i TestItem,
        mode: RunMode,
    ) -> Result<&'i MarkerDecision, &'i ConditionError> {
        item.decision
            .get_or_init(|| self.compute(item, mode))
            .as_ref()
    }

    fn compute(&self, item: &TestItem, mode: RunMode) -> Result<MarkerDecision, ConditionError> {
        let skipped = self.evaluate_skip_marks(item).inspect_err(|err| {
            tracing::warn!(nodeid = item.nodeid(), error = %err, "skip condition failed");
        })?;

        let decision = match (skipped, mode) {
            (Some(skip), _) => MarkerDecision::Skip(skip),
            (None, RunMode::RunXfail) => MarkerDecision::Run,
            (None, RunMode::Normal) => match self.evaluate_xfail_marks(item).inspect_err(|err| {
                tracing::warn!(nodeid = item.nodeid(), error = %err, "xfail condition failed");
            })? {
                Some(xfail) => MarkerDecision::ExpectedFailure(xfail),
                None => MarkerDecision::Run,
            },
        };
        tracing::debug!(nodeid = item.nodeid(), ?decision, "marker decision");
        Ok(decision)
    }

    /// Conditional skips are considered before unconditional ones.
    fn evaluate_skip_marks(&self, item: &TestItem) -> Result<Option<SkipDecision>, ConditionError> {
        for marker in item.markers() {
            let Marker::SkipIf { conditions, reason } = marker else {
                continue;
            };
            if conditions.is_empty() {
                return Ok(Some(self.skip(item, reason.clone().unwrap_or_default())));
            }
            if let Some(reason) = self.first_true(item, marker, conditions, reason.as_deref())? {
                return Ok(Some(self.skip(item, reason)));
            }
        }

        let unconditional = item.markers().iter().find_map(|marker| match marker {
            Marker::Skip { reason } => Some(
                reason
                    .clone()
                    .unwrap_or_else(|| UNCONDITIONAL_SKIP.to_string()),
            ),
            _ => None,
        });
        Ok(unconditional.map(|reason| self.skip(item, reason)))
    }

    fn evaluate_xfail_marks(
        &self,
        item: &TestItem,
    ) -> Result<Option<XfailDecision>, ConditionError> {
        for marker in item.markers() {
            let Marker::Xfail {
                conditions,
                reason,
                strict,
                run,
                raises,
            } = marker
            else {
                continue;
            };
            let decided = |reason: String| XfailDecision {
                reason,
                strict: strict.unwrap_or(self.xfail_strict),
                run: *run,
                raises: raises.clone(),
            };
            if conditions.is_empty() {
                return Ok(Some(decided(reason.clone().unwrap_or_default())));
            }
            if let Some(reason) = self.first_true(item, marker, conditions, reason.as_deref())? {
                return Ok(Some(decided(reason)));
            }
        }
        Ok(None)
    }

    /// The reason of the first condition that holds, if any.
    fn first_true(
        &self,
        item: &TestItem,
        marker: &Marker,
        conditions: &[Condition],
        reason: Option<&str>,
    ) -> Result<Option<String>, ConditionError> {
        for condition in conditions {
            let reason = match (reason, condition) {
                (Some(reason), _) => reason.to_string(),
                (None, Condition::Expr(text)) => format!("condition: {}", text),
                (None, Condition::Bool(_)) => {
                    let text = condition.to_string();
                    let span = Span::covering(&text);
                    return Err(ConditionError::new(
                        &text,
                        item.context(),
                        ExprError::MissingReason { span },
                    )
                    .with_marker(marker.name()));
                }
            };
            let holds = self
                .evaluator
                .evaluate(condition, item.context())
                .map_err(|err| err.with_marker(marker.name()))?;
            if holds {
                return Ok(Some(reason));
            }
        }
        Ok(None)
    }

    fn skip(&self, item: &TestItem, reason: String) -> SkipDecision {
        SkipDecision {
            reason,
            location: self.resolver.resolve(item.frame()),
        }
    }
}
