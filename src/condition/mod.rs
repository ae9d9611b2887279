//! Skip/xfail condition evaluation.
//!
//! A condition is either a literal boolean or an expression string. Expression strings are
//! evaluated against the namespace of the module that declared the marker, and the result is
//! cached under `(condition text, context identity)`. The text alone is never a cache key:
//! two modules can both say `skipif("skip")` and mean different things.
//!
//! ```rust
//! use verdict::condition::{Condition, ConditionContext, ConditionEvaluator};
//!
//! let evaluator = ConditionEvaluator::new();
//! let a = ConditionContext::new("test_module_1").bind("skip", true);
//! let b = ConditionContext::new("test_module_2").bind("skip", false);
//!
//! assert!(evaluator.evaluate(&Condition::from("skip"), &a).unwrap());
//! assert!(!evaluator.evaluate(&Condition::from("skip"), &b).unwrap());
//! ```

pub mod ast;
pub mod builtins;
pub mod context;
pub mod error;
pub mod eval;
pub mod parser;
pub mod value;

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

pub use self::context::{ConditionContext, ContextId};
pub use self::error::{ConditionError, ExprError};
pub use self::value::{Namespace, Value};

use self::ast::{Expr, Span};
use self::eval::Scope;
use crate::config::RunOptions;
use crate::repr::panic_parts;

/// A marker condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Bool(bool),
    Expr(String),
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Bool(b) => write!(f, "{}", Value::Bool(*b)),
            Condition::Expr(text) => f.write_str(text),
        }
    }
}

impl From<bool> for Condition {
    fn from(b: bool) -> Self {
        Condition::Bool(b)
    }
}

impl From<&str> for Condition {
    fn from(text: &str) -> Self {
        Condition::Expr(text.to_string())
    }
}

impl From<String> for Condition {
    fn from(text: String) -> Self {
        Condition::Expr(text)
    }
}

/// Cache key for evaluated conditions. Both halves are required for uniqueness.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConditionCacheKey {
    pub text: String,
    pub context: ContextId,
}

impl ConditionCacheKey {
    pub fn new(text: &str, context: ContextId) -> Self {
        Self {
            text: normalize(text).to_string(),
            context,
        }
    }
}

/// Counters for cache behaviour, mostly useful in tests and debug logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub evaluations: usize,
}

/// Evaluates marker conditions with per-context caching.
#[derive(Debug)]
pub struct ConditionEvaluator {
    globals: Namespace,
    parsed: RwLock<HashMap<String, Arc<Expr>>>,
    results: RwLock<HashMap<ConditionCacheKey, bool>>,
    hits: AtomicUsize,
    evaluations: AtomicUsize,
}

impl ConditionEvaluator {
    /// Evaluator with built-ins derived from default run options.
    pub fn new() -> Self {
        Self::with_options(&RunOptions::default())
    }

    pub fn with_options(options: &RunOptions) -> Self {
        Self::with_globals(builtins::builtin_namespace(options))
    }

    pub fn with_globals(globals: Namespace) -> Self {
        Self {
            globals,
            parsed: RwLock::new(HashMap::new()),
            results: RwLock::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            evaluations: AtomicUsize::new(0),
        }
    }

    pub fn globals(&self) -> &Namespace {
        &self.globals
    }

    /// Resolves `condition` in `ctx`.
    ///
    /// Booleans pass straight through. Expressions are looked up in the cache under
    /// `(text, ctx.id())` and evaluated on a miss. Failures are not cached.
    pub fn evaluate(
        &self,
        condition: &Condition,
        ctx: &ConditionContext,
    ) -> Result<bool, ConditionError> {
        match condition {
            Condition::Bool(b) => Ok(*b),
            Condition::Expr(text) => self.evaluate_expr(text, ctx),
        }
    }

    pub fn evaluate_expr(
        &self,
        text: &str,
        ctx: &ConditionContext,
    ) -> Result<bool, ConditionError> {
        let key = ConditionCacheKey::new(text, ctx.id());
        if let Some(hit) = read(&self.results).get(&key).copied() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                condition = %key.text,
                context = %ctx,
                result = hit,
                "condition cache hit"
            );
            return Ok(hit);
        }

        let result = self
            .compute(&key.text, ctx)
            .map_err(|err| ConditionError::new(&key.text, ctx, err))?;
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(condition = %key.text, context = %ctx, result, "condition evaluated");
        write(&self.results).insert(key, result);
        Ok(result)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            evaluations: self.evaluations.load(Ordering::Relaxed),
        }
    }

    pub fn clear_cache(&self) {
        write(&self.results).clear();
        write(&self.parsed).clear();
    }

    fn compute(&self, text: &str, ctx: &ConditionContext) -> Result<bool, ExprError> {
        let expr = self.parse_cached(text)?;
        let scope = Scope::new(ctx.namespace(), &self.globals);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| eval::evaluate(&expr, &scope)));
        match outcome {
            Ok(value) => Ok(value?.truthy()),
            Err(payload) => {
                let (kind, message) = panic_parts(payload.as_ref())
                    .unwrap_or_else(|| ("panic".to_string(), "unpresentable panic".to_string()));
                std::mem::forget(payload);
                Err(ExprError::Panic {
                    kind,
                    message,
                    span: Span::covering(text),
                })
            }
        }
    }

    // Parsing is context independent, so the syntax tree may be keyed by text alone.
    fn parse_cached(&self, text: &str) -> Result<Arc<Expr>, ExprError> {
        if let Some(expr) = read(&self.parsed).get(text) {
            return Ok(Arc::clone(expr));
        }
        let expr = Arc::new(parser::parse(text)?);
        write(&self.parsed).insert(text.to_string(), Arc::clone(&expr));
        Ok(expr)
    }
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(text: &str) -> &str {
    text.trim()
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
