use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::condition::value::{Namespace, Value};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`ConditionContext`].
///
/// Allocated once per constructed context and never reused within the process, so two
/// contexts with identical bindings still have distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// The namespace a module declares its markers in.
///
/// Deliberately not `Clone`: a copy would share the id while being a separate object.
/// Share contexts between items with `Arc` instead.
#[derive(Debug)]
pub struct ConditionContext {
    id: ContextId,
    name: String,
    namespace: Namespace,
}

impl ConditionContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_namespace(name, Namespace::new())
    }

    pub fn with_namespace(name: impl Into<String>, namespace: Namespace) -> Self {
        Self {
            id: ContextId::next(),
            name: name.into(),
            namespace,
        }
    }

    /// Adds a binding while building the context.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.namespace.insert(name.into(), value.into());
        self
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.namespace.get(name)
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}

impl fmt::Display for ConditionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}
