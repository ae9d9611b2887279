use im::HashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Name bindings visible to a condition expression.
pub type Namespace = HashMap<String, Value>;

/// A value produced or consumed by condition evaluation.
///
/// Namespaces nest through [`Value::Map`], which is how dotted names such as
/// `sys.platform` resolve.
///
/// # Examples
///
/// ```rust
/// use verdict::condition::Value;
/// assert!(Value::from("linux").truthy());
/// assert!(!Value::Seq(vec![]).truthy());
/// assert_eq!(Value::Int(3).type_name(), "int");
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    /// Python-flavoured type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Seq(_) => "tuple",
            Value::Map(_) => "namespace",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Seq(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
        }
    }

    /// Python-style `repr`: like `Display`, but strings are quoted.
    pub fn repr(&self) -> ValueRepr<'_> {
        ValueRepr(self)
    }

    /// Looks up an attribute on a namespace value.
    pub fn attr(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(name),
            _ => None,
        }
    }

    /// Equality with numeric coercion (`1 == 1.0 == True`).
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => match (self, other) {
                (Value::Seq(a), Value::Seq(b)) => {
                    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
                }
                _ => self == other,
            },
        }
    }

    /// Ordering between comparable values; `None` when the pair is unorderable.
    ///
    /// Sequences compare lexicographically, so `(3, 8) < (3, 10)`.
    pub fn try_cmp(&self, other: &Value) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a.partial_cmp(&b);
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Seq(a), Value::Seq(b)) => {
                for (x, y) in a.iter().zip(b) {
                    if x.loose_eq(y) {
                        continue;
                    }
                    return x.try_cmp(y);
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }

    /// Membership test; `None` when `container` does not support `in`.
    pub fn contains(container: &Value, item: &Value) -> Option<bool> {
        match container {
            Value::Seq(items) => Some(items.iter().any(|v| v.loose_eq(item))),
            Value::Str(haystack) => match item {
                Value::Str(needle) => Some(haystack.contains(needle.as_str())),
                _ => None,
            },
            Value::Map(map) => match item {
                Value::Str(key) => Some(map.contains_key(key)),
                _ => None,
            },
            _ => None,
        }
    }

    fn as_number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(*b as i64)),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    fn fmt_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
        write!(f, "(")?;
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            item.fmt_nested(f)?;
        }
        if items.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }

    // Strings nested inside containers are quoted, the way Python's repr shows them.
    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "'{}'", s),
            other => write!(f, "{}", other),
        }
    }
}

/// See [`Value::repr`].
#[derive(Debug, Clone, Copy)]
pub struct ValueRepr<'a>(&'a Value);

impl fmt::Display for ValueRepr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt_nested(f)
    }
}

#[derive(Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(b)),
            (Number::Int(a), Number::Float(b)) => (*a as f64).partial_cmp(b),
            (Number::Float(a), Number::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Number::Float(a), Number::Float(b)) => a.partial_cmp(b),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(n) => {
                if n.is_finite() && n.fract() == 0.0 {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Str(s) => write!(f, "{}", s),
            Value::Seq(items) => Value::fmt_items(f, items),
            Value::Map(map) => {
                let mut keys: Vec<_> = map.keys().collect();
                keys.sort();
                write!(f, "namespace(")?;
                for (i, key) in keys.into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}=", key)?;
                    if let Some(v) = map.get(key) {
                        v.fmt_nested(f)?;
                    }
                }
                write!(f, ")")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Seq(items)
    }
}

impl From<Namespace> for Value {
    fn from(map: Namespace) -> Self {
        Value::Map(map)
    }
}
