//! Safe rendering of arbitrary values for failure reports.
//!
//! Everything in here is total: a value whose `Debug` implementation panics, returns
//! `fmt::Error`, or panics with a payload we cannot describe still produces a string.
//!
//! When rendering fails the value is never consulted again. Its type name comes from
//! [`std::any::type_name`], which is resolved at compile time, and the failure is described
//! purely from the panic payload (or the `fmt::Error`) that was produced.
//!
//! ```rust
//! use std::fmt;
//! use verdict::repr::saferepr;
//!
//! struct Broken;
//! impl fmt::Debug for Broken {
//!     fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         panic!("broken repr")
//!     }
//! }
//!
//! assert_eq!(
//!     saferepr(&Broken),
//!     "<Broken raised in repr(): panic: broken repr>"
//! );
//! ```

use std::any::Any;
use std::fmt::{self, Debug, Display, Write};
use std::panic::{self, AssertUnwindSafe};

use unicode_segmentation::UnicodeSegmentation;

/// Default bound on rendered output, in grapheme clusters.
pub const DEFAULT_MAXSIZE: usize = 240;

/// Returned when a failure cannot even be described without running foreign code.
pub const UNPRESENTABLE: &str = "<[unpresentable object] raised in repr()>";

const ELLIPSIS: &str = "...";

/// A typed panic payload carrying an exception kind and message.
///
/// Raise it with [`std::panic::panic_any`] from a `Debug` impl (or a test body) to have the
/// kind show up in rendered failures instead of the generic `panic`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReprPanic {
    pub kind: String,
    pub message: String,
}

impl ReprPanic {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ReprPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Renderer with a configurable output bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafeRepr {
    maxsize: Option<usize>,
}

impl SafeRepr {
    /// Bounded renderer. Bounds below the ellipsis length are raised to it.
    pub fn new(maxsize: usize) -> Self {
        Self {
            maxsize: Some(maxsize.max(ELLIPSIS.len())),
        }
    }

    pub fn unbounded() -> Self {
        Self { maxsize: None }
    }

    pub fn maxsize(&self) -> Option<usize> {
        self.maxsize
    }

    /// Renders `value` with its `Debug` impl, falling back to a failure description.
    pub fn repr<T: Debug + ?Sized>(&self, value: &T) -> String {
        self.bound(render(value, |buf| write!(buf, "{:?}", value)))
    }

    /// Same as [`SafeRepr::repr`] but through `Display`, for error messages.
    pub fn display<T: Display + ?Sized>(&self, value: &T) -> String {
        self.bound(render(value, |buf| write!(buf, "{}", value)))
    }

    fn bound(&self, rendered: String) -> String {
        match self.maxsize {
            Some(maxsize) => ellipsize(rendered, maxsize),
            None => rendered,
        }
    }
}

impl Default for SafeRepr {
    fn default() -> Self {
        Self::new(DEFAULT_MAXSIZE)
    }
}

/// Renders `value` bounded to [`DEFAULT_MAXSIZE`].
pub fn saferepr<T: Debug + ?Sized>(value: &T) -> String {
    SafeRepr::default().repr(value)
}

/// Renders `value` without a length bound.
pub fn safeformat<T: Debug + ?Sized>(value: &T) -> String {
    SafeRepr::unbounded().repr(value)
}

/// Describes a panic raised while rendering `obj`.
///
/// `obj` only contributes its static type; none of its methods are called. Payloads of
/// unknown types are leaked rather than dropped, since their destructor is foreign code.
pub fn format_repr_panic<T: ?Sized>(payload: Box<dyn Any + Send>, _obj: &T) -> String {
    compose(type_label::<T>(), ReprFailure::Panic(payload))
}

/// Extracts a message from a panic payload, if it is one of the known payload types.
pub fn panic_message(payload: &(dyn Any + Send)) -> Option<String> {
    panic_parts(payload).map(|(kind, message)| {
        if kind == "panic" {
            message
        } else {
            format!("{}: {}", kind, message)
        }
    })
}

/// Returns `(exception kind, message)` for payloads that can be read without running user code.
pub fn panic_parts(payload: &(dyn Any + Send)) -> Option<(String, String)> {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        return Some(("panic".to_string(), (*s).to_string()));
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return Some(("panic".to_string(), s.clone()));
    }
    payload
        .downcast_ref::<ReprPanic>()
        .map(|p| (p.kind.clone(), p.message.clone()))
}

// ============================================================================
// INTERNALS
// ============================================================================

enum ReprFailure {
    Fmt,
    Panic(Box<dyn Any + Send>),
}

fn render<T: ?Sized>(_value: &T, write: impl FnOnce(&mut String) -> fmt::Result) -> String {
    let mut buf = String::new();
    let attempt = panic::catch_unwind(AssertUnwindSafe(|| write(&mut buf)));
    let failure = match attempt {
        Ok(Ok(())) => return buf,
        Ok(Err(fmt::Error)) => ReprFailure::Fmt,
        Err(payload) => ReprFailure::Panic(payload),
    };
    tracing::warn!(type_name = std::any::type_name::<T>(), "repr failed, using fallback");
    compose(type_label::<T>(), failure)
}

fn compose(type_name: String, failure: ReprFailure) -> String {
    let (kind, message) = match failure {
        ReprFailure::Fmt => ("fmt::Error".to_string(), "formatter error".to_string()),
        ReprFailure::Panic(payload) => match panic_parts(payload.as_ref()) {
            Some(parts) => parts,
            None => {
                std::mem::forget(payload);
                return UNPRESENTABLE.to_string();
            }
        },
    };
    panic::catch_unwind(AssertUnwindSafe(|| {
        format!("<{} raised in repr(): {}: {}>", type_name, kind, message)
    }))
    .unwrap_or_else(|payload| {
        std::mem::forget(payload);
        UNPRESENTABLE.to_string()
    })
}

fn type_label<T: ?Sized>() -> String {
    short_type_name(std::any::type_name::<T>())
}

/// `alloc::vec::Vec<my::Thing>` -> `Vec<my::Thing>`.
fn short_type_name(full: &str) -> String {
    let (base, generics) = match full.find('<') {
        Some(idx) => full.split_at(idx),
        None => (full, ""),
    };
    let short = base.rsplit("::").next().unwrap_or(base);
    format!("{}{}", short, generics)
}

fn ellipsize(s: String, maxsize: usize) -> String {
    if s.graphemes(true).nth(maxsize).is_none() {
        return s;
    }
    let keep = maxsize.saturating_sub(ELLIPSIS.len());
    let end = s
        .grapheme_indices(true)
        .nth(keep)
        .map(|(idx, _)| idx)
        .unwrap_or(s.len());
    format!("{}{}", &s[..end], ELLIPSIS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_type_name_strips_module_path() {
        assert_eq!(short_type_name("verdict::repr::Thing"), "Thing");
        assert_eq!(short_type_name("alloc::vec::Vec<u8>"), "Vec<u8>");
        assert_eq!(short_type_name("str"), "str");
    }

    #[test]
    fn ellipsize_keeps_short_strings() {
        assert_eq!(ellipsize("abc".to_string(), 3), "abc");
        assert_eq!(ellipsize("abcd".to_string(), 3), "...");
        assert_eq!(ellipsize("abcdefgh".to_string(), 6), "abc...");
    }

    #[test]
    fn ellipsize_counts_graphemes() {
        let s = "e\u{301}e\u{301}e\u{301}e\u{301}e\u{301}".to_string();
        let out = ellipsize(s, 4);
        assert_eq!(out, "e\u{301}...");
    }
}
