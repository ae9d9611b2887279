//! Report locations that do not depend on the working directory.
//!
//! Every reported path is derived from an [`InvocationRoot`] captured once at session start.
//! The live working directory is never consulted after that, so a test that changes directory
//! and fails without changing back still reports `tests/test_x.py:12`, not
//! `../tests/test_x.py:12`.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use once_cell::sync::OnceCell;
use serde::Serialize;

static INVOCATION_ROOT: OnceCell<InvocationRoot> = OnceCell::new();

/// The directory all reported paths are relative to. Always absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRoot(Arc<PathBuf>);

impl InvocationRoot {
    /// Builds a root from `dir`; relative directories are taken against the current one.
    pub fn new(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        let absolute = if dir.is_absolute() {
            normalize(dir)
        } else {
            normalize(&std::env::current_dir()?.join(dir))
        };
        Ok(Self(Arc::new(absolute)))
    }

    /// Captures the process-wide root from the current directory on first call.
    ///
    /// Later calls return the same root no matter where the process has moved since.
    pub fn capture() -> io::Result<&'static InvocationRoot> {
        INVOCATION_ROOT.get_or_try_init(|| {
            let root = Self::new(std::env::current_dir()?)?;
            tracing::debug!(root = %root.path().display(), "captured invocation root");
            Ok(root)
        })
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// A location as discovered at collection time or reported by a failing frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawFrame {
    pub path: PathBuf,
    /// 1-based.
    pub line: u32,
    /// The test function or scope the location belongs to.
    pub domain: String,
}

impl RawFrame {
    pub fn new(path: impl Into<PathBuf>, line: u32, domain: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line,
            domain: domain.into(),
        }
    }
}

/// Where a report is attributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLocation {
    /// Relative to the invocation root, or absolute when outside of it. Never contains `..`.
    pub path: PathBuf,
    pub line: u32,
    pub domain: String,
}

impl fmt::Display for ReportLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}

/// Turns raw frames into [`ReportLocation`]s against a fixed root.
#[derive(Debug)]
pub struct LocationResolver {
    root: InvocationRoot,
    collected: RwLock<HashMap<PathBuf, PathBuf>>,
}

impl LocationResolver {
    pub fn new(root: InvocationRoot) -> Self {
        Self {
            root,
            collected: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &InvocationRoot {
        &self.root
    }

    /// Records the absolute form of `path` at collection time and returns it.
    ///
    /// Later resolutions of the same raw path use this recorded form.
    pub fn register(&self, path: &Path) -> PathBuf {
        let absolute = self.absolutize(path);
        self.collected
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.to_path_buf(), absolute.clone());
        absolute
    }

    pub fn resolve(&self, frame: &RawFrame) -> ReportLocation {
        let recorded = self
            .collected
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&frame.path)
            .cloned();
        let absolute = recorded.unwrap_or_else(|| self.absolutize(&frame.path));
        ReportLocation {
            path: self.relativize(&absolute),
            line: frame.line,
            domain: frame.domain.clone(),
        }
    }

    fn absolutize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize(path)
        } else {
            normalize(&self.root.path().join(path))
        }
    }

    fn relativize(&self, absolute: &Path) -> PathBuf {
        match absolute.strip_prefix(self.root.path()) {
            Ok(rel) if rel.as_os_str().is_empty() => PathBuf::from("."),
            Ok(rel) => rel.to_path_buf(),
            Err(_) => absolute.to_path_buf(),
        }
    }
}

/// Lexically removes `.` and `..` components; `..` above the root is dropped.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                out.push(component.as_os_str())
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                }
            }
        }
    }
    out
}
