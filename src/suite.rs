//! YAML suite descriptions.
//!
//! A suite file stands in for collected test modules. Each module brings its own namespace,
//! which is what its marker conditions are evaluated against, and each test scripts the
//! result its body produces:
//!
//! ```yaml
//! modules:
//!   - path: test_network.py
//!     namespace:
//!       has_network: false
//!     tests:
//!       - name: test_fetch
//!         line: 12
//!         markers:
//!           - kind: skipif
//!             conditions: ["not has_network"]
//!             reason: offline
//!         outcome: pass
//!       - name: test_parse
//!         line: 20
//!         outcome: "fail:ValueError"
//!         message: bad header
//!         objects:
//!           header: "X-Bad: \x00"
//! ```
//!
//! `objects` are shown under a failure, rendered within the session's `repr_maxsize`.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use miette::NamedSource;
use serde::Deserialize;
use walkdir::WalkDir;

use crate::condition::{ConditionContext, Namespace, Value};
use crate::diagnostics::VerdictError;
use crate::location::RawFrame;
use crate::marker::{Failure, Marker, TestItem};
use crate::report::TestReport;
use crate::repr::SafeRepr;
use crate::session::Session;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteFile {
    pub modules: Vec<ModuleSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleSpec {
    /// Relative to the directory of the suite file.
    pub path: PathBuf,
    #[serde(default)]
    pub namespace: Namespace,
    #[serde(default)]
    pub tests: Vec<TestSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestSpec {
    pub name: String,
    pub line: u32,
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub outcome: ScriptedOutcome,
    #[serde(default)]
    pub message: Option<String>,
    /// Objects attached to the failure, in name order.
    #[serde(default)]
    pub objects: BTreeMap<String, Value>,
    /// Directory the body changes into before producing its outcome. It never changes back.
    #[serde(default)]
    pub chdir: Option<PathBuf>,
}

/// What a scripted test body does: `pass`, `fail` or `fail:<Kind>`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum ScriptedOutcome {
    #[default]
    Pass,
    Fail {
        kind: String,
    },
}

impl FromStr for ScriptedOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once(':') {
            None if s.trim() == "pass" => Ok(ScriptedOutcome::Pass),
            None if s.trim() == "fail" => Ok(ScriptedOutcome::Fail {
                kind: "AssertionError".to_string(),
            }),
            Some(("fail", kind)) if !kind.trim().is_empty() => Ok(ScriptedOutcome::Fail {
                kind: kind.trim().to_string(),
            }),
            _ => Err(format!(
                "unknown outcome '{}', expected 'pass', 'fail' or 'fail:<Kind>'",
                s
            )),
        }
    }
}

impl TryFrom<String> for ScriptedOutcome {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ScriptedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptedOutcome::Pass => f.write_str("pass"),
            ScriptedOutcome::Fail { kind } => write!(f, "fail:{}", kind),
        }
    }
}

impl TestSpec {
    /// Runs the scripted body. Failures are raised at the test's own frame.
    pub fn execute(&self, frame: &RawFrame, repr: &SafeRepr) -> Result<(), Failure> {
        if let Some(dir) = &self.chdir {
            std::fs::create_dir_all(dir)
                .and_then(|()| std::env::set_current_dir(dir))
                .map_err(|err| Failure::new("OSError", err.to_string()).at(frame.clone()))?;
        }
        match &self.outcome {
            ScriptedOutcome::Pass => Ok(()),
            ScriptedOutcome::Fail { kind } => {
                let message = self.message.clone().unwrap_or_default();
                let failure = self.objects.iter().fold(
                    Failure::new(kind.as_str(), message).at(frame.clone()),
                    |failure, (name, value)| failure.with_display_using(repr, name, &value.repr()),
                );
                Err(failure)
            }
        }
    }
}

/// A loaded suite file.
#[derive(Debug, Clone)]
pub struct Suite {
    path: PathBuf,
    file: SuiteFile,
}

/// A test item paired with the script that drives its body.
#[derive(Debug)]
pub struct CollectedTest {
    pub item: TestItem,
    pub spec: TestSpec,
}

impl CollectedTest {
    pub fn run(&self, session: &Session) -> TestReport {
        session.run_item(&self.item, || {
            self.spec.execute(self.item.frame(), session.repr())
        })
    }
}

impl Suite {
    pub fn load(path: &Path) -> Result<Self, VerdictError> {
        let text = std::fs::read_to_string(path).map_err(|source| VerdictError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(path, &text)
    }

    pub fn from_yaml_str(path: &Path, text: &str) -> Result<Self, VerdictError> {
        let file: SuiteFile = serde_yaml::from_str(text).map_err(|err| VerdictError::Suite {
            path: path.to_path_buf(),
            message: err.to_string(),
            span: err.location().map(|loc| (loc.index(), 1).into()),
            src: NamedSource::new(path.display().to_string(), text.to_string()),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn modules(&self) -> &[ModuleSpec] {
        &self.file.modules
    }

    /// Collects every test into `session`. Each module gets one shared context.
    pub fn collect(&self, session: &Session) -> Vec<CollectedTest> {
        let base = self.path.parent().unwrap_or_else(|| Path::new(""));
        let mut collected = Vec::new();
        for module in self.modules() {
            let module_path = base.join(&module.path);
            let context = Arc::new(ConditionContext::with_namespace(
                module.path.display().to_string(),
                module.namespace.clone(),
            ));
            tracing::debug!(
                module = %module_path.display(),
                context = %context,
                "collecting module"
            );
            for spec in &module.tests {
                let frame = RawFrame::new(module_path.clone(), spec.line, spec.name.clone());
                let nodeid = format!(
                    "{}::{}",
                    session.resolver().resolve(&frame).path.display(),
                    spec.name
                );
                let item =
                    session.collect(nodeid, frame, Arc::clone(&context), spec.markers.clone());
                collected.push(CollectedTest {
                    item,
                    spec: spec.clone(),
                });
            }
        }
        collected
    }
}

/// Expands `paths` into suite files. Directories are walked for `*.yaml` and `*.yml`.
///
/// Files found in a directory are sorted so runs are deterministic.
pub fn discover(paths: &[PathBuf]) -> Result<Vec<PathBuf>, VerdictError> {
    let mut files = Vec::new();
    for root in paths {
        if root.is_file() {
            files.push(root.clone());
            continue;
        }
        if !root.is_dir() {
            return Err(VerdictError::Io {
                path: root.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such file or directory"),
            });
        }
        let mut found = Vec::new();
        for entry in WalkDir::new(root) {
            let entry = entry.map_err(|err| VerdictError::Io {
                path: err.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone()),
                source: err.into(),
            })?;
            if entry.file_type().is_file() && is_suite_file(entry.path()) {
                found.push(entry.path().to_path_buf());
            }
        }
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

fn is_suite_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml")
}
