//! Run options.
//!
//! Options come from an optional YAML file and are then overridden by command-line flags.
//! Every field has a default so a partial file is fine:
//!
//! ```yaml
//! xfail_strict: true
//! repr_maxsize: 120
//! ```

use std::path::Path;

use miette::NamedSource;
use serde::{Deserialize, Serialize};

use crate::diagnostics::VerdictError;
use crate::repr::DEFAULT_MAXSIZE;

/// Whether expected-failure semantics are active for this run.
///
/// `RunXfail` turns xfail markers off entirely; skip markers are unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    #[default]
    Normal,
    RunXfail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunOptions {
    /// Report xfail-marked tests as if they were not marked.
    pub run_xfail: bool,
    /// Default `strict` for xfail markers that do not set it.
    pub xfail_strict: bool,
    /// Bound for object renderings embedded in failure reports.
    pub repr_maxsize: usize,
    /// Short summary selection, as in `-r`: `f`ailed, `s`kipped, `x`failed, `X`passed,
    /// `p`assed, `a`ll but passed, `A`ll.
    pub report_chars: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            run_xfail: false,
            xfail_strict: false,
            repr_maxsize: DEFAULT_MAXSIZE,
            report_chars: "f".to_string(),
        }
    }
}

impl RunOptions {
    pub fn from_yaml_str(name: &str, text: &str) -> Result<Self, VerdictError> {
        serde_yaml::from_str(text).map_err(|err| VerdictError::Config {
            message: err.to_string(),
            span: err.location().map(|loc| (loc.index(), 1).into()),
            src: NamedSource::new(name, text.to_string()),
        })
    }

    pub fn load(path: &Path) -> Result<Self, VerdictError> {
        let text = std::fs::read_to_string(path).map_err(|source| VerdictError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&path.display().to_string(), &text)
    }

    pub fn run_mode(&self) -> RunMode {
        if self.run_xfail {
            RunMode::RunXfail
        } else {
            RunMode::Normal
        }
    }

    /// Whether the short summary includes outcomes with the given report letter.
    pub fn reports(&self, letter: char) -> bool {
        let chars = self.report_chars.as_str();
        chars.contains('A')
            || (chars.contains('a') && letter != 'p')
            || chars.contains(letter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let options = RunOptions::from_yaml_str("cfg.yaml", "xfail_strict: true\n").unwrap();
        assert!(options.xfail_strict);
        assert!(!options.run_xfail);
        assert_eq!(options.repr_maxsize, DEFAULT_MAXSIZE);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = RunOptions::from_yaml_str("cfg.yaml", "runxfail: true\n").unwrap_err();
        assert!(matches!(err, VerdictError::Config { .. }));
    }

    #[test]
    fn report_chars_selection() {
        let options = RunOptions {
            report_chars: "a".to_string(),
            ..RunOptions::default()
        };
        assert!(options.reports('s'));
        assert!(options.reports('X'));
        assert!(!options.reports('p'));
    }
}
