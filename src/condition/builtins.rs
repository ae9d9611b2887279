//! Globals every condition can see, underneath the module's own bindings.
//!
//! Mirrors the modules conditions conventionally reach for: `os`, `sys`, `platform`, plus a
//! `config` namespace exposing the active run options.

use std::env::consts;

use crate::condition::value::{Namespace, Value};
use crate::config::RunOptions;

pub fn builtin_namespace(options: &RunOptions) -> Namespace {
    let mut globals = Namespace::new();
    globals.insert("os".to_string(), os_module());
    globals.insert("sys".to_string(), sys_module());
    globals.insert("platform".to_string(), platform_module());
    globals.insert("config".to_string(), config_namespace(options));
    globals
}

fn os_module() -> Value {
    let name = if cfg!(windows) { "nt" } else { "posix" };
    let sep = if cfg!(windows) { "\\" } else { "/" };
    module([("name", Value::from(name)), ("sep", Value::from(sep))])
}

fn sys_module() -> Value {
    module([
        ("platform", Value::from(sys_platform())),
        (
            "byteorder",
            Value::from(if cfg!(target_endian = "little") {
                "little"
            } else {
                "big"
            }),
        ),
        ("maxsize", Value::Int(isize::MAX as i64)),
    ])
}

fn platform_module() -> Value {
    module([
        ("system", Value::from(platform_system())),
        ("machine", Value::from(consts::ARCH)),
    ])
}

fn config_namespace(options: &RunOptions) -> Value {
    let option = module([
        ("run_xfail", Value::Bool(options.run_xfail)),
        ("xfail_strict", Value::Bool(options.xfail_strict)),
        ("repr_maxsize", Value::Int(options.repr_maxsize as i64)),
        ("report_chars", Value::from(options.report_chars.as_str())),
    ]);
    module([("option", option)])
}

fn sys_platform() -> &'static str {
    match consts::OS {
        "windows" => "win32",
        "macos" => "darwin",
        other => other,
    }
}

fn platform_system() -> &'static str {
    match consts::OS {
        "linux" => "Linux",
        "macos" => "Darwin",
        "windows" => "Windows",
        "freebsd" => "FreeBSD",
        other => other,
    }
}

fn module<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::Map(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}
