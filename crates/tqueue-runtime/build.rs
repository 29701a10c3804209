//! Build script for tqueue-runtime
//!
//! Produces `OUT_DIR/tq_merged_config.rs`, the compile-time defaults of
//! `SystemConfig`:
//! 1. Start from the library defaults below
//! 2. If `TQ_CONFIG_RS` names a file, read its `pub const NAME: TYPE = VALUE;`
//!    lines and let them override the defaults for known parameters
//! 3. Emit one `pub const` per parameter
//!
//! A user file only lists the values it changes.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

/// One configurable constant
struct Param {
    name: &'static str,
    ty: &'static str,
    default: &'static str,
}

const PARAMS: &[Param] = &[
    Param { name: "SCHEDULER_COUNT", ty: "usize", default: "1" },
    Param { name: "SMP", ty: "bool", default: "false" },
    Param { name: "MAX_NONEMPTY_QUEUES", ty: "usize", default: "256" },
    Param { name: "TICK_INTERVAL_US", ty: "u64", default: "1000" },
    Param { name: "MAX_THREADS", ty: "usize", default: "4096" },
    Param { name: "LOCAL_NODE", ty: "u16", default: "1" },
    Param { name: "DEBUG_LOGGING", ty: "bool", default: "false" },
];

fn main() {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    let dest = Path::new(&out_dir).join("tq_merged_config.rs");

    let mut values: HashMap<&'static str, String> = PARAMS
        .iter()
        .map(|p| (p.name, p.default.to_string()))
        .collect();

    let user_file = env::var("TQ_CONFIG_RS").ok();
    if let Some(path) = &user_file {
        println!("cargo:rerun-if-changed={}", path);
        match fs::read_to_string(path) {
            Ok(content) => {
                for unknown in merge_overrides(&content, &mut values) {
                    println!("cargo:warning=Unknown tqueue config parameter: {}", unknown);
                }
                println!("cargo:warning=Using tqueue config overrides from {}", path);
            }
            Err(e) => println!("cargo:warning=Cannot read TQ_CONFIG_RS ({}): {}", path, e),
        }
    }
    println!("cargo:rerun-if-env-changed=TQ_CONFIG_RS");

    fs::write(&dest, render(&values, user_file.as_deref()))
        .expect("failed to write tq_merged_config.rs");
}

/// Apply overrides from a user file, returning names that matched no parameter
fn merge_overrides(content: &str, values: &mut HashMap<&'static str, String>) -> Vec<String> {
    let mut unknown = Vec::new();
    for (name, value) in content.lines().filter_map(split_const) {
        match PARAMS.iter().find(|p| p.name == name) {
            Some(param) => {
                values.insert(param.name, value);
            }
            None => unknown.push(name),
        }
    }
    unknown
}

/// Split `pub const NAME: TYPE = VALUE;` into (NAME, VALUE)
fn split_const(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.starts_with("//") {
        return None;
    }
    let rest = line.strip_prefix("pub const ")?;
    let (name, rest) = rest.split_once(':')?;
    let (_, value) = rest.split_once('=')?;
    let value = value.trim().trim_end_matches(';').trim();
    if value.is_empty() {
        return None;
    }
    Some((name.trim().to_string(), value.to_string()))
}

fn render(values: &HashMap<&'static str, String>, source: Option<&str>) -> String {
    let mut out = String::from("// Generated by tqueue-runtime/build.rs\n");
    if let Some(path) = source {
        out.push_str(&format!("// Overrides merged from {}\n", path));
    }
    out.push('\n');
    for param in PARAMS {
        let value = values.get(param.name).map(String::as_str).unwrap_or(param.default);
        out.push_str(&format!("pub const {}: {} = {};\n", param.name, param.ty, value));
    }
    out
}
