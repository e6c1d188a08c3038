//! Unused-key guard.
//!
//! Each consumer of the configuration declares the JSON-pointer prefixes it
//! actually reads. A leaf under any consumed prefix is consumed; every other
//! leaf is reported as unused, which catches typos such as `scale.max_retry`
//! that would otherwise silently fall back to a default.
//!
//! - prefix `"/scale"` consumes `"/scale/url"` and `"/scale/max_retries"`
//! - prefix `"/audit/path"` does NOT consume `"/audit/path_old"`

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Who is reading the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigConsumer {
    /// The full station controller.
    Station,
    /// `wv scale-probe`: only the scale link.
    ScaleProbe,
}

impl ConfigConsumer {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigConsumer::Station => "STATION",
            ConfigConsumer::ScaleProbe => "SCALE_PROBE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub consumer: String,
    /// Sorted, unique.
    pub consumed_prefixes: Vec<String>,
    /// Sorted.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

// Must mirror the reads in `station::StationConfig::from_config_json`.
static STATION: &[&str] = &[
    "/station/tolerance",
    "/scale/url",
    "/scale/poll_interval_ms",
    "/scale/read_timeout_ms",
    "/scale/max_retries",
    "/scale/backoff",
    "/scale/backoff_factor",
    "/scale/backoff_max_ms",
    "/submit/debounce_ms",
    "/submit/reset_delay_ms",
    "/print/timeout_ms",
    "/print/max_failures",
    "/audit/path",
    "/audit/hash_chain",
];

static SCALE_PROBE: &[&str] = &["/scale"];

pub fn consumed_pointers(consumer: ConfigConsumer) -> &'static [&'static str] {
    match consumer {
        ConfigConsumer::Station => STATION,
        ConfigConsumer::ScaleProbe => SCALE_PROBE,
    }
}

/// Produce an unused-key report. With [`UnusedKeyPolicy::Fail`] any unused
/// leaf is an error.
pub fn report_unused_keys(
    consumer: ConfigConsumer,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = consumed_pointers(consumer)
        .iter()
        .map(|p| normalize_pointer(p))
        .collect();
    let consumed_prefixes: Vec<String> = consumed.into_iter().collect();

    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|lp| !consumed_prefixes.iter().any(|cp| is_prefix_pointer(cp, lp)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        consumer: consumer.as_str().to_string(),
        consumed_prefixes,
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS (consumer={}): {} unused config leaf key(s) detected. \
            Remove them or update the consumed registry. First few: {}",
            report.consumer,
            report.unused_leaf_pointers.len(),
            preview_list(&report.unused_leaf_pointers, 12)
        );
    }

    Ok(report)
}

fn normalize_pointer(p: &str) -> String {
    let mut s = p.trim().to_string();
    if s.is_empty() {
        return "/".to_string();
    }
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.ends_with('/') && s.len() > 1 {
        s.pop();
    }
    s
}

/// `"/a/b"` is a prefix of `"/a/b"` and `"/a/b/c"`, never of `"/a/bc"`.
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" || leaf == prefix {
        return true;
    }
    leaf.strip_prefix(prefix)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => {
            let p = if prefix.is_empty() {
                "/".to_string()
            } else {
                prefix.to_string()
            };
            out.push(p);
        }
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn preview_list(items: &[String], n: usize) -> String {
    format!("{:?}", items.iter().take(n).collect::<Vec<_>>())
}
