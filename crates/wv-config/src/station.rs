//! Typed station configuration.
//!
//! Every key is optional; absent keys take the defaults below. Values are
//! validated here, synchronously, so a bad configuration is rejected before
//! the station touches the scale or the store.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use wv_retry::{Backoff, RetryPolicy};
use wv_schemas::ToleranceBand;

pub const DEFAULT_SCALE_URL: &str = "http://localhost:8000/scale/read";

#[derive(Debug, Clone, PartialEq)]
pub struct ScaleConfig {
    pub url: String,
    pub poll_interval: Duration,
    pub read_timeout: Duration,
    /// Consecutive failures before the link goes offline; pacing uses
    /// `poll_interval` as the base interval.
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubmitConfig {
    /// Window after an accepted trigger during which further triggers are ignored.
    pub debounce: Duration,
    /// Delay before the form is cleared after a successful commit.
    pub reset_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrintConfig {
    pub timeout: Duration,
    /// Consecutive failed print cycles before the print link is offline.
    pub link: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditConfig {
    pub path: PathBuf,
    pub hash_chain: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationConfig {
    /// Default band when a header carries none.
    pub tolerance: ToleranceBand,
    pub scale: ScaleConfig,
    pub submit: SubmitConfig,
    pub print: PrintConfig,
    /// `None` disables the audit trail.
    pub audit: Option<AuditConfig>,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            tolerance: ToleranceBand::default(),
            scale: ScaleConfig {
                url: DEFAULT_SCALE_URL.to_string(),
                poll_interval: Duration::from_millis(1000),
                read_timeout: Duration::from_millis(5000),
                retry: RetryPolicy::fixed(3, Duration::from_millis(1000)),
            },
            submit: SubmitConfig {
                debounce: Duration::from_millis(500),
                reset_delay: Duration::from_millis(1000),
            },
            print: PrintConfig {
                timeout: Duration::from_millis(5000),
                link: RetryPolicy::fixed(3, Duration::ZERO),
            },
            audit: None,
        }
    }
}

impl StationConfig {
    pub fn from_config_json(v: &Value) -> Result<Self> {
        let raw: RawDoc = serde_json::from_value(v.clone()).context("station config shape")?;
        raw.validate()
    }
}

// ---------------------------------------------------------------------------
// Raw document
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDoc {
    station: RawStation,
    scale: RawScale,
    submit: RawSubmit,
    print: RawPrint,
    audit: Option<RawAudit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStation {
    tolerance: Option<ToleranceBand>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawBackoff {
    #[default]
    Fixed,
    Exponential,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawScale {
    url: String,
    poll_interval_ms: u64,
    read_timeout_ms: u64,
    max_retries: u32,
    backoff: RawBackoff,
    backoff_factor: f64,
    backoff_max_ms: u64,
}

impl Default for RawScale {
    fn default() -> Self {
        Self {
            url: DEFAULT_SCALE_URL.to_string(),
            poll_interval_ms: 1000,
            read_timeout_ms: 5000,
            max_retries: 3,
            backoff: RawBackoff::Fixed,
            backoff_factor: 2.0,
            backoff_max_ms: 30_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawSubmit {
    debounce_ms: u64,
    reset_delay_ms: u64,
}

impl Default for RawSubmit {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            reset_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawPrint {
    timeout_ms: u64,
    max_failures: u32,
}

impl Default for RawPrint {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            max_failures: 3,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawAudit {
    path: PathBuf,
    #[serde(default = "default_true")]
    hash_chain: bool,
}

fn default_true() -> bool {
    true
}

impl RawDoc {
    fn validate(self) -> Result<StationConfig> {
        let tolerance = self.station.tolerance.unwrap_or_default();
        match tolerance {
            ToleranceBand::Absolute { kg } if !kg.is_finite() || kg < 0.0 => {
                bail!("CONFIG_INVALID station.tolerance.kg must be a finite value >= 0 (got {kg})")
            }
            ToleranceBand::Relative { percent } if !percent.is_finite() || percent < 0.0 => {
                bail!("CONFIG_INVALID station.tolerance.percent must be a finite value >= 0 (got {percent})")
            }
            _ => {}
        }

        let s = self.scale;
        if s.url.trim().is_empty() {
            bail!("CONFIG_INVALID scale.url must not be empty");
        }
        if s.poll_interval_ms == 0 {
            bail!("CONFIG_INVALID scale.poll_interval_ms must be > 0");
        }
        if s.read_timeout_ms == 0 {
            bail!("CONFIG_INVALID scale.read_timeout_ms must be > 0");
        }
        if s.max_retries == 0 {
            bail!("CONFIG_INVALID scale.max_retries must be >= 1");
        }
        let poll_interval = Duration::from_millis(s.poll_interval_ms);
        let retry = match s.backoff {
            RawBackoff::Fixed => RetryPolicy::fixed(s.max_retries, poll_interval),
            RawBackoff::Exponential => {
                if !s.backoff_factor.is_finite() || s.backoff_factor < 1.0 {
                    bail!("CONFIG_INVALID scale.backoff_factor must be >= 1.0");
                }
                RetryPolicy {
                    max_attempts: s.max_retries,
                    interval: poll_interval,
                    backoff: Backoff::Exponential {
                        factor: s.backoff_factor,
                        max: Duration::from_millis(s.backoff_max_ms.max(s.poll_interval_ms)),
                    },
                }
            }
        };

        if self.print.timeout_ms == 0 {
            bail!("CONFIG_INVALID print.timeout_ms must be > 0");
        }
        if self.print.max_failures == 0 {
            bail!("CONFIG_INVALID print.max_failures must be >= 1");
        }

        let audit = match self.audit {
            Some(a) if a.path.as_os_str().is_empty() => {
                bail!("CONFIG_INVALID audit.path must not be empty")
            }
            Some(a) => Some(AuditConfig {
                path: a.path,
                hash_chain: a.hash_chain,
            }),
            None => None,
        };

        Ok(StationConfig {
            tolerance,
            scale: ScaleConfig {
                url: s.url,
                poll_interval,
                read_timeout: Duration::from_millis(s.read_timeout_ms),
                retry,
            },
            submit: SubmitConfig {
                debounce: Duration::from_millis(self.submit.debounce_ms),
                reset_delay: Duration::from_millis(self.submit.reset_delay_ms),
            },
            print: PrintConfig {
                timeout: Duration::from_millis(self.print.timeout_ms),
                link: RetryPolicy::fixed(self.print.max_failures, Duration::ZERO),
            },
            audit,
        })
    }
}
