//! HTTP scale bridge adapter.
//!
//! The bridge is a small local service that owns the serial connection and
//! answers `GET <url>` with:
//!
//! ```json
//! { "weight": "ST,NT, 9,    0.54 kg", "status": "ok", "timestamp": "..." }
//! ```
//!
//! `weight` may also be a JSON number. Only `weight` is interpreted.

use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use wv_schemas::WeightReading;

use crate::{parse_scale_output, ReadError, WeightSource};

#[derive(Debug, Clone)]
pub struct HttpScaleSource {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpScaleSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn map_transport(&self, err: reqwest::Error) -> ReadError {
        if err.is_timeout() {
            ReadError::Timeout {
                after_ms: self.timeout.as_millis() as u64,
            }
        } else if err.is_decode() {
            ReadError::Malformed(err.to_string())
        } else {
            ReadError::Connection(err.to_string())
        }
    }
}

#[async_trait::async_trait]
impl WeightSource for HttpScaleSource {
    fn name(&self) -> &'static str {
        "http-bridge"
    }

    async fn read(&self) -> Result<WeightReading, ReadError> {
        let resp = self
            .http
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ReadError::Status {
                code: status.as_u16(),
            });
        }

        let body: BridgeResponse = resp.json().await.map_err(|e| self.map_transport(e))?;
        let weight = match &body.weight {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| ReadError::Malformed(format!("weight not representable: {n}")))?,
            Value::String(s) => parse_scale_output(s)?,
            other => {
                return Err(ReadError::Malformed(format!(
                    "weight field has unexpected type: {other}"
                )))
            }
        };

        debug!(url = %self.url, weight, bridge_status = ?body.status, "scale read");
        Ok(WeightReading::new(weight, Utc::now()))
    }
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    #[serde(default)]
    weight: Value,
    #[serde(default)]
    status: Option<String>,
}
