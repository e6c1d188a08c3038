//! Command bodies that are more than a couple of calls.

use std::time::Instant;

use anyhow::{bail, Result};
use chrono::Utc;
use tracing::{info, warn};
use wv_config::ScaleConfig;
use wv_retry::{RetryDecision, RetryTracker};
use wv_scale::{HttpScaleSource, WeightSource};
use wv_schemas::{ToleranceBand, VerdictKind, WeightReading};

/// `--band` / `--percent`, falling back to the station default band.
pub fn band_from_args(band: Option<f64>, percent: Option<f64>) -> Result<ToleranceBand> {
    let b = match (band, percent) {
        (Some(kg), None) => ToleranceBand::Absolute { kg },
        (None, Some(percent)) => ToleranceBand::Relative { percent },
        (None, None) => wv_config::StationConfig::default().tolerance,
        (Some(_), Some(_)) => bail!("use either --band or --percent, not both"),
    };
    let width = match b {
        ToleranceBand::Absolute { kg } => kg,
        ToleranceBand::Relative { percent } => percent,
    };
    if !width.is_finite() || width < 0.0 {
        bail!("tolerance must be a non-negative number, got {width}");
    }
    Ok(b)
}

/// `key=value` report lines for one evaluation.
pub fn evaluate_lines(standard: f64, reading: f64, band: &ToleranceBand) -> Vec<String> {
    let verdict = wv_tolerance::evaluate(
        &WeightReading::new(reading, Utc::now()),
        Some(standard),
        band,
    );

    let mut out = Vec::new();
    match verdict.kind {
        VerdictKind::Accepted => out.push("verdict=accepted".to_string()),
        VerdictKind::Rejected { reason } => {
            out.push("verdict=rejected".to_string());
            out.push(format!("reason={reason}"));
        }
        VerdictKind::Pending => out.push("verdict=pending".to_string()),
        VerdictKind::Offline => out.push("verdict=offline".to_string()),
    }
    if standard.is_finite() && standard > 0.0 {
        let b = wv_tolerance::bounds(standard, band);
        out.push(format!("lower={:.3}", b.lower));
        out.push(format!("upper={:.3}", b.upper));
    }
    out
}

/// Take `count` readings from the bridge. Failures are paced and bounded by
/// the configured retry policy; reaching the bound is an error.
pub async fn scale_probe(cfg: &ScaleConfig, count: u32) -> Result<()> {
    let source = HttpScaleSource::new(cfg.url.clone(), cfg.read_timeout);
    let mut tracker = RetryTracker::new(cfg.retry);
    info!(url = source.url(), count, "probing scale");

    let mut taken = 0u32;
    while taken < count {
        match source.read().await {
            Ok(r) => {
                tracker.record_success();
                taken += 1;
                println!(
                    "reading={} weight={:.3} read_at={}",
                    taken,
                    r.weight,
                    r.read_at.to_rfc3339()
                );
                if taken < count {
                    tokio::time::sleep(cfg.poll_interval).await;
                }
            }
            Err(e) => {
                warn!(url = source.url(), error = %e, "scale read failed");
                match tracker.record_failure(e.to_string(), Instant::now()) {
                    RetryDecision::RetryAfter(d) => {
                        println!("retrying attempt={} in_ms={}", tracker.state().attempts, d.as_millis());
                        tokio::time::sleep(d).await;
                    }
                    RetryDecision::GiveUp => {
                        bail!(
                            "SCALE_OFFLINE url={} attempts={}: {}",
                            source.url(),
                            tracker.state().attempts,
                            e
                        );
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_defaults_to_station_band() {
        assert_eq!(
            band_from_args(None, None).unwrap(),
            ToleranceBand::Absolute { kg: 0.1 }
        );
        assert_eq!(
            band_from_args(None, Some(2.0)).unwrap(),
            ToleranceBand::Relative { percent: 2.0 }
        );
        assert!(band_from_args(Some(-0.1), None).is_err());
    }

    #[test]
    fn evaluate_reports_bounds() {
        let lines = evaluate_lines(2.5, 2.6, &ToleranceBand::Absolute { kg: 0.1 });
        assert_eq!(lines, vec!["verdict=accepted", "lower=2.400", "upper=2.600"]);

        let lines = evaluate_lines(2.5, 2.7, &ToleranceBand::Absolute { kg: 0.1 });
        assert_eq!(lines[0], "verdict=rejected");
        assert_eq!(lines[1], "reason=above upper bound 2.600 kg");
    }

    #[test]
    fn evaluate_without_standard_has_no_bounds() {
        let lines = evaluate_lines(0.0, 2.5, &ToleranceBand::Absolute { kg: 0.1 });
        assert_eq!(
            lines,
            vec!["verdict=rejected", "reason=no standard weight configured"]
        );
    }
}
