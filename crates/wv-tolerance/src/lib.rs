//! wv-tolerance
//!
//! Tolerance evaluator: maps a scale reading, the header's standard weight and
//! a tolerance band to a [`Verdict`].
//!
//! # Invariants
//!
//! - **Inclusive bounds**: a reading exactly on `standard ± half_width` is
//!   accepted.
//! - **No silent accept**: a missing or non-positive standard weight is a
//!   `Rejected { NoStandardWeight }` classification, never an error and never
//!   an accept.
//! - **Garbage in, rejected out**: NaN, infinite or negative readings are
//!   `Rejected { InvalidReading }`.
//!
//! Pure: no IO, no clock.

use wv_schemas::{RejectReason, ToleranceBand, Verdict, VerdictKind, WeightReading};

/// Slack applied to both bounds so that a decimal reading printed as exactly
/// the bound (e.g. `2.6` for `2.5 + 0.1`) is not lost to binary rounding.
/// Far below any scale's resolution.
pub const BOUND_SLACK_KG: f64 = 1e-9;

/// Inclusive acceptance window for one standard weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub fn contains(&self, weight: f64) -> bool {
        weight >= self.lower - BOUND_SLACK_KG && weight <= self.upper + BOUND_SLACK_KG
    }
}

/// Acceptance window for `standard_weight` under `band`.
pub fn bounds(standard_weight: f64, band: &ToleranceBand) -> Bounds {
    let half = band.half_width(standard_weight);
    Bounds {
        lower: standard_weight - half,
        upper: standard_weight + half,
    }
}

/// Classify a bare weight.
///
/// | standard weight     | reading            | result                         |
/// |---------------------|--------------------|--------------------------------|
/// | `None` or `<= 0`    | any                | `Rejected { NoStandardWeight }`|
/// | usable              | NaN / inf / `< 0`  | `Rejected { InvalidReading }`  |
/// | usable              | `< lower`          | `Rejected { BelowLowerBound }` |
/// | usable              | `> upper`          | `Rejected { AboveUpperBound }` |
/// | usable              | within bounds      | `Accepted`                     |
pub fn classify(weight: f64, standard_weight: Option<f64>, band: &ToleranceBand) -> VerdictKind {
    let Some(standard) = standard_weight.filter(|w| w.is_finite() && *w > 0.0) else {
        return VerdictKind::Rejected {
            reason: RejectReason::NoStandardWeight,
        };
    };

    if !weight.is_finite() || weight < 0.0 {
        return VerdictKind::Rejected {
            reason: RejectReason::InvalidReading,
        };
    }

    let b = bounds(standard, band);
    if b.contains(weight) {
        VerdictKind::Accepted
    } else if weight < b.lower {
        VerdictKind::Rejected {
            reason: RejectReason::BelowLowerBound { lower: b.lower },
        }
    } else {
        VerdictKind::Rejected {
            reason: RejectReason::AboveUpperBound { upper: b.upper },
        }
    }
}

/// Evaluate a reading into a full verdict stamped with the reading's time.
pub fn evaluate(
    reading: &WeightReading,
    standard_weight: Option<f64>,
    band: &ToleranceBand,
) -> Verdict {
    Verdict {
        kind: classify(reading.weight, standard_weight, band),
        weight: Some(reading.weight),
        at: reading.read_at,
    }
}
