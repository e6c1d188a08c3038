//! Scenario: Tolerance bounds are inclusive, missing standard weight rejects
//!
//! # Invariants under test (pure, no IO)
//!
//! 1. For any positive standard weight, readings exactly at
//!    `standard - band` and `standard + band` are accepted.
//! 2. Readings a small epsilon outside either bound are rejected.
//! 3. Without a standard weight every reading is rejected with
//!    `NoStandardWeight`, for every band, and nothing panics.
//! 4. The two reference readings from the packing floor classify as expected.

use chrono::{DateTime, Utc};
use wv_schemas::{RejectReason, ToleranceBand, VerdictKind, WeightReading};
use wv_tolerance::{bounds, classify, evaluate};

const EPS: f64 = 1e-6;

fn bands() -> Vec<ToleranceBand> {
    vec![
        ToleranceBand::Absolute { kg: 0.02 },
        ToleranceBand::Absolute { kg: 0.1 },
        ToleranceBand::Relative { percent: 5.0 },
        ToleranceBand::Relative { percent: 1.25 },
    ]
}

fn standards() -> Vec<f64> {
    vec![0.54, 1.0, 2.5, 7.25, 20.0, 48.3]
}

fn at() -> DateTime<Utc> {
    DateTime::from_timestamp(1_760_000_000, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Inclusivity
// ---------------------------------------------------------------------------

#[test]
fn readings_on_either_bound_are_accepted() {
    for standard in standards() {
        for band in bands() {
            let b = bounds(standard, &band);
            assert_eq!(
                classify(b.lower, Some(standard), &band),
                VerdictKind::Accepted,
                "lower bound must be accepted: standard={standard} band={band:?}"
            );
            assert_eq!(
                classify(b.upper, Some(standard), &band),
                VerdictKind::Accepted,
                "upper bound must be accepted: standard={standard} band={band:?}"
            );
        }
    }
}

#[test]
fn readings_just_outside_either_bound_are_rejected() {
    for standard in standards() {
        for band in bands() {
            let b = bounds(standard, &band);
            assert!(
                matches!(
                    classify(b.lower - EPS, Some(standard), &band),
                    VerdictKind::Rejected {
                        reason: RejectReason::BelowLowerBound { .. }
                    }
                ),
                "below lower bound must be rejected: standard={standard} band={band:?}"
            );
            assert!(
                matches!(
                    classify(b.upper + EPS, Some(standard), &band),
                    VerdictKind::Rejected {
                        reason: RejectReason::AboveUpperBound { .. }
                    }
                ),
                "above upper bound must be rejected: standard={standard} band={band:?}"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// No configured standard weight
// ---------------------------------------------------------------------------

#[test]
fn missing_standard_weight_always_rejects() {
    for band in bands() {
        for reading in [0.0, 0.54, 2.5, 1_000.0, -3.0, f64::NAN] {
            for standard in [None, Some(0.0), Some(-2.5)] {
                assert_eq!(
                    classify(reading, standard, &band),
                    VerdictKind::Rejected {
                        reason: RejectReason::NoStandardWeight
                    },
                    "reading={reading} standard={standard:?} band={band:?}"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reference readings
// ---------------------------------------------------------------------------

#[test]
fn reference_reading_inside_band_is_accepted() {
    let band = ToleranceBand::Absolute { kg: 0.1 };
    let v = evaluate(&WeightReading::new(2.55, at()), Some(2.5), &band);
    assert_eq!(v.kind, VerdictKind::Accepted);
    assert_eq!(v.weight, Some(2.55));
    assert_eq!(v.at, at());
}

#[test]
fn reference_reading_outside_band_is_rejected() {
    let band = ToleranceBand::Absolute { kg: 0.1 };
    let v = evaluate(&WeightReading::new(2.61, at()), Some(2.5), &band);
    assert!(matches!(
        v.kind,
        VerdictKind::Rejected {
            reason: RejectReason::AboveUpperBound { .. }
        }
    ));
}
