//! wv-schemas
//!
//! Shared data model for the weight-verification station: headers (expected
//! weight targets), persisted weight lines, scale readings, tolerance bands
//! and the single tagged [`Verdict`] type used by every other crate.
//!
//! Pure data. No IO, no clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned header identifier.
pub type HeaderId = i64;

/// Store-assigned weight line identifier.
pub type LineId = i64;

// ---------------------------------------------------------------------------
// Tolerance band
// ---------------------------------------------------------------------------

/// Allowed deviation from the standard weight.
///
/// Which policy applies is configuration, never hardcoded: the station carries
/// a default band and a header may override it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ToleranceBand {
    /// Fixed deviation in kilograms on either side of the standard weight.
    Absolute { kg: f64 },
    /// Deviation as a percentage of the standard weight (e.g. `1.25`).
    Relative { percent: f64 },
}

impl ToleranceBand {
    /// Half-width of the band in kilograms for the given standard weight.
    pub fn half_width(&self, standard_weight: f64) -> f64 {
        match self {
            ToleranceBand::Absolute { kg } => kg.abs(),
            ToleranceBand::Relative { percent } => standard_weight * percent.abs() / 100.0,
        }
    }
}

impl Default for ToleranceBand {
    fn default() -> Self {
        ToleranceBand::Absolute { kg: 0.1 }
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Order metadata carried through to labels. Never used for reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderMetadata {
    pub contract_no: Option<String>,
    pub product_name: Option<String>,
    pub order_line_number: Option<i64>,
    pub inner_count: Option<i64>,
    pub master_cartons: Option<i64>,
    pub net_qty: Option<f64>,
    pub job_no: Option<String>,
}

/// One expected-weight target tied to an order line.
///
/// Created by an external flow; the core only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub id: HeaderId,
    /// Expected gross weight in kg. `None` (or a non-positive value) means the
    /// header cannot be reconciled.
    pub standard_weight: Option<f64>,
    /// Header-level band. `None` falls back to the station default.
    #[serde(default)]
    pub tolerance: Option<ToleranceBand>,
    pub allow_print: bool,
    #[serde(default)]
    pub order: OrderMetadata,
}

impl Header {
    /// The standard weight when it is usable for reconciliation.
    pub fn usable_standard_weight(&self) -> Option<f64> {
        self.standard_weight.filter(|w| w.is_finite() && *w > 0.0)
    }

    /// Band to apply for this header, given the station default.
    pub fn effective_band(&self, station_default: ToleranceBand) -> ToleranceBand {
        self.tolerance.unwrap_or(station_default)
    }
}

// ---------------------------------------------------------------------------
// Weight line
// ---------------------------------------------------------------------------

/// Persisted status of a weight line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    Draft,
    Valid,
    Invalid,
    /// Superseded by a failed reweigh. Lines are never deleted.
    Cancelled,
}

impl LineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineStatus::Draft => "draft",
            LineStatus::Valid => "valid",
            LineStatus::Invalid => "invalid",
            LineStatus::Cancelled => "cancelled",
        }
    }

    /// `true` when the reweigh correction path may act on a line in this state.
    pub fn is_correctable(&self) -> bool {
        matches!(self, LineStatus::Valid | LineStatus::Invalid)
    }
}

/// One persisted weight observation against a header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightLine {
    pub id: LineId,
    pub header_id: HeaderId,
    /// Store-assigned verification code printed on the label. Immutable.
    pub serial: String,
    pub gross_weight: f64,
    pub recorded_at: DateTime<Utc>,
    pub status: LineStatus,
    pub remark: Option<String>,
    /// Carton number within the header.
    pub index_no: u32,
    /// Weight captured by the reweigh correction path, if any.
    #[serde(default)]
    pub corrected_weight: Option<f64>,
    /// Bumped by the store on every correction; `0` at creation.
    #[serde(default)]
    pub revision: u32,
}

/// Create request for [`WeightLine`]. Serial and index are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLine {
    pub gross_weight: f64,
    pub recorded_at: DateTime<Utc>,
    pub status: LineStatus,
    pub remark: Option<String>,
}

/// Correction request issued by the reweigh path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineCorrection {
    pub line_id: LineId,
    pub status: LineStatus,
    pub corrected_weight: f64,
    pub remark: Option<String>,
}

// ---------------------------------------------------------------------------
// Readings and verdicts
// ---------------------------------------------------------------------------

/// A single successful read from the weight source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightReading {
    pub weight: f64,
    pub read_at: DateTime<Utc>,
}

impl WeightReading {
    pub fn new(weight: f64, read_at: DateTime<Utc>) -> Self {
        Self { weight, read_at }
    }
}

/// Why a reading was classified as rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// The header carries no usable standard weight.
    NoStandardWeight,
    /// The reading is NaN, infinite or negative.
    InvalidReading,
    BelowLowerBound { lower: f64 },
    AboveUpperBound { upper: f64 },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::NoStandardWeight => write!(f, "no standard weight configured"),
            RejectReason::InvalidReading => write!(f, "invalid weight reading"),
            RejectReason::BelowLowerBound { lower } => write!(f, "below lower bound {lower:.3} kg"),
            RejectReason::AboveUpperBound { upper } => write!(f, "above upper bound {upper:.3} kg"),
        }
    }
}

/// Classification of the current reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerdictKind {
    Accepted,
    Rejected { reason: RejectReason },
    /// No reading classified yet for this session.
    Pending,
    /// The weight source is unreachable; polling has stopped.
    Offline,
}

/// Ephemeral verdict. Recomputed on every reading, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub kind: VerdictKind,
    pub weight: Option<f64>,
    pub at: DateTime<Utc>,
}

impl Verdict {
    pub fn pending(at: DateTime<Utc>) -> Self {
        Self {
            kind: VerdictKind::Pending,
            weight: None,
            at,
        }
    }

    /// Offline keeps the last known weight for display only.
    pub fn offline(last_weight: Option<f64>, at: DateTime<Utc>) -> Self {
        Self {
            kind: VerdictKind::Offline,
            weight: last_weight,
            at,
        }
    }

    /// `true` for accepted/rejected verdicts backed by a reading.
    pub fn is_decided(&self) -> bool {
        self.line_status().is_some() && self.weight.is_some()
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.kind, VerdictKind::Accepted)
    }

    /// Persisted status for a line created from this verdict.
    ///
    /// `None` for pending/offline: nothing may be persisted from those.
    pub fn line_status(&self) -> Option<LineStatus> {
        match self.kind {
            VerdictKind::Accepted => Some(LineStatus::Valid),
            VerdictKind::Rejected { .. } => Some(LineStatus::Invalid),
            VerdictKind::Pending | VerdictKind::Offline => None,
        }
    }
}
