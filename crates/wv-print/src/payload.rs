use chrono::{DateTime, Utc};
use serde::Serialize;
use wv_schemas::{Header, HeaderId, LineId, LineStatus, OrderMetadata, WeightLine};

/// Label timestamp layout, e.g. `07-Mar-2026 14:05:09`.
pub const LABEL_TIME_FORMAT: &str = "%d-%b-%Y %H:%M:%S";

/// Everything a label template needs for one weight line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrintPayload {
    pub header_id: HeaderId,
    pub line_id: LineId,
    pub revision: u32,
    /// Verification code.
    pub serial: String,
    /// Carton number.
    pub index_no: u32,
    /// Weight shown on the label: the corrected weight when the line was reweighed.
    pub gross_weight: f64,
    pub status: LineStatus,
    pub label_time: String,
    pub order: OrderMetadata,
}

impl PrintPayload {
    pub fn for_line(line: &WeightLine, header: &Header, printed_at: DateTime<Utc>) -> Self {
        Self {
            header_id: header.id,
            line_id: line.id,
            revision: line.revision,
            serial: line.serial.clone(),
            index_no: line.index_no,
            gross_weight: line.corrected_weight.unwrap_or(line.gross_weight),
            status: line.status,
            label_time: printed_at.format(LABEL_TIME_FORMAT).to_string(),
            order: header.order.clone(),
        }
    }
}
