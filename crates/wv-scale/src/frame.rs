//! Indicator frame parsing.
//!
//! Bench indicators report frames such as `"ST,NT, 9,    0.54 kg"`: status
//! flags, a device field, then the weight immediately followed by the unit.
//! Some bridges forward a bare number instead. Both are accepted here.

use crate::ReadError;

/// Extract the weight in kilograms from one indicator frame.
///
/// The weight is the token immediately before the last `kg` (case-insensitive),
/// delimited by a comma or whitespace. A frame that is just a number is taken
/// as kilograms. Anything else is [`ReadError::Malformed`].
pub fn parse_scale_output(raw: &str) -> Result<f64, ReadError> {
    let t = raw.trim();
    if t.is_empty() {
        return Err(ReadError::Malformed("empty scale frame".to_string()));
    }

    if let Ok(w) = t.parse::<f64>() {
        return finite(w, raw);
    }

    let lower = t.to_ascii_lowercase();
    let Some(unit_at) = lower.rfind("kg") else {
        return Err(ReadError::Malformed(format!("no kg unit in frame {raw:?}")));
    };

    let head = t[..unit_at].trim_end();
    let token = head
        .rsplit(|c: char| c == ',' || c.is_whitespace())
        .next()
        .unwrap_or_default();

    let w = token
        .parse::<f64>()
        .map_err(|_| ReadError::Malformed(format!("unparseable weight in frame {raw:?}")))?;
    finite(w, raw)
}

fn finite(w: f64, raw: &str) -> Result<f64, ReadError> {
    if w.is_finite() {
        Ok(w)
    } else {
        Err(ReadError::Malformed(format!("non-finite weight in frame {raw:?}")))
    }
}
