//! Read-side view over a header's lines.

use serde::Serialize;
use wv_schemas::{LineStatus, WeightLine};

/// A header's lines ordered newest-first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineHistory {
    lines: Vec<WeightLine>,
}

/// Counts and weights over a [`LineHistory`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistorySummary {
    pub total: usize,
    pub total_weight: f64,
    pub avg_weight: f64,
    pub valid: usize,
    pub invalid: usize,
    pub cancelled: usize,
    pub draft: usize,
}

impl LineHistory {
    /// Sort newest-first by `recorded_at`, ties broken by id descending.
    pub fn from_lines(mut lines: Vec<WeightLine>) -> Self {
        lines.sort_by(|a, b| {
            b.recorded_at
                .cmp(&a.recorded_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Self { lines }
    }

    pub fn lines(&self) -> &[WeightLine] {
        &self.lines
    }

    pub fn latest(&self) -> Option<&WeightLine> {
        self.lines.first()
    }

    pub fn find_serial(&self, serial: &str) -> Option<&WeightLine> {
        self.lines.iter().find(|l| l.serial == serial)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines the reweigh path may correct.
    pub fn correctable(&self) -> impl Iterator<Item = &WeightLine> {
        self.lines.iter().filter(|l| l.status.is_correctable())
    }

    /// Effective weight is the corrected weight when a reweigh recorded one.
    pub fn summary(&self) -> HistorySummary {
        let mut s = HistorySummary {
            total: self.lines.len(),
            ..HistorySummary::default()
        };
        for l in &self.lines {
            s.total_weight += l.corrected_weight.unwrap_or(l.gross_weight);
            match l.status {
                LineStatus::Valid => s.valid += 1,
                LineStatus::Invalid => s.invalid += 1,
                LineStatus::Cancelled => s.cancelled += 1,
                LineStatus::Draft => s.draft += 1,
            }
        }
        if s.total > 0 {
            s.avg_weight = s.total_weight / s.total as f64;
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn line(id: i64, ts: i64, w: f64, status: LineStatus) -> WeightLine {
        WeightLine {
            id,
            header_id: 1,
            serial: format!("S{id:05}"),
            gross_weight: w,
            recorded_at: DateTime::<Utc>::from_timestamp(ts, 0).unwrap(),
            status,
            remark: None,
            index_no: id as u32,
            corrected_weight: None,
            revision: 0,
        }
    }

    #[test]
    fn sorted_newest_first_with_id_tiebreak() {
        let h = LineHistory::from_lines(vec![
            line(1, 100, 2.5, LineStatus::Valid),
            line(3, 300, 2.5, LineStatus::Valid),
            line(2, 300, 2.5, LineStatus::Invalid),
        ]);
        let ids: Vec<i64> = h.lines().iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(h.latest().map(|l| l.id), Some(3));
    }

    #[test]
    fn summary_counts_and_average() {
        let mut corrected = line(4, 400, 2.9, LineStatus::Valid);
        corrected.corrected_weight = Some(2.5);
        let h = LineHistory::from_lines(vec![
            line(1, 100, 2.5, LineStatus::Valid),
            line(2, 200, 2.7, LineStatus::Invalid),
            line(3, 300, 2.3, LineStatus::Cancelled),
            corrected,
        ]);
        let s = h.summary();
        assert_eq!(s.total, 4);
        assert_eq!((s.valid, s.invalid, s.cancelled, s.draft), (2, 1, 1, 0));
        assert!((s.total_weight - 10.0).abs() < 1e-9);
        assert!((s.avg_weight - 2.5).abs() < 1e-9);
    }

    #[test]
    fn empty_summary_has_zero_average() {
        let s = LineHistory::default().summary();
        assert_eq!(s.total, 0);
        assert_eq!(s.avg_weight, 0.0);
    }

    #[test]
    fn correctable_excludes_cancelled_and_draft() {
        let h = LineHistory::from_lines(vec![
            line(1, 100, 2.5, LineStatus::Valid),
            line(2, 200, 2.5, LineStatus::Draft),
            line(3, 300, 2.5, LineStatus::Cancelled),
            line(4, 400, 2.5, LineStatus::Invalid),
        ]);
        let ids: Vec<i64> = h.correctable().map(|l| l.id).collect();
        assert_eq!(ids, vec![4, 1]);
        assert_eq!(h.find_serial("S00002").map(|l| l.id), Some(2));
    }
}
