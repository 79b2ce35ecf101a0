use crate::models::WagerRecord;
use chrono::NaiveDate;
use serde::Serialize;

pub const DEFAULT_UNIT_SIZE: f64 = 5.0;

/// Raised when units are requested for a unit size that is not positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DivisionError {
    pub unit_size: f64,
}

impl std::fmt::Display for DivisionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unit size must be positive (got {})", self.unit_size)
    }
}

impl std::error::Error for DivisionError {}

/// Lifetime totals for one ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub total_wagered: f64,
    pub total_won: f64,
    pub win_count: u64,
    pub record_count: u64,
    pub profit: f64,
    pub unit_size: f64,
}

impl SummaryMetrics {
    /// Total won expressed in units, rounded to cents.
    pub fn units_change(&self) -> Result<f64, DivisionError> {
        if !(self.unit_size.is_finite() && self.unit_size > 0.0) {
            return Err(DivisionError {
                unit_size: self.unit_size,
            });
        }
        Ok(round_cents(self.total_won / self.unit_size))
    }

    pub fn loss_count(&self) -> u64 {
        self.record_count - self.win_count
    }

    pub fn win_rate(&self) -> f64 {
        if self.record_count > 0 {
            self.win_count as f64 / self.record_count as f64
        } else {
            0.0
        }
    }
}

/// One point of the cumulative profit chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CumulativePoint {
    pub date: NaiveDate,
    pub differential: f64,
    pub cumulative: f64,
}

/// Compute lifetime metrics. An empty ledger yields all zeros.
pub fn summarize(records: &[WagerRecord], unit_size: f64) -> SummaryMetrics {
    let mut total_wagered = 0.0;
    let mut total_won = 0.0;
    let mut win_count = 0u64;

    for record in records {
        total_wagered += record.amount_wagered();
        total_won += record.amount_won();
        if record.is_win() {
            win_count += 1;
        }
    }

    SummaryMetrics {
        total_wagered,
        total_won,
        win_count,
        record_count: records.len() as u64,
        profit: total_won - total_wagered,
        unit_size,
    }
}

/// Running sum of per-wager differentials over dated records, oldest first.
///
/// Undated records are left out. Records sharing a date keep ledger order.
pub fn cumulative_series(records: &[WagerRecord]) -> Vec<CumulativePoint> {
    let mut dated: Vec<(NaiveDate, f64)> = records
        .iter()
        .filter_map(|r| r.date().map(|d| (d, r.differential())))
        .collect();
    dated.sort_by_key(|(date, _)| *date);

    let mut running = 0.0;
    dated
        .into_iter()
        .map(|(date, differential)| {
            running += differential;
            CumulativePoint {
                date,
                differential,
                cumulative: running,
            }
        })
        .collect()
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
