//! Text rendering of ledger views for the terminal.

use crate::ledger::{CumulativePoint, SummaryMetrics};
use crate::models::WagerRecord;
use crate::tracker::{RecordedSlip, SlipError};
use std::fmt::Write;

/// Shown in place of the units metric when it cannot be computed.
pub const UNITS_PLACEHOLDER: &str = "0 u";

const CHART_WIDTH: usize = 40;

/// `1250.5` → `$1,250.50`; negatives as `-$12.00`.
pub fn format_currency(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

/// Lifetime record as `wins-total`.
pub fn format_record(metrics: &SummaryMetrics) -> String {
    format!("{}-{}", metrics.win_count, metrics.record_count)
}

pub fn format_units(metrics: &SummaryMetrics) -> String {
    match metrics.units_change() {
        Ok(units) => format!("{:.2} u", units),
        Err(_) => UNITS_PLACEHOLDER.to_string(),
    }
}

pub fn render_summary(user: &str, metrics: &SummaryMetrics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Selected User = {}", user);
    let _ = writeln!(out, "{:<22}{}", "Total Amount Wagered", format_currency(metrics.total_wagered));
    let _ = writeln!(out, "{:<22}{}", "Total Won", format_currency(metrics.total_won));
    let _ = writeln!(out, "{:<22}{}", "Profit", format_currency(metrics.profit));
    let _ = writeln!(out, "{:<22}{}", "Lifetime Record", format_record(metrics));
    let _ = writeln!(
        out,
        "{:<22}{:.1}% ({} W, {} L)",
        "Win Rate",
        metrics.win_rate() * 100.0,
        metrics.win_count,
        metrics.loss_count()
    );
    let _ = writeln!(
        out,
        "{:<22}{} (unit {})",
        "Units",
        format_units(metrics),
        format_currency(metrics.unit_size)
    );
    out
}

/// One slip's result; a failure is a notice, never fatal to the run.
pub fn render_slip_outcome(slip: &str, result: &Result<RecordedSlip, SlipError>) -> String {
    match result {
        Ok(recorded) => format!(
            "== {} ==\nBet Results:\n{}\n({} wager(s) recorded)\n\n",
            slip,
            recorded.reply.trim(),
            recorded.records.len()
        ),
        Err(e) => format!("== {} ==\ncould not process this slip: {}\n\n", slip, e),
    }
}

pub fn render_ledger(records: &[WagerRecord]) -> String {
    if records.is_empty() {
        return "No Data\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "{:>5}  {:>14}  {:>14}  {:<10}", "#", "Amount Wagered", "Amount Won", "Date");
    let _ = writeln!(out, "{}", "-".repeat(50));
    for (i, r) in records.iter().enumerate() {
        let date = r
            .date()
            .map(|d| d.format("%m/%d/%Y").to_string())
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{:>5}  {:>14}  {:>14}  {:<10}",
            i + 1,
            format_currency(r.amount_wagered()),
            format_currency(r.amount_won()),
            date
        );
    }
    out
}

/// Horizontal bar chart of the cumulative profit series, one row per point.
/// Bars grow right of the axis for profit and left of it for loss.
pub fn render_chart(series: &[CumulativePoint]) -> String {
    if series.is_empty() {
        return "No dated wagers to chart\n".to_string();
    }

    let peak = series
        .iter()
        .map(|p| p.cumulative.abs())
        .fold(0.0_f64, f64::max);
    let half = CHART_WIDTH / 2;
    let scale = if peak > 0.0 { half as f64 / peak } else { 0.0 };

    let mut out = String::new();
    for point in series {
        let len = (point.cumulative.abs() * scale).round() as usize;
        let (left, right) = if point.cumulative < 0.0 {
            (format!("{:>half$}", "#".repeat(len)), String::new())
        } else {
            (" ".repeat(half), "#".repeat(len))
        };
        let _ = writeln!(
            out,
            "{}  {}|{:<half$}  {}",
            point.date.format("%m/%d/%Y"),
            left,
            right,
            format_currency(point.cumulative)
        );
    }
    out
}
