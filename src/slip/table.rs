//! Pipe-table parser for vision model replies.
//!
//! The model is asked for a markdown table with "Amount Wagered", "Amount Won"
//! and "Date" columns, but replies drift: prose around the table, fenced blocks,
//! missing separator rows, stray currency formatting. This parser accepts that
//! drift and rejects tables whose rows do not line up with the header.

use crate::models::WagerRecord;
use crate::slip::amount::{parse_amount, parse_slip_date};
use tracing::{debug, warn};

pub const COL_AMOUNT_WAGERED: &str = "Amount Wagered";
pub const COL_AMOUNT_WON: &str = "Amount Won";
pub const COL_DATE: &str = "Date";

/// Errors raised for text that holds a table the parser cannot trust.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Fewer than two table lines: no header plus separator/data.
    MissingHeader,
    /// The header does not name a required column.
    MissingColumn(&'static str),
    /// A data row has a different number of cells than the header.
    ColumnCountMismatch {
        line: usize,
        expected: usize,
        found: usize,
    },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingHeader => write!(f, "table needs a header and at least one more line"),
            Self::MissingColumn(name) => write!(f, "table header has no \"{}\" column", name),
            Self::ColumnCountMismatch {
                line,
                expected,
                found,
            } => write!(
                f,
                "line {}: row has {} cells but header has {}",
                line, found, expected
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// Column positions resolved once from the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnLayout {
    width: usize,
    wagered: usize,
    won: usize,
    date: Option<usize>,
}

impl ColumnLayout {
    fn from_header(header: &[&str]) -> Result<Self, ParseError> {
        let find = |name: &str| {
            header
                .iter()
                .position(|cell| normalize_header(cell).eq_ignore_ascii_case(name))
        };

        let wagered = find(COL_AMOUNT_WAGERED).ok_or(ParseError::MissingColumn(COL_AMOUNT_WAGERED))?;
        let won = find(COL_AMOUNT_WON).ok_or(ParseError::MissingColumn(COL_AMOUNT_WON))?;

        Ok(Self {
            width: header.len(),
            wagered,
            won,
            date: find(COL_DATE),
        })
    }
}

/// Parse a model reply into wager records, in row order.
///
/// Returns an empty vector when the text holds no pipe table at all. Rows
/// whose amounts cannot be read are dropped with a warning.
pub fn parse_wager_table(text: &str) -> Result<Vec<WagerRecord>, ParseError> {
    // A fence only wins if it holds the table; line numbers stay relative to the reply.
    let (line_offset, body) = match fenced_body(text) {
        Some((offset, body)) if body.lines().any(|line| line.contains('|')) => (offset, body),
        _ => (0, text),
    };

    let lines: Vec<(usize, Vec<&str>)> = body
        .lines()
        .enumerate()
        .map(|(idx, line)| (line_offset + idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && line.contains('|'))
        .map(|(no, line)| (no, split_cells(line)))
        .collect();

    if lines.is_empty() {
        debug!("no pipe table found in model reply");
        return Ok(Vec::new());
    }
    if lines.len() < 2 {
        return Err(ParseError::MissingHeader);
    }

    let layout = ColumnLayout::from_header(&lines[0].1)?;

    // Only a real separator row is skipped; a bare header + row table keeps its row.
    let data_start = if is_separator(&lines[1].1) { 2 } else { 1 };

    let mut records = Vec::with_capacity(lines.len() - data_start);
    for (line_no, cells) in &lines[data_start..] {
        if cells.len() != layout.width {
            return Err(ParseError::ColumnCountMismatch {
                line: *line_no,
                expected: layout.width,
                found: cells.len(),
            });
        }

        let wagered = parse_amount(cells[layout.wagered]);
        let won = parse_amount(cells[layout.won]);
        let (Some(wagered), Some(won)) = (wagered, won) else {
            warn!(
                line = *line_no,
                wagered = cells[layout.wagered],
                won = cells[layout.won],
                "dropping slip row with unreadable amount"
            );
            continue;
        };

        let date = layout.date.and_then(|i| parse_slip_date(cells[i]));
        if let Some(record) = WagerRecord::new(wagered, won, date) {
            records.push(record);
        }
    }

    Ok(records)
}

/// Body of the first ``` fenced block, if any, with the number of reply lines
/// before it. An unterminated fence runs to the end of the text.
fn fenced_body(text: &str) -> Option<(usize, &str)> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    // Skip the info string (e.g. ```markdown) on the opening line.
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(after_fence.len());
    let lines_before = text[..open + 3 + body_start].matches('\n').count();
    let body = &after_fence[body_start..];
    let body = match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    };
    Some((lines_before, body))
}

fn split_cells(line: &str) -> Vec<&str> {
    let mut cells: Vec<&str> = line.split('|').map(str::trim).collect();
    if cells.first().is_some_and(|c| c.is_empty()) {
        cells.remove(0);
    }
    if cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
    cells
}

fn is_separator(cells: &[&str]) -> bool {
    !cells.is_empty()
        && cells.iter().all(|cell| {
            cell.contains('-') && cell.chars().all(|c| matches!(c, '-' | ':' | ' '))
        })
}

fn normalize_header(cell: &str) -> &str {
    cell.trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace())
}
