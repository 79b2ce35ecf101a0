//! Import of `betting_results.csv` files kept by earlier versions of the tracker.
//!
//! Amounts in those files are free text (`$25`, `1,000.00`, sometimes blank), so
//! every row is decoded leniently and unreadable rows are skipped.

use crate::models::WagerRecord;
use crate::slip::amount::{parse_amount, parse_slip_date};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Read;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct LegacyRow {
    #[serde(rename = "Amount Wagered")]
    amount_wagered: Option<String>,
    #[serde(rename = "Amount Won")]
    amount_won: Option<String>,
    #[serde(rename = "Date", default)]
    date: Option<String>,
}

#[derive(Debug, Default)]
pub struct LegacyImport {
    pub records: Vec<WagerRecord>,
    pub skipped: usize,
}

pub fn read_legacy_csv<R: Read>(reader: R) -> Result<LegacyImport> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut import = LegacyImport::default();
    for (idx, row) in rdr.deserialize::<LegacyRow>().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        let row = match row {
            Ok(row) => row,
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => {
                return Err(e).context("reading legacy csv");
            }
            Err(e) => {
                warn!(line, "skipping unreadable legacy row: {}", e);
                import.skipped += 1;
                continue;
            }
        };

        let wagered = row.amount_wagered.as_deref().and_then(parse_amount);
        let won = row.amount_won.as_deref().and_then(parse_amount);
        let date = row.date.as_deref().and_then(parse_slip_date);

        match wagered
            .zip(won)
            .and_then(|(wagered, won)| WagerRecord::new(wagered, won, date))
        {
            Some(record) => import.records.push(record),
            None => {
                warn!(line, "skipping legacy row with malformed amount");
                import.skipped += 1;
            }
        }
    }

    Ok(import)
}
