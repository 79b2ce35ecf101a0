//! Slip Parsing
//! Turns the vision model's text reply into typed wager records.

pub mod amount;
pub mod table;

pub use amount::{parse_amount, parse_slip_date};
pub use table::{parse_wager_table, ParseError};
