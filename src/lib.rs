//! Bet Tracker Library
//!
//! Reads wager tables off betting-slip photos with a vision model and keeps a
//! per-user ledger of the results.

pub mod api;
pub mod config;
pub mod ledger;
pub mod models;
pub mod report;
pub mod slip;
pub mod tracker;
pub mod vision;

pub use models::{UserIdentity, WagerRecord};
pub use tracker::SlipTracker;
