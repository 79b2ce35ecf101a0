//! Ledger Module
//! Per-user wager persistence and the metrics derived from it.

pub mod aggregator;
pub mod legacy_csv;
pub mod sqlite_store;
pub mod store;

pub use aggregator::{
    cumulative_series, summarize, CumulativePoint, DivisionError, SummaryMetrics,
    DEFAULT_UNIT_SIZE,
};
pub use sqlite_store::SqliteLedgerStore;
pub use store::{LedgerStore, MemoryLedgerStore, StoreError};
