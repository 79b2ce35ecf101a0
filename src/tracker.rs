//! Slip Tracker
//! Extract → parse → append, one slip at a time, for an explicit user.

use crate::ledger::{
    cumulative_series, summarize, CumulativePoint, LedgerStore, StoreError, SummaryMetrics,
};
use crate::models::{UserIdentity, WagerRecord};
use crate::slip::{parse_wager_table, ParseError};
use crate::vision::{SlipExtractor, SlipImage};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Why a single slip could not be recorded.
#[derive(Debug)]
pub enum SlipError {
    Extraction(anyhow::Error),
    Parse(ParseError),
    Store(StoreError),
}

impl std::fmt::Display for SlipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlipError::Extraction(e) => write!(f, "extraction failed: {:#}", e),
            SlipError::Parse(e) => write!(f, "unreadable table: {}", e),
            SlipError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SlipError {}

impl From<ParseError> for SlipError {
    fn from(err: ParseError) -> Self {
        SlipError::Parse(err)
    }
}

impl From<StoreError> for SlipError {
    fn from(err: StoreError) -> Self {
        SlipError::Store(err)
    }
}

/// A slip that made it into the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedSlip {
    /// Raw model reply, shown back to the user.
    pub reply: String,
    pub records: Vec<WagerRecord>,
}

#[derive(Debug)]
pub struct SlipOutcome {
    pub slip: String,
    pub result: Result<RecordedSlip, SlipError>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<SlipOutcome>,
}

impl BatchReport {
    pub fn recorded_rows(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(|r| r.records.len())
            .sum()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }
}

/// Everything a ledger view needs, read in one go.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerView {
    pub user: UserIdentity,
    pub records: Vec<WagerRecord>,
    pub metrics: SummaryMetrics,
    pub series: Vec<CumulativePoint>,
}

#[derive(Clone)]
pub struct SlipTracker {
    store: Arc<dyn LedgerStore>,
    extractor: Arc<dyn SlipExtractor>,
}

impl SlipTracker {
    pub fn new(store: Arc<dyn LedgerStore>, extractor: Arc<dyn SlipExtractor>) -> Self {
        Self { store, extractor }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Process slips in order. A failing slip is reported and the rest still run.
    pub async fn process_batch(&self, user: &UserIdentity, images: &[SlipImage]) -> BatchReport {
        info!(user = user.as_str(), slips = images.len(), "processing slip batch");

        let mut report = BatchReport::default();
        for image in images {
            let result = self.process_slip(user, image).await;
            match &result {
                Ok(recorded) => info!(
                    user = user.as_str(),
                    slip = image.name.as_str(),
                    rows = recorded.records.len(),
                    "slip recorded"
                ),
                Err(e) => warn!(
                    user = user.as_str(),
                    slip = image.name.as_str(),
                    "could not process slip: {}",
                    e
                ),
            }
            report.outcomes.push(SlipOutcome {
                slip: image.name.clone(),
                result,
            });
        }
        report
    }

    async fn process_slip(
        &self,
        user: &UserIdentity,
        image: &SlipImage,
    ) -> Result<RecordedSlip, SlipError> {
        let reply = self
            .extractor
            .extract(image)
            .await
            .map_err(SlipError::Extraction)?;
        self.record_reply(user, reply)
    }

    /// Parse a model reply and append its rows.
    pub fn record_reply(&self, user: &UserIdentity, reply: String) -> Result<RecordedSlip, SlipError> {
        let records = parse_wager_table(&reply)?;
        if !records.is_empty() {
            self.store.append(user, &records)?;
        }
        Ok(RecordedSlip { reply, records })
    }

    /// Load the full ledger and derive metrics and the profit series.
    pub fn view(&self, user: &UserIdentity, unit_size: f64) -> Result<LedgerView, StoreError> {
        let records = self.store.read(user)?;
        let metrics = summarize(&records, unit_size);
        let series = cumulative_series(&records);
        Ok(LedgerView {
            user: user.clone(),
            records,
            metrics,
            series,
        })
    }
}
