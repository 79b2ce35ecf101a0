//! Integration tests for the slip pipeline
//!
//! Drives `SlipTracker` end to end against a SQLite ledger in a temp file, with a
//! scripted extractor standing in for the vision model.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bet_tracker::{
    ledger::{LedgerStore, SqliteLedgerStore},
    report,
    slip::ParseError,
    tracker::{SlipError, SlipTracker},
    vision::{SlipExtractor, SlipImage},
    UserIdentity,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// Hands out replies in submission order; `None` simulates a failed API call.
struct ScriptedExtractor {
    replies: Mutex<VecDeque<Option<&'static str>>>,
}

impl ScriptedExtractor {
    fn new(replies: Vec<Option<&'static str>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }
}

#[async_trait]
impl SlipExtractor for ScriptedExtractor {
    async fn extract(&self, image: &SlipImage) -> Result<String> {
        let next = self.replies.lock().unwrap().pop_front().flatten();
        next.map(str::to_string)
            .ok_or_else(|| anyhow!("vision api 500 for {}", image.name))
    }
}

fn slips(n: usize) -> Vec<SlipImage> {
    (1..=n)
        .map(|i| SlipImage::new(format!("slip{}.jpg", i), "image/jpeg", vec![0xFF, 0xD8]))
        .collect()
}

fn setup(replies: Vec<Option<&'static str>>) -> (SlipTracker, Arc<SqliteLedgerStore>, NamedTempFile) {
    let temp = NamedTempFile::new().unwrap();
    let store = Arc::new(SqliteLedgerStore::open(temp.path().to_str().unwrap()).unwrap());
    let tracker = SlipTracker::new(store.clone(), Arc::new(ScriptedExtractor::new(replies)));
    (tracker, store, temp)
}

#[tokio::test]
async fn test_batch_keeps_going_after_bad_slip() {
    let (tracker, store, _temp) = setup(vec![
        Some("Amount Wagered | Amount Won\n---|---\n$10 | $20 | $30"),
        None,
        Some("Amount Wagered | Amount Won\n---|---\n$100 | $150\n$50 | $0"),
    ]);
    let user = UserIdentity::new("Nikh").unwrap();

    let report = tracker.process_batch(&user, &slips(3)).await;

    assert_eq!(report.outcomes.len(), 3);
    assert!(matches!(
        report.outcomes[0].result,
        Err(SlipError::Parse(ParseError::ColumnCountMismatch {
            expected: 2,
            found: 3,
            ..
        }))
    ));
    assert!(matches!(report.outcomes[1].result, Err(SlipError::Extraction(_))));
    assert!(report.outcomes[2].result.is_ok());

    // Only the good slip reached the ledger.
    assert_eq!(store.read(&user).unwrap().len(), 2);

    let view = tracker.view(&user, 5.0).unwrap();
    assert_eq!(view.metrics.total_wagered, 150.0);
    assert_eq!(view.metrics.total_won, 150.0);
    assert_eq!(view.metrics.win_count, 1);
    assert_eq!(view.metrics.record_count, 2);
    assert_eq!(view.metrics.profit, 0.0);
}

#[tokio::test]
async fn test_ledgers_are_per_user() {
    let reply = "| Amount Wagered | Amount Won | Date |\n|---|---|---|\n| $20 | $45 | 04/01/2024 |";
    let (tracker, store, _temp) = setup(vec![Some(reply), Some(reply), Some(reply)]);
    let alice = UserIdentity::new("alice").unwrap();
    let bob = UserIdentity::new("bob").unwrap();

    tracker.process_batch(&alice, &slips(2)).await;
    tracker.process_batch(&bob, &slips(1)).await;

    assert_eq!(store.read(&alice).unwrap().len(), 2);
    assert_eq!(store.read(&bob).unwrap().len(), 1);
    assert_eq!(store.list_users().unwrap(), vec![alice.clone(), bob]);

    let view = tracker.view(&alice, 5.0).unwrap();
    let cumulative: Vec<f64> = view.series.iter().map(|p| p.cumulative).collect();
    assert_eq!(cumulative, vec![25.0, 50.0]);
}

#[tokio::test]
async fn test_zero_unit_size_renders_placeholder() {
    let (tracker, _store, _temp) = setup(vec![Some(
        "Amount Wagered | Amount Won\n---|---\n$10 | $30",
    )]);
    let user = UserIdentity::new("carol").unwrap();
    tracker.process_batch(&user, &slips(1)).await;

    let view = tracker.view(&user, 0.0).unwrap();
    assert!(view.metrics.units_change().is_err());
    assert_eq!(report::format_units(&view.metrics), "0 u");
}

#[test]
fn test_empty_ledger_summary_is_zero() {
    let (tracker, _store, _temp) = setup(Vec::new());
    let user = UserIdentity::new("nobody").unwrap();

    let view = tracker.view(&user, 5.0).unwrap();
    assert!(view.records.is_empty());
    assert_eq!(view.metrics.total_wagered, 0.0);
    assert_eq!(view.metrics.record_count, 0);
    assert_eq!(view.metrics.units_change().unwrap(), 0.0);
}
