//! SQLite Ledger Storage
//! One database holds every user's ledger; each append is a single transaction.

use crate::ledger::store::{LedgerStore, StoreError};
use crate::models::{UserIdentity, WagerRecord};
use crate::slip::amount::{parse_amount, parse_slip_date};
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::{params, types::Value, Connection, ErrorCode};
use tracing::{info, warn};

const STORED_DATE_FORMAT: &str = "%Y-%m-%d";

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

pub struct SqliteLedgerStore {
    conn: Mutex<Connection>,
}

impl SqliteLedgerStore {
    /// Open (or create) the ledger database at `db_path`.
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();

        Self::init_schema(&conn)?;
        info!(path = db_path, "ledger store ready");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                name TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        // Amount columns are left loosely typed: rows written by other tools
        // may carry text such as "$25", which is decoded on read.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS wagers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_name TEXT NOT NULL,
                amount_wagered,
                amount_won,
                slip_date TEXT,
                recorded_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_wagers_user ON wagers(user_name, id)",
            [],
        )?;

        Ok(())
    }
}

impl LedgerStore for SqliteLedgerStore {
    fn read(&self, user: &UserIdentity) -> Result<Vec<WagerRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, amount_wagered, amount_won, slip_date
             FROM wagers WHERE user_name = ?1 ORDER BY id ASC",
        )?;

        let rows = stmt
            .query_map(params![user.as_str()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Value>(1)?,
                    row.get::<_, Value>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for (id, wagered, won, date) in rows {
            let date = date.as_deref().and_then(decode_date);
            match (decode_amount(&wagered), decode_amount(&won)) {
                (Some(wagered), Some(won)) => {
                    if let Some(record) = WagerRecord::new(wagered, won, date) {
                        records.push(record);
                    }
                }
                _ => warn!(
                    user = user.as_str(),
                    row_id = id,
                    "skipping stored wager with malformed amount"
                ),
            }
        }

        Ok(records)
    }

    fn append(&self, user: &UserIdentity, records: &[WagerRecord]) -> Result<usize, StoreError> {
        let now = Utc::now().to_rfc3339();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO users (name, created_at) VALUES (?1, ?2)",
            params![user.as_str(), now],
        )?;

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO wagers (user_name, amount_wagered, amount_won, slip_date, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in records {
                stmt.execute(params![
                    user.as_str(),
                    record.amount_wagered(),
                    record.amount_won(),
                    record
                        .date()
                        .map(|d| d.format(STORED_DATE_FORMAT).to_string()),
                    now,
                ])?;
            }
        }

        tx.commit()?;
        info!(user = user.as_str(), rows = records.len(), "appended wagers");
        Ok(records.len())
    }

    fn list_users(&self) -> Result<Vec<UserIdentity>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("SELECT name FROM users ORDER BY name ASC")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(names
            .iter()
            .filter_map(|name| match UserIdentity::new(name) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(name = name.as_str(), "ignoring stored user: {}", e);
                    None
                }
            })
            .collect())
    }

    fn add_user(&self, name: &str) -> Result<UserIdentity, StoreError> {
        let user = UserIdentity::new(name)?;
        let conn = self.conn.lock();

        let inserted = conn.execute(
            "INSERT INTO users (name, created_at) VALUES (?1, ?2)",
            params![user.as_str(), Utc::now().to_rfc3339()],
        );

        match inserted {
            Ok(_) => {
                info!(user = user.as_str(), "created user");
                Ok(user)
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::DuplicateUser(user.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn decode_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Real(v) => Some(*v).filter(|v| v.is_finite() && *v >= 0.0),
        Value::Integer(v) => (*v >= 0).then_some(*v as f64),
        Value::Text(s) => parse_amount(s),
        Value::Null | Value::Blob(_) => None,
    }
}

fn decode_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), STORED_DATE_FORMAT)
        .ok()
        .or_else(|| parse_slip_date(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (SqliteLedgerStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = SqliteLedgerStore::open(db_path).unwrap();
        (store, temp_file)
    }

    fn user(name: &str) -> UserIdentity {
        UserIdentity::new(name).unwrap()
    }

    #[test]
    fn test_missing_user_reads_empty() {
        let (store, _temp) = create_test_store();
        assert!(store.read(&user("nobody")).unwrap().is_empty());
    }

    #[test]
    fn test_append_and_read_roundtrip_keeps_order_and_dates() {
        let (store, _temp) = create_test_store();
        let alice = user("alice");
        let rows = vec![
            WagerRecord::new(100.0, 150.0, NaiveDate::from_ymd_opt(2024, 1, 15)).unwrap(),
            WagerRecord::new(50.0, 0.0, None).unwrap(),
        ];

        assert_eq!(store.append(&alice, &rows).unwrap(), 2);
        assert_eq!(store.read(&alice).unwrap(), rows);

        // Other users' ledgers are untouched.
        assert!(store.read(&user("bob")).unwrap().is_empty());
    }

    #[test]
    fn test_append_registers_user() {
        let (store, _temp) = create_test_store();
        let carol = user("carol");
        store
            .append(&carol, &[WagerRecord::new(1.0, 2.0, None).unwrap()])
            .unwrap();
        assert_eq!(store.list_users().unwrap(), vec![carol]);
    }

    #[test]
    fn test_add_user_duplicate_and_reserved() {
        let (store, _temp) = create_test_store();
        store.add_user("zed").unwrap();
        store.add_user("amy").unwrap();

        assert!(matches!(store.add_user("zed"), Err(StoreError::DuplicateUser(_))));
        assert!(matches!(store.add_user("New User"), Err(StoreError::ReservedName)));

        let names: Vec<String> = store
            .list_users()
            .unwrap()
            .iter()
            .map(|u| u.to_string())
            .collect();
        assert_eq!(names, vec!["amy", "zed"]);
    }

    #[test]
    fn test_malformed_stored_amounts_are_skipped() {
        let (store, _temp) = create_test_store();
        let dave = user("dave");
        {
            let conn = store.conn.lock();
            conn.execute(
                "INSERT INTO wagers (user_name, amount_wagered, amount_won, slip_date, recorded_at)
                 VALUES ('dave', '$25', '$40.50', '02/03/2024', 'now'),
                        ('dave', 'pending', '$10', NULL, 'now'),
                        ('dave', 10, 0, '2024-02-04', 'now')",
                [],
            )
            .unwrap();
        }

        let records = store.read(&dave).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].amount_wagered(), 25.0);
        assert_eq!(records[0].amount_won(), 40.5);
        assert_eq!(records[0].date(), NaiveDate::from_ymd_opt(2024, 2, 3));
        assert_eq!(records[1].amount_wagered(), 10.0);
        assert_eq!(records[1].date(), NaiveDate::from_ymd_opt(2024, 2, 4));
    }

    #[test]
    fn test_failed_append_leaves_no_rows_or_user() {
        let (store, _temp) = create_test_store();
        let frank = user("frank");
        {
            let conn = store.conn.lock();
            conn.execute_batch(
                "CREATE TRIGGER fail_second_row BEFORE INSERT ON wagers
                 WHEN (SELECT COUNT(*) FROM wagers WHERE user_name = NEW.user_name) >= 1
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();
        }

        let rows = vec![
            WagerRecord::new(10.0, 20.0, None).unwrap(),
            WagerRecord::new(5.0, 0.0, None).unwrap(),
        ];
        assert!(matches!(store.append(&frank, &rows), Err(StoreError::Unavailable(_))));

        assert!(store.read(&frank).unwrap().is_empty());
        assert!(store.list_users().unwrap().is_empty());
    }

    #[test]
    fn test_data_survives_reopen() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let erin = user("erin");

        {
            let store = SqliteLedgerStore::open(db_path).unwrap();
            store
                .append(&erin, &[WagerRecord::new(3.0, 9.0, None).unwrap()])
                .unwrap();
        }

        let store = SqliteLedgerStore::open(db_path).unwrap();
        assert_eq!(store.read(&erin).unwrap().len(), 1);
    }
}
