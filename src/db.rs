use crate::error::{InventoryError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Typed inventory record.
///
/// `name` is the business key: unique within the store and used for all
/// merge decisions. `id` is the surrogate key the store assigns on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: Option<i64>,
    pub name: String,
    pub quantity: i64,
    /// Price in cents
    pub price: i64,
    pub updated_at: NaiveDateTime,
}

impl Record {
    /// Build an unsaved record, checking the field invariants.
    pub fn new(
        name: impl Into<String>,
        quantity: i64,
        price: i64,
        updated_at: NaiveDateTime,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(InventoryError::format("product_name", &name, "name is empty"));
        }
        if quantity < 0 {
            return Err(InventoryError::format(
                "product_quantity",
                &quantity.to_string(),
                "quantity is negative",
            ));
        }
        if price < 0 {
            return Err(InventoryError::format(
                "product_price",
                &price.to_string(),
                "price is negative",
            ));
        }

        Ok(Record {
            id: None,
            name,
            quantity,
            price,
            updated_at,
        })
    }

    /// Price rendered as `$units.cents`
    pub fn display_price(&self) -> String {
        format!("${}.{:02}", self.price / 100, self.price % 100)
    }
}

/// What `apply_batch` did with one incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record with that name existed; a new one was created.
    Inserted { id: i64 },
    /// The stored record was older or equally old and got overwritten.
    Updated { id: i64 },
    /// The stored record is newer; nothing changed.
    Skipped { id: i64 },
}

impl UpsertOutcome {
    pub fn id(&self) -> i64 {
        match self {
            UpsertOutcome::Inserted { id }
            | UpsertOutcome::Updated { id }
            | UpsertOutcome::Skipped { id } => *id,
        }
    }
}

/// Counts of per-record outcomes for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl BatchSummary {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted { .. } => self.inserted += 1,
            UpsertOutcome::Updated { .. } => self.updated += 1,
            UpsertOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.skipped
    }
}

/// Who is writing a batch, stamped onto its audit events.
#[derive(Debug, Clone)]
pub struct BatchOrigin {
    pub actor: String,
    /// SHA-256 of the source file, when the batch came from one
    pub source_sha256: Option<String>,
}

impl BatchOrigin {
    pub fn new(actor: &str) -> Self {
        Self {
            actor: actor.to_string(),
            source_sha256: None,
        }
    }

    pub fn with_source_sha256(mut self, digest: String) -> Self {
        self.source_sha256 = Some(digest);
        self
    }
}

/// Audit trail entry: every change that lands in `products` is also an event.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub record_name: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(event_type: &str, record_name: &str, data: serde_json::Value, actor: &str) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            record_name: record_name.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL keeps a committed batch durable across crashes
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS products (
            product_id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_name TEXT NOT NULL UNIQUE,
            product_quantity INTEGER NOT NULL CHECK (product_quantity >= 0),
            product_price INTEGER NOT NULL CHECK (product_price >= 0),
            date_updated TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            record_name TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_record ON events(record_name)",
        [],
    )?;

    Ok(())
}

/// Handle to the persistent store.
///
/// Owns the SQLite connection; it is released when the handle is dropped,
/// on error paths too. Call [`Store::close`] to observe close failures.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(Self { conn })
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| InventoryError::Storage(e))
    }

    /// Upsert `records` as one atomic batch with an anonymous origin.
    pub fn apply_batch(&mut self, records: &[Record]) -> Result<BatchSummary> {
        self.apply_batch_from(records, &BatchOrigin::new("system"))
    }

    /// Upsert `records` in a single transaction.
    ///
    /// New names are inserted. An existing name is overwritten (price,
    /// quantity, updated_at) when the incoming `updated_at` is newer than or
    /// equal to the stored one, and left alone when it is strictly older.
    /// Records later in the batch see the effect of earlier ones. Any error
    /// rolls the whole batch back.
    pub fn apply_batch_from(
        &mut self,
        records: &[Record],
        origin: &BatchOrigin,
    ) -> Result<BatchSummary> {
        let tx = self.conn.transaction()?;
        let mut summary = BatchSummary::default();

        for record in records {
            let outcome = upsert_record(&tx, record)?;
            debug!(name = %record.name, ?outcome, "applied record");

            let event_type = match outcome {
                UpsertOutcome::Inserted { .. } => Some("record_inserted"),
                UpsertOutcome::Updated { .. } => Some("record_updated"),
                UpsertOutcome::Skipped { .. } => None,
            };
            if let Some(event_type) = event_type {
                let event = Event::new(
                    event_type,
                    &record.name,
                    serde_json::json!({
                        "id": outcome.id(),
                        "quantity": record.quantity,
                        "price": record.price,
                        "updated_at": record.updated_at,
                        "source_sha256": origin.source_sha256,
                    }),
                    &origin.actor,
                );
                insert_event(&tx, &event)?;
            }

            summary.record(outcome);
        }

        // Dropping an uncommitted transaction rolls it back
        tx.commit()?;

        info!(
            actor = %origin.actor,
            inserted = summary.inserted,
            updated = summary.updated,
            skipped = summary.skipped,
            "batch committed"
        );

        Ok(summary)
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<Record>> {
        let record = self
            .conn
            .query_row(
                "SELECT product_id, product_name, product_quantity, product_price, date_updated
                 FROM products
                 WHERE product_id = ?1",
                [id],
                record_from_row,
            )
            .optional()?;

        Ok(record)
    }

    pub fn get_all(&self) -> Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(
            "SELECT product_id, product_name, product_quantity, product_price, date_updated
             FROM products
             ORDER BY product_id",
        )?;

        let records = stmt
            .query_map([], record_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;

        Ok(count)
    }

    /// Audit events for one product name, newest first
    pub fn events_for(&self, record_name: &str) -> Result<Vec<Event>> {
        get_events_for_record(&self.conn, record_name)
    }
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        quantity: row.get(2)?,
        price: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn upsert_record(conn: &Connection, record: &Record) -> Result<UpsertOutcome> {
    let existing: Option<(i64, NaiveDateTime)> = conn
        .query_row(
            "SELECT product_id, date_updated FROM products WHERE product_name = ?1",
            [&record.name],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match existing {
        None => {
            conn.execute(
                "INSERT INTO products (product_name, product_quantity, product_price, date_updated)
                 VALUES (?1, ?2, ?3, ?4)",
                params![record.name, record.quantity, record.price, record.updated_at],
            )?;
            Ok(UpsertOutcome::Inserted {
                id: conn.last_insert_rowid(),
            })
        }
        Some((id, stored_at)) if stored_at <= record.updated_at => {
            conn.execute(
                "UPDATE products
                 SET product_quantity = ?1, product_price = ?2, date_updated = ?3
                 WHERE product_id = ?4",
                params![record.quantity, record.price, record.updated_at, id],
            )?;
            Ok(UpsertOutcome::Updated { id })
        }
        Some((id, _)) => Ok(UpsertOutcome::Skipped { id }),
    }
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, record_name, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.record_name,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific product name
pub fn get_events_for_record(conn: &Connection, record_name: &str) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, record_name, data, actor
         FROM events
         WHERE record_name = ?1
         ORDER BY id DESC",
    )?;

    let events = stmt
        .query_map([record_name], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(4)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                record_name: row.get(3)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        4,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
                actor: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn create_test_record(
        name: &str,
        quantity: i64,
        price: i64,
        updated_at: NaiveDateTime,
    ) -> Record {
        Record::new(name, quantity, price, updated_at).unwrap()
    }

    #[test]
    fn test_insert_assigns_ids() {
        let mut store = Store::open_in_memory().unwrap();

        let summary = store
            .apply_batch(&[
                create_test_record("Milk", 32, 899, at(2019, 1, 6)),
                create_test_record("Oranges", 52, 172, at(2018, 12, 27)),
            ])
            .unwrap();

        assert_eq!(summary.inserted, 2);
        assert_eq!(store.count().unwrap(), 2);

        let all = store.get_all().unwrap();
        assert_eq!(all[0].name, "Milk");
        assert_eq!(all[0].id, Some(1));
        assert_eq!(all[1].name, "Oranges");
        assert_eq!(all[1].id, Some(2));
    }

    #[test]
    fn test_newer_record_wins() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .apply_batch(&[create_test_record("Milk", 32, 899, at(2019, 1, 6))])
            .unwrap();

        let summary = store
            .apply_batch(&[create_test_record("Milk", 10, 432, at(2019, 6, 23))])
            .unwrap();

        assert_eq!(summary.updated, 1);
        let milk = store.get_by_id(1).unwrap().unwrap();
        assert_eq!(milk.price, 432);
        assert_eq!(milk.quantity, 10);
        assert_eq!(milk.updated_at, at(2019, 6, 23));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_older_record_is_skipped() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .apply_batch(&[create_test_record("Milk", 10, 432, at(2019, 6, 23))])
            .unwrap();

        let summary = store
            .apply_batch(&[create_test_record("Milk", 32, 899, at(2019, 1, 6))])
            .unwrap();

        assert_eq!(summary.skipped, 1);
        let milk = store.get_by_id(1).unwrap().unwrap();
        assert_eq!(milk.price, 432);
        assert_eq!(milk.quantity, 10);
        assert_eq!(milk.updated_at, at(2019, 6, 23));
    }

    #[test]
    fn test_equal_timestamp_overwrites() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .apply_batch(&[create_test_record("Cream", 12, 432, at(2019, 6, 23))])
            .unwrap();

        let summary = store
            .apply_batch(&[create_test_record("Cream", 7, 450, at(2019, 6, 23))])
            .unwrap();

        assert_eq!(summary.updated, 1);
        let cream = store.get_by_id(1).unwrap().unwrap();
        assert_eq!(cream.quantity, 7);
        assert_eq!(cream.price, 450);
    }

    #[test]
    fn test_duplicates_within_one_batch() {
        let mut store = Store::open_in_memory().unwrap();

        let summary = store
            .apply_batch(&[
                create_test_record("Milk", 1, 100, at(2019, 1, 6)),
                create_test_record("Milk", 2, 200, at(2019, 3, 1)),
                create_test_record("Milk", 3, 300, at(2019, 2, 1)),
            ])
            .unwrap();

        assert_eq!(
            summary,
            BatchSummary {
                inserted: 1,
                updated: 1,
                skipped: 1
            }
        );
        let milk = store.get_by_id(1).unwrap().unwrap();
        assert_eq!(milk.price, 200);
    }

    #[test]
    fn test_idempotency_apply_twice() {
        let mut store = Store::open_in_memory().unwrap();
        let batch = vec![
            create_test_record("Milk", 32, 899, at(2019, 1, 6)),
            create_test_record("Oranges", 52, 172, at(2018, 12, 27)),
            create_test_record("Cream", 12, 432, at(2019, 6, 23)),
        ];

        store.apply_batch(&batch).unwrap();
        let first = store.get_all().unwrap();

        let summary = store.apply_batch(&batch).unwrap();
        let second = store.get_all().unwrap();

        assert_eq!(summary.inserted, 0);
        assert_eq!(summary.updated, 3);
        assert_eq!(store.count().unwrap(), 3);
        assert_eq!(first, second);
    }

    #[test]
    fn test_failed_batch_rolls_back() {
        let mut store = Store::open_in_memory().unwrap();

        // Bypasses Record::new so the CHECK constraint fires mid-batch
        let bad = Record {
            id: None,
            name: "Broken".to_string(),
            quantity: -1,
            price: 100,
            updated_at: at(2019, 1, 1),
        };
        let result = store.apply_batch(&[
            create_test_record("Milk", 32, 899, at(2019, 1, 6)),
            bad,
        ]);

        assert!(matches!(result, Err(InventoryError::Storage(_))));
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.events_for("Milk").unwrap().is_empty());
    }

    #[test]
    fn test_get_by_id_missing() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.get_by_id(42).unwrap().is_none());
    }

    #[test]
    fn test_events_logged_for_changes_only() {
        let mut store = Store::open_in_memory().unwrap();
        let origin = BatchOrigin::new("csv_importer").with_source_sha256("abc123".to_string());

        store
            .apply_batch_from(&[create_test_record("Milk", 32, 899, at(2019, 1, 6))], &origin)
            .unwrap();
        store
            .apply_batch_from(&[create_test_record("Milk", 10, 432, at(2019, 6, 23))], &origin)
            .unwrap();
        store
            .apply_batch_from(&[create_test_record("Milk", 1, 1, at(2018, 1, 1))], &origin)
            .unwrap();

        let events = store.events_for("Milk").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "record_updated");
        assert_eq!(events[1].event_type, "record_inserted");
        assert_eq!(events[0].actor, "csv_importer");
        assert_eq!(events[0].data["price"], 432);
        assert_eq!(events[0].data["source_sha256"], "abc123");
    }

    #[test]
    fn test_record_new_rejects_invalid_fields() {
        assert!(Record::new("", 1, 1, at(2019, 1, 1)).unwrap_err().is_format());
        assert!(Record::new("   ", 1, 1, at(2019, 1, 1)).unwrap_err().is_format());
        assert!(Record::new("Milk", -1, 1, at(2019, 1, 1)).unwrap_err().is_format());
        assert!(Record::new("Milk", 1, -1, at(2019, 1, 1)).unwrap_err().is_format());
    }

    #[test]
    fn test_display_price() {
        let record = create_test_record("Milk", 1, 899, at(2019, 1, 6));
        assert_eq!(record.display_price(), "$8.99");

        let record = create_test_record("Gum", 1, 5, at(2019, 1, 6));
        assert_eq!(record.display_price(), "$0.05");
    }

    #[test]
    fn test_store_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.db");

        {
            let mut store = Store::open(&path).unwrap();
            store
                .apply_batch(&[create_test_record("Milk", 32, 899, at(2019, 1, 6))])
                .unwrap();
            store.close().unwrap();
        }

        let store = Store::open(&path).unwrap();
        let milk = store.get_by_id(1).unwrap().unwrap();
        assert_eq!(milk.name, "Milk");
        assert_eq!(milk.updated_at, at(2019, 1, 6));
    }
}
