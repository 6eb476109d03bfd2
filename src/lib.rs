// Inventory Ledger
// Product rows from CSV → normalized records → SQLite, upserted by name with
// the newest `date_updated` winning. Also backs the store up to CSV and drives
// a small console menu.

pub mod backup;
pub mod config;
pub mod console;
pub mod db;
pub mod error;
pub mod import;
pub mod parser;

// Re-export commonly used types
pub use backup::{backup_to_file, write_backup};
pub use config::{Cli, CliCommand, Config, Mode};
pub use console::{Command, Console, Flow, MENU};
pub use db::{
    get_events_for_record, insert_event, setup_database, BatchOrigin, BatchSummary, Event,
    Record, Store, UpsertOutcome,
};
pub use error::{InventoryError, Result};
pub use import::{file_sha256, import_csv, ImportReport};
pub use parser::{
    normalize, normalize_all, parse_date, parse_price, parse_quantity, read_csv, RawRow,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
