// Backup writer: store contents → CSV in the same layout as the import file

use crate::db::Record;
use crate::error::Result;
use crate::parser::{CSV_HEADERS, DATE_FORMAT};
use std::io::Write;
use std::path::Path;

/// Write `records` as CSV to `writer`.
///
/// The layout matches the import file: dates as `month/day/year` and prices
/// with a leading `$`, so a backup can be fed back through the importer.
pub fn write_backup<W: Write>(writer: W, records: &[Record]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADERS)?;

    for record in records {
        wtr.write_record([
            record.name.clone(),
            record.quantity.to_string(),
            record.display_price(),
            record.updated_at.format(DATE_FORMAT).to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write a backup file at `path`, replacing any existing file.
pub fn backup_to_file(path: &Path, records: &[Record]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_backup(std::io::BufWriter::new(file), records)?;
    tracing::info!(path = %path.display(), records = records.len(), "backup written");
    Ok(())
}
