// Record Normalizer
// Raw CSV rows → typed records (cents, integer quantities, midnight timestamps)

use crate::db::Record;
use crate::error::{InventoryError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Date format used by the inventory CSV, e.g. `1/06/2019` or `12/27/2018`
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Header row of both the input file and the backup file.
pub const CSV_HEADERS: [&str; 4] = [
    "product_name",
    "product_quantity",
    "product_price",
    "date_updated",
];

// ============================================================================
// RAW ROW
// ============================================================================

/// One untyped CSV row, before normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(rename = "product_name")]
    pub name: String,

    #[serde(rename = "product_quantity")]
    pub quantity: String,

    #[serde(rename = "product_price")]
    pub price: String,

    #[serde(rename = "date_updated")]
    pub date_updated: String,
}

impl RawRow {
    pub fn new(name: &str, quantity: &str, price: &str, date_updated: &str) -> Self {
        RawRow {
            name: name.to_string(),
            quantity: quantity.to_string(),
            price: price.to_string(),
            date_updated: date_updated.to_string(),
        }
    }
}

/// Read every data row of an inventory CSV file.
///
/// Columns are matched by header name, so their order in the file does not
/// matter. Fails on a missing column or unreadable line.
pub fn read_csv(csv_path: &Path) -> Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_path(csv_path)?;

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let row: RawRow = result?;
        rows.push(row);
    }

    Ok(rows)
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Convert one raw row into a typed [`Record`] (without an id).
pub fn normalize(raw: &RawRow) -> Result<Record> {
    if raw.name.trim().is_empty() {
        return Err(InventoryError::format("product_name", &raw.name, "name is empty"));
    }

    Ok(Record {
        id: None,
        name: raw.name.clone(),
        quantity: parse_quantity(&raw.quantity)?,
        price: parse_price(&raw.price)?,
        updated_at: parse_date(&raw.date_updated)?,
    })
}

/// Normalize every row in order, failing on the first bad one.
///
/// The error carries the 1-based data row number (header excluded).
pub fn normalize_all(rows: &[RawRow]) -> Result<Vec<Record>> {
    rows.iter()
        .enumerate()
        .map(|(i, raw)| normalize(raw).map_err(|e| e.at_row(i + 1)))
        .collect()
}

/// Parse a currency string into cents.
///
/// The first character is dropped unconditionally (it is the currency
/// symbol in well-formed input), before any trimming. The trimmed rest
/// must be `digits[.digits]`; cents past the second decimal place are
/// truncated. Exact integer arithmetic, no floats.
pub fn parse_price(value: &str) -> Result<i64> {
    let mut chars = value.chars();
    if chars.next().is_none() {
        return Err(InventoryError::format("product_price", value, "price is empty"));
    }
    let amount = chars.as_str().trim();

    let (units, fraction) = match amount.split_once('.') {
        Some((units, fraction)) => (units, fraction),
        None => (amount, ""),
    };

    let is_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (units.is_empty() && fraction.is_empty()) || !is_digits(units) || !is_digits(fraction) {
        return Err(InventoryError::format("product_price", value, "not a decimal amount"));
    }

    let units: i64 = if units.is_empty() {
        0
    } else {
        units
            .parse()
            .map_err(|_| InventoryError::format("product_price", value, "amount too large"))?
    };

    // fraction is all ASCII digits at this point
    let mut digits = fraction.bytes().map(|b| i64::from(b - b'0'));
    let cents = digits.next().unwrap_or(0) * 10 + digits.next().unwrap_or(0);

    units
        .checked_mul(100)
        .and_then(|v| v.checked_add(cents))
        .ok_or_else(|| InventoryError::format("product_price", value, "amount too large"))
}

/// Parse a non-negative base-10 quantity.
pub fn parse_quantity(value: &str) -> Result<i64> {
    let quantity: i64 = value
        .trim()
        .parse()
        .map_err(|_| InventoryError::format("product_quantity", value, "not an integer"))?;

    if quantity < 0 {
        return Err(InventoryError::format("product_quantity", value, "quantity is negative"));
    }

    Ok(quantity)
}

/// Parse `month/day/year` into a timestamp at midnight.
///
/// The year must be exactly four digits; chrono alone would take `19` as
/// year 0019.
pub fn parse_date(value: &str) -> Result<NaiveDateTime> {
    let trimmed = value.trim();
    let year_ok = trimmed
        .rsplit_once('/')
        .is_some_and(|(_, year)| year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()));
    if !year_ok {
        return Err(InventoryError::format(
            "date_updated",
            value,
            "expected month/day/year with a four-digit year",
        ));
    }

    let date = NaiveDate::parse_from_str(trimmed, DATE_FORMAT).map_err(|e| {
        InventoryError::format(
            "date_updated",
            value,
            format!("expected month/day/year: {}", e),
        )
    })?;

    Ok(date.and_time(chrono::NaiveTime::MIN))
}

// ============================================================================
// TESTS
// ============================================================================
