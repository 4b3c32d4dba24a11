// CSV reader - one observation per row
//
// Expected columns, in order: common name, issuer, expiration date,
// key usage, friendly name, status, template name. The status column is
// read but not carried over; lifecycle status is always derived, never
// imported.

use crate::error::CsvImportError;
use crate::model::{Environment, Observation};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::io::Read;

/// Supported CSV delimiters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Tab,
    Semicolon,
    Comma,
}

impl Delimiter {
    pub fn as_byte(self) -> u8 {
        match self {
            Delimiter::Tab => b'\t',
            Delimiter::Semicolon => b';',
            Delimiter::Comma => b',',
        }
    }
}

impl std::str::FromStr for Delimiter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tab" | "\t" => Ok(Delimiter::Tab),
            "semicolon" | ";" => Ok(Delimiter::Semicolon),
            "comma" | "," => Ok(Delimiter::Comma),
            other => Err(format!(
                "unknown delimiter '{}' (expected tab, semicolon or comma)",
                other
            )),
        }
    }
}

/// Options for one CSV import
#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: Delimiter,
    pub skip_header: bool,
    /// Environment assigned to every row of this import
    pub default_environment: Option<Environment>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: Delimiter::Tab,
            skip_header: true,
            default_environment: None,
        }
    }
}

/// Parse CSV input into observations.
///
/// Row problems never abort the batch: a malformed row yields an
/// observation with `parse_error` set, which the analyzer routes to the
/// error bucket. An unparseable or empty expiration date is not a row
/// error - the observation simply has no expiration.
pub fn read_observations<R: Read>(
    input: R,
    options: &CsvOptions,
) -> Result<Vec<Observation>, CsvImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter.as_byte())
        .has_headers(false)
        .flexible(true)
        .from_reader(input);

    let mut observations = Vec::new();

    for (index, row) in reader.records().enumerate() {
        let line = index + 1;

        if index == 0 && options.skip_header {
            // Consume the record to surface stream-level errors even on the
            // skipped line
            row?;
            continue;
        }

        let row = match row {
            Ok(row) => row,
            Err(e) => {
                observations.push(Observation::parse_failure(
                    line,
                    format!("unreadable row: {}", e),
                ));
                continue;
            }
        };

        // Skip fully empty rows
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let common_name = row.get(0).map(str::trim).unwrap_or("");
        if common_name.is_empty() {
            observations.push(Observation::parse_failure(
                line,
                "empty common name".to_string(),
            ));
            continue;
        }

        let issuer = row.get(1).map(str::trim).unwrap_or("").to_string();

        let mut obs =
            Observation::from_csv(common_name.to_string(), issuer, line);
        obs.valid_until = row.get(2).and_then(parse_csv_date);
        obs.key_usage = row.get(3).and_then(clean_csv_value);
        obs.friendly_name = row.get(4).and_then(clean_csv_value);
        obs.template_name = row.get(6).and_then(clean_csv_value);
        obs.environment = options.default_environment;

        observations.push(obs);
    }

    Ok(observations)
}

/// Parse an expiration date, trying the formats seen in exports from common
/// certificate tooling. Returns None for empty, sentinel or unparseable
/// values.
pub fn parse_csv_date(raw: &str) -> Option<DateTime<Utc>> {
    let value = clean_csv_value(raw)?;

    const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d"];
    const DATETIME_FORMATS: &[&str] = &["%d/%m/%Y %H:%M", "%Y-%m-%d %H:%M:%S"];

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&value, fmt) {
            let naive = date.and_hms_opt(0, 0, 0)?;
            return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&value, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }

    tracing::warn!("unparseable date in CSV input: {}", value);
    None
}

/// Trim a cell and normalize sentinel values to absent
pub fn clean_csv_value(raw: &str) -> Option<String> {
    let value = raw.trim();
    match value {
        "" | "<None>" | "<Aucun>" | "N/A" | "None" | "-" => None,
        _ => Some(value.to_string()),
    }
}
