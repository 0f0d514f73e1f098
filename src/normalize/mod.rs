//! Card statement export -> [`TransactionRecord`]s.
//!
//! The export is a spreadsheet whose real header sits a few rows down,
//! below a banner. Rows are kept only if they carry a textual date that is
//! not a grand-total line, a merchant and an amount, and the date parses
//! day-first. Output depends on the file contents alone.

mod translations;

pub use translations::TranslationTable;

use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::Context;
use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::config::ResolvedConfig;
use crate::error::ScrapeError;
use crate::models::TransactionRecord;

/// Zero-based sheet row holding the column headers in the card export.
pub const HEADER_ROW: u32 = 3;

/// Leading text of the summary rows the export appends per month.
pub const GRAND_TOTAL_MARKER: &str = "סך הכל";

/// Export column headers and the field each one feeds.
pub const COLUMN_DATE: &str = "תאריך עסקה";
pub const COLUMN_BUSINESS: &str = "שם בית העסק";
pub const COLUMN_CATEGORY: &str = "קטגוריה";
pub const COLUMN_CARD: &str = "4 ספרות אחרונות של כרטיס האשראי";
pub const COLUMN_AMOUNT: &str = "סכום חיוב";

/// Positions of the recognized columns within a row.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    date: usize,
    business: usize,
    category: usize,
    card: usize,
    amount: usize,
}

impl ColumnMap {
    fn from_header(header: &[Data]) -> Result<Self, String> {
        let find = |name: &str| {
            header
                .iter()
                .position(|cell| match cell {
                    Data::String(s) => s.split_whitespace().eq(name.split_whitespace()),
                    _ => false,
                })
                .ok_or_else(|| format!("missing column '{name}'"))
        };
        Ok(Self {
            date: find(COLUMN_DATE)?,
            business: find(COLUMN_BUSINESS)?,
            category: find(COLUMN_CATEGORY)?,
            card: find(COLUMN_CARD)?,
            amount: find(COLUMN_AMOUNT)?,
        })
    }
}

static EMPTY_CELL: Data = Data::Empty;

/// One export row with its cells addressed by meaning.
struct RawRecord<'a> {
    date: &'a Data,
    business: &'a Data,
    category: &'a Data,
    card: &'a Data,
    amount: &'a Data,
}

impl<'a> RawRecord<'a> {
    fn from_row(row: &'a [Data], columns: &ColumnMap) -> Self {
        let cell = |i: usize| row.get(i).unwrap_or(&EMPTY_CELL);
        Self {
            date: cell(columns.date),
            business: cell(columns.business),
            category: cell(columns.category),
            card: cell(columns.card),
            amount: cell(columns.amount),
        }
    }
}

/// Why a row was left out, for the summary log line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DropCounts {
    pub missing_value: usize,
    pub not_a_transaction: usize,
    pub bad_date: usize,
}

/// Parses card statement exports.
#[derive(Debug, Clone)]
pub struct TransactionNormalizer {
    translations: TranslationTable,
}

impl Default for TransactionNormalizer {
    fn default() -> Self {
        Self::new(TranslationTable::builtin())
    }
}

impl TransactionNormalizer {
    pub fn new(translations: TranslationTable) -> Self {
        Self { translations }
    }

    /// Built-in translations merged with the configured overrides file, if any.
    pub fn from_config(config: &ResolvedConfig) -> anyhow::Result<Self> {
        let translations = match &config.translations_file {
            Some(path) => TranslationTable::builtin()
                .with_overrides_file(path)
                .with_context(|| format!("Failed to load translations: {}", path.display()))?,
            None => TranslationTable::builtin(),
        };
        Ok(Self::new(translations))
    }

    pub fn translations(&self) -> &TranslationTable {
        &self.translations
    }

    /// Read the first sheet of the export at `path`.
    pub fn normalize_file(&self, path: &Path) -> Result<Vec<TransactionRecord>, ScrapeError> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| ScrapeError::parse(path, e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ScrapeError::parse(path, "workbook has no sheets"))?
            .map_err(|e| ScrapeError::parse(path, e.to_string()))?;

        let (records, dropped) = self
            .normalize_range(&range)
            .map_err(|reason| ScrapeError::parse(path, reason))?;

        info!(
            path = %path.display(),
            records = records.len(),
            missing_value = dropped.missing_value,
            not_a_transaction = dropped.not_a_transaction,
            bad_date = dropped.bad_date,
            "Normalized export"
        );

        if records.is_empty() {
            return Err(ScrapeError::parse(path, "no transactions left after filtering"));
        }
        Ok(records)
    }

    /// Normalize an already-loaded sheet. Returns the kept records and the
    /// number of rows dropped for each reason.
    pub fn normalize_range(
        &self,
        range: &Range<Data>,
    ) -> Result<(Vec<TransactionRecord>, DropCounts), String> {
        let (start_row, _) = range.start().ok_or("sheet is empty")?;
        if start_row > HEADER_ROW {
            return Err(format!(
                "sheet starts at row {} but the header is expected at row {}",
                start_row + 1,
                HEADER_ROW + 1
            ));
        }

        let mut rows = range.rows().skip((HEADER_ROW - start_row) as usize);
        let header = rows.next().ok_or("header row is missing")?;
        let columns = ColumnMap::from_header(header)?;

        let mut records = Vec::new();
        let mut dropped = DropCounts::default();
        for row in rows {
            let raw = RawRecord::from_row(row, &columns);
            match self.normalize_row(&raw) {
                Ok(record) => records.push(record),
                Err(reason) => match reason {
                    RowRejection::MissingValue => dropped.missing_value += 1,
                    RowRejection::NotATransaction => dropped.not_a_transaction += 1,
                    RowRejection::BadDate => dropped.bad_date += 1,
                },
            }
        }

        Ok((records, dropped))
    }

    fn normalize_row(&self, raw: &RawRecord<'_>) -> Result<TransactionRecord, RowRejection> {
        let date_text = match raw.date {
            Data::String(s) if !s.trim().is_empty() => s.trim(),
            Data::Empty => return Err(RowRejection::MissingValue),
            _ => return Err(RowRejection::NotATransaction),
        };
        let business = cell_text(raw.business).ok_or(RowRejection::MissingValue)?;
        let amount = parse_amount(raw.amount).ok_or(RowRejection::MissingValue)?;

        if date_text.starts_with(GRAND_TOTAL_MARKER) {
            return Err(RowRejection::NotATransaction);
        }
        let date = parse_day_first(date_text).ok_or_else(|| {
            debug!(date = date_text, "Dropping row with unparseable date");
            RowRejection::BadDate
        })?;

        let category = cell_text(raw.category).unwrap_or_default();
        Ok(TransactionRecord {
            date,
            business_translated: self.translations.merchant(&business).to_string(),
            business,
            category_translated: self.translations.category(&category).to_string(),
            category,
            card: card_digits(raw.card),
            amount,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowRejection {
    MissingValue,
    NotATransaction,
    BadDate,
}

/// Cell contents as stored in the export. Blank text counts as missing but
/// non-blank text is kept verbatim, surrounding whitespace included.
fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        _ => return None,
    };
    (!text.trim().is_empty()).then_some(text)
}

/// Parse a charge amount from a numeric cell or text like `"₪1,234.50"`.
pub fn parse_amount(cell: &Data) -> Option<Decimal> {
    match cell {
        Data::Int(i) => Some(Decimal::from(*i)),
        Data::Float(f) if f.is_finite() => Decimal::from_str(&f.to_string()).ok(),
        Data::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| {
                    !c.is_whitespace() && !matches!(c, ',' | '₪' | '$' | '\u{200f}' | '\u{200e}')
                })
                .collect();
            // Some exports write negatives with a trailing sign.
            let cleaned = if cleaned.ends_with('-') && !cleaned.starts_with('-') {
                format!("-{}", cleaned.trim_end_matches('-'))
            } else {
                cleaned
            };
            Decimal::from_str(&cleaned).ok()
        }
        _ => None,
    }
}

/// Parse `dd/mm/yyyy` (also `-` or `.` separated, two-digit years, optional
/// trailing time). A leading four-digit year is read as `yyyy-mm-dd`.
pub fn parse_day_first(text: &str) -> Option<NaiveDate> {
    let date_part = text.split_whitespace().next()?;
    let parts: Vec<&str> = date_part.split(['/', '-', '.']).collect();
    let [a, b, c] = parts.as_slice() else {
        return None;
    };
    if !parts
        .iter()
        .all(|p| !p.is_empty() && p.chars().all(|ch| ch.is_ascii_digit()))
    {
        return None;
    }

    let (day, month, year) = if a.len() == 4 { (c, b, a) } else { (a, b, c) };
    let year: i32 = match year.len() {
        2 => 2000 + year.parse::<i32>().ok()?,
        4 => year.parse().ok()?,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

fn card_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("[0-9]{4}").expect("card pattern is valid"))
}

/// First run of four digits in the card cell. Numeric cells lose leading
/// zeros in the spreadsheet, so they are padded back to four digits.
pub fn card_digits(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::String(s) => s.clone(),
        Data::Int(i) if (0..10_000).contains(i) => format!("{i:04}"),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && (0.0..10_000.0).contains(f) => {
            format!("{:04}", *f as i64)
        }
        Data::Float(f) => f.to_string(),
        _ => return None,
    };
    card_pattern().find(&text).map(|m| m.as_str().to_string())
}
