use std::fmt;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{RawRow, RawValue, Transaction};

// ---------------------------------------------------------------------------
// Value parsing
// ---------------------------------------------------------------------------

/// Parse a currency cell. Anything unparseable is zero, never an error.
pub fn parse_amount(raw: &str) -> f64 {
    let s = raw.replace([',', '"', '$'], "");
    let s = s.trim();
    let value = if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        -inner.trim().parse::<f64>().unwrap_or(0.0)
    } else {
        s.parse().unwrap_or(0.0)
    };
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

pub fn amount_from_cell(value: &RawValue) -> f64 {
    match value {
        RawValue::Number(n) if n.is_finite() => *n,
        RawValue::Text(s) => parse_amount(s),
        _ => 0.0,
    }
}

/// Spreadsheet serial day number to calendar date, 1899-12-30 epoch.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_days(Days::new(serial.floor() as u64))
}

/// `M/D/YY` or `M/D/YYYY`. Two-digit years land in 2000+YY.
pub fn parse_date_mdy(raw: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = raw.trim().split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let m: u32 = parts[0].trim().parse().ok()?;
    let d: u32 = parts[1].trim().parse().ok()?;
    let year_part = parts[2].trim();
    let y: i32 = match year_part.len() {
        2 => 2000 + year_part.parse::<i32>().ok()?,
        4 => year_part.parse().ok()?,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(y, m, d)
}

/// The one date coercion used for every source row.
///
/// Accepts a numeric serial (as a number cell or a numeric string) or an
/// `M/D/YY[YY]` string, optionally followed by a time portion. Dates before
/// 2000 are rejected along with anything unparseable; there is no fallback.
pub fn parse_date(value: &RawValue) -> Option<NaiveDate> {
    let date = match value {
        RawValue::Number(n) => excel_serial_to_date(*n)?,
        RawValue::Text(s) => {
            let token = s.split_whitespace().next()?;
            match token.parse::<f64>() {
                Ok(serial) => excel_serial_to_date(serial)?,
                Err(_) => parse_date_mdy(token)?,
            }
        }
        RawValue::Empty => return None,
    };
    (date.year() >= 2000).then_some(date)
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

/// Accepted raw header aliases per logical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMap {
    #[serde(default = "default_date_aliases")]
    pub date: Vec<String>,
    #[serde(default = "default_patient_aliases")]
    pub patient: Vec<String>,
    #[serde(default = "default_description_aliases")]
    pub description: Vec<String>,
    #[serde(default = "default_amount_aliases")]
    pub amount: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_date_aliases() -> Vec<String> {
    strings(&["Date", "Date Of Payment", "Payment Date"])
}

fn default_patient_aliases() -> Vec<String> {
    strings(&["Patient", "Patient Name"])
}

fn default_description_aliases() -> Vec<String> {
    strings(&["Charge Desc", "Description", "Service"])
}

fn default_amount_aliases() -> Vec<String> {
    strings(&["Calculated Payment (Line)", "Amount", "Payment"])
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            date: default_date_aliases(),
            patient: default_patient_aliases(),
            description: default_description_aliases(),
            amount: default_amount_aliases(),
        }
    }
}

/// Header names chosen for one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedColumns {
    pub date: Option<String>,
    pub patient: Option<String>,
    pub description: Option<String>,
    pub amount: Option<String>,
}

impl ResolvedColumns {
    /// Logical fields no header could be found for.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.date.is_none() {
            out.push("date");
        }
        if self.patient.is_none() {
            out.push("patient");
        }
        if self.description.is_none() {
            out.push("description");
        }
        if self.amount.is_none() {
            out.push("amount");
        }
        out
    }
}

impl ColumnMap {
    /// Pick a header per field: first alias (in configured order) present in
    /// `headers`, compared case-insensitively after trimming.
    pub fn resolve<S: AsRef<str>>(&self, headers: &[S]) -> ResolvedColumns {
        let find = |aliases: &[String]| -> Option<String> {
            aliases.iter().find_map(|alias| {
                headers
                    .iter()
                    .map(|h| h.as_ref())
                    .find(|h| h.trim().eq_ignore_ascii_case(alias.trim()))
                    .map(|h| h.to_string())
            })
        };
        ResolvedColumns {
            date: find(&self.date),
            patient: find(&self.patient),
            description: find(&self.description),
            amount: find(&self.amount),
        }
    }
}

// ---------------------------------------------------------------------------
// Row normalization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    UnparseableDate(String),
    MissingPatient,
    MissingDescription,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnparseableDate(raw) if raw.is_empty() => write!(f, "missing date"),
            Self::UnparseableDate(raw) => write!(f, "unparseable date '{raw}'"),
            Self::MissingPatient => write!(f, "missing patient"),
            Self::MissingDescription => write!(f, "missing description"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    /// Zero-based position in the source batch.
    pub index: usize,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub transactions: Vec<Transaction>,
    pub rejected: Vec<RejectedRow>,
}

static EMPTY: RawValue = RawValue::Empty;

fn cell<'a>(row: &'a RawRow, header: &Option<String>) -> &'a RawValue {
    header.as_ref().and_then(|h| row.get(h)).unwrap_or(&EMPTY)
}

pub fn normalize_row(
    row: &RawRow,
    columns: &ResolvedColumns,
) -> std::result::Result<Transaction, RejectReason> {
    let raw_date = cell(row, &columns.date);
    let date = parse_date(raw_date)
        .ok_or_else(|| RejectReason::UnparseableDate(raw_date.as_text().unwrap_or_default()))?;
    let patient = cell(row, &columns.patient)
        .as_text()
        .ok_or(RejectReason::MissingPatient)?;
    let description = cell(row, &columns.description)
        .as_text()
        .ok_or(RejectReason::MissingDescription)?;
    let amount = amount_from_cell(cell(row, &columns.amount));
    Ok(Transaction {
        date,
        patient,
        description,
        amount,
    })
}

/// Normalize a batch, keeping source order. Rejections are tallied, not fatal.
pub fn normalize_rows(rows: &[RawRow], columns: &ResolvedColumns) -> Normalized {
    let mut out = Normalized::default();
    for (index, row) in rows.iter().enumerate() {
        match normalize_row(row, columns) {
            Ok(txn) => out.transactions.push(txn),
            Err(reason) => {
                tracing::debug!(row = index, %reason, "row rejected");
                out.rejected.push(RejectedRow { index, reason });
            }
        }
    }
    out
}
