use std::io::Read;
use std::path::Path;

use crate::error::{ClinicError, Result};
use crate::models::{RawRow, RawValue};

/// Rows of one export, keyed by the header row's names.
#[derive(Debug, Clone, Default)]
pub struct SourceTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl SourceTable {
    /// Build from positional cells. The first row with any content is the
    /// header row; blank rows are skipped.
    fn from_cells(cells: impl Iterator<Item = Vec<RawValue>>) -> Self {
        let mut table = SourceTable::default();
        for row in cells {
            if row.iter().all(|v| *v == RawValue::Empty) {
                continue;
            }
            if table.headers.is_empty() {
                table.headers = row
                    .iter()
                    .map(|v| v.as_text().unwrap_or_default())
                    .collect();
                continue;
            }
            let record: RawRow = table
                .headers
                .iter()
                .zip(row)
                .filter(|(h, _)| !h.is_empty())
                .map(|(h, v)| (h.clone(), v))
                .collect();
            table.rows.push(record);
        }
        table
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceKind {
    Csv,
    #[cfg(feature = "xlsx")]
    Workbook,
}

impl SourceKind {
    /// Chosen by extension only.
    pub fn from_path(path: &Path) -> Result<SourceKind> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "txt" => Ok(SourceKind::Csv),
            #[cfg(feature = "xlsx")]
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(SourceKind::Workbook),
            _ => Err(ClinicError::UnsupportedFile(path.display().to_string())),
        }
    }
}

pub fn read_file(path: &Path, sheet: Option<&str>) -> Result<SourceTable> {
    let table = match SourceKind::from_path(path)? {
        SourceKind::Csv => read_csv(std::fs::File::open(path)?)?,
        #[cfg(feature = "xlsx")]
        SourceKind::Workbook => read_workbook(path, sheet)?,
    };
    #[cfg(not(feature = "xlsx"))]
    let _ = sheet;
    tracing::info!(
        file = %path.display(),
        headers = table.headers.len(),
        rows = table.rows.len(),
        "read export"
    );
    Ok(table)
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Fields are decoded lossily; a non-UTF-8 byte never drops the row.
pub fn read_csv<R: Read>(input: R) -> Result<SourceTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(std::io::BufReader::new(input));
    let mut cells = Vec::new();
    for result in rdr.byte_records() {
        let record = result?;
        cells.push(
            record
                .iter()
                .map(|field| RawValue::from(&*String::from_utf8_lossy(field)))
                .collect::<Vec<_>>(),
        );
    }
    Ok(SourceTable::from_cells(cells.into_iter()))
}

// ---------------------------------------------------------------------------
// XLSX / XLS
// ---------------------------------------------------------------------------

#[cfg(feature = "xlsx")]
fn cell_value(data: &calamine::Data) -> RawValue {
    use calamine::Data;
    match data {
        Data::Float(f) => RawValue::Number(*f),
        Data::Int(i) => RawValue::Number(*i as f64),
        Data::DateTime(dt) => RawValue::Number(dt.as_f64()),
        Data::String(s) | Data::DateTimeIso(s) => RawValue::from(s.as_str()),
        Data::Bool(b) => RawValue::Text(b.to_string()),
        Data::DurationIso(_) | Data::Error(_) | Data::Empty => RawValue::Empty,
    }
}

#[cfg(feature = "xlsx")]
fn read_workbook(path: &Path, sheet: Option<&str>) -> Result<SourceTable> {
    use calamine::Reader;

    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| ClinicError::Workbook(format!("failed to open {}: {e}", path.display())))?;
    let range = match sheet {
        Some(name) => workbook.worksheet_range(name),
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ClinicError::Workbook(format!("{} has no sheets", path.display())))?,
    }
    .map_err(|e| ClinicError::Workbook(e.to_string()))?;

    Ok(SourceTable::from_cells(
        range.rows().map(|row| row.iter().map(cell_value).collect()),
    ))
}
