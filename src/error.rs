use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("No column found for {0}")]
    MissingColumn(String),

    #[error("Week {start} to {end} is not a Monday-Sunday span")]
    WeekSpan { start: NaiveDate, end: NaiveDate },

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("No stored week starting {0}")]
    UnknownWeek(NaiveDate),

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, ClinicError>;
