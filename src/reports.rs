use chrono::NaiveDate;
use rusqlite::Connection;

use crate::aggregator::aggregate_period;
use crate::db::{load_transactions, parse_stored_date};
use crate::error::Result;
use crate::models::PeriodSummary;
use crate::week::DateRange;

// ---------------------------------------------------------------------------
// Stored weeks
// ---------------------------------------------------------------------------

pub struct WeekRow {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub total_revenue: f64,
    pub unique_customers: i64,
    pub computed_at: String,
}

pub fn list_weeks(conn: &Connection, limit: Option<usize>) -> Result<Vec<WeekRow>> {
    let mut stmt = conn.prepare(
        "SELECT week_start, week_end, total_revenue, unique_customers, computed_at \
         FROM weekly_analytics ORDER BY week_start DESC LIMIT ?1",
    )?;
    let limit = limit.map(|l| l as i64).unwrap_or(-1);
    let raw: Vec<(String, String, f64, i64, Option<String>)> = stmt
        .query_map([limit], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    raw.into_iter()
        .map(|(start, end, total_revenue, unique_customers, computed_at)| {
            Ok(WeekRow {
                week_start: parse_stored_date(&start)?,
                week_end: parse_stored_date(&end)?,
                total_revenue,
                unique_customers,
                computed_at: computed_at.unwrap_or_default(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Monthly summary
// ---------------------------------------------------------------------------

/// Folded directly from stored transactions, never from weekly rows, so a
/// week straddling two months is split correctly.
pub fn get_period_summary(conn: &Connection, range: DateRange) -> Result<PeriodSummary> {
    let transactions = load_transactions(conn, range)?;
    Ok(aggregate_period(range, &transactions))
}

// ---------------------------------------------------------------------------
// Unmapped services audit
// ---------------------------------------------------------------------------

pub struct UnmappedItem {
    pub description: String,
    pub count: i64,
    pub total: f64,
    pub first_seen: String,
    pub last_seen: String,
}

pub fn get_unmapped(conn: &Connection, week_start: Option<NaiveDate>) -> Result<Vec<UnmappedItem>> {
    let mut stmt = conn.prepare(
        "SELECT description, COUNT(*) as count, SUM(amount), MIN(date), MAX(date) \
         FROM unmapped_services WHERE ?1 IS NULL OR week_start = ?1 \
         GROUP BY description ORDER BY count DESC, description",
    )?;
    let rows = stmt.query_map([week_start.map(|d| d.to_string())], |row| {
        Ok(UnmappedItem {
            description: row.get(0)?,
            count: row.get(1)?,
            total: row.get(2)?,
            first_seen: row.get(3)?,
            last_seen: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

pub struct StatusCounts {
    pub imports: i64,
    pub transactions: i64,
    pub weeks: i64,
    pub unmapped: i64,
    pub last_import: Option<String>,
}

pub fn get_status(conn: &Connection) -> Result<StatusCounts> {
    let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };
    Ok(StatusCounts {
        imports: count("SELECT count(*) FROM imports")?,
        transactions: count("SELECT count(*) FROM transactions")?,
        weeks: count("SELECT count(*) FROM weekly_analytics")?,
        unmapped: count("SELECT count(*) FROM unmapped_services")?,
        last_import: conn.query_row("SELECT MAX(import_date) FROM imports", [], |r| r.get(0))?,
    })
}
