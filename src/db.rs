use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Transaction as SqlTransaction, TransactionBehavior};

use crate::aggregator::WeekResult;
use crate::categorizer::categorize;
use crate::error::{ClinicError, Result};
use crate::models::{Category, MembershipType, ServiceCount, Transaction, WeeklyAggregate};
use crate::week::{DateRange, WeekRange};

pub const DB_FILE: &str = "clinicboard.db";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    import_date TEXT DEFAULT (datetime('now')),
    checksum TEXT,
    rows_read INTEGER NOT NULL,
    rows_accepted INTEGER NOT NULL,
    rows_rejected INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    import_id INTEGER,
    date TEXT NOT NULL,
    patient TEXT NOT NULL,
    description TEXT NOT NULL,
    amount REAL NOT NULL,
    category TEXT NOT NULL,
    FOREIGN KEY (import_id) REFERENCES imports(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);

CREATE TABLE IF NOT EXISTS weekly_analytics (
    week_start TEXT PRIMARY KEY,
    week_end TEXT NOT NULL,
    total_revenue REAL NOT NULL,
    unique_customers INTEGER NOT NULL,
    computed_at TEXT DEFAULT (datetime('now')),
    CHECK (strftime('%w', week_start) = '1'),
    CHECK (week_end = date(week_start, '+6 days'))
);

CREATE TABLE IF NOT EXISTS weekly_category_totals (
    week_start TEXT NOT NULL,
    category TEXT NOT NULL,
    revenue REAL NOT NULL,
    transactions INTEGER NOT NULL,
    PRIMARY KEY (week_start, category),
    FOREIGN KEY (week_start) REFERENCES weekly_analytics(week_start) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS weekly_memberships (
    week_start TEXT NOT NULL,
    membership_type TEXT NOT NULL,
    total INTEGER NOT NULL,
    new_count INTEGER NOT NULL,
    PRIMARY KEY (week_start, membership_type),
    FOREIGN KEY (week_start) REFERENCES weekly_analytics(week_start) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS weekly_top_services (
    week_start TEXT NOT NULL,
    category TEXT NOT NULL,
    position INTEGER NOT NULL,
    description TEXT NOT NULL,
    count INTEGER NOT NULL,
    PRIMARY KEY (week_start, category, position),
    FOREIGN KEY (week_start) REFERENCES weekly_analytics(week_start) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS unmapped_services (
    id INTEGER PRIMARY KEY,
    week_start TEXT NOT NULL,
    date TEXT NOT NULL,
    patient TEXT NOT NULL,
    description TEXT NOT NULL,
    amount REAL NOT NULL,
    FOREIGN KEY (week_start) REFERENCES weekly_analytics(week_start) ON DELETE CASCADE
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub(crate) fn parse_stored_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| ClinicError::InvalidDate(raw.to_string()))
}

// ---------------------------------------------------------------------------
// Imports
// ---------------------------------------------------------------------------

/// One row of the `imports` ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRecord<'a> {
    pub filename: &'a str,
    pub checksum: &'a str,
    pub rows_read: usize,
    pub rows_accepted: usize,
    pub rows_rejected: usize,
}

fn insert_import(conn: &Connection, record: &ImportRecord<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO imports (filename, checksum, rows_read, rows_accepted, rows_rejected) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.filename,
            record.checksum,
            record.rows_read as i64,
            record.rows_accepted as i64,
            record.rows_rejected as i64
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// ---------------------------------------------------------------------------
// Canonical transactions
// ---------------------------------------------------------------------------

/// Stored transactions in `range`, in insertion (source) order.
pub fn load_transactions(conn: &Connection, range: DateRange) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT date, patient, description, amount FROM transactions \
         WHERE date BETWEEN ?1 AND ?2 ORDER BY id",
    )?;
    let raw: Vec<(String, String, String, f64)> = stmt
        .query_map(
            params![range.start.to_string(), range.end.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    raw.into_iter()
        .map(|(date, patient, description, amount)| {
            Ok(Transaction {
                date: parse_stored_date(&date)?,
                patient,
                description,
                amount,
            })
        })
        .collect()
}

fn replace_transactions(
    tx: &SqlTransaction<'_>,
    week: WeekRange,
    import_id: Option<i64>,
    transactions: &[Transaction],
) -> Result<usize> {
    tx.execute(
        "DELETE FROM transactions WHERE date BETWEEN ?1 AND ?2",
        params![week.start().to_string(), week.end().to_string()],
    )?;
    let mut stmt = tx.prepare_cached(
        "INSERT INTO transactions (import_id, date, patient, description, amount, category) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    let mut inserted = 0usize;
    for t in transactions.iter().filter(|t| week.contains(t.date)) {
        stmt.execute(params![
            import_id,
            t.date.to_string(),
            t.patient,
            t.description,
            t.amount,
            categorize(&t.description).key(),
        ])?;
        inserted += 1;
    }
    Ok(inserted)
}

// ---------------------------------------------------------------------------
// Weekly aggregates
// ---------------------------------------------------------------------------

fn write_aggregate(tx: &SqlTransaction<'_>, result: &WeekResult) -> Result<()> {
    let agg = &result.aggregate;
    let week = WeekRange::new(agg.week_start, agg.week_end)?;
    let start = week.start().to_string();

    // children cascade
    tx.execute("DELETE FROM weekly_analytics WHERE week_start = ?1", [&start])?;
    tx.execute(
        "INSERT INTO weekly_analytics (week_start, week_end, total_revenue, unique_customers) \
         VALUES (?1, ?2, ?3, ?4)",
        params![
            start,
            week.end().to_string(),
            agg.total_revenue,
            agg.unique_customers as i64
        ],
    )?;

    for (category, revenue) in &agg.revenue_by_category {
        let count = agg.transactions_by_category.get(category).copied().unwrap_or(0);
        tx.execute(
            "INSERT INTO weekly_category_totals (week_start, category, revenue, transactions) \
             VALUES (?1, ?2, ?3, ?4)",
            params![start, category.key(), revenue, count as i64],
        )?;
    }

    for (kind, total) in &agg.membership_counts {
        let new_count = agg.new_membership_counts.get(kind).copied().unwrap_or(0);
        tx.execute(
            "INSERT INTO weekly_memberships (week_start, membership_type, total, new_count) \
             VALUES (?1, ?2, ?3, ?4)",
            params![start, kind.key(), *total as i64, new_count as i64],
        )?;
    }

    for (category, services) in &agg.top_services {
        for (rank, service) in services.iter().enumerate() {
            tx.execute(
                "INSERT INTO weekly_top_services (week_start, category, position, description, count) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    start,
                    category.key(),
                    rank as i64 + 1,
                    service.description,
                    service.count as i64
                ],
            )?;
        }
    }

    for u in &result.unmapped {
        tx.execute(
            "INSERT INTO unmapped_services (week_start, date, patient, description, amount) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![start, u.date.to_string(), u.patient, u.description, u.amount],
        )?;
    }
    Ok(())
}

/// Replace everything stored for the week: its canonical transactions and
/// its aggregate.
fn replace_week(
    tx: &SqlTransaction<'_>,
    import_id: i64,
    transactions: &[Transaction],
    result: &WeekResult,
) -> Result<usize> {
    let week = WeekRange::new(result.aggregate.week_start, result.aggregate.week_end)?;
    let inserted = replace_transactions(tx, week, Some(import_id), transactions)?;
    write_aggregate(tx, result)?;
    tracing::info!(week_start = %week.start(), transactions = inserted, "replaced week");
    Ok(inserted)
}

/// Record an import and replace every week it touched, all in one IMMEDIATE
/// transaction. Either the ledger row and all weeks land, or nothing does.
/// Returns the import id and the rows stored per week, in input order.
pub fn store_import(
    conn: &Connection,
    record: &ImportRecord<'_>,
    weeks: &[(Vec<Transaction>, WeekResult)],
) -> Result<(i64, Vec<usize>)> {
    let tx = SqlTransaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let import_id = insert_import(&tx, record)?;
    let mut stored = Vec::with_capacity(weeks.len());
    for (transactions, result) in weeks {
        stored.push(replace_week(&tx, import_id, transactions, result)?);
    }
    tx.commit()?;
    Ok((import_id, stored))
}

/// Replace only the aggregate, keeping the stored transactions.
pub fn replace_aggregate(conn: &Connection, result: &WeekResult) -> Result<()> {
    let tx = SqlTransaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    write_aggregate(&tx, result)?;
    tx.commit()?;
    tracing::info!(week_start = %result.aggregate.week_start, "recomputed week");
    Ok(())
}

/// Remove a week's aggregate and transactions. Returns false if nothing was stored.
pub fn delete_week(conn: &Connection, week: WeekRange) -> Result<bool> {
    let tx = SqlTransaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let removed = tx.execute(
        "DELETE FROM weekly_analytics WHERE week_start = ?1",
        [week.start().to_string()],
    )?;
    let txns = tx.execute(
        "DELETE FROM transactions WHERE date BETWEEN ?1 AND ?2",
        params![week.start().to_string(), week.end().to_string()],
    )?;
    tx.commit()?;
    Ok(removed > 0 || txns > 0)
}

pub fn load_week(conn: &Connection, week_start: NaiveDate) -> Result<WeeklyAggregate> {
    let start = week_start.to_string();
    let header: Option<(String, f64, i64)> = conn
        .query_row(
            "SELECT week_end, total_revenue, unique_customers FROM weekly_analytics WHERE week_start = ?1",
            [&start],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    let Some((week_end, total_revenue, unique_customers)) = header else {
        return Err(ClinicError::UnknownWeek(week_start));
    };
    let week = WeekRange::new(week_start, parse_stored_date(&week_end)?)?;

    let mut revenue_by_category: BTreeMap<Category, f64> =
        Category::ALL.iter().map(|c| (*c, 0.0)).collect();
    let mut transactions_by_category: BTreeMap<Category, usize> =
        Category::ALL.iter().map(|c| (*c, 0)).collect();
    let mut stmt = conn.prepare(
        "SELECT category, revenue, transactions FROM weekly_category_totals WHERE week_start = ?1",
    )?;
    let rows: Vec<(String, f64, i64)> = stmt
        .query_map([&start], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for (key, revenue, count) in rows {
        if let Some(cat) = Category::from_key(&key) {
            revenue_by_category.insert(cat, revenue);
            transactions_by_category.insert(cat, count as usize);
        }
    }

    let mut membership_counts: BTreeMap<MembershipType, usize> =
        MembershipType::ALL.iter().map(|m| (*m, 0)).collect();
    let mut new_membership_counts = membership_counts.clone();
    let mut stmt = conn.prepare(
        "SELECT membership_type, total, new_count FROM weekly_memberships WHERE week_start = ?1",
    )?;
    let rows: Vec<(String, i64, i64)> = stmt
        .query_map([&start], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for (key, total, new_count) in rows {
        if let Some(kind) = MembershipType::from_key(&key) {
            membership_counts.insert(kind, total as usize);
            new_membership_counts.insert(kind, new_count as usize);
        }
    }

    let mut top_services: BTreeMap<Category, Vec<ServiceCount>> = Category::TOP_SERVICES
        .iter()
        .map(|c| (*c, Vec::new()))
        .collect();
    let mut stmt = conn.prepare(
        "SELECT category, description, count FROM weekly_top_services \
         WHERE week_start = ?1 ORDER BY category, position",
    )?;
    let rows: Vec<(String, String, i64)> = stmt
        .query_map([&start], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for (key, description, count) in rows {
        if let Some(cat) = Category::from_key(&key) {
            top_services.entry(cat).or_default().push(ServiceCount {
                description,
                count: count as usize,
            });
        }
    }

    Ok(WeeklyAggregate {
        week_start: week.start(),
        week_end: week.end(),
        revenue_by_category,
        transactions_by_category,
        total_revenue,
        unique_customers: unique_customers as usize,
        membership_counts,
        new_membership_counts,
        top_services,
    })
}
