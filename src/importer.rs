use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::aggregator::{aggregate_week, WeekResult};
use crate::db;
use crate::error::{ClinicError, Result};
use crate::models::Transaction;
use crate::normalizer::{normalize_rows, ColumnMap, RejectedRow};
use crate::reader::{read_file, SourceTable};
use crate::week::{week_bounds, WeekRange};

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions<'a> {
    /// Restrict the import to the week containing this date.
    pub week: Option<NaiveDate>,
    /// Worksheet name for workbook exports (default: first sheet).
    pub sheet: Option<&'a str>,
    pub top_services_limit: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeekSummary {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub transactions: usize,
    pub total_revenue: f64,
    pub unmapped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    pub rows_read: usize,
    pub accepted: usize,
    pub rejected: Vec<RejectedRow>,
    /// Accepted rows outside the requested week.
    pub out_of_range: usize,
    pub weeks: Vec<WeekSummary>,
}

/// Bucket transactions by their Monday-Sunday week, keeping source order
/// inside each bucket.
pub fn group_by_week(transactions: &[Transaction]) -> Result<BTreeMap<WeekRange, Vec<Transaction>>> {
    let mut weeks: BTreeMap<WeekRange, Vec<Transaction>> = BTreeMap::new();
    for txn in transactions {
        weeks.entry(week_bounds(txn.date)?).or_default().push(txn.clone());
    }
    Ok(weeks)
}

pub fn import_file(
    conn: &Connection,
    file_path: &Path,
    columns: &ColumnMap,
    options: &ImportOptions<'_>,
) -> Result<ImportResult> {
    let checksum = compute_checksum(file_path)?;
    let table = read_file(file_path, options.sheet)?;
    let filename = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    import_table(conn, filename, &checksum, &table, columns, options)
}

/// Normalize, fold and store one export. Every week touched is replaced
/// wholesale; nothing is patched in place.
pub fn import_table(
    conn: &Connection,
    filename: &str,
    checksum: &str,
    table: &SourceTable,
    columns: &ColumnMap,
    options: &ImportOptions<'_>,
) -> Result<ImportResult> {
    let resolved = columns.resolve(&table.headers);
    let missing = resolved.missing();
    if !missing.is_empty() {
        return Err(ClinicError::MissingColumn(format!(
            "{} (headers: {})",
            missing.join(", "),
            table.headers.join(", ")
        )));
    }

    let normalized = normalize_rows(&table.rows, &resolved);

    let mut out_of_range = 0usize;
    let batches: BTreeMap<WeekRange, Vec<Transaction>> = match options.week {
        Some(reference) => {
            let week = week_bounds(reference)?;
            let (inside, outside): (Vec<Transaction>, Vec<Transaction>) = normalized
                .transactions
                .iter()
                .cloned()
                .partition(|t| week.contains(t.date));
            out_of_range = outside.len();
            if inside.is_empty() {
                // an empty fold would wipe whatever is stored for the week
                tracing::warn!(week_start = %week.start(), "no rows in requested week; leaving it unchanged");
                BTreeMap::new()
            } else {
                BTreeMap::from([(week, inside)])
            }
        }
        None => group_by_week(&normalized.transactions)?,
    };

    let folded: Vec<(Vec<Transaction>, WeekResult)> = batches
        .into_iter()
        .map(|(week, transactions)| {
            let result = aggregate_week(week, &transactions, options.top_services_limit);
            (transactions, result)
        })
        .collect();

    let record = db::ImportRecord {
        filename,
        checksum,
        rows_read: table.rows.len(),
        rows_accepted: normalized.transactions.len(),
        rows_rejected: normalized.rejected.len(),
    };
    let (_, stored) = db::store_import(conn, &record, &folded)?;

    let weeks: Vec<WeekSummary> = folded
        .iter()
        .zip(stored)
        .map(|((_, result), transactions)| WeekSummary {
            week_start: result.aggregate.week_start,
            week_end: result.aggregate.week_end,
            transactions,
            total_revenue: result.aggregate.total_revenue,
            unmapped: result.unmapped.len(),
        })
        .collect();

    tracing::info!(
        file = filename,
        rows = table.rows.len(),
        accepted = normalized.transactions.len(),
        rejected = normalized.rejected.len(),
        out_of_range,
        weeks = weeks.len(),
        "import complete"
    );

    Ok(ImportResult {
        rows_read: table.rows.len(),
        accepted: normalized.transactions.len(),
        rejected: normalized.rejected,
        out_of_range,
        weeks,
    })
}

/// Re-fold a week from its stored canonical transactions and replace the
/// aggregate. The repair path for a week whose numbers look wrong.
pub fn recompute_week(conn: &Connection, week: WeekRange, top_services_limit: usize) -> Result<WeekResult> {
    let transactions = db::load_transactions(conn, week.range())?;
    let result = aggregate_week(week, &transactions, top_services_limit);
    db::replace_aggregate(conn, &result)?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db, load_week};
    use crate::models::{Category, MembershipType};
    use crate::normalizer::RejectReason;
    use crate::reader::read_csv;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn options() -> ImportOptions<'static> {
        ImportOptions {
            top_services_limit: 3,
            ..ImportOptions::default()
        }
    }

    const WEEK_CSV: &str = "\
Date Of Payment,Patient,Charge Desc,Calculated Payment (Line)
8/25/25,Jane Doe,Hydration,$150.00
8/26/25,Jane Doe,Semaglutide Injection (Member),$150.00
8/27/25,Amy Poe,OFFICE VISIT Membership - Family (NEW),$199.00
8/28/25,Bob Roe,B12 Injection (Member),$25.00
8/29/25,Bob Roe,Gift Card,$50.00
bad date,Cal Low,Hydration,$150.00
8/30/25,,Energy,$175.00
9/1/25,Dee Fox,Energy,$175.00
";

    #[test]
    fn test_import_groups_by_week() {
        let (_dir, conn) = test_db();
        let table = read_csv(WEEK_CSV.as_bytes()).unwrap();
        let result = import_table(&conn, "week.csv", "abc", &table, &ColumnMap::default(), &options()).unwrap();

        assert_eq!(result.rows_read, 8);
        assert_eq!(result.accepted, 6);
        assert_eq!(result.rejected.len(), 2);
        assert_eq!(result.rejected[0].reason, RejectReason::UnparseableDate("bad date".into()));
        assert_eq!(result.rejected[1].reason, RejectReason::MissingPatient);
        assert_eq!(result.weeks.len(), 2);
        assert_eq!(result.weeks[0].week_start, ymd(2025, 8, 25));
        assert_eq!(result.weeks[0].transactions, 5);
        assert_eq!(result.weeks[0].unmapped, 1);
        assert_eq!(result.weeks[1].week_start, ymd(2025, 9, 1));

        let agg = load_week(&conn, ymd(2025, 8, 25)).unwrap();
        assert_eq!(agg.total_revenue, 574.0);
        assert_eq!(agg.revenue_by_category[&Category::WeightLossMedication], 150.0);
        assert_eq!(agg.revenue_by_category[&Category::StandaloneInjection], 25.0);
        assert_eq!(agg.unique_customers, 3);
        assert_eq!(agg.new_membership_counts[&MembershipType::Family], 1);
    }

    #[test]
    fn test_import_single_week_counts_out_of_range() {
        let (_dir, conn) = test_db();
        let table = read_csv(WEEK_CSV.as_bytes()).unwrap();
        let opts = ImportOptions {
            week: Some(ymd(2025, 8, 31)),
            ..options()
        };
        let result = import_table(&conn, "week.csv", "abc", &table, &ColumnMap::default(), &opts).unwrap();
        assert_eq!(result.weeks.len(), 1);
        assert_eq!(result.out_of_range, 1);
        assert!(load_week(&conn, ymd(2025, 9, 1)).is_err());
    }

    #[test]
    fn test_requested_week_without_rows_keeps_stored_week() {
        let (_dir, conn) = test_db();
        let table = read_csv(WEEK_CSV.as_bytes()).unwrap();
        import_table(&conn, "week.csv", "abc", &table, &ColumnMap::default(), &options()).unwrap();
        let before = load_week(&conn, ymd(2025, 8, 25)).unwrap();

        let stray = read_csv(
            "Date Of Payment,Patient,Charge Desc,Calculated Payment (Line)\n9/2/25,Jane Doe,Hydration,$150.00\n"
                .as_bytes(),
        )
        .unwrap();
        let opts = ImportOptions {
            week: Some(ymd(2025, 8, 27)),
            ..options()
        };
        let result = import_table(&conn, "stray.csv", "def", &stray, &ColumnMap::default(), &opts).unwrap();
        assert!(result.weeks.is_empty());
        assert_eq!(result.out_of_range, 1);

        assert_eq!(load_week(&conn, ymd(2025, 8, 25)).unwrap(), before);
        let stored: i64 = conn
            .query_row(
                "SELECT count(*) FROM transactions WHERE date BETWEEN '2025-08-25' AND '2025-08-31'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(stored, 5);
    }

    #[test]
    fn test_import_ledger_row_per_import() {
        let (_dir, conn) = test_db();
        let table = read_csv(WEEK_CSV.as_bytes()).unwrap();
        import_table(&conn, "week.csv", "abc", &table, &ColumnMap::default(), &options()).unwrap();
        let (accepted, rejected): (i64, i64) = conn
            .query_row("SELECT rows_accepted, rows_rejected FROM imports", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!((accepted, rejected), (6, 2));
        let linked: i64 = conn
            .query_row(
                "SELECT count(*) FROM transactions t JOIN imports i ON t.import_id = i.id",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(linked, 6);
    }

    #[test]
    fn test_reimport_is_idempotent() {
        let (_dir, conn) = test_db();
        let table = read_csv(WEEK_CSV.as_bytes()).unwrap();
        import_table(&conn, "week.csv", "abc", &table, &ColumnMap::default(), &options()).unwrap();
        let first = load_week(&conn, ymd(2025, 8, 25)).unwrap();
        import_table(&conn, "week.csv", "abc", &table, &ColumnMap::default(), &options()).unwrap();
        let second = load_week(&conn, ymd(2025, 8, 25)).unwrap();
        assert_eq!(first, second);
        let stored: i64 = conn
            .query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(stored, 6);
    }

    #[test]
    fn test_missing_column_is_reported() {
        let (_dir, conn) = test_db();
        let table = read_csv("Date,Patient,Amount\n8/25/25,Jane,$10\n".as_bytes()).unwrap();
        let err = import_table(&conn, "x.csv", "abc", &table, &ColumnMap::default(), &options()).unwrap_err();
        assert!(matches!(err, ClinicError::MissingColumn(ref m) if m.starts_with("description")));
    }

    #[test]
    fn test_recompute_week_matches_import() {
        let (_dir, conn) = test_db();
        let table = read_csv(WEEK_CSV.as_bytes()).unwrap();
        import_table(&conn, "week.csv", "abc", &table, &ColumnMap::default(), &options()).unwrap();
        let imported = load_week(&conn, ymd(2025, 8, 25)).unwrap();
        let week = week_bounds(ymd(2025, 8, 25)).unwrap();
        let result = recompute_week(&conn, week, 3).unwrap();
        assert_eq!(result.aggregate, imported);
        assert_eq!(load_week(&conn, week.start()).unwrap(), imported);
    }

    #[test]
    fn test_import_file_from_disk() {
        let (dir, conn) = test_db();
        let path = dir.path().join("week.csv");
        std::fs::write(&path, WEEK_CSV).unwrap();
        let result = import_file(&conn, &path, &ColumnMap::default(), &options()).unwrap();
        assert_eq!(result.accepted, 6);
        let checksum: String = conn
            .query_row("SELECT checksum FROM imports LIMIT 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(checksum.len(), 64);
    }

    #[test]
    fn test_group_by_week() {
        let t = |d: NaiveDate| Transaction {
            date: d,
            patient: "P".into(),
            description: "Hydration".into(),
            amount: 1.0,
        };
        let groups = group_by_week(&[t(ymd(2025, 8, 31)), t(ymd(2025, 9, 1)), t(ymd(2025, 8, 25))]).unwrap();
        let starts: Vec<NaiveDate> = groups.keys().map(|w| w.start()).collect();
        assert_eq!(starts, vec![ymd(2025, 8, 25), ymd(2025, 9, 1)]);
        assert_eq!(groups.values().next().unwrap().len(), 2);
    }
}
