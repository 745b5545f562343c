use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::fmt::{money, week_label};
use crate::importer::{import_file, ImportOptions};
use crate::settings::{db_path, load_settings};
use crate::week::parse_iso_date;

/// Rejected rows listed individually before summarizing the rest.
const REJECTED_SHOWN: usize = 10;

pub fn run(file: &str, week: Option<&str>, sheet: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let file_path = PathBuf::from(file);
    let conn = get_connection(&db_path())?;
    init_db(&conn)?;

    let options = ImportOptions {
        week: week.map(parse_iso_date).transpose()?,
        sheet,
        top_services_limit: settings.top_services_limit,
    };
    let result = import_file(&conn, &file_path, &settings.columns, &options)?;

    println!(
        "{} rows read, {} accepted, {} rejected",
        result.rows_read,
        result.accepted,
        result.rejected.len()
    );
    if result.out_of_range > 0 {
        println!("{} rows outside the requested week were skipped", result.out_of_range);
    }

    if !result.rejected.is_empty() {
        for r in result.rejected.iter().take(REJECTED_SHOWN) {
            println!("  {} data row {}: {}", "rejected".yellow(), r.index + 1, r.reason);
        }
        if result.rejected.len() > REJECTED_SHOWN {
            println!("  ... and {} more", result.rejected.len() - REJECTED_SHOWN);
        }
    }

    if result.weeks.is_empty() {
        if options.week.is_some() {
            println!("No rows in the requested week; stored data left unchanged.");
        } else {
            println!("No weeks updated.");
        }
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Week", "Transactions", "Revenue", "Unmapped"]);
    for w in &result.weeks {
        let unmapped = if w.unmapped > 0 {
            w.unmapped.to_string().yellow().to_string()
        } else {
            w.unmapped.to_string()
        };
        table.add_row(vec![
            Cell::new(week_label(w.week_start, w.week_end)),
            Cell::new(w.transactions),
            Cell::new(money(w.total_revenue)),
            Cell::new(unmapped),
        ]);
    }
    println!("Weeks updated\n{table}");
    Ok(())
}
