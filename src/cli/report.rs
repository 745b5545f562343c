use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::db::{get_connection, load_week};
use crate::error::Result;
use crate::fmt::{money, week_label};
use crate::models::{Category, MembershipType};
use crate::reports;
use crate::settings::db_path;
use crate::week::parse_month;

use super::parse_week_arg;

pub fn week(week: &str) -> Result<()> {
    let range = parse_week_arg(week)?;
    let conn = get_connection(&db_path())?;
    let agg = load_week(&conn, range.start())?;

    let mut table = Table::new();
    table.set_header(vec!["Category", "Transactions", "Revenue"]);
    for category in Category::ALL {
        let revenue = agg.revenue_by_category.get(&category).copied().unwrap_or(0.0);
        let count = agg.transactions_by_category.get(&category).copied().unwrap_or(0);
        table.add_row(vec![
            Cell::new(category.name()),
            Cell::new(count),
            Cell::new(money(revenue)),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(""),
        Cell::new(money(agg.total_revenue).bold()),
    ]);
    println!("{}\n{table}", week_label(agg.week_start, agg.week_end).bold());
    println!("Unique customers: {}", agg.unique_customers);

    if agg.membership_counts.values().any(|n| *n > 0) {
        let mut members = Table::new();
        members.set_header(vec!["Membership", "Signups", "New"]);
        for mt in MembershipType::ALL {
            let total = agg.membership_counts.get(&mt).copied().unwrap_or(0);
            if total == 0 {
                continue;
            }
            let new = agg.new_membership_counts.get(&mt).copied().unwrap_or(0);
            members.add_row(vec![Cell::new(mt.key()), Cell::new(total), Cell::new(new)]);
        }
        println!("\nMemberships\n{members}");
    }

    for category in Category::TOP_SERVICES {
        let services = match agg.top_services.get(&category) {
            Some(s) if !s.is_empty() => s,
            _ => continue,
        };
        let mut top = Table::new();
        top.set_header(vec!["Service", "Count"]);
        for s in services {
            top.add_row(vec![Cell::new(&s.description), Cell::new(s.count)]);
        }
        println!("\nTop {}\n{top}", category.name());
    }
    Ok(())
}

pub fn weeks(limit: Option<usize>) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let rows = reports::list_weeks(&conn, limit)?;
    if rows.is_empty() {
        println!("No weeks stored. Run `clinicboard import <file>` first.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Week", "Revenue", "Customers", "Computed"]);
    for r in &rows {
        table.add_row(vec![
            Cell::new(week_label(r.week_start, r.week_end)),
            Cell::new(money(r.total_revenue)),
            Cell::new(r.unique_customers),
            Cell::new(&r.computed_at),
        ]);
    }
    println!("Stored Weeks\n{table}");
    Ok(())
}

pub fn month(month: &str) -> Result<()> {
    let range = parse_month(month)?;
    let conn = get_connection(&db_path())?;
    let summary = reports::get_period_summary(&conn, range)?;

    let mut table = Table::new();
    table.set_header(vec!["Category", "Transactions", "Revenue"]);
    for category in Category::ALL {
        let revenue = summary.revenue_by_category.get(&category).copied().unwrap_or(0.0);
        let count = summary.transactions_by_category.get(&category).copied().unwrap_or(0);
        table.add_row(vec![
            Cell::new(category.name()),
            Cell::new(count),
            Cell::new(money(revenue)),
        ]);
    }
    let total_label = if summary.total_revenue >= 0.0 {
        "Total".green().bold()
    } else {
        "Total".red().bold()
    };
    table.add_row(vec![
        Cell::new(total_label),
        Cell::new(""),
        Cell::new(money(summary.total_revenue)),
    ]);
    println!(
        "{} to {}\n{table}",
        summary.start.format("%b %d, %Y"),
        summary.end.format("%b %d, %Y")
    );
    println!("Unique customers: {}", summary.unique_customers);
    Ok(())
}

pub fn unmapped(week: Option<&str>) -> Result<()> {
    let week_start = week.map(parse_week_arg).transpose()?.map(|w| w.start());
    let conn = get_connection(&db_path())?;
    let items = reports::get_unmapped(&conn, week_start)?;
    if items.is_empty() {
        println!("{}", "No unmapped services.".green());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Description", "Count", "Total", "First Seen", "Last Seen"]);
    for item in &items {
        table.add_row(vec![
            Cell::new(&item.description),
            Cell::new(item.count),
            Cell::new(money(item.total)),
            Cell::new(&item.first_seen),
            Cell::new(&item.last_seen),
        ]);
    }
    println!("{}\n{table}", "Unmapped Services".yellow().bold());
    Ok(())
}
