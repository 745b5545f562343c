use crate::db::get_connection;
use crate::error::Result;
use crate::fmt::{money, week_label};
use crate::importer::recompute_week;
use crate::settings::{db_path, load_settings};

use super::parse_week_arg;

pub fn run(week: &str) -> Result<()> {
    let week = parse_week_arg(week)?;
    let conn = get_connection(&db_path())?;
    let result = recompute_week(&conn, week, load_settings().top_services_limit)?;
    println!(
        "Recomputed {}: {} revenue, {} customers, {} unmapped",
        week_label(week.start(), week.end()),
        money(result.aggregate.total_revenue),
        result.aggregate.unique_customers,
        result.unmapped.len()
    );
    Ok(())
}
