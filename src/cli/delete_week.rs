use crate::db::{delete_week, get_connection};
use crate::error::Result;
use crate::fmt::week_label;
use crate::settings::db_path;

use super::parse_week_arg;

pub fn run(week: &str) -> Result<()> {
    let week = parse_week_arg(week)?;
    let conn = get_connection(&db_path())?;
    let label = week_label(week.start(), week.end());
    if delete_week(&conn, week)? {
        println!("Deleted {label}");
    } else {
        println!("No stored data for {label}");
    }
    Ok(())
}
