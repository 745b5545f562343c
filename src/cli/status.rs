use crate::db::{get_connection, DB_FILE};
use crate::error::Result;
use crate::reports::get_status;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let db_path = data_dir.join(DB_FILE);

    println!("Data dir:   {}", data_dir.display());
    println!("Database:   {}", db_path.display());

    if db_path.exists() {
        let conn = get_connection(&db_path)?;
        let counts = get_status(&conn)?;

        println!();
        println!("Imports:       {}", counts.imports);
        println!("Transactions:  {}", counts.transactions);
        println!("Weeks:         {}", counts.weeks);
        println!("Unmapped:      {}", counts.unmapped);
        println!("Last import:   {}", counts.last_import.as_deref().unwrap_or("(never)"));
    } else {
        println!();
        println!("Database not found. Run `clinicboard init` to set up.");
    }

    Ok(())
}
