pub mod classify;
pub mod delete_week;
pub mod import;
pub mod init;
pub mod recompute;
pub mod report;
pub mod status;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::week::{parse_iso_date, week_bounds, WeekRange};

/// `--week` accepts any date inside the week; it is anchored to its Monday.
pub(crate) fn parse_week_arg(raw: &str) -> Result<WeekRange> {
    week_bounds(parse_iso_date(raw)?)
}

#[derive(Parser)]
#[command(name = "clinicboard", about = "Weekly revenue and membership tracker for an infusion clinic.")]
pub struct Cli {
    /// Log level or filter directive (overrides RUST_LOG and settings)
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for clinicboard data (default: ~/Documents/clinicboard)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Import a weekly export (CSV or XLSX) and rebuild the weeks it covers.
    Import {
        /// Path to the CSV or XLSX export
        file: String,
        /// Only import the week containing this date: YYYY-MM-DD
        #[arg(long)]
        week: Option<String>,
        /// Worksheet name for workbook exports (default: first sheet)
        #[arg(long)]
        sheet: Option<String>,
    },
    /// Rebuild a week's aggregate from its stored transactions.
    Recompute {
        /// Any date in the week: YYYY-MM-DD
        #[arg(long)]
        week: String,
    },
    /// Show how a charge description is categorized.
    Classify {
        /// Charge description, e.g. "B12 Injection (Member)"
        description: String,
    },
    /// Generate reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Delete a stored week (aggregate and transactions).
    DeleteWeek {
        /// Any date in the week: YYYY-MM-DD
        #[arg(long)]
        week: String,
    },
    /// Show current database and summary statistics.
    Status,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Weekly aggregate: revenue, memberships, top services.
    Week {
        /// Any date in the week: YYYY-MM-DD
        #[arg(long)]
        week: String,
    },
    /// List stored weeks, newest first.
    Weeks {
        /// Show at most this many weeks
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Revenue for a calendar month, folded from stored transactions.
    Month {
        /// Month: YYYY-MM
        #[arg(long)]
        month: String,
    },
    /// Services that matched no category rule.
    Unmapped {
        /// Restrict to the week containing this date: YYYY-MM-DD
        #[arg(long)]
        week: Option<String>,
    },
}
