mod aggregator;
mod categorizer;
mod cli;
mod db;
mod error;
mod fmt;
mod importer;
mod logging;
mod models;
mod normalizer;
mod reader;
mod reports;
mod settings;
mod week;

use clap::Parser;

use cli::{Cli, Commands, ReportCommands};

fn main() {
    let cli = Cli::parse();
    logging::setup_logging(cli.log_level.as_deref(), &settings::load_settings().log_level);

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Import { file, week, sheet } => {
            cli::import::run(&file, week.as_deref(), sheet.as_deref())
        }
        Commands::Recompute { week } => cli::recompute::run(&week),
        Commands::Classify { description } => cli::classify::run(&description),
        Commands::Report { command } => match command {
            ReportCommands::Week { week } => cli::report::week(&week),
            ReportCommands::Weeks { limit } => cli::report::weeks(limit),
            ReportCommands::Month { month } => cli::report::month(&month),
            ReportCommands::Unmapped { week } => cli::report::unmapped(week.as_deref()),
        },
        Commands::DeleteWeek { week } => cli::delete_week::run(&week),
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
