use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use tracing::info;

use office_parking::config::AppConfig;
use office_parking::display::{print_report, write_assignments_csv, write_day_files};
use office_parking::error::{AppError, StoreError};
use office_parking::parser::{load_attendance, load_spaces};
use office_parking::schedule::eligibility::check_window_start;
use office_parking::schedule::WindowRunner;
use office_parking::store::MemoryStore;
use office_parking::{logging, web};

#[derive(Parser)]
#[command(name = "office-parking", about = "Office attendance and parking allocation", version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the JSON API
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Allocate the assignment window starting at a date (default today)
    Allocate {
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Also export the committed assignments as CSV
        #[arg(long)]
        output: Option<PathBuf>,
        /// Write one text file per committed day into this directory
        #[arg(long)]
        day_files: Option<PathBuf>,
    },
    /// Import parking spaces from CSV
    ImportSpaces { file: PathBuf },
    /// Import attendance rows from CSV
    ImportAttendance { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    logging::init(&config.logging.filter);

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            println!("Starting web server on port {}...", config.server.port);
            web::start_server(config).await?;
        }
        Command::Allocate {
            start,
            output,
            day_files,
        } => {
            let today = Local::now().date_naive();
            let start = start.unwrap_or(today);
            check_window_start(today, start).map_err(StoreError::from)?;
            let path = &config.storage.snapshot_path;
            let mut store = MemoryStore::load_snapshot(path)?;

            let report = WindowRunner::new(
                &mut store,
                config.allocation.trailing_days,
                config.allocation.commit_retries,
            )
            .run(start)?;
            store.save_snapshot(path)?;
            print_report(&report, store.inventory());

            if let Some(output) = output {
                let file = File::create(&output)?;
                write_assignments_csv(file, &report.ledger())?;
                println!("Assignments saved to {}", output.display());
            }
            if let Some(dir) = day_files {
                let written = write_day_files(&report, store.inventory(), &dir)?;
                println!("Wrote {} day files to {}", written, dir.display());
            }
        }
        Command::ImportSpaces { file } => {
            let path = &config.storage.snapshot_path;
            let mut store = MemoryStore::load_snapshot(path)?;
            let spaces = load_spaces(&file)?;
            let count = spaces.len();
            for space in spaces {
                if store.inventory().get(&space.id).is_some() {
                    store.update_space(space)?;
                } else {
                    store.add_space(space)?;
                }
            }
            store.save_snapshot(path)?;
            info!(count, "parking spaces imported");
            println!("Imported {} parking spaces", count);
        }
        Command::ImportAttendance { file } => {
            let path = &config.storage.snapshot_path;
            let mut store = MemoryStore::load_snapshot(path)?;
            let rows = load_attendance(&file)?;
            for row in &rows {
                store.record_attendance(&row.user_id, row.date, row.status)?;
            }
            store.save_snapshot(path)?;
            info!(count = rows.len(), "attendance imported");
            println!("Imported {} attendance records", rows.len());
        }
    }

    Ok(())
}
