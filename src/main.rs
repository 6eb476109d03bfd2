use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::path::Path;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use inventory_ledger::{backup_to_file, import_csv, Cli, Config, Console, Mode, Store};

fn main() -> Result<()> {
    init_tracing();
    let config = Config::from(Cli::parse());

    // The store is released when it goes out of scope, error paths included
    let mut store = Store::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;

    match &config.mode {
        Mode::Run => {
            if config.csv_path.exists() {
                run_import(&mut store, &config.csv_path)?;
            } else {
                warn!(path = %config.csv_path.display(), "startup CSV not found, skipping import");
            }
            run_menu(&mut store, &config)?;
        }
        Mode::Import(csv_path) => run_import(&mut store, csv_path)?,
        Mode::Backup(out) => run_backup(&store, out)?,
        Mode::Menu => run_menu(&mut store, &config)?,
    }

    store.close().context("Failed to close database")?;
    Ok(())
}

fn init_tracing() {
    // Logs go to stderr so they never interleave with the menu on stdout
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run_import(store: &mut Store, csv_path: &Path) -> Result<()> {
    println!("📂 Importing {}...", csv_path.display());

    let report = import_csv(store, csv_path, "csv_importer")
        .with_context(|| format!("Failed to import {}", csv_path.display()))?;

    println!("✓ Read {} rows (sha256 {})", report.rows, report.sha256);
    println!("✓ Inserted: {}", report.summary.inserted);
    println!("✓ Updated: {}", report.summary.updated);
    println!("✓ Skipped (stored copy newer): {}", report.summary.skipped);
    println!("✓ Database contains {} products", store.count()?);

    Ok(())
}

fn run_backup(store: &Store, out: &Path) -> Result<()> {
    let records = store.get_all()?;
    backup_to_file(out, &records)
        .with_context(|| format!("Failed to write backup {}", out.display()))?;
    println!("✓ Backed up {} products to {}", records.len(), out.display());
    Ok(())
}

fn run_menu(store: &mut Store, config: &Config) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();

    Console::new(
        store,
        &mut input,
        &mut output,
        config.backup_path.clone(),
        config.clear_screen,
    )
    .run()
    .context("Console failed")?;

    Ok(())
}
