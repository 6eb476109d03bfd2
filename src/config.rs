// Command-line configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "inventory-ledger",
    version,
    about = "Import inventory CSV files into SQLite and browse them from a console menu"
)]
pub struct Cli {
    /// SQLite database file
    #[arg(long, global = true, default_value = "inventory.db")]
    pub db: PathBuf,

    /// CSV file imported on startup when no subcommand is given
    #[arg(long, default_value = "inventory.csv")]
    pub csv: PathBuf,

    /// Where the menu's backup command writes
    #[arg(long, default_value = "backup.csv")]
    pub backup_path: PathBuf,

    /// Do not clear the terminal between menu screens
    #[arg(long)]
    pub no_clear: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Import a CSV file and exit
    Import { csv: PathBuf },
    /// Write every stored product to a CSV file and exit
    Backup { out: PathBuf },
    /// Open the console menu without importing
    Menu,
}

/// What the binary should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Import the startup CSV (if present), then open the menu
    Run,
    Import(PathBuf),
    Backup(PathBuf),
    Menu,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub csv_path: PathBuf,
    pub backup_path: PathBuf,
    pub clear_screen: bool,
    pub mode: Mode,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        let mode = match cli.command {
            None => Mode::Run,
            Some(CliCommand::Import { csv }) => Mode::Import(csv),
            Some(CliCommand::Backup { out }) => Mode::Backup(out),
            Some(CliCommand::Menu) => Mode::Menu,
        };

        Config {
            db_path: cli.db,
            csv_path: cli.csv,
            backup_path: cli.backup_path,
            clear_screen: !cli.no_clear,
            mode,
        }
    }
}
