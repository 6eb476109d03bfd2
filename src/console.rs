use crate::backup::backup_to_file;
use crate::db::{BatchOrigin, Record, Store};
use crate::error::Result;
use crate::parser::DATE_FORMAT;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    View,
    Add,
    Backup,
    Quit,
}

/// Whether the menu loop keeps going after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

type Handler = fn(&mut Console<'_>) -> Result<Flow>;

pub struct MenuEntry {
    pub key: char,
    pub command: Command,
    pub description: &'static str,
    handler: Handler,
}

pub const MENU: &[MenuEntry] = &[
    MenuEntry {
        key: 'v',
        command: Command::View,
        description: "View a product by id",
        handler: view_product,
    },
    MenuEntry {
        key: 'a',
        command: Command::Add,
        description: "Add a product",
        handler: add_product,
    },
    MenuEntry {
        key: 'b',
        command: Command::Backup,
        description: "Back up all products to CSV",
        handler: backup,
    },
    MenuEntry {
        key: 'q',
        command: Command::Quit,
        description: "Quit",
        handler: quit,
    },
];

impl Command {
    pub fn from_key(key: char) -> Option<Self> {
        let key = key.to_ascii_lowercase();
        MENU.iter().find(|e| e.key == key).map(|e| e.command)
    }

    fn entry(&self) -> Option<&'static MenuEntry> {
        MENU.iter().find(|e| e.command == *self)
    }
}

/// Line-based menu over a store.
///
/// Reads commands and answers from `input`, writes everything to `output`.
/// Bad answers re-prompt; end of input quits.
pub struct Console<'a> {
    store: &'a mut Store,
    input: &'a mut dyn BufRead,
    output: &'a mut dyn Write,
    backup_path: PathBuf,
    clear_screen: bool,
}

impl<'a> Console<'a> {
    pub fn new(
        store: &'a mut Store,
        input: &'a mut dyn BufRead,
        output: &'a mut dyn Write,
        backup_path: PathBuf,
        clear_screen: bool,
    ) -> Self {
        Self {
            store,
            input,
            output,
            backup_path,
            clear_screen,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        loop {
            if self.clear_screen {
                clear_screen(&mut *self.output)?;
            }
            self.print_menu()?;

            let Some(choice) = self.prompt("> ")? else {
                return Ok(());
            };

            let command = choice.chars().next().and_then(Command::from_key);
            let Some(entry) = command.and_then(|c| c.entry()) else {
                writeln!(self.output, "Unknown option {:?}", choice)?;
                continue;
            };

            match (entry.handler)(self) {
                Ok(Flow::Quit) => return Ok(()),
                Ok(Flow::Continue) => {}
                Err(e) => {
                    warn!(command = ?entry.command, error = %e, "menu command failed");
                    writeln!(self.output, "Error: {}", e)?;
                }
            }

            if self.clear_screen && self.prompt("Press Enter to continue...")?.is_none() {
                return Ok(());
            }
        }
    }

    fn print_menu(&mut self) -> Result<()> {
        writeln!(self.output, "Inventory")?;
        for entry in MENU {
            writeln!(self.output, "  {}) {}", entry.key, entry.description)?;
        }
        Ok(())
    }

    fn print_record(&mut self, record: &Record) -> Result<()> {
        writeln!(self.output, "Product #{}", record.id.unwrap_or_default())?;
        writeln!(self.output, "  Name:         {}", record.name)?;
        writeln!(self.output, "  Quantity:     {}", record.quantity)?;
        writeln!(self.output, "  Price:        {}", record.display_price())?;
        writeln!(
            self.output,
            "  Last updated: {}",
            record.updated_at.format(DATE_FORMAT)
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Input helpers: Ok(None) means the input is exhausted
    // ------------------------------------------------------------------------

    fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        write!(self.output, "{}", label)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn prompt_non_negative(&mut self, label: &str) -> Result<Option<i64>> {
        loop {
            let Some(answer) = self.prompt(label)? else {
                return Ok(None);
            };
            match answer.parse::<i64>() {
                Ok(value) if value >= 0 => return Ok(Some(value)),
                _ => writeln!(self.output, "Please enter a whole number of zero or more.")?,
            }
        }
    }

    fn prompt_non_empty(&mut self, label: &str) -> Result<Option<String>> {
        loop {
            let Some(answer) = self.prompt(label)? else {
                return Ok(None);
            };
            if !answer.is_empty() {
                return Ok(Some(answer));
            }
            writeln!(self.output, "Please enter a value.")?;
        }
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

fn view_product(console: &mut Console<'_>) -> Result<Flow> {
    let Some(id) = console.prompt_non_negative("Product id: ")? else {
        return Ok(Flow::Quit);
    };

    match console.store.get_by_id(id)? {
        Some(record) => console.print_record(&record)?,
        None => writeln!(console.output, "No product with id {}", id)?,
    }

    Ok(Flow::Continue)
}

fn add_product(console: &mut Console<'_>) -> Result<Flow> {
    let Some(name) = console.prompt_non_empty("Name: ")? else {
        return Ok(Flow::Quit);
    };
    let Some(quantity) = console.prompt_non_negative("Quantity: ")? else {
        return Ok(Flow::Quit);
    };
    let Some(price) = console.prompt_non_negative("Price in cents: ")? else {
        return Ok(Flow::Quit);
    };

    let updated_at = chrono::Local::now().naive_local();
    let record = Record::new(name, quantity, price, updated_at)?;
    let summary = console
        .store
        .apply_batch_from(std::slice::from_ref(&record), &BatchOrigin::new("console"))?;

    if summary.inserted > 0 {
        writeln!(console.output, "Added {}", record.name)?;
    } else if summary.updated > 0 {
        writeln!(console.output, "Updated {}", record.name)?;
    } else {
        writeln!(console.output, "Kept the newer stored copy of {}", record.name)?;
    }

    Ok(Flow::Continue)
}

fn backup(console: &mut Console<'_>) -> Result<Flow> {
    let records = console.store.get_all()?;
    backup_to_file(&console.backup_path, &records)?;
    writeln!(
        console.output,
        "Backed up {} products to {}",
        records.len(),
        console.backup_path.display()
    )?;

    Ok(Flow::Continue)
}

fn quit(console: &mut Console<'_>) -> Result<Flow> {
    writeln!(console.output, "Bye!")?;
    Ok(Flow::Quit)
}

#[cfg(feature = "tui")]
fn clear_screen(out: &mut dyn Write) -> io::Result<()> {
    use crossterm::{
        cursor::MoveTo,
        terminal::{Clear, ClearType},
        QueueableCommand,
    };

    out.queue(Clear(ClearType::All))?.queue(MoveTo(0, 0))?;
    out.flush()
}

#[cfg(not(feature = "tui"))]
fn clear_screen(out: &mut dyn Write) -> io::Result<()> {
    write!(out, "\x1B[2J\x1B[1;1H")?;
    out.flush()
}
