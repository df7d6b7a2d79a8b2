//! sheetpatch CLI - surgical cell edits on Excel templates
//!
//! A command-line tool for writing values and fills into existing XLSX files.

use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use sheetpatch::{CellEdit, Package, PatchEngine, PatchOptions};
use std::fs;
use std::path::{Path, PathBuf};

/// Surgical cell edits on XLSX templates
#[derive(Parser)]
#[command(
    name = "sheetpatch",
    author = "iyulab",
    version,
    about = "Write cell values into Excel templates",
    long_about = "sheetpatch - Surgical cell edits on XLSX templates.\n\n\
                  Only the touched cells, shared strings and styles change; \
                  every other byte of the workbook is preserved."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write cell values (and optional fills) into a workbook
    Set {
        /// Input file path
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Sheet tab name to patch
        #[arg(long, conflicts_with = "part")]
        sheet: Option<String>,

        /// Worksheet part path to patch (default: xl/worksheets/sheet1.xml)
        #[arg(long)]
        part: Option<String>,

        /// Cell value as REF=VALUE (repeatable)
        #[arg(short, long = "cell", value_name = "REF=VALUE")]
        cells: Vec<String>,

        /// Fill color for a --cell as REF=#RRGGBB (repeatable)
        #[arg(short, long = "fill", value_name = "REF=#RRGGBB")]
        fills: Vec<String>,

        /// JSON file with an array of {"cell", "value", "fill"} edits
        #[arg(short, long)]
        batch: Option<PathBuf>,

        /// Insert new rows and cells in sorted position instead of appending
        #[arg(long)]
        sorted: bool,

        /// Print errors as JSON records
        #[arg(long)]
        json_errors: bool,
    },

    /// List the sheets of a workbook
    Info {
        /// Input file path
        input: PathBuf,
    },

    /// Show version information
    Version,
}

/// Failures that happen before the library is reached.
#[derive(Debug)]
struct UsageError(String);

impl std::fmt::Display for UsageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for UsageError {}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let json_errors = matches!(cli.command, Commands::Set { json_errors: true, .. });

    if let Err(e) = run(cli) {
        if json_errors {
            eprintln!("{}", error_json(e.as_ref()));
        } else {
            eprintln!("{}: {}", "Error".red().bold(), e);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Set {
            input,
            output,
            sheet,
            part,
            cells,
            fills,
            batch,
            sorted,
            json_errors: _,
        } => {
            let mut edits = match batch {
                Some(path) => read_batch(&path)?,
                None => Vec::new(),
            };
            edits.extend(collect_edits(&cells, &fills)?);
            if edits.is_empty() {
                return Err(UsageError("no edits given (use --cell or --batch)".into()).into());
            }

            let pb = create_spinner("Opening workbook...");
            let mut package = Package::open(&input)?;
            log::debug!("opened {} ({} parts)", input.display(), package.list_files().len());

            let worksheet = match (sheet, part) {
                (Some(name), _) => sheetpatch::xlsx::resolve_sheet_path(&package, &name)?,
                (None, Some(path)) => path,
                (None, None) => sheetpatch::options::DEFAULT_WORKSHEET_PATH.to_string(),
            };
            let options = PatchOptions::for_sheet(worksheet).with_sorted(sorted);
            log::debug!("patching {} with {} edits", options.worksheet_path, edits.len());

            pb.set_message(format!("Patching {}...", options.worksheet_path));
            let mut engine = PatchEngine::new(&mut package, options);
            let applied = engine.set_cells(&edits)?;
            engine.flush()?;

            pb.set_message("Writing workbook...");
            package.save(&output)?;
            log::debug!("saved {}", output.display());
            pb.finish_and_clear();

            println!(
                "{} Wrote {} cells to {}",
                "✓".green().bold(),
                applied,
                output.display()
            );
        }

        Commands::Info { input } => {
            let pb = create_spinner("Reading workbook...");
            let package = Package::open(&input)?;
            let sheets = sheetpatch::xlsx::list_sheets(&package)?;
            pb.finish_and_clear();

            println!("{}", "Workbook Information".cyan().bold());
            println!("{}", "─".repeat(40));
            println!(
                "{}: {}",
                "File".bold(),
                input.file_name().unwrap_or_default().to_string_lossy()
            );
            println!("{}: {}", "Parts".bold(), package.list_files().len());
            println!("{}: {}", "Sheets".bold(), sheets.len());

            println!("\n{}", "Sheets".cyan().bold());
            println!("{}", "─".repeat(40));
            for sheet in &sheets {
                println!("{} {}", sheet.name.bold(), sheet.part_path.dimmed());
            }
        }

        Commands::Version => {
            print_version();
        }
    }

    Ok(())
}

/// Split a `REF=VALUE` argument. The value may itself contain `=`.
fn parse_assignment(arg: &str) -> Result<(String, String), UsageError> {
    match arg.split_once('=') {
        Some((cell, value)) if !cell.trim().is_empty() => {
            Ok((cell.trim().to_string(), value.to_string()))
        }
        _ => Err(UsageError(format!("expected REF=VALUE, got '{}'", arg))),
    }
}

/// Build edits from `--cell` values, attaching any `--fill` given for the same reference.
fn collect_edits(cells: &[String], fills: &[String]) -> Result<Vec<CellEdit>, UsageError> {
    let mut edits = cells
        .iter()
        .map(|arg| parse_assignment(arg).map(|(cell, value)| CellEdit::new(cell, value)))
        .collect::<Result<Vec<_>, _>>()?;

    for arg in fills {
        let (cell, color) = parse_assignment(arg)?;
        let mut matched = false;
        for edit in edits.iter_mut().filter(|e| e.cell == cell) {
            edit.fill = Some(color.clone());
            matched = true;
        }
        if !matched {
            return Err(UsageError(format!("--fill for {} has no matching --cell", cell)));
        }
    }

    Ok(edits)
}

fn read_batch(path: &Path) -> Result<Vec<CellEdit>, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    let edits = serde_json::from_str(&text)
        .map_err(|e| UsageError(format!("invalid batch file {}: {}", path.display(), e)))?;
    Ok(edits)
}

fn error_json(err: &(dyn std::error::Error + 'static)) -> String {
    match err.downcast_ref::<sheetpatch::Error>() {
        Some(e) => e.to_record().to_json(),
        None => serde_json::json!({
            "code": "USAGE_ERROR",
            "message": err.to_string(),
            "recoverable": false,
        })
        .to_string(),
    }
}

fn print_version() {
    println!("{} {}", "sheetpatch".green().bold(), env!("CARGO_PKG_VERSION"));
    println!("Surgical cell edits on XLSX templates");
    println!();
    println!("Repository: https://github.com/iyulab/sheetpatch");
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
