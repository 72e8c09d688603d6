// gridcalc CLI - apply a cell script to a sheet and dump the result

mod exit_codes;
mod script;

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use gridcalc_engine::{CellValue, Position, Sheet, SheetError, Size};
use serde::Serialize;

use exit_codes::{sheet_exit_code, EXIT_IO, EXIT_SUCCESS};
use script::{parse_line, LineError, Step};

#[derive(Parser)]
#[command(name = "gcalc")]
#[command(about = "Apply a cell script to a spreadsheet and print the result")]
#[command(version)]
#[command(long_version = long_version())]
#[command(after_help = "\
Script format (one cell per line):
  A1 42
  B1 =A1*2
  C1 'quoted text
  A1            (bare address clears the cell)

Examples:
  gcalc sheet.txt
  printf 'A1 2\\nB1 =A1*3\\n' | gcalc --output texts")]
struct Cli {
    /// Script to apply ('-' or omitted reads stdin)
    script: Option<PathBuf>,

    /// How to print the sheet after the script has run
    #[arg(long, short = 'o', value_enum, default_value = "values", env = "GRIDCALC_OUTPUT")]
    output: OutputFormat,

    /// Keep applying lines after a rejected one; exit with the first fault's code
    #[arg(long)]
    keep_going: bool,

    /// Log filter, e.g. "debug" or "gridcalc_engine=trace"
    #[arg(long, default_value = "warn", env = "GRIDCALC_LOG")]
    log_level: String,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  gridcalc-engine ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Tab-separated cell values
    Values,
    /// Tab-separated cell texts
    Texts,
    /// JSON object with size, values and texts
    Json,
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    /// Error for a script line the sheet or the line parser rejected.
    pub fn line(number: usize, code: u8, msg: impl std::fmt::Display) -> Self {
        Self { code, message: format!("line {}: {}", number, msg), hint: None }
    }

    pub fn sheet(number: usize, err: &SheetError) -> Self {
        let hint = match err {
            SheetError::CircularDependency(_) => {
                Some("a formula may not read itself, directly or through other cells".to_string())
            }
            SheetError::FormulaParse(_) => {
                Some("start the content with ' to store it as text".to_string())
            }
            SheetError::InvalidPosition(_) => None,
        };
        Self { hint, ..Self::line(number, sheet_exit_code(err), err) }
    }

    pub fn script_line(number: usize, err: &LineError) -> Self {
        let hint = match err {
            LineError::BadAddress(_) => {
                Some("addresses are uppercase column letters followed by a row, e.g. B12".to_string())
            }
            LineError::MissingAddress => None,
        };
        Self { hint, ..Self::line(number, err.exit_code(), err) }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(&cli) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));

    // try_init also installs the log -> tracing bridge for the engine's records
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .try_init()
        .ok();
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let reader = open_script(cli.script.as_ref())?;
    let mut sheet = Sheet::new();
    let first_fault = apply_script(&mut sheet, reader, cli.keep_going)?;

    // A fault without --keep-going stops before anything is printed
    let first_fault = match first_fault {
        Some(err) if !cli.keep_going => return Err(err),
        other => other,
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    print_sheet(&sheet, cli.output, &mut out)
        .and_then(|()| out.flush())
        .map_err(|e| CliError::io(format!("failed to write output: {}", e)))?;

    match first_fault {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn open_script(path: Option<&PathBuf>) -> Result<Box<dyn BufRead>, CliError> {
    match path {
        None => Ok(Box::new(BufReader::new(io::stdin()))),
        Some(p) if p.as_os_str() == "-" => Ok(Box::new(BufReader::new(io::stdin()))),
        Some(p) => {
            let file = File::open(p).map_err(|e| {
                CliError::io(format!("cannot open {}: {}", p.display(), e))
                    .with_hint("pass '-' or omit the path to read the script from stdin")
            })?;
            Ok(Box::new(BufReader::new(file)))
        }
    }
}

/// Apply every line of `reader` to `sheet`.
///
/// Returns the first rejected line as an error value. Without `keep_going`
/// application stops there. I/O failures are returned as `Err` right away.
fn apply_script<R: BufRead>(
    sheet: &mut Sheet,
    reader: R,
    keep_going: bool,
) -> Result<Option<CliError>, CliError> {
    let mut first_fault: Option<CliError> = None;

    for (idx, line) in reader.lines().enumerate() {
        let number = idx + 1;
        let line = line.map_err(|e| CliError::io(format!("failed to read script: {}", e)))?;

        let outcome = match parse_line(&line) {
            Ok(None) => continue,
            Ok(Some(Step::Set(pos, text))) => {
                sheet.set_cell(pos, &text).map_err(|e| CliError::sheet(number, &e))
            }
            Ok(Some(Step::Clear(pos))) => {
                sheet.clear_cell(pos).map_err(|e| CliError::sheet(number, &e))
            }
            Err(e) => Err(CliError::script_line(number, &e)),
        };

        if let Err(err) = outcome {
            log::info!("{}", err.message);
            if !keep_going {
                return Ok(Some(err));
            }
            if first_fault.is_none() {
                first_fault = Some(err);
            } else {
                eprintln!("error: {}", err.message);
            }
        }
    }

    Ok(first_fault)
}

#[derive(Serialize)]
struct SheetDump {
    size: Size,
    values: Vec<Vec<CellValue>>,
    texts: Vec<Vec<String>>,
}

impl SheetDump {
    fn new(sheet: &Sheet) -> Self {
        let size = sheet.printable_size();
        let texts = (0..size.rows)
            .map(|row| {
                (0..size.cols)
                    .map(|col| sheet.text(Position::new(row, col)).unwrap_or_default())
                    .collect()
            })
            .collect();
        Self { size, values: sheet.values_grid(), texts }
    }
}

fn print_sheet<W: Write>(sheet: &Sheet, format: OutputFormat, out: &mut W) -> io::Result<()> {
    match format {
        OutputFormat::Values => sheet.print_values(out),
        OutputFormat::Texts => sheet.print_texts(out),
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &SheetDump::new(sheet))?;
            writeln!(out)
        }
    }
}
