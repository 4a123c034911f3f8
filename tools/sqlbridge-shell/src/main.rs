///
/// sqlbridge shell - Main Entry Point
///
/// Opens one database handle and feeds it SQL, either from `--command` or
/// line by line from stdin:
/// - sqlbridge [db]: interactive session, statements end with `;`
/// - sqlbridge [db] -c "<sql>": run once and exit
/// - sqlbridge --config sqlbridge.toml: open what the config describes
///
/// Rows go to stdout as JSON lines; logs go to stderr.
///

mod repl;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use miette::{IntoDiagnostic, Result, WrapErr};
use sqlbridge::{BridgeConfig, Database, RowMode};
use tracing::Level;

use repl::Shell;

#[derive(Parser)]
#[command(name = "sqlbridge")]
#[command(author, version, about = "Interactive shell for the sqlbridge SQLite bridge", long_about = None)]
struct Cli {
    /// Database file (in-memory when omitted)
    database: Option<PathBuf>,

    /// Read handle settings from a TOML file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Deliver rows as arrays instead of maps
    #[arg(long)]
    array: bool,

    /// Translate cells through the declared column types
    #[arg(long)]
    translate: bool,

    /// Turn on the show_datatypes pragma at startup
    #[arg(long)]
    show_datatypes: bool,

    /// Run this SQL and exit
    #[arg(short, long)]
    command: Option<String>,

    /// Log more (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn bridge_config(&self) -> Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::from_path(path)
                .into_diagnostic()
                .wrap_err("could not load configuration")?,
            None => BridgeConfig::default(),
        };

        if let Some(path) = &self.database {
            config.database.path = path.display().to_string();
        }
        if self.array {
            config.rows.representation = RowMode::Array;
        }
        config.rows.type_translation |= self.translate;
        config.rows.show_datatypes |= self.show_datatypes;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_max_level(level)
        .init();

    let config = cli.bridge_config()?;
    let db = Database::open_with_config(&config)
        .into_diagnostic()
        .wrap_err_with(|| format!("could not open {}", config.database.path))?;

    let stdout = io::stdout();
    let mut shell = Shell::new(&db, stdout.lock());

    if let Some(sql) = &cli.command {
        shell.run(sql).into_diagnostic()?;
        return db.close().into_diagnostic();
    }

    let interactive = io::IsTerminal::is_terminal(&io::stdin());
    if interactive {
        eprintln!(
            "sqlbridge {} (SQLite {}). Enter \".quit\" to exit.",
            sqlbridge::LIB_VERSION,
            sqlbridge::engine_version()
        );
    }

    for line in io::stdin().lock().lines() {
        let line = line.into_diagnostic()?;
        match shell.feed(&line) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => eprintln!("Error: {}", e),
        }
        if interactive {
            prompt(shell.is_pending());
        }
    }

    if shell.is_pending() {
        eprintln!("Error: incomplete SQL statement at end of input");
    }
    drop(shell);
    db.close().into_diagnostic()
}

fn prompt(continuation: bool) {
    let mut stderr = io::stderr();
    let _ = write!(stderr, "{}", if continuation { "   ...> " } else { "sqlbridge> " });
    let _ = stderr.flush();
}
