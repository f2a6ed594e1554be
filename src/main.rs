//! Purpose: `slotstore` CLI entry point for inspecting and editing slot files.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Command results are JSON on stdout (pretty on a terminal).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: All reads and writes go through `api::Store`, so fan-out and
//! error policy match embedded use.
use std::error::Error as StdError;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

use slotstore::api::{Error, ErrorKind, Store, to_exit_code};

mod command_dispatch;
mod store_paths;

use store_paths::{default_store_dir, resolve_store_path};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `slotstore --help`."));
            }
        },
    };

    let store_dir = cli.dir.unwrap_or_else(default_store_dir);
    let store_path = resolve_store_path(&cli.store, &store_dir);
    command_dispatch::dispatch_command(cli.command, store_path)
}

#[derive(Parser)]
#[command(
    name = "slotstore",
    version,
    about = "Inspect and edit persistent key/value slots",
    long_about = None,
    after_help = r#"EXAMPLES
  $ slotstore set theme '"dark"'
  $ slotstore get theme
  $ slotstore set auth '{"isAuthenticated":false,"user":null}'
  $ slotstore list
  $ slotstore delete theme auth

NOTES
  - Default location: ~/.slotstore/slots.db (override with --dir / --store)
  - Values are JSON; quote strings for the shell"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        help = "Directory for named stores (default: ~/.slotstore)",
        value_hint = ValueHint::DirPath
    )]
    dir: Option<PathBuf>,
    #[arg(
        long,
        default_value = "slots",
        help = "Store name (resolved under --dir) or path to a database file"
    )]
    store: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Print the value stored under a key")]
    Get {
        key: String,
        #[arg(long, help = "Print the stored text without decoding it")]
        raw: bool,
    },
    #[command(about = "Store a JSON value under a key")]
    Set {
        key: String,
        #[arg(help = "JSON value, e.g. '\"dark\"' or '{\"n\":1}'")]
        value: String,
    },
    #[command(about = "Remove one or more keys")]
    Delete {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    #[command(about = "List stored keys")]
    List,
    #[command(about = "Generate shell completion scripts")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
    #[command(about = "Print version info as JSON")]
    Version,
}

fn open_store(path: &Path) -> Result<Store, Error> {
    Store::open(path).map_err(|err| {
        err.with_hint("Check that --dir is writable and --store names a SQLite file.")
    })
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Corrupt => "corrupt data".to_string(),
        ErrorKind::Encode => "value cannot be encoded".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(key) = err.key() {
        inner.insert("key".to_string(), json!(key));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(key) = err.key() {
        lines.push(format!("key: {key}"));
    }
    if let Some(path) = err.path() {
        lines.push(format!("path: {}", path.display()));
    }
    for cause in error_causes(err) {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn error_json_carries_context() {
        let err = Error::new(ErrorKind::NotFound)
            .with_message("no value stored")
            .with_key("theme")
            .with_hint("Use `slotstore list`.");
        let value = error_json(&err);
        let inner = value.get("error").expect("error object");
        assert_eq!(inner["kind"], "NotFound");
        assert_eq!(inner["message"], "no value stored");
        assert_eq!(inner["key"], "theme");
        assert_eq!(inner["hint"], "Use `slotstore list`.");
        assert!(inner.get("causes").is_none());
    }

    #[test]
    fn error_text_lists_causes() {
        let err = Error::new(ErrorKind::Io)
            .with_source(io::Error::other("disk full"));
        let text = error_text(&err);
        assert!(text.starts_with("error: i/o error"));
        assert!(text.contains("caused by: disk full"));
    }

    #[test]
    fn clap_summary_strips_prefix() {
        let err = Cli::try_parse_from(["slotstore", "frobnicate"])
            .err()
            .expect("parse error");
        let summary = clap_error_summary(&err);
        assert!(!summary.starts_with("error:"));
        assert!(summary.contains("frobnicate"));
    }
}
