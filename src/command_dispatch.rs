//! Purpose: Hold top-level CLI command dispatch for `slotstore`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Only commands that touch data open the store.
//! Invariants: Writes use the fallible store operations so failures reach the exit code.

use super::*;

pub(super) fn dispatch_command(command: Command, store_path: PathBuf) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "slotstore", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_json(json!({
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Get { key, raw } => {
            let store = open_store(&store_path)?;
            if raw {
                let text = store.try_get_raw(&key)?.ok_or_else(|| missing_key(&key))?;
                emit_json(json!({ "key": key, "raw": text }));
                return Ok(RunOutcome::ok());
            }
            let value = store
                .try_get::<Value>(&key)
                .map_err(|err| match err.kind() {
                    ErrorKind::Corrupt => {
                        err.with_hint("Inspect the stored text with `slotstore get --raw`.")
                    }
                    _ => err,
                })?
                .ok_or_else(|| missing_key(&key))?;
            emit_json(json!({ "key": key, "value": value }));
            Ok(RunOutcome::ok())
        }
        Command::Set { key, value } => {
            let value: Value = serde_json::from_str(&value).map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message("value is not valid JSON")
                    .with_key(&key)
                    .with_hint("Quote strings for the shell, e.g. '\"dark\"'.")
                    .with_source(err)
            })?;
            let store = open_store(&store_path)?;
            store.try_set(&key, &value)?;
            emit_json(json!({ "key": key, "value": value }));
            Ok(RunOutcome::ok())
        }
        Command::Delete { keys } => {
            let store = open_store(&store_path)?;
            let mut deleted = Vec::new();
            let mut missing = Vec::new();
            for key in keys {
                if store.try_delete(&key)? {
                    deleted.push(key);
                } else {
                    missing.push(key);
                }
            }
            emit_json(json!({ "deleted": deleted, "missing": missing }));
            Ok(RunOutcome::ok())
        }
        Command::List => {
            let store = open_store(&store_path)?;
            let keys = store.try_keys()?;
            emit_json(json!({ "keys": keys }));
            Ok(RunOutcome::ok())
        }
    }
}

fn missing_key(key: &str) -> Error {
    Error::new(ErrorKind::NotFound)
        .with_message("no value stored")
        .with_key(key)
        .with_hint("Use `slotstore list` to see stored keys.")
}
