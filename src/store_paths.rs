//! Purpose: Resolve the CLI `--store` argument to a database file.
//! Exports: `default_store_dir`, `resolve_store_path`.
//! Role: Keep named-store and path semantics in one place for the CLI.
//! Invariants: Default store directory remains `~/.slotstore`.
//! Invariants: Refs containing a path separator are paths.
//! Invariants: Refs ending in `.db` name a file in the store dir.

use std::path::{Path, PathBuf};

pub(crate) const STORE_EXTENSION: &str = "db";

pub(crate) fn default_store_dir() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_default();
    PathBuf::from(home).join(".slotstore")
}

pub(crate) fn resolve_store_path(store: &str, store_dir: &Path) -> PathBuf {
    if store.contains('/') || store.contains(std::path::MAIN_SEPARATOR) {
        return PathBuf::from(store);
    }
    if Path::new(store)
        .extension()
        .is_some_and(|ext| ext == STORE_EXTENSION)
    {
        return store_dir.join(store);
    }
    store_dir.join(format!("{store}.{STORE_EXTENSION}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_names_live_in_the_store_dir() {
        let dir = Path::new("/tmp/slots");
        assert_eq!(
            resolve_store_path("prefs", dir),
            PathBuf::from("/tmp/slots/prefs.db")
        );
        assert_eq!(
            resolve_store_path("prefs.db", dir),
            PathBuf::from("/tmp/slots/prefs.db")
        );
    }

    #[test]
    fn refs_with_separators_are_paths() {
        let dir = Path::new("/tmp/slots");
        assert_eq!(
            resolve_store_path("./local/app.sqlite", dir),
            PathBuf::from("./local/app.sqlite")
        );
    }

    #[test]
    fn default_dir_ends_with_slotstore() {
        assert!(default_store_dir().ends_with(".slotstore"));
    }
}
