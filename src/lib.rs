// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) uses these modules to implement the interactive client.
//
// Module responsibilities:
// - `api`: Encapsulates HTTP interactions with the comic service (the
//   connectivity probe, metadata and image fetches) and owns the
//   transport cache directory.
// - `archive`: Owns the on-disk comic archive and the caption index,
//   including filename derivation and the cached directory listing.
// - `ui`: Implements the command grammar and the interactive flows, and
//   delegates network and disk work to `api` and `archive`.

use std::fs;
use std::path::{Path, PathBuf};

pub mod api;
pub mod archive;
pub mod ui;

/// Root directory for everything this program stores on disk. The
/// `COMIC_HOME` environment variable overrides it; otherwise it lives
/// under the user's home directory.
pub fn data_root() -> PathBuf {
    if let Ok(root) = std::env::var("COMIC_HOME") {
        return PathBuf::from(root);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".comicstash")
}

/// Remove every file directly inside `dir`, leaving the directory itself
/// in place. A missing directory counts as already empty.
pub(crate) fn clear_dir(dir: &Path) -> anyhow::Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}
