//! Persistence layer.
//!
//! Saves and loads the search session's cookie jar to/from a JSON file.
//! Loading never fails: a missing or unreadable jar starts an empty
//! session. Saving reports errors so the caller can log and move on.

use anyhow::{anyhow, Context, Result};
use cookie_store::CookieStore;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Cookie jar file name, placed in the home directory by default.
const DEFAULT_JAR_FILE: &str = ".google-cookie";

/// Default cookie jar path: `$HOME/.google-cookie`, or the working directory.
pub fn default_cookie_jar_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(DEFAULT_JAR_FILE)
}

/// Load a cookie jar. Returns an empty jar if the file is missing or corrupt.
pub fn load_cookie_jar(path: &Path) -> CookieStore {
    if !path.exists() {
        info!(path = %path.display(), "No cookie jar found, starting fresh session");
        return CookieStore::default();
    }

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to open cookie jar");
            return CookieStore::default();
        }
    };

    match cookie_store::serde::json::load(BufReader::new(file)) {
        Ok(store) => {
            debug!(path = %path.display(), cookies = store.iter_any().count(), "Cookie jar loaded");
            store
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to parse cookie jar");
            CookieStore::default()
        }
    }
}

/// Save a cookie jar, replacing any previous file.
///
/// The jar is written to a sibling temp file and renamed into place, so a
/// crash mid-write never leaves a truncated jar behind.
pub fn save_cookie_jar(store: &CookieStore, path: &Path) -> Result<()> {
    let tmp = temp_sibling(path);
    if let Err(e) = write_jar(store, &tmp) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("Failed to replace cookie jar {}", path.display()));
    }

    debug!(path = %path.display(), "Cookie jar saved");
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_JAR_FILE.to_string());
    path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4()))
}

fn write_jar(store: &CookieStore, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create cookie jar {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    cookie_store::serde::json::save(store, &mut writer)
        .map_err(|e| anyhow!("Failed to serialise cookie jar: {e}"))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write cookie jar {}", path.display()))?;
    Ok(())
}

/// Delete the cookie jar (for testing or reset).
pub fn delete_cookie_jar(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to delete cookie jar {}", path.display()))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("asset_sentiment_jar_{}.json", uuid::Uuid::new_v4()));
        p
    }

    #[test]
    fn test_load_nonexistent_is_empty() {
        let store = load_cookie_jar(Path::new("/tmp/asset_sentiment_no_such_jar_12345.json"));
        assert_eq!(store.iter_any().count(), 0);
    }

    #[test]
    fn test_load_corrupt_is_empty() {
        let path = temp_path();
        std::fs::write(&path, "not json at all {{{").unwrap();

        let store = load_cookie_jar(&path);
        assert_eq!(store.iter_any().count(), 0);

        delete_cookie_jar(&path).unwrap();
    }

    #[test]
    fn test_save_creates_file() {
        let path = temp_path();
        save_cookie_jar(&CookieStore::default(), &path).unwrap();
        assert!(path.exists());

        delete_cookie_jar(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_save_replaces_corrupt_jar_without_leftovers() {
        let dir = std::env::temp_dir().join(format!("asset_sentiment_dir_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir(&dir).unwrap();
        let path = dir.join("jar.json");
        std::fs::write(&path, "truncated {{").unwrap();

        save_cookie_jar(&CookieStore::default(), &path).unwrap();

        let entries: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("jar.json")]);
        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(cookie_store::serde::json::load(saved.as_bytes()).is_ok());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_save_into_missing_dir_errors() {
        let path = Path::new("/nonexistent_dir_for_asset_sentiment/jar.json");
        assert!(save_cookie_jar(&CookieStore::default(), path).is_err());
    }

    #[test]
    fn test_default_path_file_name() {
        assert!(default_cookie_jar_path().ends_with(DEFAULT_JAR_FILE));
    }
}
