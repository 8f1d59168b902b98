//! Key list input and result table output.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::OutputError;
use crate::session::ResultTable;

/// Read one key per line, trimming whitespace and skipping blank lines.
pub fn read_keys(path: &Path) -> Result<Vec<String>, OutputError> {
    let content = std::fs::read_to_string(path).map_err(|source| OutputError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let keys: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    debug!(path = %path.display(), count = keys.len(), "Read keys");
    Ok(keys)
}

/// Write `table` as TSV, replacing `path` only once the whole file is on disk.
pub fn write_table(path: &Path, table: &ResultTable) -> Result<(), OutputError> {
    let tmp = temp_path(path);
    let write_err = |source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Err(source) = std::fs::write(&tmp, table.to_tsv()) {
        let _ = std::fs::remove_file(&tmp);
        return Err(write_err(source));
    }
    if let Err(source) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(write_err(source));
    }
    debug!(path = %path.display(), records = table.len(), "Wrote results");
    Ok(())
}

/// `dir/name` -> `dir/.name.tmp`
fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_keys_trims_and_skips_blanks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("channels-in");
        std::fs::write(&path, "#rust\n\n  #tokio  \r\n\t\n#serde").unwrap();

        assert_eq!(read_keys(&path).unwrap(), vec!["#rust", "#tokio", "#serde"]);
    }

    #[test]
    fn test_read_keys_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_keys(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, OutputError::Read { .. }));
    }

    #[test]
    fn test_write_table_replaces_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("channels-out-acls");
        std::fs::write(&path, "stale\tcontent\n").unwrap();

        let mut table = ResultTable::new();
        table.insert("#rust", "alice, bob".to_string());
        table.insert("#gone", "N/A".to_string());
        write_table(&path, &table).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "#rust\talice, bob\n#gone\tN/A\n"
        );
        assert!(!dir.path().join(".channels-out-acls.tmp").exists());
    }

    #[test]
    fn test_empty_table_writes_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out");
        write_table(&path, &ResultTable::new()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("out");
        let err = write_table(&path, &ResultTable::new()).unwrap_err();
        assert!(matches!(err, OutputError::Write { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        assert_eq!(
            temp_path(Path::new("/data/channels-out-mlock")),
            PathBuf::from("/data/.channels-out-mlock.tmp")
        );
    }
}
