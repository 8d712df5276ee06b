//! Offline record source reading JSON Lines files.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{RepodexError, Result};
use crate::source::github::normalize_organization;
use crate::source::{Record, RecordSource};

/// Reads `<directory>/<organization>.jsonl`, one [`Record`] per line.
/// Blank lines are ignored.
#[derive(Debug, Clone)]
pub struct JsonlSource {
    directory: PathBuf,
}

impl JsonlSource {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        JsonlSource {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, organization: &str) -> PathBuf {
        self.directory.join(format!("{organization}.jsonl"))
    }
}

impl RecordSource for JsonlSource {
    fn fetch_records(&self, organization: &str) -> Result<Vec<Record>> {
        let organization = normalize_organization(organization)?;
        let path = self.path_for(&organization);
        let file = File::open(&path).map_err(|e| {
            RepodexError::source(format!("cannot open {}: {e}", path.display()))
        })?;

        let mut records = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(&line).map_err(|e| {
                RepodexError::source(format!(
                    "{} line {}: {e}",
                    path.display(),
                    line_num + 1
                ))
            })?;
            records.push(record);
        }

        info!(
            "read {} records of '{organization}' from {}",
            records.len(),
            path.display()
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_reads_records() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("acme.jsonl"),
            concat!(
                r#"{"id": 1, "url": "https://github.com/acme/a", "name": "a"}"#,
                "\n\n",
                r#"{"id": 2, "url": "https://github.com/acme/b", "name": "b", "owner_name": "o"}"#,
                "\n"
            ),
        )
        .unwrap();

        let source = JsonlSource::new(dir.path());
        let records = source.fetch_records("Acme").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].owner_name.as_deref(), Some("o"));
    }

    #[test]
    fn test_missing_file_and_bad_line() {
        let dir = TempDir::new().unwrap();
        let source = JsonlSource::new(dir.path());
        assert!(matches!(
            source.fetch_records("nobody"),
            Err(RepodexError::Source(_))
        ));

        fs::write(dir.path().join("bad.jsonl"), "{not json}\n").unwrap();
        let err = source.fetch_records("bad").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
