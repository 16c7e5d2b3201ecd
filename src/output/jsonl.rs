//! JSON-lines dataset sink

use crate::output::record::ItemRecord;
use crate::output::traits::{OutputError, OutputResult, OutputSink};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Appends one JSON object per line to a dataset file
///
/// The file is opened in append mode, so a resumed crawl keeps the records of
/// earlier runs.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    /// Opens (or creates) the dataset file
    pub fn open(path: &Path) -> OutputResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for JsonLinesSink {
    fn push(&self, record: &ItemRecord) -> OutputResult<()> {
        let line = serde_json::to_string(&record.to_json())?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|e| OutputError::Write(format!("Failed to lock dataset: {}", e)))?;

        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        // Flushed per record so a crash never loses an acknowledged item
        writer.flush()?;

        Ok(())
    }

    fn finish(&self) -> OutputResult<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| OutputError::Write(format!("Failed to lock dataset: {}", e)))?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::record::ItemFields;
    use crate::state::RequestRecord;
    use tempfile::TempDir;

    fn record(id: &str) -> ItemRecord {
        let url = format!("https://shop.example.com/s/item/{}", id);
        let fields = ItemFields {
            url: url.clone(),
            item_id: id.to_string(),
            ..ItemFields::default()
        };
        ItemRecord::new(fields, &RequestRecord::item(url))
    }

    #[test]
    fn test_appends_one_line_per_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("items.jsonl");

        let sink = JsonLinesSink::open(&path).unwrap();
        sink.push(&record("1")).unwrap();
        sink.push(&record("2")).unwrap();
        sink.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["itemId"], "1");
    }

    #[test]
    fn test_reopen_keeps_existing_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("items.jsonl");

        JsonLinesSink::open(&path).unwrap().push(&record("1")).unwrap();
        JsonLinesSink::open(&path).unwrap().push(&record("2")).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
