//! Persisted log of decoded submissions.
//!
//! The log is a single pretty-printed JSON array. Each element maps one
//! timestamp to the record received at that moment:
//!
//! ```json
//! [
//!     {
//!         "2024-05-01 12:00:00": {
//!             "name": "Alice",
//!             "msg": "Hi"
//!         }
//!     }
//! ]
//! ```
//!
//! Appending re-reads the whole file, pushes the new entry and writes the
//! array back through a temporary file, so readers never see a partial
//! array. There is no locking; one collector owns the file.

use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::record::DecodedRecord;

/// Timestamp layout used as the key of every log entry.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One timestamped record in the persisted log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Local time the record was accepted, second resolution.
    pub timestamp: String,
    /// The decoded form fields.
    pub record: DecodedRecord,
}

impl LogEntry {
    /// Create an entry stamped with the current local time.
    #[must_use]
    pub fn now(record: DecodedRecord) -> Self {
        Self {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            record,
        }
    }
}

impl Serialize for LogEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.timestamp, &self.record)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for LogEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntryVisitor;

        impl<'de> Visitor<'de> for EntryVisitor {
            type Value = LogEntry;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object with exactly one timestamp key")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<LogEntry, A::Error> {
                let Some((timestamp, record)) = map.next_entry::<String, DecodedRecord>()? else {
                    return Err(de::Error::invalid_length(0, &self));
                };
                if map.next_key::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(2, &self));
                }
                Ok(LogEntry { timestamp, record })
            }
        }

        deserializer.deserialize_map(EntryVisitor)
    }
}

/// File-backed, append-only log of [`LogEntry`] values.
#[derive(Debug, Clone)]
pub struct LogStore {
    /// Directory holding the log file.
    dir: PathBuf,
    /// Full path of the log file.
    path: PathBuf,
}

impl LogStore {
    /// Create a store for `file_name` inside `dir`.
    ///
    /// Nothing is touched on disk until the first load or append.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, file_name: &str) -> Self {
        let dir = dir.into();
        let path = dir.join(file_name);
        Self { dir, path }
    }

    /// Get the path to the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            debug!("Creating storage directory {}", self.dir.display());
            std::fs::create_dir_all(&self.dir).map_err(|source| Error::DirectoryCreate {
                path: self.dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Read every entry in the log.
    ///
    /// A missing file is an empty log.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptLog`] if the file does not hold a JSON array
    /// of entries, or [`Error::LogRead`] if it cannot be read.
    pub fn load(&self) -> Result<Vec<LogEntry>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("No persisted log at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(Error::LogRead {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_slice(&bytes).map_err(|source| Error::CorruptLog {
            path: self.path.clone(),
            source,
        })
    }

    /// Append one entry, returning the number of entries now in the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the existing log
    /// cannot be loaded, or the updated log cannot be written.
    pub fn append(&self, entry: LogEntry) -> Result<usize> {
        self.ensure_dir()?;

        let mut entries = self.load()?;
        entries.push(entry);
        self.persist(&entries)?;

        debug!(
            "Persisted log at {} now holds {} entries",
            self.path.display(),
            entries.len()
        );
        Ok(entries.len())
    }

    fn persist(&self, entries: &[LogEntry]) -> Result<()> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        entries.serialize(&mut serializer)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let write_err = |source| Error::LogWrite {
            path: self.path.clone(),
            source,
        };
        std::fs::write(&tmp, &buf).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }

    /// Summarize the log contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be loaded.
    pub fn stats(&self) -> Result<LogStats> {
        let entries = self.load()?;
        let file_size_bytes = std::fs::metadata(&self.path).map_or(0, |m| m.len());

        let mut field_counts = BTreeMap::new();
        for entry in &entries {
            for key in entry.record.keys() {
                *field_counts.entry(key.clone()).or_insert(0) += 1;
            }
        }

        let stats = LogStats {
            total_entries: entries.len(),
            first_timestamp: entries.first().map(|e| e.timestamp.clone()),
            last_timestamp: entries.last().map(|e| e.timestamp.clone()),
            field_counts,
            file_size_bytes,
        };
        info!(
            "Persisted log {} has {} entries",
            self.path.display(),
            stats.total_entries
        );
        Ok(stats)
    }
}

/// Statistics about the persisted log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogStats {
    /// Number of entries in the log.
    pub total_entries: usize,
    /// Timestamp of the first entry.
    pub first_timestamp: Option<String>,
    /// Timestamp of the last entry.
    pub last_timestamp: Option<String>,
    /// How many entries carry each field name.
    pub field_counts: BTreeMap<String, usize>,
    /// Size of the log file in bytes.
    pub file_size_bytes: u64,
}
