use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use dashmap::DashMap;

use super::{Error, Result, SampleStore, StoredSample};
use crate::fsutil;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Entry {
    updated_at: SystemTime,
    sample: StoredSample,
}

/// Store persisted as a JSON document.
///
/// Samples are kept in memory and only written on [`SampleStore::save`],
/// which replaces the file atomically. Entries not updated within the TTL
/// are dropped on save, so containers that disappeared don't accumulate.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    ttl: Option<Duration>,
    entries: DashMap<String, Entry>,
}

impl FileStore {
    /// Opens the store at `path`. A `ttl` of `None` keeps entries forever.
    ///
    /// A missing file is an empty store. So is an undecodable one; its
    /// content is discarded with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Read`] if the file exists but can't be read.
    pub fn open(path: impl Into<PathBuf>, ttl: Option<Duration>) -> Result<Self> {
        let path = path.into();
        let entries = match fsutil::open_file_reader(&path) {
            Ok(reader) => match serde_json::from_reader::<_, BTreeMap<String, Entry>>(reader) {
                Ok(entries) => entries.into_iter().collect(),
                Err(err) => {
                    log::warn!(
                        "Discarding unreadable sample store `{}`: {err}",
                        path.display()
                    );
                    DashMap::new()
                }
            },
            Err(err) if err.is_not_found() => {
                log::debug!("Sample store `{}` does not exist yet", path.display());
                DashMap::new()
            }
            Err(err) => {
                return Err(Error::Read {
                    path: err.path,
                    source: err.source,
                });
            }
        };

        log::debug!(
            "Opened sample store `{}` with {} entries",
            path.display(),
            entries.len()
        );
        Ok(Self { path, ttl, entries })
    }

    fn evict_expired(&self, now: SystemTime) {
        let Some(ttl) = self.ttl else {
            return;
        };
        self.entries.retain(|key, entry| {
            let keep = now
                .duration_since(entry.updated_at)
                .map_or(true, |age| age <= ttl);
            if !keep {
                log::debug!("Evicting stale sample of `{key}`");
            }
            keep
        });
    }

    fn write_snapshot(&self, snapshot: &BTreeMap<String, Entry>) -> Result<()> {
        let write_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: io::Error| Error::Write { path, source }
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err(parent))?;
        }

        let tmp_path = self.path.with_extension("tmp");
        let file = File::create(&tmp_path).map_err(write_err(&tmp_path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, snapshot)?;
        writer.flush().map_err(write_err(&tmp_path))?;
        drop(writer);

        std::fs::rename(&tmp_path, &self.path).map_err(write_err(&self.path))
    }
}

impl SampleStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<StoredSample>> {
        Ok(self.entries.get(key).map(|entry| entry.sample.clone()))
    }

    fn set(&self, key: &str, sample: StoredSample) -> Result<()> {
        let entry = Entry {
            updated_at: SystemTime::now(),
            sample,
        };
        self.entries.insert(key.to_owned(), entry);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn save(&self) -> Result<()> {
        self.evict_expired(SystemTime::now());
        let snapshot: BTreeMap<String, Entry> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        self.write_snapshot(&snapshot)?;
        log::debug!(
            "Saved {} samples to `{}`",
            snapshot.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::RawCpu;

    fn sample(total_usage: u64) -> StoredSample {
        StoredSample {
            timestamp: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            cpu: RawCpu {
                total_usage,
                percpu_usage: vec![total_usage / 2, total_usage / 2],
                limit_cores: 1.5,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("samples.json"), None).unwrap();
        assert_eq!(store.get("abc").unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::open(&path, None).unwrap();
        assert_eq!(store.get("abc").unwrap(), None);
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/samples.json");

        let store = FileStore::open(&path, None).unwrap();
        store.set("abc", sample(10)).unwrap();
        store.set("def", sample(20)).unwrap();
        store.delete("def").unwrap();
        store.save().unwrap();
        assert!(!path.with_extension("tmp").exists());

        let reopened = FileStore::open(&path, None).unwrap();
        assert_eq!(reopened.get("abc").unwrap(), Some(sample(10)));
        assert_eq!(reopened.get("def").unwrap(), None);
    }

    #[test]
    fn test_save_evicts_stale_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.json");
        let store = FileStore::open(&path, Some(Duration::from_secs(60))).unwrap();
        store.set("fresh", sample(1)).unwrap();
        store.entries.insert(
            "stale".to_owned(),
            Entry {
                updated_at: SystemTime::now() - Duration::from_secs(120),
                sample: sample(2),
            },
        );

        store.save().unwrap();
        assert_eq!(store.get("stale").unwrap(), None);
        assert!(store.get("fresh").unwrap().is_some());

        let reopened = FileStore::open(&path, None).unwrap();
        assert_eq!(reopened.get("stale").unwrap(), None);
    }
}
