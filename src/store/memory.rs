use dashmap::DashMap;

use super::{Result, SampleStore, StoredSample};

/// In-process store, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    samples: DashMap<String, StoredSample>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SampleStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<StoredSample>> {
        Ok(self.samples.get(key).map(|entry| entry.value().clone()))
    }

    fn set(&self, key: &str, sample: StoredSample) -> Result<()> {
        self.samples.insert(key.to_owned(), sample);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.samples.remove(key);
        Ok(())
    }

    fn save(&self) -> Result<()> {
        Ok(())
    }
}
