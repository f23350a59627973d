pub mod disk;
pub mod memory;

use crate::core::cache::KeyValueCollection;
use disk::DiskCollection;
use fjall::{Keyspace, PartitionCreateOptions};
use memory::MemoryCollection;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Hands out cache collections, persistent when a keyspace could be opened.
pub struct KeyValueStore {
    keyspace: Option<Keyspace>,
}

impl KeyValueStore {
    /// Opens a keyspace under `path/cache`; falls back to memory-only on failure.
    pub fn open(path: &Path) -> Self {
        let cache_dir = path.join("cache");
        let keyspace = match fjall::Config::new(&cache_dir).open() {
            Ok(keyspace) => Some(keyspace),
            Err(e) => {
                warn!(
                    "Could not open cache at {}: {}. Using memory cache",
                    cache_dir.display(),
                    e
                );
                None
            }
        };
        Self { keyspace }
    }

    pub fn in_memory() -> Self {
        Self { keyspace: None }
    }

    pub fn collection(&self, name: &str) -> Arc<dyn KeyValueCollection> {
        let partition = self.keyspace.as_ref().and_then(|ks| {
            ks.open_partition(name, PartitionCreateOptions::default())
                .map_err(|e| warn!("Could not open cache partition {}: {}", name, e))
                .ok()
        });

        match partition {
            Some(partition) => {
                debug!("Using persistent cache collection {}", name);
                Arc::new(DiskCollection::new(partition))
            }
            None => Arc::new(MemoryCollection::new()),
        }
    }
}
