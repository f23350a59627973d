use crate::core::document::{DocumentError, DocumentStore, VersionedDocument};
use async_trait::async_trait;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

/// Documents as plain files in one directory, for single-machine use.
/// The version token is a fingerprint of the file content.
pub struct LocalDocumentStore {
    dir: PathBuf,
}

impl LocalDocumentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn fingerprint(content: &str) -> String {
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    async fn read(&self, path: &str) -> Result<Option<String>, DocumentError> {
        match tokio::fs::read_to_string(self.dir.join(path)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn fetch(&self, path: &str) -> Result<Option<VersionedDocument>, DocumentError> {
        debug!("Reading {}", self.dir.join(path).display());
        Ok(self.read(path).await?.map(|content| VersionedDocument {
            version: Self::fingerprint(&content),
            content,
        }))
    }

    async fn put(
        &self,
        path: &str,
        content: &str,
        version: Option<&str>,
    ) -> Result<String, DocumentError> {
        let current = self.read(path).await?.map(|c| Self::fingerprint(&c));
        if current.as_deref() != version {
            return Err(DocumentError::Conflict {
                path: path.to_string(),
            });
        }

        let target = self.dir.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = target.with_extension("json.tmp");
        tokio::fs::write(&staging, content).await?;
        tokio::fs::rename(&staging, &target).await?;
        debug!("Wrote {}", target.display());

        Ok(Self::fingerprint(content))
    }
}
