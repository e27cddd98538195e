//! Object Store wrapper — content-addressed blob I/O for originals and
//! protected artifacts. Spec §2 (C-external) and §6 ("Object Store layout").
//!
//! Adapted from the teacher's `services/objectstore.rs`: same thin wrapper
//! over the `object_store` crate, same backend-selected-at-construction
//! shape, extended with an in-process `memory` backend so both binaries can
//! run against a real object store in production and an `InMemory` one in
//! tests — the "dynamic configuration dispatch" pattern spec.md §9 asks for
//! (a tagged variant chosen once at the constructor).

use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use object_store::{ObjectMeta, ObjectStore, path::Path};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object store error: {0}")]
    Store(#[from] object_store::Error),
    #[error("invalid path: {0}")]
    Path(#[from] object_store::path::Error),
    #[error("unsupported backend: {0}")]
    UnsupportedBackend(String),
}

/// Backend selection, read from config once at startup.
#[derive(Debug, Clone)]
pub enum ObjectStoreBackend {
    /// In-process, non-durable — local dev and tests.
    Memory,
    /// Local filesystem, rooted at `path`.
    Local { path: String },
    /// S3-compatible (also covers R2/MinIO via a custom endpoint).
    S3 {
        bucket: String,
        region: String,
        key: String,
        secret: String,
        endpoint: Option<String>,
    },
}

#[derive(Clone)]
pub struct ObjectStoreService {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreService {
    pub fn new(backend: ObjectStoreBackend) -> Result<Self, StorageError> {
        let store: Arc<dyn ObjectStore> = match backend {
            ObjectStoreBackend::Memory => {
                use object_store::memory::InMemory;
                Arc::new(InMemory::new())
            }
            ObjectStoreBackend::Local { path } => {
                use object_store::local::LocalFileSystem;
                Arc::new(LocalFileSystem::new_with_prefix(&path)?)
            }
            ObjectStoreBackend::S3 {
                bucket,
                region,
                key,
                secret,
                endpoint,
            } => {
                use object_store::aws::AmazonS3Builder;
                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(&bucket)
                    .with_region(&region)
                    .with_access_key_id(&key)
                    .with_secret_access_key(&secret);
                if let Some(endpoint) = endpoint.filter(|e| !e.is_empty()) {
                    builder = builder.with_endpoint(&endpoint);
                }
                Arc::new(builder.build()?)
            }
        };
        Ok(Self { store })
    }

    pub fn from_store(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn put(&self, path: &str, data: Bytes) -> Result<(), StorageError> {
        let location = Path::parse(path)?;
        self.store.put(&location, data.into()).await?;
        Ok(())
    }

    pub async fn get(&self, path: &str) -> Result<Bytes, StorageError> {
        let location = Path::parse(path)?;
        let result = self.store.get(&location).await?;
        Ok(result.bytes().await?)
    }

    pub async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let location = Path::parse(path)?;
        self.store.delete(&location).await?;
        Ok(())
    }

    pub async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let location = Path::parse(path)?;
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        let prefix_path = if prefix.is_empty() {
            None
        } else {
            Some(Path::parse(prefix)?)
        };
        let mut stream = self.store.list(prefix_path.as_ref());
        let mut results = Vec::new();
        while let Some(meta) = stream.next().await {
            results.push(meta?);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_service() -> ObjectStoreService {
        ObjectStoreService::new(ObjectStoreBackend::Memory).unwrap()
    }

    #[tokio::test]
    async fn put_get_delete_roundtrip() {
        let svc = memory_service();
        let data = Bytes::from("hello object store");

        svc.put("raw/u1/a.png", data.clone()).await.unwrap();
        let got = svc.get("raw/u1/a.png").await.unwrap();
        assert_eq!(got, data);
        assert!(svc.exists("raw/u1/a.png").await.unwrap());

        svc.delete("raw/u1/a.png").await.unwrap();
        assert!(svc.get("raw/u1/a.png").await.is_err());
        assert!(!svc.exists("raw/u1/a.png").await.unwrap());
    }

    #[tokio::test]
    async fn list_with_prefix() {
        let svc = memory_service();
        svc.put("protected/a.png", Bytes::from("a")).await.unwrap();
        svc.put("protected/b.png", Bytes::from("b")).await.unwrap();
        svc.put("raw/c.png", Bytes::from("c")).await.unwrap();

        let results = svc.list("protected").await.unwrap();
        assert_eq!(results.len(), 2);
    }
}
