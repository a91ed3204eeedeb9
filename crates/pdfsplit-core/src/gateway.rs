//! The storage boundary: opaque byte blobs keyed by name.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use object_store::path::Path as StorePath;
use object_store::{ObjectStore, PutPayload};
use tracing::debug;

use crate::error::GatewayError;

/// Narrow contract over the storage backend. Keys are the source
/// identifiers and output target keys from the split specification; the
/// bucket itself is fixed at construction time.
#[async_trait]
pub trait ObjectGateway: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, GatewayError>;
    async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<(), GatewayError>;
}

#[async_trait]
impl<T: ObjectGateway + ?Sized> ObjectGateway for Arc<T> {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, GatewayError> {
        (**self).fetch(key).await
    }

    async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<(), GatewayError> {
        (**self).store(key, bytes).await
    }
}

/// Gateway over any `object_store` backend (S3, R2, MinIO, local
/// filesystem), with a per-request deadline.
pub struct ObjectStoreGateway {
    store: Arc<dyn ObjectStore>,
    timeout: Duration,
}

impl ObjectStoreGateway {
    pub fn new(store: Arc<dyn ObjectStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }
}

/// Run one backend request against a deadline. An expired deadline becomes
/// [`GatewayError::Timeout`] instead of hanging the job.
async fn with_deadline<T, F>(deadline: Duration, key: &str, op: F) -> Result<T, GatewayError>
where
    F: std::future::Future<Output = Result<T, object_store::Error>>,
{
    match tokio::time::timeout(deadline, op).await {
        Ok(result) => result.map_err(|e| map_store_error(key, e)),
        Err(_) => Err(GatewayError::Timeout {
            key: key.to_string(),
            seconds: deadline.as_secs(),
        }),
    }
}

fn map_store_error(key: &str, err: object_store::Error) -> GatewayError {
    match err {
        object_store::Error::NotFound { .. } => GatewayError::NotFound {
            key: key.to_string(),
        },
        other => GatewayError::Transfer {
            key: key.to_string(),
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl ObjectGateway for ObjectStoreGateway {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, GatewayError> {
        let path = StorePath::from(key);
        let bytes = with_deadline(self.timeout, key, async {
            self.store.get(&path).await?.bytes().await
        })
        .await?;
        debug!(key, bytes = bytes.len(), "fetched object");
        Ok(bytes.to_vec())
    }

    async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<(), GatewayError> {
        let path = StorePath::from(key);
        let len = bytes.len();
        with_deadline(
            self.timeout,
            key,
            self.store.put(&path, PutPayload::from(bytes)),
        )
        .await?;
        debug!(key, bytes = len, "stored object");
        Ok(())
    }
}

/// In-memory gateway for tests and local experiments.
///
/// Counts fetches so callers can assert that the document cache touches
/// the backend at most once per key.
#[derive(Default)]
pub struct MemoryGateway {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fetches: AtomicUsize,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.into(), bytes);
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    /// Number of `fetch` calls seen, hits and misses alike.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectGateway for MemoryGateway {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, GatewayError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound {
                key: key.to_string(),
            })
    }

    async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<(), GatewayError> {
        self.insert(key, bytes);
        Ok(())
    }
}
