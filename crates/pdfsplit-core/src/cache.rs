//! Additive per-job cache of downloaded and decoded source documents.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::codec::{PageHandle, SourcePages};
use crate::error::SplitError;
use crate::gateway::ObjectGateway;

/// Caches each source's raw bytes and, lazily, its decoded page sequence,
/// so a source is fetched and decoded at most once per job.
///
/// Failures are never cached: a source that failed to download is retried
/// from scratch on its next reference, and a decode failure leaves the
/// already-downloaded bytes in place. The cache is strictly additive; it
/// lives exactly as long as the one job that owns it.
pub struct DocumentCache<G> {
    gateway: G,
    bytes: HashMap<String, Vec<u8>>,
    pages: HashMap<String, Arc<SourcePages>>,
}

impl<G: ObjectGateway> DocumentCache<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            bytes: HashMap::new(),
            pages: HashMap::new(),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn is_downloaded(&self, source_id: &str) -> bool {
        self.bytes.contains_key(source_id)
    }

    pub fn is_decoded(&self, source_id: &str) -> bool {
        self.pages.contains_key(source_id)
    }

    /// Make sure the raw bytes for `source_id` are cached; a no-op once
    /// they are.
    pub async fn ensure_downloaded(&mut self, source_id: &str) -> Result<(), SplitError> {
        if self.bytes.contains_key(source_id) {
            return Ok(());
        }
        let bytes = self
            .gateway
            .fetch(source_id)
            .await
            .map_err(|cause| SplitError::Fetch {
                source_id: source_id.to_string(),
                cause,
            })?;
        info!(source = source_id, bytes = bytes.len(), "downloaded source");
        self.bytes.insert(source_id.to_string(), bytes);
        Ok(())
    }

    /// Make sure `source_id` is decoded into pages, downloading first if
    /// needed.
    pub async fn ensure_decoded(&mut self, source_id: &str) -> Result<(), SplitError> {
        if self.pages.contains_key(source_id) {
            return Ok(());
        }
        self.ensure_downloaded(source_id).await?;
        let decoded = SourcePages::decode(source_id, &self.bytes[source_id])?;
        info!(
            source = source_id,
            pages = decoded.page_count(),
            "decoded source"
        );
        self.pages.insert(source_id.to_string(), Arc::new(decoded));
        Ok(())
    }

    /// Resolve one 1-indexed page of a source to an opaque handle.
    pub async fn get_page(
        &mut self,
        source_id: &str,
        page: u32,
    ) -> Result<PageHandle, SplitError> {
        self.ensure_decoded(source_id).await?;
        self.pages[source_id].handle(page)
    }
}
