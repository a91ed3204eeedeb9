//! The split engine: drives a [`SplitSpec`] from cache to uploaded outputs.

use tracing::{error, info, warn};

use crate::cache::DocumentCache;
use crate::codec::AssembledDocument;
use crate::error::SplitError;
use crate::gateway::ObjectGateway;
use crate::spec::{OutputSpec, SplitSpec};

/// Runs split jobs against one storage backend.
///
/// Owns the per-job document cache; create a fresh instance per job so
/// cached sources never leak across jobs.
pub struct Splitter<G> {
    cache: DocumentCache<G>,
}

impl<G: ObjectGateway> Splitter<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            cache: DocumentCache::new(gateway),
        }
    }

    pub fn cache(&self) -> &DocumentCache<G> {
        &self.cache
    }

    /// Resolve every page reference of one output, in order.
    ///
    /// All-or-nothing: the first failing reference fails the whole output,
    /// and cache errors propagate unchanged.
    pub async fn resolve_output(
        &mut self,
        spec: &OutputSpec,
    ) -> Result<AssembledDocument, SplitError> {
        spec.validate()?;
        let mut doc = AssembledDocument::new();
        for reference in &spec.pages {
            let page = self
                .cache
                .get_page(reference.source_id(), reference.page())
                .await?;
            doc.push(page);
        }
        Ok(doc)
    }

    /// Encode an assembled document and upload it under `target`.
    ///
    /// On an upload failure the encode work is cheap to redo, so callers
    /// may retry with the same document.
    pub async fn publish(
        &self,
        doc: &AssembledDocument,
        target: &str,
    ) -> Result<(), SplitError> {
        let bytes = doc.encode()?;
        self.cache
            .gateway()
            .store(target, bytes)
            .await
            .map_err(|cause| SplitError::Upload {
                target: target.to_string(),
                cause,
            })?;
        info!(output = target, pages = doc.len(), "uploaded output");
        Ok(())
    }

    /// Run a whole job: prefetch the manifest, then resolve and publish
    /// each output in the given order.
    ///
    /// Outputs are independent units of work; a failure is captured in the
    /// report and the remaining outputs still run.
    pub async fn run(&mut self, spec: &SplitSpec) -> JobReport {
        for source_id in &spec.input {
            // Prefetch is advisory; a miss here is retried when an output
            // actually references the source.
            if let Err(err) = self.cache.ensure_downloaded(source_id).await {
                warn!(source = source_id.as_str(), %err, "prefetch failed");
            }
        }

        let mut outcomes = Vec::with_capacity(spec.output.len());
        for output in &spec.output {
            let result = self.process_output(output).await;
            if let Err(err) = &result {
                error!(output = output.target.as_str(), %err, "output failed");
            }
            outcomes.push(OutputOutcome {
                target: output.target.clone(),
                result,
            });
        }
        JobReport { outcomes }
    }

    async fn process_output(&mut self, output: &OutputSpec) -> Result<(), SplitError> {
        let doc = self.resolve_output(output).await?;
        self.publish(&doc, &output.target).await
    }
}

/// Outcome of one output within a job.
#[derive(Debug)]
pub struct OutputOutcome {
    pub target: String,
    pub result: Result<(), SplitError>,
}

/// Per-output outcomes of one job run, in spec order.
#[derive(Debug, Default)]
pub struct JobReport {
    pub outcomes: Vec<OutputOutcome>,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &OutputOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn outcome(&self, target: &str) -> Option<&OutputOutcome> {
        self.outcomes.iter().find(|o| o.target == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::test_support::pdf_with_texts;
    use crate::error::GatewayError;
    use crate::gateway::MemoryGateway;
    use crate::spec::PageReference;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn seeded() -> MemoryGateway {
        let gateway = MemoryGateway::new();
        gateway.insert("letter.pdf", pdf_with_texts(&["a", "b"]));
        gateway
    }

    fn output(target: &str, pages: &[(&str, u32)]) -> OutputSpec {
        OutputSpec {
            target: target.to_string(),
            pages: pages
                .iter()
                .map(|(source, page)| PageReference::new(*source, *page))
                .collect(),
        }
    }

    /// Rejects every store for one target; everything else delegates.
    struct RejectingStoreGateway {
        inner: MemoryGateway,
        reject: String,
    }

    #[async_trait]
    impl ObjectGateway for RejectingStoreGateway {
        async fn fetch(&self, key: &str) -> Result<Vec<u8>, GatewayError> {
            self.inner.fetch(key).await
        }

        async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<(), GatewayError> {
            if key == self.reject {
                return Err(GatewayError::Transfer {
                    key: key.to_string(),
                    message: "connection reset".to_string(),
                });
            }
            self.inner.store(key, bytes).await
        }
    }

    /// Fails the first store, then behaves.
    struct FailOnceStoreGateway {
        inner: MemoryGateway,
        failed: AtomicBool,
    }

    #[async_trait]
    impl ObjectGateway for FailOnceStoreGateway {
        async fn fetch(&self, key: &str) -> Result<Vec<u8>, GatewayError> {
            self.inner.fetch(key).await
        }

        async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<(), GatewayError> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(GatewayError::Transfer {
                    key: key.to_string(),
                    message: "connection reset".to_string(),
                });
            }
            self.inner.store(key, bytes).await
        }
    }

    #[tokio::test]
    async fn upload_failure_is_captured_without_aborting_siblings() {
        let gateway = Arc::new(RejectingStoreGateway {
            inner: seeded(),
            reject: "flaky.pdf".to_string(),
        });
        let spec = SplitSpec {
            input: vec!["letter.pdf".to_string()],
            output: vec![
                output("flaky.pdf", &[("letter.pdf", 1)]),
                output("steady.pdf", &[("letter.pdf", 2)]),
            ],
        };

        let mut splitter = Splitter::new(Arc::clone(&gateway));
        let report = splitter.run(&spec).await;

        assert!(!report.is_success());
        assert!(matches!(
            report.outcome("flaky.pdf").unwrap().result,
            Err(SplitError::Upload {
                ref target,
                cause: GatewayError::Transfer { .. },
            }) if target == "flaky.pdf"
        ));
        assert!(report.outcome("steady.pdf").unwrap().result.is_ok());
        assert!(gateway.inner.contains("steady.pdf"));
        assert!(!gateway.inner.contains("flaky.pdf"));
    }

    #[tokio::test]
    async fn upload_failure_is_retryable_with_the_same_document() {
        let gateway = Arc::new(FailOnceStoreGateway {
            inner: seeded(),
            failed: AtomicBool::new(false),
        });
        let mut splitter = Splitter::new(Arc::clone(&gateway));
        let spec = output("out.pdf", &[("letter.pdf", 1)]);

        let doc = splitter.resolve_output(&spec).await.unwrap();
        let err = splitter.publish(&doc, "out.pdf").await.unwrap_err();
        assert!(matches!(err, SplitError::Upload { ref target, .. } if target == "out.pdf"));

        // Encoding succeeded and is cheap to redo; the same assembled
        // document goes through on retry.
        splitter.publish(&doc, "out.pdf").await.unwrap();
        assert!(gateway.inner.contains("out.pdf"));
    }

    fn report(results: Vec<(&str, Result<(), SplitError>)>) -> JobReport {
        JobReport {
            outcomes: results
                .into_iter()
                .map(|(target, result)| OutputOutcome {
                    target: target.to_string(),
                    result,
                })
                .collect(),
        }
    }

    #[test]
    fn report_distinguishes_partial_failure() {
        let report = report(vec![
            ("good.pdf", Ok(())),
            (
                "bad.pdf",
                Err(SplitError::Upload {
                    target: "bad.pdf".to_string(),
                    cause: GatewayError::Transfer {
                        key: "bad.pdf".to_string(),
                        message: "connection reset".to_string(),
                    },
                }),
            ),
        ]);

        assert!(!report.is_success());
        assert_eq!(report.failures().count(), 1);
        assert!(report.outcome("good.pdf").unwrap().result.is_ok());
        assert!(report.outcome("bad.pdf").unwrap().result.is_err());
        assert!(report.outcome("missing.pdf").is_none());
    }

    #[test]
    fn report_with_all_successes_is_success() {
        let report = report(vec![("a.pdf", Ok(())), ("b.pdf", Ok(()))]);
        assert!(report.is_success());
        assert_eq!(report.failures().count(), 0);
    }
}
