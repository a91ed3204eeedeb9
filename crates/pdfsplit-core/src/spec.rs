//! The declarative job description: which pages go into which outputs.

use serde::{Deserialize, Serialize};

use crate::error::SplitError;

/// One page of one source document, 1-indexed.
///
/// Serializes as a two-element array, e.g. `["letter.pdf", 3]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReference(String, u32);

impl PageReference {
    pub fn new(source_id: impl Into<String>, page: u32) -> Self {
        Self(source_id.into(), page)
    }

    pub fn source_id(&self) -> &str {
        &self.0
    }

    pub fn page(&self) -> u32 {
        self.1
    }
}

/// One output document: a target storage key plus the ordered pages that
/// make it up. Order is significant and duplicates are allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpec {
    pub target: String,
    pub pages: Vec<PageReference>,
}

impl OutputSpec {
    /// Reject degenerate outputs before any source is touched.
    pub fn validate(&self) -> Result<(), SplitError> {
        if self.target.is_empty() {
            return Err(SplitError::Validation(
                "output target key is empty".to_string(),
            ));
        }
        if self.pages.is_empty() {
            return Err(SplitError::Validation(format!(
                "output {} has an empty page list",
                self.target
            )));
        }
        Ok(())
    }
}

/// The top-level job description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitSpec {
    /// Prefetch manifest. Purely advisory: outputs may reference sources
    /// outside it, which are then resolved lazily on first use.
    #[serde(default)]
    pub input: Vec<String>,
    pub output: Vec<OutputSpec>,
}

impl SplitSpec {
    pub fn from_json(json: &str) -> Result<Self, SplitError> {
        serde_json::from_str(json).map_err(|e| SplitError::Validation(e.to_string()))
    }
}
