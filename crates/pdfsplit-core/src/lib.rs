//! PDF page splitting against an object-storage bucket
//!
//! This crate rearranges pages from source PDFs held in a bucket into newly
//! assembled output PDFs, driven by a declarative split specification.
//!
//! The moving parts, leaves first:
//! - [`gateway`]: opaque get/put of byte blobs, backed by `object_store`
//! - [`codec`]: lopdf-based decode of sources and assembly of outputs
//! - [`cache`]: per-job memoization of downloaded and decoded sources
//! - [`engine`]: turns a [`SplitSpec`] into uploaded outputs, one outcome
//!   per output

pub mod cache;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod spec;

pub use cache::DocumentCache;
pub use codec::{AssembledDocument, PageHandle, SourcePages};
pub use config::{StorageConfig, StorageProvider};
pub use engine::{JobReport, OutputOutcome, Splitter};
pub use error::{GatewayError, SplitError};
pub use gateway::{MemoryGateway, ObjectGateway, ObjectStoreGateway};
pub use spec::{OutputSpec, PageReference, SplitSpec};
