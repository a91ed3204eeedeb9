use thiserror::Error;

/// Failures at the object-storage boundary.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("transfer failed for {key}: {message}")]
    Transfer { key: String, message: String },

    #[error("request for {key} timed out after {seconds}s")]
    Timeout { key: String, seconds: u64 },
}

/// Failures while running a split job, attributed to one output.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("failed to fetch source {source_id}")]
    Fetch {
        source_id: String,
        #[source]
        cause: GatewayError,
    },

    #[error("failed to decode source {source_id}: {message}")]
    Decode { source_id: String, message: String },

    #[error("page {page} out of range for {source_id} (document has {page_count} pages)")]
    PageOutOfRange {
        source_id: String,
        page: u32,
        page_count: u32,
    },

    #[error("failed to encode output: {0}")]
    Encode(String),

    #[error("failed to upload {target}")]
    Upload {
        target: String,
        #[source]
        cause: GatewayError,
    },

    #[error("invalid split specification: {0}")]
    Validation(String),
}
