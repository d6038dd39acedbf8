use thiserror::Error;

use crate::backend::TextureHandle;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Failed to compile batch shader: {diagnostic}")]
    ShaderCompile { diagnostic: String },

    #[error("Failed to create GPU resource `{resource}`")]
    ResourceCreation {
        resource: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("GPU backend call failed during {stage}")]
    Backend {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid batch configuration: {0}")]
    InvalidConfig(String),

    #[error("Texture slot table still full after a flush ({slots} slots)")]
    SlotsExhaustedAfterReset { slots: usize },

    #[error("Invalid texture handle: {0:?}")]
    InvalidTexture(TextureHandle),

    #[error("{operation} called while {state}")]
    Lifecycle {
        operation: &'static str,
        state: &'static str,
    },
}

pub type BatchResult<T> = Result<T, BatchError>;

/// `err` followed by each of its sources, separated by `: `.
pub fn error_chain(err: &BatchError) -> String {
    anyhow::Chain::new(err)
        .map(|cause| cause.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}
