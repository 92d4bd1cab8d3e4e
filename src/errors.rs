// ⚠️ Error types for the olca-bridge pipeline
//
// Validation errors aggregate every problem found in one pass so a user can
// fix a whole input table at once. Resolution problems that are NOT fatal are
// logged with `tracing::warn!` and never show up here.

/// Top-level error enum for the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Incorrect units present in exchange data: {}", .0.join(", "))]
    UnresolvedUnits(Vec<String>),

    #[error("Flow UUID {uuid} ({flow_name}) is not an elementary flow, not an existing technosphere flow and cannot be created")]
    FlowResolution { uuid: String, flow_name: String },

    #[error("Bridge for `{source_flow}` needs target flow `{target_flow}`, which was not found in the repository")]
    BridgeTargetMissing {
        source_flow: String,
        target_flow: String,
    },

    #[error("Process `{process}` references flow {uuid} which is not in the flow registry")]
    UnknownProcessFlow { process: String, uuid: String },

    #[error("Repository error for {repo} ({endpoint}): {message}")]
    Repository {
        repo: String,
        endpoint: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl PipelineError {
    /// Single-message validation error
    pub fn invalid(message: impl Into<String>) -> Self {
        PipelineError::Validation(vec![message.into()])
    }

    /// True for the data-integrity errors that must abort a run
    pub fn is_identity_error(&self) -> bool {
        matches!(
            self,
            PipelineError::FlowResolution { .. }
                | PipelineError::BridgeTargetMissing { .. }
                | PipelineError::UnknownProcessFlow { .. }
        )
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
