//! Error types for the model crate

/// Errors raised while parsing templates and property bags
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Intrinsic function object has the wrong shape
    #[error("invalid {function}: {reason}")]
    InvalidIntrinsic {
        /// Intrinsic name, e.g. `Fn::Join`
        function: String,
        /// What was wrong with it
        reason: String,
    },

    /// Template document is structurally invalid
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    /// Underlying JSON error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// Create intrinsic shape error
    pub fn invalid_intrinsic(function: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIntrinsic {
            function: function.into(),
            reason: reason.into(),
        }
    }
}
