//! Error taxonomy for devstrip.

use function_api::FunctionApiError;

/// devstrip errors.
#[derive(Debug, thiserror::Error)]
pub enum DevstripError {
    #[error("function API error: {0}")]
    Api(#[from] FunctionApiError),

    #[error("unknown lifecycle point: {0}")]
    UnknownLifecyclePoint(String),

    #[error("invalid deployment descriptor: {0}")]
    Descriptor(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for DevstripError {
    fn from(err: serde_yaml::Error) -> Self {
        DevstripError::Descriptor(err.to_string())
    }
}

impl From<toml::de::Error> for DevstripError {
    fn from(err: toml::de::Error) -> Self {
        DevstripError::Descriptor(err.to_string())
    }
}

/// Result type for devstrip operations.
pub type Result<T> = std::result::Result<T, DevstripError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_converts_and_keeps_message() {
        let err: DevstripError = FunctionApiError::NotFound {
            function_name: "svc-dev-a".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "function API error: function not found: svc-dev-a"
        );
    }
}
