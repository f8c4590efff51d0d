use thiserror::Error;

use crate::codec::CodecError;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Missing or malformed credentials/config. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The bank rejected the client credentials or the token request.
    #[error("{provider} authentication failed (status {status}): {body}")]
    Authentication {
        provider: &'static str,
        status: u16,
        body: String,
    },
    /// The provider/credential combination cannot perform the operation.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    /// Non-2xx response from a charge or statement endpoint.
    #[error("{provider} request failed (status {status}): {body}")]
    Upstream {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("decryption failed: {0}")]
    Decryption(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("tls error: {0}")]
    Tls(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperation(msg.into())
    }

    /// Check if this error is a configuration problem the caller must fix.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::UnknownProvider(_) | Self::Tls(_)
        )
    }

    /// Check if this error is transient and may be retried by the caller.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Upstream { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Upstream HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::Upstream { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<CodecError> for ProviderError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Decryption | CodecError::InvalidEnvelope(_) => {
                ProviderError::Decryption(err.to_string())
            }
            CodecError::Serialization(e) => ProviderError::Json(e),
            CodecError::Encryption => ProviderError::Validation(err.to_string()),
            CodecError::InvalidKeyLength(_) | CodecError::InvalidHexKey(_) => {
                ProviderError::Configuration(err.to_string())
            }
        }
    }
}
