use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecoverError>;

/// A type-erased error, used at the middleware seams
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum RecoverError {
    #[error("failed to render panic report: {0}")]
    Render(#[from] askama::Error),

    #[error("panic while rendering panic report: {0}")]
    RenderPanicked(String),

    #[error("panic interceptor: {0}")]
    Interceptor(BoxError),

    #[error("invalid value for {key}: {value:?}")]
    InvalidConfig { key: String, value: String },

    #[error("failed to write panic log: {0}")]
    Io(#[from] std::io::Error),
}

impl RecoverError {
    pub fn interceptor(err: impl Into<BoxError>) -> Self {
        Self::Interceptor(err.into())
    }

    pub fn invalid_config(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl From<anyhow::Error> for RecoverError {
    fn from(err: anyhow::Error) -> Self {
        RecoverError::Interceptor(err.into())
    }
}
