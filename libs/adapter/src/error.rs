use bfm_auth::AuthError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// Null/blank required parameters, raised before any asynchronous
    /// work begins.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Authentication failures propagate uncaught; callers surface them
    /// as an unauthorized response.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A bot callback or connector failure; treated as an unhandled
    /// turn error.
    #[error("turn processing failed: {0}")]
    Turn(#[source] anyhow::Error),
}
