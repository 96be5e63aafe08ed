use thiserror::Error;

#[derive(Debug, Error)]
pub enum DialogError {
    #[error("dialog '{0}' is not registered")]
    NotFound(String),

    #[error("no active dialog on the stack")]
    NoActiveDialog,

    /// A step or send failure. The engine does not catch these; they
    /// propagate to the turn driver as unhandled turn errors.
    #[error("dialog step failed: {0}")]
    Step(#[from] anyhow::Error),
}
