use thiserror::Error;

/// Command-level failures the dispatcher turns into chat replies.
#[derive(Debug, Error)]
pub enum AppError {
    /// The requester is neither the hit's reporter nor privileged. Raised
    /// before any session state exists.
    #[error("not allowed to edit this hit")]
    Unauthorized,
    /// A user-correctable problem; the message is shown verbatim.
    #[error("{0}")]
    BadRequest(String),
    /// Unexpected failure. The session handling the message is destroyed.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
