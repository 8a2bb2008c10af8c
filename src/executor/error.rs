use crate::session::SessionError;

/// Errors that can occur while executing a forwarded request
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("invalid session {0}")]
    InvalidSession(String),

    #[error("upstream for chain {0} failed without a decodable reply")]
    NoHealthyRpc(u64),

    #[error(transparent)]
    Session(#[from] SessionError),
}
