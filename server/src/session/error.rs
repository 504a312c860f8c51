use super::UpstreamResponse;

/// Failures reported by a [`ClientSession`](super::ClientSession).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No outbound group session exists yet for the room; sharing one and
    /// retrying the send is expected to fix it.
    #[error("No outbound group session for room {room_id}")]
    NoGroupSession { room_id: String },

    #[error("Homeserver request failed: {0}")]
    Transport(String),

    #[error("Homeserver responded with status {}", .0.status)]
    Upstream(UpstreamResponse),

    #[error("Invalid homeserver response: {0}")]
    InvalidResponse(String),

    #[error("Session has not logged in")]
    NotLoggedIn,

    #[error("Session is closed")]
    Closed,
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        SessionError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
