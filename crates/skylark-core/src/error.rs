use std::fmt;

/// Error taxonomy for core operations.
///
/// Variants carry rendered messages rather than source errors so the type
/// stays `Clone` — in-flight profile loads are shared between callers, and
/// every waiter gets the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Remote call unreachable or timed out. Retried at the caller's
    /// discretion, never automatically.
    #[error("network failure: {0}")]
    Network(String),

    /// Invalid credentials or expired session. The session manager forces
    /// the session to `Unauthenticated` when it sees this.
    #[error("authentication failure: {0}")]
    Auth(String),

    /// Profile or conversation missing remotely.
    #[error("not found: {0}")]
    NotFound(String),

    /// Persistent storage write failed. Read-side storage problems are
    /// handled as cache misses and never reach the caller.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn network(msg: impl fmt::Display) -> Self {
        Self::Network(msg.to_string())
    }

    pub fn auth(msg: impl fmt::Display) -> Self {
        Self::Auth(msg.to_string())
    }

    pub fn not_found(msg: impl fmt::Display) -> Self {
        Self::NotFound(msg.to_string())
    }

    pub fn storage(msg: impl fmt::Display) -> Self {
        Self::Storage(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
