//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors a chat participant can run into.
///
/// Every variant is recoverable at the session boundary: the client gets
/// an `ERR <code>` line and the session carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Username is empty or too long after trimming
    #[error("username must be 1-{max} characters after trimming", max = crate::MAX_USERNAME_CHARS)]
    UsernameInvalid,

    /// Another client already holds this username
    #[error("username already taken: {0}")]
    UsernameTaken(String),

    /// Whisper target is empty or not connected
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// Whisper addressed to the sender
    #[error("cannot whisper to yourself")]
    CannotWhisperSelf,

    /// Malformed `/w` command
    #[error("usage: /w <user> <message>")]
    WhisperUsage,
}

impl ChatError {
    /// Wire code sent to the client after `ERR `.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UsernameInvalid => "username_invalid",
            Self::UsernameTaken(_) => "username_taken",
            Self::UserNotFound(_) => "user_not_found",
            Self::CannotWhisperSelf => "cannot_whisper_self",
            Self::WhisperUsage => "whisper_usage",
        }
    }
}

/// Result type for domain operations.
pub type ChatResult<T> = Result<T, ChatError>;
