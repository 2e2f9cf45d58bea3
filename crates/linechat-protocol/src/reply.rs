//! Server to client lines.

use std::fmt;

use linechat_core::{ChatError, Username};

/// Error code sent when registration fails for a reason other than the
/// username itself (e.g. the registry has shut down).
pub const REGISTER_FAILED: &str = "register_failed";

/// A single line sent to a client, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `Enter username:`
    Prompt,

    /// `OK` - registration accepted
    Ok,

    /// `ERR <code>`
    Error(&'static str),

    /// `SYSTEM: <text>`
    System(String),

    /// `<from>: <text>`
    Chat { from: Username, text: String },

    /// `USERS: <a,b,c>`
    Users(Vec<Username>),

    /// `WHISPER <from>: <text>`
    Whisper { from: Username, text: String },

    /// `Bye`
    Bye,
}

impl Reply {
    /// Error line for a domain error.
    pub fn error(err: &ChatError) -> Self {
        Self::Error(err.code())
    }

    /// Error line shown after a failed registration attempt.
    ///
    /// Username problems keep their own code; anything else is reported as
    /// `register_failed`.
    pub fn register_failure(err: Option<&ChatError>) -> Self {
        match err {
            Some(e @ (ChatError::UsernameTaken(_) | ChatError::UsernameInvalid)) => Self::error(e),
            _ => Self::Error(REGISTER_FAILED),
        }
    }

    /// `SYSTEM: <name> joined`
    pub fn joined(name: &Username) -> Self {
        Self::System(format!("{name} joined"))
    }

    /// `SYSTEM: <name> left`
    pub fn left(name: &Username) -> Self {
        Self::System(format!("{name} left"))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prompt => write!(f, "Enter username:"),
            Self::Ok => write!(f, "OK"),
            Self::Error(code) => write!(f, "ERR {code}"),
            Self::System(text) => write!(f, "SYSTEM: {text}"),
            Self::Chat { from, text } => write!(f, "{from}: {text}"),
            Self::Users(names) => {
                write!(f, "USERS: ")?;
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{name}")?;
                }
                Ok(())
            }
            Self::Whisper { from, text } => write!(f, "WHISPER {from}: {text}"),
            Self::Bye => write!(f, "Bye"),
        }
    }
}

impl From<Reply> for String {
    fn from(reply: Reply) -> Self {
        reply.to_string()
    }
}
