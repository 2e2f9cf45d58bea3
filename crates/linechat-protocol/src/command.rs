//! Parsing of client command lines.

use linechat_core::{truncate_to_bytes, ChatError, MAX_MESSAGE_BYTES};

/// A command read from a registered client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/exit` - leave the chat
    Exit,

    /// `/users` - list connected users
    Users,

    /// `/w <target> <text>` - private message
    Whisper {
        /// Single non-whitespace token naming the recipient
        target: String,
        /// Trimmed body, at most 512 bytes
        text: String,
    },

    /// Anything else - sent to every user
    Say(String),
}

impl Command {
    /// Parses one line (already stripped of its terminator).
    ///
    /// Returns `Ok(None)` for an empty line, which clients may send freely.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::WhisperUsage` for any `/w`-prefixed line that is
    /// not `/w <target> <text>`, including `/wbob hi`.
    pub fn parse(line: &str) -> Result<Option<Self>, ChatError> {
        match line {
            "" => Ok(None),
            "/exit" => Ok(Some(Self::Exit)),
            "/users" => Ok(Some(Self::Users)),
            _ => match line.strip_prefix("/w") {
                Some(rest) => parse_whisper(rest).map(Some),
                None => Ok(Some(Self::Say(line.to_string()))),
            },
        }
    }
}

/// Splits `<target> <text>` following the `/w` keyword.
fn parse_whisper(rest: &str) -> Result<Command, ChatError> {
    if !rest.starts_with(char::is_whitespace) {
        return Err(ChatError::WhisperUsage);
    }

    let (target, body) = rest
        .trim_start()
        .split_once(char::is_whitespace)
        .ok_or(ChatError::WhisperUsage)?;

    let text = body.trim();
    if target.is_empty() || text.is_empty() {
        return Err(ChatError::WhisperUsage);
    }

    Ok(Command::Whisper {
        target: target.to_string(),
        text: truncate_to_bytes(text, MAX_MESSAGE_BYTES).to_string(),
    })
}
