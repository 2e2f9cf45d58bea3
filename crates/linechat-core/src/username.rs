//! Validated chat usernames.

use std::borrow::Borrow;
use std::fmt;

use crate::ChatError;

/// Maximum username length, counted in characters after trimming.
pub const MAX_USERNAME_CHARS: usize = 16;

/// A registered client's name.
///
/// Always trimmed and 1-16 characters long. Comparison is case-sensitive.
/// No character-set filtering is applied: control characters and protocol
/// delimiters such as `,` are accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Username(String);

impl Username {
    /// Trims surrounding whitespace and validates the length.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::UsernameInvalid` if the trimmed candidate is
    /// empty or longer than [`MAX_USERNAME_CHARS`].
    pub fn parse(candidate: &str) -> Result<Self, ChatError> {
        let trimmed = candidate.trim();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_USERNAME_CHARS {
            return Err(ChatError::UsernameInvalid);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets maps keyed by Username be queried with a plain &str.
impl Borrow<str> for Username {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Username {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Username {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
