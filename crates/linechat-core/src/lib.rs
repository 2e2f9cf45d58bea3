//! linechat Core - Shared types for the chat daemon
//!
//! This crate provides the domain types shared between the line
//! protocol (linechat-protocol) and the daemon (linechatd).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod message;
pub mod username;

// Re-exports for convenience
pub use error::{ChatError, ChatResult};
pub use message::{clean_message, truncate_to_bytes, MAX_MESSAGE_BYTES};
pub use username::{Username, MAX_USERNAME_CHARS};
