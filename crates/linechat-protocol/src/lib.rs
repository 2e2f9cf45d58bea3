//! linechat Protocol - Newline-delimited text protocol
//!
//! This crate provides the client command parser and the server reply
//! lines exchanged between chat clients and the daemon.
//!
//! ```text
//! client → server   free text | /users | /w <user> <message> | /exit
//! server → client   Enter username: | OK | ERR <code> | SYSTEM: <text>
//!                   <name>: <text> | USERS: <a,b,c> | WHISPER <name>: <text> | Bye
//! ```

pub mod command;
pub mod reply;

pub use command::Command;
pub use reply::{Reply, REGISTER_FAILED};
