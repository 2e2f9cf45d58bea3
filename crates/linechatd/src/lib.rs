//! linechat Daemon - Session registry and line-protocol chat server
//!
//! This crate provides the core infrastructure for the chat daemon:
//! - `registry` - Single-owner actor holding all membership state
//! - `session` - Per-connection handshake and command state machine
//! - `outbound` - Bounded per-client mailboxes and their delivery loops
//! - `server` - TCP listener and per-connection handlers
//! - `metrics` - OpenTelemetry instruments fed by registry hooks
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      linechatd daemon                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐  RegistryEvent  ┌──────────────────┐   │
//! │  │    Session      │────(mpsc)──────▶│  RegistryActor   │   │
//! │  │  (per client)   │◀──(oneshot)─────│ (membership map) │   │
//! │  └─────────────────┘   register ack  └────────┬─────────┘   │
//! │                                               │ try_send    │
//! │                                               ▼             │
//! │  ┌─────────────────┐     lines       ┌──────────────────┐   │
//! │  │ OutboundWriter  │◀────────────────│     Mailbox      │   │
//! │  │  (per client)   │                 │   (per client)   │   │
//! │  └─────────────────┘                 └──────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod client;
pub mod config;
pub mod metrics;
pub mod observer;
pub mod outbound;
pub mod registry;
pub mod server;
pub mod session;
