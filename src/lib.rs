//! Mail bridge — routes inbound email to a session-based agent runtime
//! and replies through a transactional mail sender.

pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod inbound;
pub mod outbound;
pub mod pipeline;
pub mod reply;
pub mod server;
pub mod session;
