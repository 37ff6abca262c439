//! procbridge - cross-process helper
//!
//! Platform queries, process exit, and child process spawning (fire-and-forget,
//! blocking, buffered or streamed line by line). When the caller runs in a
//! restricted context, pid lookup, exit and plain spawns are forwarded to a
//! privileged counterpart over a message channel.

pub mod bridge;
pub mod error;
pub mod host;
pub mod logging;
pub mod settings;

pub use bridge::{ExecutionContext, LocalHost, ProcessHost, RemoteHost};
pub use error::CommandError;
pub use host::{CommandLine, CommandRunner, LineStreamer};
