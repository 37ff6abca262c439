//! Host module for process management and command execution

pub mod command_runner;
pub mod line_streamer;
pub mod outcome;
pub mod platform;

pub use command_runner::{CommandLine, CommandRunner};
pub use line_streamer::{split_lines, LineStreamer};
pub use outcome::{classify, classify_code};
