//! Command-line interface

pub mod process;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Process exit codes used by the CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const UNEXPECTED_FAILURE: i32 = 1;
    pub const SPAWN_FAILED: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
    pub const NO_PRIVILEGED_TARGET: i32 = 4;
    pub const NOT_FOUND: i32 = 5;
}

/// procbridge - platform queries and child processes, locally or through a privileged endpoint
#[derive(Debug, Parser)]
#[command(name = "procbridge", version, about)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs and results as JSON
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Settings file (defaults to <config dir>/procbridge/settings.toml)
    #[arg(long, global = true, env = "PROCBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Route pid/exit/start/exec through a privileged endpoint
    #[arg(long, global = true)]
    pub restricted: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the operating system name
    Platform,
    /// Print the current process id
    Pid,
    /// Print the path of this executable
    Exe,
    /// Check whether a path exists
    Exists {
        path: PathBuf,
    },
    /// Exit with the given code
    Exit {
        #[arg(allow_hyphen_values = true)]
        code: i32,
    },
    /// Spawn a command and return immediately
    Start(CommandArgs),
    /// Run a command, blocking, and print its stdout
    Exec(CommandArgs),
    /// Run a command asynchronously and print its trimmed stdout
    Run(CommandArgs),
    /// Run a command asynchronously, printing stdout line by line as it arrives
    Stream(CommandArgs),
}

#[derive(Debug, Args)]
pub struct CommandArgs {
    /// Program followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}
