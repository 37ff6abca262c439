//! Subcommand handlers

use std::io::Write;

use procbridge::bridge::{self, ExecutionContext, ProcessHost};
use procbridge::host::platform;
use procbridge::{CommandError, CommandLine, CommandRunner};
use serde_json::json;

use super::{exit_codes, Commands};

/// Everything a subcommand needs to run
pub struct Session {
    pub runner: CommandRunner,
    pub context: ExecutionContext,
    pub json: bool,
}

impl Session {
    fn host(&self) -> Result<Box<dyn ProcessHost>, CommandError> {
        bridge::host_for(self.context, self.runner.clone())
    }

    fn print(&self, key: &str, value: serde_json::Value) {
        if self.json {
            println!("{}", json!({ key: value }));
        } else {
            match value {
                serde_json::Value::String(s) => println!("{}", s),
                other => println!("{}", other),
            }
        }
    }

    /// Write command output verbatim, or as a JSON object under `key`
    fn write_output(&self, out: &mut impl Write, key: &str, text: &str) -> std::io::Result<()> {
        if self.json {
            writeln!(out, "{}", json!({ key: text }))?;
        } else {
            out.write_all(text.as_bytes())?;
        }
        out.flush()
    }
}

/// Run one subcommand and return the process exit code
pub async fn run(command: Commands, session: &Session) -> Result<i32, CommandError> {
    match command {
        Commands::Platform => {
            session.print("platform", json!(platform::platform_name()));
        }
        Commands::Exe => {
            let path = platform::executable_path()?;
            session.print("exe", json!(path.display().to_string()));
        }
        Commands::Exists { path } => {
            let exists = platform::process_exists(&path);
            session.print("exists", json!(exists));
            if !exists {
                return Ok(exit_codes::NOT_FOUND);
            }
        }
        Commands::Pid => {
            let pid = session.host()?.current_pid()?;
            session.print("pid", json!(pid));
        }
        Commands::Exit { code } => {
            session.host()?.exit(code)?;
            // Only reached when a one-way target accepted the request
            return Ok(code);
        }
        Commands::Start(args) => {
            let command = CommandLine::new(args.command)?;
            let host = session.host()?;
            host.start(&command)?;
            // A restricted host hands the spawn to its endpoint; wait for it
            drop(host);
            tracing::info!("Started {}", command);
        }
        Commands::Exec(args) => {
            let command = CommandLine::new(args.command)?;
            let output = session.host()?.run_blocking(&command)?;
            session.write_output(&mut std::io::stdout().lock(), "output", &output)?;
        }
        Commands::Run(args) => {
            let command = CommandLine::new(args.command)?;
            let output = session.runner.run_buffered(&command).await?;
            session.print("output", json!(output));
        }
        Commands::Stream(args) => {
            let command = CommandLine::new(args.command)?;
            let json = session.json;
            session
                .runner
                .run_streamed(&command, |line| {
                    if json {
                        println!("{}", json!({ "line": line }));
                    } else {
                        println!("{}", line);
                    }
                })
                .await?;
        }
    }

    Ok(exit_codes::SUCCESS)
}

/// Map a failed operation to the CLI exit code
pub fn exit_code_for(err: &CommandError) -> i32 {
    match err {
        CommandError::SpawnFailed { .. } | CommandError::EmptyCommand => exit_codes::SPAWN_FAILED,
        CommandError::NoPrivilegedTarget => exit_codes::NO_PRIVILEGED_TARGET,
        other => other.exit_code().unwrap_or(exit_codes::UNEXPECTED_FAILURE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_for_errors() {
        let err = CommandError::NonZeroExit {
            code: 42,
            message: "boom".to_string(),
        };
        assert_eq!(exit_code_for(&err), 42);
        assert_eq!(exit_code_for(&CommandError::EmptyCommand), exit_codes::SPAWN_FAILED);
        assert_eq!(
            exit_code_for(&CommandError::NoPrivilegedTarget),
            exit_codes::NO_PRIVILEGED_TARGET
        );
        assert_eq!(
            exit_code_for(&CommandError::Channel("gone".to_string())),
            exit_codes::UNEXPECTED_FAILURE
        );
    }

    #[test]
    fn test_exec_output_follows_json_flag() {
        let mut session = Session {
            runner: CommandRunner::new(),
            context: ExecutionContext::Privileged,
            json: false,
        };

        let mut plain = Vec::new();
        session.write_output(&mut plain, "output", "a\nb\n").unwrap();
        assert_eq!(plain, b"a\nb\n");

        session.json = true;
        let mut encoded = Vec::new();
        session.write_output(&mut encoded, "output", "a\nb\n").unwrap();
        let value: serde_json::Value = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(value, json!({ "output": "a\nb\n" }));
    }

    #[cfg(unix)]
    #[test]
    fn test_restricted_exec_runs_through_endpoint() {
        let session = Session {
            runner: CommandRunner::new(),
            context: ExecutionContext::Restricted,
            json: true,
        };
        let code = tokio_test::block_on(run(
            Commands::Exec(crate::cli::CommandArgs {
                command: vec!["sh".to_string(), "-c".to_string(), "exit 4".to_string()],
            }),
            &session,
        ));
        assert_eq!(code.unwrap_err().exit_code(), Some(4));
    }

    #[test]
    fn test_exists_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session {
            runner: CommandRunner::new(),
            context: ExecutionContext::Privileged,
            json: false,
        };
        let code = tokio_test::block_on(run(
            Commands::Exists {
                path: dir.path().join("missing"),
            },
            &session,
        ))
        .unwrap();
        assert_eq!(code, exit_codes::NOT_FOUND);
    }
}
