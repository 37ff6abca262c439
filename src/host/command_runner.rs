//! Command Runner
//!
//! Spawns child processes from a program-plus-arguments command line, without
//! shell interpretation. Four flavours are offered:
//! - fire-and-forget (`start`)
//! - blocking with captured stdout (`run_blocking`)
//! - async with buffered stdout (`run_buffered`)
//! - async with stdout streamed line by line (`run_streamed`)
//!
//! Standard error is never captured; its lines are logged.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::line_streamer::LineStreamer;
use super::outcome::classify;
use crate::error::CommandError;

const READ_CHUNK: usize = 8192;

/// A program path followed by its arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandLine(Vec<String>);

impl CommandLine {
    /// Build a command line, rejecting one without a program
    pub fn new<I, S>(parts: I) -> Result<Self, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parts: Vec<String> = parts.into_iter().map(Into::into).collect();
        if parts.is_empty() {
            return Err(CommandError::EmptyCommand);
        }
        Ok(Self(parts))
    }

    /// Split into program and arguments.
    ///
    /// A command line that arrived through deserialization may still be empty.
    pub fn split(&self) -> Result<(&str, &[String]), CommandError> {
        self.0
            .split_first()
            .map(|(program, args)| (program.as_str(), args))
            .ok_or(CommandError::EmptyCommand)
    }

    pub fn program(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

/// Command runner for spawning child processes
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    /// Environment variables to add
    env_additions: HashMap<String, String>,
    /// Working directory for every spawned process
    working_directory: Option<PathBuf>,
}

impl CommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_additions.insert(key.into(), value.into());
        self
    }

    /// Set the working directory
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Resolve the program: an existing path is used as-is, anything else is
    /// looked up in the PATH the child will see
    fn resolve(&self, program: &str) -> Result<PathBuf, CommandError> {
        if Path::new(program).exists() {
            return Ok(PathBuf::from(program));
        }

        let search_path = match self.env_additions.get("PATH") {
            Some(path) => Some(OsString::from(path)),
            None => std::env::var_os("PATH"),
        };
        let cwd = match &self.working_directory {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        which::which_in(program, search_path, cwd)
            .map_err(|_| CommandError::spawn_failed(program, "not found in PATH"))
    }

    fn build(&self, command: &CommandLine) -> Result<Command, CommandError> {
        let (program, args) = command.split()?;
        let mut cmd = Command::new(self.resolve(program)?);
        cmd.args(args);

        if let Some(dir) = &self.working_directory {
            cmd.current_dir(dir);
        }
        for (k, v) in &self.env_additions {
            cmd.env(k, v);
        }

        Ok(cmd)
    }

    /// Spawn a command and forget about it.
    ///
    /// Output is discarded and the exit code is never observed. A background
    /// thread reaps the child so it does not linger as a zombie.
    pub fn start(&self, command: &CommandLine) -> Result<(), CommandError> {
        let mut cmd = self.build(command)?;
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        let mut child = cmd
            .spawn()
            .map_err(|e| CommandError::spawn_failed(command.program(), e))?;
        tracing::debug!("Started detached process {} ({})", child.id(), command);

        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }

    /// Run a command to completion on the calling thread and return its stdout.
    ///
    /// Blocks the thread until the child exits.
    pub fn run_blocking(&self, command: &CommandLine) -> Result<String, CommandError> {
        let mut cmd = self.build(command)?;
        cmd.stdin(Stdio::null());

        tracing::debug!("Running blocking: {}", command);
        let output = cmd
            .output()
            .map_err(|e| CommandError::spawn_failed(command.program(), e))?;

        let program = command.program();
        let mut stderr = LineStreamer::new(|line: String| log_stderr_line(program, &line));
        stderr.feed(&output.stderr);
        stderr.close();

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        classify(program, output.status, stdout)
    }

    /// Run a command asynchronously and resolve with its trimmed stdout
    pub async fn run_buffered(&self, command: &CommandLine) -> Result<String, CommandError> {
        let mut stdout = Vec::new();
        let status = self
            .drive(command, |chunk| stdout.extend_from_slice(chunk))
            .await?;

        let text = String::from_utf8_lossy(&stdout).trim().to_string();
        classify(command.program(), status, text)
    }

    /// Run a command asynchronously, calling `handler` once per stdout line.
    ///
    /// Lines are delivered in output order. On a non-zero exit the error is
    /// returned only after every line seen before exit was handled.
    pub async fn run_streamed<H>(&self, command: &CommandLine, mut handler: H) -> Result<(), CommandError>
    where
        H: FnMut(String),
    {
        let mut streamer = LineStreamer::new(|line: String| handler(line));
        let status = self.drive(command, |chunk| streamer.feed(chunk)).await?;
        streamer.close();

        classify(command.program(), status, ())
    }

    /// Spawn asynchronously, push stdout chunks into `on_chunk`, log stderr, wait for exit
    async fn drive<C>(&self, command: &CommandLine, mut on_chunk: C) -> Result<ExitStatus, CommandError>
    where
        C: FnMut(&[u8]),
    {
        let mut cmd = tokio::process::Command::from(self.build(command)?);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let program = command.program();
        tracing::debug!("Spawning: {}", command);
        let mut child = cmd
            .spawn()
            .map_err(|e| CommandError::spawn_failed(program, e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CommandError::Io(std::io::Error::other("Failed to capture stdout")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| CommandError::Io(std::io::Error::other("Failed to capture stderr")))?;

        let read_stdout = read_chunks(stdout, |chunk| on_chunk(chunk));
        let log_stderr = async {
            let mut streamer = LineStreamer::new(|line: String| log_stderr_line(program, &line));
            let result = read_chunks(stderr, |chunk| streamer.feed(chunk)).await;
            streamer.close();
            result
        };

        let (stdout_result, stderr_result) = tokio::join!(read_stdout, log_stderr);
        stdout_result?;
        stderr_result?;

        let status = child.wait().await?;
        tracing::debug!("Process '{}' finished: {}", program, status);
        Ok(status)
    }
}

/// Read a stream to the end, handing each chunk to `on_chunk` as it arrives
async fn read_chunks<R, C>(mut reader: R, mut on_chunk: C) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    C: FnMut(&[u8]),
{
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        on_chunk(&buf[..n]);
    }
}

fn log_stderr_line(program: &str, line: &str) {
    tracing::warn!(program = %program, "stderr: {}", line);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandLine {
        CommandLine::new(["sh", "-c", script]).unwrap()
    }

    #[test]
    fn test_command_line_rejects_empty() {
        let err = CommandLine::new(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, CommandError::EmptyCommand));
    }

    #[test]
    fn test_command_line_parts() {
        let cmd = CommandLine::new(["git", "status", "--short"]).unwrap();
        assert_eq!(cmd.program(), "git");
        let (program, args) = cmd.split().unwrap();
        assert_eq!(program, "git");
        assert_eq!(args, ["status", "--short"]);
        assert_eq!(cmd.to_string(), "git status --short");
    }

    #[test]
    fn test_deserialized_empty_command_is_rejected_at_run() {
        let cmd: CommandLine = serde_json::from_str("[]").unwrap();
        let err = CommandRunner::new().run_blocking(&cmd).unwrap_err();
        assert!(matches!(err, CommandError::EmptyCommand));
    }

    #[test]
    fn test_command_runner_with_env() {
        let runner = CommandRunner::new()
            .with_env("FOO", "bar")
            .with_env("BAZ", "qux");

        assert_eq!(runner.env_additions.get("FOO"), Some(&"bar".to_string()));
        assert_eq!(runner.env_additions.get("BAZ"), Some(&"qux".to_string()));
    }

    #[test]
    fn test_missing_binary_fails_to_spawn() {
        let cmd = CommandLine::new(["nonexistent_command_12345"]).unwrap();
        let err = CommandRunner::new().run_blocking(&cmd).unwrap_err();
        assert!(matches!(err, CommandError::SpawnFailed { .. }));

        let err = tokio_test::block_on(CommandRunner::new().run_buffered(&cmd)).unwrap_err();
        assert!(matches!(err, CommandError::SpawnFailed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_blocking_success() {
        let output = CommandRunner::new().run_blocking(&sh("echo hello")).unwrap();
        assert_eq!(output, "hello\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_blocking_failure_mentions_code() {
        let err = CommandRunner::new().run_blocking(&sh("exit 1")).unwrap_err();
        assert_eq!(err.exit_code(), Some(1));
        assert!(err.to_string().contains('1'));
    }

    #[cfg(unix)]
    #[test]
    fn test_env_and_working_directory_applied() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), b"").unwrap();

        let runner = CommandRunner::new()
            .with_env("PROCBRIDGE_TEST", "bar")
            .with_working_directory(dir.path());

        let output = runner.run_blocking(&sh("printf %s \"$PROCBRIDGE_TEST\"")).unwrap();
        assert_eq!(output, "bar");

        let output = runner.run_blocking(&sh("ls")).unwrap();
        assert!(output.contains("marker.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_program_found_in_configured_path() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("procbridge-greeter");
        std::fs::write(&tool, "#!/bin/sh\necho greetings\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let cmd = CommandLine::new(["procbridge-greeter"]).unwrap();
        let err = CommandRunner::new().run_blocking(&cmd).unwrap_err();
        assert!(matches!(err, CommandError::SpawnFailed { .. }));

        let runner = CommandRunner::new().with_env("PATH", dir.path().to_string_lossy());
        assert_eq!(runner.run_blocking(&cmd).unwrap(), "greetings\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_start_fire_and_forget() {
        assert!(CommandRunner::new().start(&sh("exit 3")).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_buffered_trims_and_ignores_stderr() {
        let runner = CommandRunner::new();
        let output = tokio_test::block_on(runner.run_buffered(&sh(
            "printf '  first\\n'; echo oops 1>&2; printf 'second  \\n\\n'",
        )))
        .unwrap();
        assert_eq!(output, "first\nsecond");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_buffered_non_zero_exit() {
        let runner = CommandRunner::new();
        let err = tokio_test::block_on(runner.run_buffered(&sh("echo partial; exit 4"))).unwrap_err();
        assert_eq!(err.exit_code(), Some(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_streamed_delivers_lines_in_order() {
        let runner = CommandRunner::new();
        let mut lines = Vec::new();
        tokio_test::block_on(runner.run_streamed(&sh("printf 'one\\ntwo\\nthree\\n'"), |line| {
            lines.push(line)
        }))
        .unwrap();
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_streamed_flushes_unterminated_last_line() {
        let runner = CommandRunner::new();
        let mut lines = Vec::new();
        tokio_test::block_on(runner.run_streamed(&sh("printf 'a\\nb'"), |line| lines.push(line)))
            .unwrap();
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_streamed_rejects_after_handling_lines() {
        let runner = CommandRunner::new();
        let mut lines = Vec::new();
        let result = tokio_test::block_on(
            runner.run_streamed(&sh("printf 'x\\ny\\n'; exit 2"), |line| lines.push(line)),
        );
        let err = result.unwrap_err();
        assert_eq!(err.exit_code(), Some(2));
        assert_eq!(lines, vec!["x", "y"]);
    }
}
