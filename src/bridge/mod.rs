//! Privileged / restricted process access
//!
//! Only a privileged context may touch OS process APIs for pid lookup, exit
//! and plain spawns. A restricted context asks a privileged counterpart to do
//! it over a message channel. Callers pick the strategy by holding either a
//! [`LocalHost`] or a [`RemoteHost`] behind the [`ProcessHost`] trait.

mod channel;
mod exit_router;
mod message;

use std::sync::Arc;
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};

use crate::error::CommandError;
use crate::host::{platform, CommandLine, CommandRunner};

pub use channel::{channel, ChannelMessenger, Messenger, PrivilegedEndpoint};
pub use exit_router::{Delivery, ExitRouter, ExitTarget};
pub use message::{Envelope, Request, Response};

/// Which side of the bridge the current code runs on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionContext {
    #[default]
    Privileged,
    Restricted,
}

/// Process operations whose implementation depends on the execution context
pub trait ProcessHost: Send + Sync {
    /// Process id of the current (application) process
    fn current_pid(&self) -> Result<u32, CommandError>;

    /// Terminate the current process with `code`
    fn exit(&self, code: i32) -> Result<(), CommandError>;

    /// Spawn without observing output or exit code
    fn start(&self, command: &CommandLine) -> Result<(), CommandError>;

    /// Spawn, wait, and return stdout on exit code 0
    fn run_blocking(&self, command: &CommandLine) -> Result<String, CommandError>;
}

/// Direct OS access, for privileged contexts
#[derive(Debug, Clone, Default)]
pub struct LocalHost {
    runner: CommandRunner,
}

impl LocalHost {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }
}

impl ProcessHost for LocalHost {
    fn current_pid(&self) -> Result<u32, CommandError> {
        Ok(platform::current_pid())
    }

    fn exit(&self, code: i32) -> Result<(), CommandError> {
        tracing::info!("Exiting with code {}", code);
        std::process::exit(code)
    }

    fn start(&self, command: &CommandLine) -> Result<(), CommandError> {
        self.runner.start(command)
    }

    fn run_blocking(&self, command: &CommandLine) -> Result<String, CommandError> {
        self.runner.run_blocking(command)
    }
}

/// Message-based access, for restricted contexts
///
/// A host built by [`connect_restricted`] owns its endpoint thread. Dropping it
/// closes the channel and waits until the endpoint has handled every request
/// already sent, including one-way starts.
pub struct RemoteHost {
    messenger: Arc<dyn Messenger>,
    exit_router: ExitRouter,
    // Declared last: the messengers above must be gone before the join
    endpoint: EndpointThread,
}

impl RemoteHost {
    pub fn new(messenger: Arc<dyn Messenger>, exit_router: ExitRouter) -> Self {
        Self {
            messenger,
            exit_router,
            endpoint: EndpointThread(None),
        }
    }

    fn with_endpoint(mut self, handle: JoinHandle<()>) -> Self {
        self.endpoint = EndpointThread(Some(handle));
        self
    }
}

struct EndpointThread(Option<JoinHandle<()>>);

impl Drop for EndpointThread {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            if handle.join().is_err() {
                tracing::error!("Privileged endpoint thread panicked");
            }
        }
    }
}

impl ProcessHost for RemoteHost {
    fn current_pid(&self) -> Result<u32, CommandError> {
        self.messenger.invoke(Request::CurrentPid)?.into_pid()
    }

    fn exit(&self, code: i32) -> Result<(), CommandError> {
        self.exit_router.exit(code).map(|_| ())
    }

    fn start(&self, command: &CommandLine) -> Result<(), CommandError> {
        self.messenger.notify(Request::Start {
            command: command.clone(),
        })
    }

    fn run_blocking(&self, command: &CommandLine) -> Result<String, CommandError> {
        self.messenger
            .invoke(Request::RunBlocking {
                command: command.clone(),
            })?
            .into_output()
    }
}

/// Start a privileged endpoint on its own thread and return a restricted host wired to it.
///
/// Exit requests go to the endpoint synchronously.
pub fn connect_restricted(runner: CommandRunner) -> Result<RemoteHost, CommandError> {
    connect_with(LocalHost::new(runner))
}

/// Like [`connect_restricted`], with any host serving the privileged side
pub fn connect_with<H: ProcessHost + 'static>(host: H) -> Result<RemoteHost, CommandError> {
    let (endpoint, messenger) = channel(host);
    let handle = endpoint.spawn()?;

    let messenger: Arc<dyn Messenger> = Arc::new(messenger);
    let exit_router = ExitRouter::new().with_target(ExitTarget::new(
        "endpoint",
        messenger.clone(),
        Delivery::Synchronous,
    ));
    Ok(RemoteHost::new(messenger, exit_router).with_endpoint(handle))
}

/// Build the host for `context`
pub fn host_for(context: ExecutionContext, runner: CommandRunner) -> Result<Box<dyn ProcessHost>, CommandError> {
    match context {
        ExecutionContext::Privileged => Ok(Box::new(LocalHost::new(runner))),
        ExecutionContext::Restricted => Ok(Box::new(connect_restricted(runner)?)),
    }
}
