//! In-process transport between restricted callers and a privileged endpoint

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use uuid::Uuid;

use super::message::{Envelope, Request, Response};
use super::ProcessHost;
use crate::error::CommandError;

/// Trait for delivering requests to a privileged counterpart
pub trait Messenger: Send + Sync {
    /// Whether the counterpart is still there to receive messages
    fn is_available(&self) -> bool;

    /// Send a request without waiting for an answer
    fn notify(&self, request: Request) -> Result<(), CommandError>;

    /// Send a request and block until the answer arrives
    fn invoke(&self, request: Request) -> Result<Response, CommandError>;
}

/// Messenger backed by a crossbeam channel
#[derive(Debug, Clone)]
pub struct ChannelMessenger {
    sender: Sender<Envelope>,
    alive: Arc<AtomicBool>,
}

impl ChannelMessenger {
    fn send(&self, request: Request, reply: Option<Sender<Response>>) -> Result<Uuid, CommandError> {
        let id = Uuid::new_v4();
        tracing::debug!(%id, "Sending {:?}", request);
        self.sender
            .send(Envelope { id, request, reply })
            .map_err(|_| CommandError::Channel("Privileged endpoint has shut down".to_string()))?;
        Ok(id)
    }
}

impl Messenger for ChannelMessenger {
    fn is_available(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn notify(&self, request: Request) -> Result<(), CommandError> {
        self.send(request, None).map(|_| ())
    }

    fn invoke(&self, request: Request) -> Result<Response, CommandError> {
        let (reply_tx, reply_rx) = bounded(1);
        let id = self.send(request, Some(reply_tx))?;
        reply_rx.recv().map_err(|_| {
            CommandError::Channel(format!("Privileged endpoint dropped request {} without answering", id))
        })
    }
}

/// The privileged side of the bridge: performs requests with a local host
pub struct PrivilegedEndpoint<H: ProcessHost> {
    receiver: Receiver<Envelope>,
    host: H,
    alive: Arc<AtomicBool>,
}

/// Create a connected endpoint/messenger pair
pub fn channel<H: ProcessHost>(host: H) -> (PrivilegedEndpoint<H>, ChannelMessenger) {
    let (sender, receiver) = unbounded();
    let alive = Arc::new(AtomicBool::new(true));
    let endpoint = PrivilegedEndpoint {
        receiver,
        host,
        alive: alive.clone(),
    };
    (endpoint, ChannelMessenger { sender, alive })
}

impl<H: ProcessHost> PrivilegedEndpoint<H> {
    /// Handle requests one at a time until every messenger is dropped or an exit was performed.
    ///
    /// A failed exit leaves the endpoint serving.
    pub fn serve(&self) {
        for Envelope { id, request, reply } in self.receiver.iter() {
            tracing::debug!(%id, "Handling {:?}", request);

            let exiting = matches!(request, Request::Exit { .. });
            let response = self.handle(request);
            let exited = exiting && response == Response::Ack;
            if exited {
                // Unavailable before the caller sees the ack
                self.alive.store(false, Ordering::SeqCst);
            }

            if let Some(reply) = reply {
                if reply.send(response).is_err() {
                    tracing::warn!(%id, "Caller went away before the reply was sent");
                }
            }
            if exited {
                break;
            }
        }
        tracing::debug!("Privileged endpoint stopped");
    }

    fn handle(&self, request: Request) -> Response {
        let result = match request {
            Request::CurrentPid => self.host.current_pid().map(|pid| Response::Pid { pid }),
            Request::Exit { code } => self.host.exit(code).map(|_| Response::Ack),
            Request::Start { command } => self.host.start(&command).map(|_| Response::Ack),
            Request::RunBlocking { command } => self
                .host
                .run_blocking(&command)
                .map(|output| Response::Output { output }),
        };

        result.unwrap_or_else(|e| {
            tracing::warn!("Request failed: {}", e);
            Response::from_error(&e)
        })
    }

    /// Run [`serve`](Self::serve) on a dedicated thread
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>>
    where
        H: 'static,
    {
        std::thread::Builder::new()
            .name("procbridge-endpoint".to_string())
            .spawn(move || self.serve())
    }
}

impl<H: ProcessHost> Drop for PrivilegedEndpoint<H> {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}
