//! Ordered fallback chain for exit requests made from a restricted context

use std::fmt;
use std::sync::Arc;

use super::channel::Messenger;
use super::message::Request;
use crate::error::CommandError;

/// How an exit request is handed to a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Fire the request and return immediately
    OneWay,
    /// Wait for the target to acknowledge
    Synchronous,
}

/// One privileged counterpart that may be able to perform an exit
#[derive(Clone)]
pub struct ExitTarget {
    name: String,
    messenger: Arc<dyn Messenger>,
    delivery: Delivery,
}

impl ExitTarget {
    pub fn new(name: impl Into<String>, messenger: Arc<dyn Messenger>, delivery: Delivery) -> Self {
        Self {
            name: name.into(),
            messenger,
            delivery,
        }
    }
}

impl fmt::Debug for ExitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExitTarget")
            .field("name", &self.name)
            .field("delivery", &self.delivery)
            .field("available", &self.messenger.is_available())
            .finish()
    }
}

/// Tries each target in order; the first available one receives the request
#[derive(Debug, Clone, Default)]
pub struct ExitRouter {
    targets: Vec<ExitTarget>,
}

impl ExitRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a target at the lowest priority so far
    pub fn with_target(mut self, target: ExitTarget) -> Self {
        self.targets.push(target);
        self
    }

    /// Forward an exit request and return the name of the target that took it.
    ///
    /// Delivery failures on the chosen target are returned as-is; later
    /// targets are only consulted when earlier ones are unavailable.
    pub fn exit(&self, code: i32) -> Result<&str, CommandError> {
        let target = self
            .targets
            .iter()
            .find(|t| {
                let available = t.messenger.is_available();
                if !available {
                    tracing::debug!("Exit target '{}' unavailable, trying next", t.name);
                }
                available
            })
            .ok_or(CommandError::NoPrivilegedTarget)?;

        tracing::info!("Forwarding exit({}) to '{}'", code, target.name);
        match target.delivery {
            Delivery::OneWay => target.messenger.notify(Request::Exit { code })?,
            Delivery::Synchronous => target.messenger.invoke(Request::Exit { code })?.into_ack()?,
        }
        Ok(target.name.as_str())
    }
}
