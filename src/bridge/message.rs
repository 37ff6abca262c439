//! Messages exchanged between a restricted caller and the privileged endpoint

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CommandError;
use crate::host::CommandLine;

/// Operations a restricted context asks the privileged side to perform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    CurrentPid,
    Exit { code: i32 },
    Start { command: CommandLine },
    RunBlocking { command: CommandLine },
}

/// Answer to a synchronous request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pid { pid: u32 },
    Output { output: String },
    Ack,
    Failed { code: Option<i32>, message: String },
}

impl Response {
    pub(crate) fn from_error(err: &CommandError) -> Self {
        Response::Failed {
            code: err.exit_code(),
            message: err.to_string(),
        }
    }

    fn unexpected(self, wanted: &str) -> CommandError {
        match self {
            Response::Failed { code, message } => CommandError::Remote { code, message },
            other => CommandError::Channel(format!("Expected {} response, got {:?}", wanted, other)),
        }
    }

    pub fn into_pid(self) -> Result<u32, CommandError> {
        match self {
            Response::Pid { pid } => Ok(pid),
            other => Err(other.unexpected("pid")),
        }
    }

    pub fn into_output(self) -> Result<String, CommandError> {
        match self {
            Response::Output { output } => Ok(output),
            other => Err(other.unexpected("output")),
        }
    }

    pub fn into_ack(self) -> Result<(), CommandError> {
        match self {
            Response::Ack => Ok(()),
            other => Err(other.unexpected("ack")),
        }
    }
}

/// A request in flight. `reply` is present only for synchronous calls.
#[derive(Debug)]
pub struct Envelope {
    pub id: Uuid,
    pub request: Request,
    pub reply: Option<Sender<Response>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let command = CommandLine::new(["git", "status"]).unwrap();
        let json = serde_json::to_value(Request::RunBlocking { command }).unwrap();
        assert_eq!(json["type"], "run_blocking");
        assert_eq!(json["command"], serde_json::json!(["git", "status"]));

        let parsed: Request = serde_json::from_str(r#"{"type":"exit","code":2}"#).unwrap();
        assert_eq!(parsed, Request::Exit { code: 2 });
    }

    #[test]
    fn test_failed_response_becomes_remote_error() {
        let err = Response::Failed {
            code: Some(1),
            message: "Command 'make' exited with code 1".to_string(),
        }
        .into_output()
        .unwrap_err();

        assert_eq!(err.exit_code(), Some(1));
        assert!(err.to_string().contains("code 1"));
    }

    #[test]
    fn test_mismatched_response_is_channel_error() {
        let err = Response::Ack.into_pid().unwrap_err();
        assert!(matches!(err, CommandError::Channel(_)));
        assert_eq!(Response::Pid { pid: 42 }.into_pid().unwrap(), 42);
    }
}
