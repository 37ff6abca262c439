//! Process outcome classification
//!
//! Every spawn variant funnels its exit status through here so that blocking,
//! buffered and streamed runs agree on what counts as failure.

use std::process::ExitStatus;

use crate::error::CommandError;

/// Classify a finished process: exit code 0 keeps the captured output, anything else fails
pub fn classify<T>(program: &str, status: ExitStatus, output: T) -> Result<T, CommandError> {
    classify_code(program, status.code(), output)
}

/// Same as [`classify`], for callers that only have the raw code
pub fn classify_code<T>(program: &str, code: Option<i32>, output: T) -> Result<T, CommandError> {
    match code {
        Some(0) => Ok(output),
        Some(code) => Err(CommandError::NonZeroExit {
            code,
            message: format!("Command '{}' exited with code {}", program, code),
        }),
        None => Err(CommandError::Terminated {
            program: program.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_keeps_output() {
        let result = classify_code("echo", Some(0), "hello".to_string());
        assert_eq!(result.unwrap(), "hello");
    }

    #[test]
    fn test_non_zero_embeds_code() {
        let err = classify_code("false", Some(1), ()).unwrap_err();
        assert_eq!(err.exit_code(), Some(1));
        assert!(err.to_string().contains("code 1"));
        assert!(err.to_string().contains("false"));
    }

    #[test]
    fn test_missing_code_is_terminated() {
        let err = classify_code("sleep", None, ()).unwrap_err();
        assert!(matches!(err, CommandError::Terminated { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_classify_exit_status() {
        use std::os::unix::process::ExitStatusExt;

        assert!(classify("sh", ExitStatus::from_raw(0), ()).is_ok());
        // wait(2) encoding: exit code lives in the second byte
        let err = classify("sh", ExitStatus::from_raw(2 << 8), ()).unwrap_err();
        assert_eq!(err.exit_code(), Some(2));
        // killed by SIGKILL
        let err = classify("sh", ExitStatus::from_raw(9), ()).unwrap_err();
        assert!(matches!(err, CommandError::Terminated { .. }));
    }
}
