use crate::command::{run_command, CommandError};
use ampresence_core::{BridgeStage, Error, ProcessProbe, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Process probe backed by `pgrep ^<name>$`
pub struct PgrepProbe {
    process_name: String,
    program: String,
    timeout: Duration,
}

impl PgrepProbe {
    pub fn new(process_name: impl Into<String>, timeout: Duration) -> Self {
        Self::with_program("pgrep", process_name, timeout)
    }

    /// Use a different process-listing utility with pgrep's calling convention
    pub fn with_program(program: impl Into<String>, process_name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            process_name: process_name.into(),
            program: program.into(),
            timeout,
        }
    }

    fn pattern(&self) -> String {
        format!("^{}$", self.process_name)
    }

    fn unavailable(&self, reason: impl ToString) -> Error {
        Error::EnvironmentUnavailable {
            process: self.process_name.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl ProcessProbe for PgrepProbe {
    async fn is_running(&self) -> Result<bool> {
        let pattern = self.pattern();
        let output = match run_command(&self.program, &[pattern.as_str()], self.timeout).await {
            Ok(output) => output,
            Err(e @ CommandError::Spawn { .. }) => return Err(self.unavailable(e)),
            Err(e) => return Err(Error::bridge(BridgeStage::ProcessProbe, e)),
        };

        // pgrep: 0 = match, 1 = no match, anything else = the utility itself failed
        match output.status.code() {
            Some(0) | Some(1) => {
                let pids = output.stdout.trim();
                debug!("{} pids: [{}]", self.process_name, pids.replace('\n', ", "));
                Ok(!pids.is_empty())
            }
            _ => Err(self.unavailable(format!(
                "{} exited with {}: {}",
                self.program, output.status, output.stderr
            ))),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_is_anchored() {
        let probe = PgrepProbe::new("Music", Duration::from_secs(1));
        assert_eq!(probe.pattern(), "^Music$");
    }

    #[tokio::test]
    async fn test_missing_utility_is_fatal() {
        let probe = PgrepProbe::with_program("ampresence-no-such-pgrep", "Music", Duration::from_secs(5));
        let err = probe.is_running().await.unwrap_err();

        assert!(matches!(err, Error::EnvironmentUnavailable { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_output_means_running() {
        // echo prints its argument, standing in for a pid
        let probe = PgrepProbe::with_program("echo", "Music", Duration::from_secs(5));
        assert!(probe.is_running().await.unwrap());
    }

    #[tokio::test]
    async fn test_no_output_means_not_running() {
        let probe = PgrepProbe::with_program("true", "Music", Duration::from_secs(5));
        assert!(!probe.is_running().await.unwrap());
    }

    #[tokio::test]
    async fn test_no_match_exit_code() {
        let probe = PgrepProbe::with_program("false", "Music", Duration::from_secs(5));
        assert!(!probe.is_running().await.unwrap());
    }
}
