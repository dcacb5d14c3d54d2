use std::fmt;

/// The external call a bridge failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeStage {
    ProcessProbe,
    PlayerState,
    NowPlaying,
    PlayerPosition,
}

impl BridgeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeStage::ProcessProbe => "process probe",
            BridgeStage::PlayerState => "player state query",
            BridgeStage::NowPlaying => "now playing query",
            BridgeStage::PlayerPosition => "player position query",
        }
    }
}

impl fmt::Display for BridgeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures surfaced by the presence pipeline.
///
/// Only [`Error::EnvironmentUnavailable`] and [`Error::Config`] stop the
/// program; everything else is logged and retried on the next tick.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot determine whether {process} is running: {reason}")]
    EnvironmentUnavailable { process: String, reason: String },

    #[error("{stage} failed: {reason}")]
    BridgeCallFailed { stage: BridgeStage, reason: String },

    #[error("no artwork found for '{query}'")]
    ArtworkNotFound { query: String },

    #[error("artwork lookup failed: {reason}")]
    ArtworkLookupFailed { reason: String },

    #[error("presence publish failed: {reason}")]
    PresencePublishFailed { reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn bridge(stage: BridgeStage, reason: impl fmt::Display) -> Self {
        Error::BridgeCallFailed {
            stage,
            reason: reason.to_string(),
        }
    }

    pub fn publish(reason: impl fmt::Display) -> Self {
        Error::PresencePublishFailed {
            reason: reason.to_string(),
        }
    }

    /// Whether the poll loop has to give up on this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::EnvironmentUnavailable { .. } | Error::Config(_)
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_environment_and_config_are_fatal() {
        let fatal = Error::EnvironmentUnavailable {
            process: "Music".to_string(),
            reason: "pgrep not found".to_string(),
        };
        assert!(fatal.is_fatal());
        assert!(Error::Config("DISCORD_CLIENT_ID is not set".to_string()).is_fatal());

        assert!(!Error::bridge(BridgeStage::NowPlaying, "exit status 1").is_fatal());
        assert!(!Error::ArtworkNotFound { query: "a b c".to_string() }.is_fatal());
        assert!(!Error::publish("pipe closed").is_fatal());
    }

    #[test]
    fn test_bridge_error_names_stage() {
        let err = Error::bridge(BridgeStage::PlayerPosition, "timed out");
        assert_eq!(err.to_string(), "player position query failed: timed out");
    }
}
