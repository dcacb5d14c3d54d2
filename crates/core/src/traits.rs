use crate::error::Result;
use crate::models::{PlayerState, PresencePayload, TrackInfo};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Checks whether the media application process exists
#[async_trait]
pub trait ProcessProbe: Send + Sync {
    /// `Err(Error::EnvironmentUnavailable)` when the probe itself cannot run
    async fn is_running(&self) -> Result<bool>;
}

/// Reads playback state from the media application
#[async_trait]
pub trait PlayerBridge: Send + Sync {
    async fn player_state(&self) -> Result<PlayerState>;

    async fn now_playing(&self) -> Result<TrackInfo>;

    /// Current playback position in seconds
    async fn player_position(&self) -> Result<f64>;
}

/// Looks up a cover image URL for a track
#[async_trait]
pub trait ArtworkResolver: Send + Sync {
    async fn resolve(&self, artist: &str, title: &str, album: &str) -> Result<String>;
}

/// Connection to the presence service
pub trait PresencePublisher: Send {
    /// Whether a live connection is held
    fn is_connected(&self) -> bool;

    /// Whether a presence is currently shown
    fn is_displaying(&self) -> bool;

    /// Push a payload, connecting first if needed.
    ///
    /// Returns `Ok(false)` when the payload equals the last one sent and was skipped.
    fn publish(&mut self, payload: &PresencePayload) -> Result<bool>;

    /// Remove the shown presence. No-op when nothing is shown.
    fn clear(&mut self) -> Result<()>;

    /// Close the connection. The next publish reconnects.
    fn teardown(&mut self);
}

/// Source of wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
