//! Poll loop controller
//!
//! Each tick probes the media application, reads its playback state and
//! decides whether the presence needs to be published, cleared or left alone.
//! All external collaborators are injected so the transition logic can be
//! driven by fakes.

use crate::config::Config;
use crate::error::Result;
use crate::models::{LoopState, Phase, PlaybackSnapshot, PlayerState, PresencePayload, TrackInfo};
use crate::traits::{ArtworkResolver, Clock, PlayerBridge, PresencePublisher, ProcessProbe};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Timing and display settings for the controller
#[derive(Clone, Debug)]
pub struct ControllerSettings {
    pub process_name: String,
    pub small_image_key: String,
    pub poll_interval: Duration,
    pub idle_interval: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            process_name: "Music".to_string(),
            small_image_key: "image_small".to_string(),
            poll_interval: Duration::from_secs(1),
            idle_interval: Duration::from_secs(5),
        }
    }
}

impl From<&Config> for ControllerSettings {
    fn from(config: &Config) -> Self {
        Self {
            process_name: config.process_name.clone(),
            small_image_key: config.small_image_key.clone(),
            poll_interval: config.poll_interval,
            idle_interval: config.idle_interval,
        }
    }
}

/// What a tick did and how long to wait before the next one
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickOutcome {
    /// `None` when a non-fatal failure left the state unknown
    pub phase: Option<Phase>,
    pub delay: Duration,
}

pub struct Controller {
    probe: Box<dyn ProcessProbe>,
    bridge: Box<dyn PlayerBridge>,
    artwork: Box<dyn ArtworkResolver>,
    publisher: Box<dyn PresencePublisher>,
    clock: Box<dyn Clock>,
    settings: ControllerSettings,
    last_phase: Option<Phase>,
    /// Last successfully resolved artwork, keyed by track id
    artwork_cache: Option<(String, String)>,
    /// A same-track publish failed and is owed on the next tick
    pending_publish: bool,
}

impl Controller {
    pub fn new(
        probe: Box<dyn ProcessProbe>,
        bridge: Box<dyn PlayerBridge>,
        artwork: Box<dyn ArtworkResolver>,
        publisher: Box<dyn PresencePublisher>,
        clock: Box<dyn Clock>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            probe,
            bridge,
            artwork,
            publisher,
            clock,
            settings,
            last_phase: None,
            artwork_cache: None,
            pending_publish: false,
        }
    }

    /// Run ticks forever, sleeping between them.
    ///
    /// Returns only on a fatal error, after tearing the publisher down.
    pub async fn run(&mut self, mut state: LoopState) -> Result<()> {
        loop {
            match self.tick(state).await {
                Ok((next, outcome)) => {
                    state = next;
                    tokio::time::sleep(outcome.delay).await;
                }
                Err(e) => {
                    error!("Giving up: {}", e);
                    self.shutdown();
                    return Err(e);
                }
            }
        }
    }

    /// Clear any shown presence and close the connection
    pub fn shutdown(&mut self) {
        if self.publisher.is_displaying() {
            if let Err(e) = self.publisher.clear() {
                warn!("Failed to clear presence on shutdown: {}", e);
            }
        }
        if self.publisher.is_connected() {
            self.publisher.teardown();
            info!("Presence connection closed");
        }
    }

    /// Perform one poll step.
    ///
    /// Only fatal errors are returned; everything else is logged and the
    /// state is handed back unchanged so the next tick retries.
    pub async fn tick(&mut self, state: LoopState) -> Result<(LoopState, TickOutcome)> {
        match self.probe.is_running().await {
            Ok(true) => {}
            Ok(false) => return Ok(self.app_not_running(state)),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Could not check whether {} is running: {}", self.settings.process_name, e);
                return Ok(self.retry(state));
            }
        }

        let player_state = match self.bridge.player_state().await {
            Ok(player_state) => player_state,
            Err(e) => {
                warn!("Could not read player state: {}", e);
                return Ok(self.retry(state));
            }
        };

        if !player_state.is_playing() {
            return Ok(self.paused(state, &player_state));
        }

        let track = match self.bridge.now_playing().await {
            Ok(track) => track,
            Err(e) => {
                warn!("Could not read the current track: {}", e);
                return Ok(self.retry(state));
            }
        };

        if track.track_id != state.current_track_id {
            Ok(self.new_track(state, track).await)
        } else {
            Ok(self.same_track(state, track).await)
        }
    }

    fn app_not_running(&mut self, state: LoopState) -> (LoopState, TickOutcome) {
        if self.publisher.is_connected() {
            self.publisher.teardown();
            info!("Presence connection closed");
        }

        if self.enter(Phase::AppNotRunning) {
            info!(
                "{} is not running, next check in {:?}",
                self.settings.process_name, self.settings.idle_interval
            );
        }

        self.pending_publish = false;
        (state.reset(), self.outcome(Phase::AppNotRunning, self.settings.idle_interval))
    }

    fn paused(&mut self, state: LoopState, player_state: &PlayerState) -> (LoopState, TickOutcome) {
        if self.publisher.is_displaying() {
            match self.publisher.clear() {
                Ok(()) => info!("Presence cleared"),
                Err(e) => warn!("Failed to clear presence: {}", e),
            }
        }

        if self.enter(Phase::Paused) {
            info!("{} is not playing ({})", self.settings.process_name, player_state);
        }

        self.pending_publish = false;
        (state.reset(), self.outcome(Phase::Paused, self.settings.poll_interval))
    }

    async fn new_track(&mut self, state: LoopState, track: TrackInfo) -> (LoopState, TickOutcome) {
        self.enter(Phase::PlayingNewTrack);

        let position = match self.bridge.player_position().await {
            Ok(position) => position,
            Err(e) => {
                warn!("Could not read player position for new track: {}", e);
                return self.retry(state);
            }
        };

        let snapshot = PlaybackSnapshot::new(track, position, self.clock.now());
        if let Err(e) = self.publish(&snapshot).await {
            // Keep the old id so the next tick tries again
            warn!("Failed to publish new track: {}", e);
            return self.retry(state);
        }
        self.pending_publish = false;

        let next = LoopState {
            current_track_id: snapshot.track.track_id,
            last_known_position_secs: snapshot.position_secs,
            last_sample_time: snapshot.captured_at,
        };
        (next, self.outcome(Phase::PlayingNewTrack, self.settings.poll_interval))
    }

    async fn same_track(&mut self, state: LoopState, track: TrackInfo) -> (LoopState, TickOutcome) {
        self.enter(Phase::PlayingSameTrack);

        let position = match self.bridge.player_position().await {
            Ok(position) => position,
            Err(e) => {
                warn!("Could not read player position: {}", e);
                return self.retry(state);
            }
        };
        let now = self.clock.now();

        let drift = state.drift(position, now);
        let drifted = state.has_drifted(position, now);
        if drifted || self.pending_publish {
            if drifted {
                info!("Player position is off by {:.1}s, updating presence", drift);
            } else {
                info!("Retrying presence update");
            }
            let snapshot = PlaybackSnapshot::new(track, position, now);
            match self.publish(&snapshot).await {
                Ok(()) => self.pending_publish = false,
                Err(e) => {
                    warn!("Failed to publish after seek, retrying next tick: {}", e);
                    self.pending_publish = true;
                }
            }
        } else {
            debug!("Position {:.1}s, drift {:.2}s", position, drift);
        }

        let next = LoopState {
            current_track_id: state.current_track_id,
            last_known_position_secs: position,
            last_sample_time: now,
        };
        (next, self.outcome(Phase::PlayingSameTrack, self.settings.poll_interval))
    }

    async fn publish(&mut self, snapshot: &PlaybackSnapshot) -> Result<()> {
        let artwork_url = self.artwork_for(&snapshot.track).await;
        let payload = PresencePayload::from_snapshot(snapshot, artwork_url, &self.settings.small_image_key);

        if self.publisher.publish(&payload)? {
            info!(
                "Presence set: {} - {} on {}",
                snapshot.track.title, snapshot.track.artist, snapshot.track.album
            );
            if let Some(url) = &payload.large_image_url {
                debug!("Artwork: {}", url);
            }
        } else {
            debug!("Presence unchanged, skipped");
        }
        Ok(())
    }

    /// Resolve artwork, falling back to no image on failure
    async fn artwork_for(&mut self, track: &TrackInfo) -> Option<String> {
        if let Some((track_id, url)) = &self.artwork_cache {
            if *track_id == track.track_id {
                return Some(url.clone());
            }
        }

        match self.artwork.resolve(&track.artist, &track.title, &track.album).await {
            Ok(url) => {
                self.artwork_cache = Some((track.track_id.clone(), url.clone()));
                Some(url)
            }
            Err(e) => {
                warn!("Publishing without artwork: {}", e);
                None
            }
        }
    }

    /// Record the phase, returning whether it changed
    fn enter(&mut self, phase: Phase) -> bool {
        let changed = self.last_phase != Some(phase);
        if changed {
            debug!("Phase: {}", phase.as_str());
        }
        self.last_phase = Some(phase);
        changed
    }

    fn outcome(&self, phase: Phase, delay: Duration) -> TickOutcome {
        TickOutcome {
            phase: Some(phase),
            delay,
        }
    }

    fn retry(&self, state: LoopState) -> (LoopState, TickOutcome) {
        (
            state,
            TickOutcome {
                phase: None,
                delay: self.settings.poll_interval,
            },
        )
    }
}
