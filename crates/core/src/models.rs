use crate::error::{BridgeStage, Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position jump (in seconds) beyond which playback is considered scrubbed
pub const DRIFT_THRESHOLD_SECS: f64 = 3.0;

/// Number of fields the now-playing script emits, one per line
const NOW_PLAYING_FIELDS: usize = 5;

/// Player state as reported by the media application
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayerState {
    Playing,
    /// Paused, stopped, fast forwarding... anything that is not plain playback
    Other(String),
}

impl PlayerState {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "playing" => PlayerState::Playing,
            other => PlayerState::Other(other.to_string()),
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlayerState::Playing)
    }

    pub fn as_str(&self) -> &str {
        match self {
            PlayerState::Playing => "playing",
            PlayerState::Other(raw) => raw,
        }
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Track metadata read from the media application
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Library database id, the de-duplication key
    pub track_id: String,
    pub title: String,
    pub album: String,
    pub artist: String,
    pub duration_secs: f64,
}

impl TrackInfo {
    /// Parse the newline separated reply of the now-playing script.
    ///
    /// Fields are positional: id, name, album, artist, duration.
    pub fn parse(output: &str) -> Result<Self> {
        let fields: Vec<&str> = output.trim().split('\n').map(|f| f.trim_end_matches('\r')).collect();

        if fields.len() != NOW_PLAYING_FIELDS {
            return Err(Error::bridge(
                BridgeStage::NowPlaying,
                format!("expected {} fields, got {}", NOW_PLAYING_FIELDS, fields.len()),
            ));
        }

        let track_id = fields[0].trim();
        if track_id.is_empty() {
            return Err(Error::bridge(BridgeStage::NowPlaying, "empty track id"));
        }

        let duration_secs = parse_seconds(fields[4])
            .map_err(|reason| Error::bridge(BridgeStage::NowPlaying, reason))?;

        Ok(TrackInfo {
            track_id: track_id.to_string(),
            title: fields[1].to_string(),
            album: fields[2].to_string(),
            artist: fields[3].to_string(),
            duration_secs,
        })
    }

    /// Search term used for artwork lookup
    pub fn search_query(&self) -> String {
        format!("{} {} {}", self.artist, self.title, self.album)
    }
}

/// Parse a seconds value printed by the scripting bridge.
///
/// AppleScript prints reals with the user's decimal separator, so both
/// `12.5` and `12,5` are accepted.
pub fn parse_seconds(raw: &str) -> std::result::Result<f64, String> {
    let normalized = raw.trim().replace(',', ".");
    let value: f64 = normalized
        .parse()
        .map_err(|_| format!("invalid seconds value '{}'", raw.trim()))?;

    if !value.is_finite() {
        return Err(format!("invalid seconds value '{}'", raw.trim()));
    }
    Ok(value)
}

/// Track metadata together with a position sample taken in the same tick
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackSnapshot {
    pub track: TrackInfo,
    pub position_secs: f64,
    pub captured_at: DateTime<Utc>,
}

impl PlaybackSnapshot {
    pub fn new(track: TrackInfo, position_secs: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            track,
            position_secs,
            captured_at,
        }
    }

    /// Wall-clock time at which the track is expected to finish
    pub fn end_timestamp(&self) -> DateTime<Utc> {
        end_timestamp(self.captured_at, self.track.duration_secs, self.position_secs)
    }
}

/// `captured_at + (duration - position)`, truncated to whole seconds.
///
/// Remaining time never goes negative. A remaining time chrono cannot
/// represent falls back to `captured_at`.
pub fn end_timestamp(captured_at: DateTime<Utc>, duration_secs: f64, position_secs: f64) -> DateTime<Utc> {
    let remaining_ms = ((duration_secs - position_secs).max(0.0) * 1000.0).round() as i64;
    let end = Duration::try_milliseconds(remaining_ms)
        .and_then(|remaining| captured_at.checked_add_signed(remaining))
        .unwrap_or(captured_at);
    DateTime::from_timestamp(end.timestamp(), 0).unwrap_or(end)
}

/// Poll loop state carried from one tick to the next
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoopState {
    /// Empty means no track is current
    pub current_track_id: String,
    pub last_known_position_secs: f64,
    pub last_sample_time: DateTime<Utc>,
}

impl LoopState {
    pub fn has_track(&self) -> bool {
        !self.current_track_id.is_empty()
    }

    /// Forget the current track, keeping the last sample
    pub fn reset(self) -> Self {
        Self {
            current_track_id: String::new(),
            ..self
        }
    }

    /// Where playback should be now if nothing was scrubbed
    pub fn expected_position(&self, now: DateTime<Utc>) -> f64 {
        let elapsed = (now - self.last_sample_time).num_milliseconds() as f64 / 1000.0;
        self.last_known_position_secs + elapsed
    }

    /// Signed difference between the sampled and the extrapolated position
    pub fn drift(&self, actual_position_secs: f64, now: DateTime<Utc>) -> f64 {
        actual_position_secs - self.expected_position(now)
    }

    pub fn has_drifted(&self, actual_position_secs: f64, now: DateTime<Utc>) -> bool {
        self.drift(actual_position_secs, now).abs() > DRIFT_THRESHOLD_SECS
    }
}

/// Status payload pushed to the presence service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresencePayload {
    /// Artist line
    pub state: String,
    /// Title line
    pub details: String,
    /// `None` when no artwork could be resolved
    pub large_image_url: Option<String>,
    pub large_image_caption: String,
    pub small_image_key: String,
    pub end_timestamp: DateTime<Utc>,
}

impl PresencePayload {
    pub fn from_snapshot(snapshot: &PlaybackSnapshot, artwork_url: Option<String>, small_image_key: &str) -> Self {
        Self {
            state: snapshot.track.artist.clone(),
            details: snapshot.track.title.clone(),
            large_image_url: artwork_url,
            large_image_caption: snapshot.track.title.clone(),
            small_image_key: small_image_key.to_string(),
            end_timestamp: snapshot.end_timestamp(),
        }
    }
}

/// Loop phase entered by a tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    AppNotRunning,
    Paused,
    PlayingSameTrack,
    PlayingNewTrack,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::AppNotRunning => "app not running",
            Phase::Paused => "paused",
            Phase::PlayingSameTrack => "playing same track",
            Phase::PlayingNewTrack => "playing new track",
        }
    }
}
