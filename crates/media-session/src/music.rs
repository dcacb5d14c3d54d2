//! Music.app queries over AppleScript

use crate::script::{OsaScript, Script};
use ampresence_core::{parse_seconds, BridgeStage, Error, PlayerBridge, PlayerState, Result, TrackInfo};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub struct MusicAppBridge {
    app_name: String,
    runner: OsaScript,
}

impl MusicAppBridge {
    pub fn new(app_name: impl Into<String>, timeout: Duration) -> Self {
        Self::with_runner(app_name, OsaScript::new(timeout))
    }

    pub fn with_runner(app_name: impl Into<String>, runner: OsaScript) -> Self {
        Self {
            app_name: app_name.into(),
            runner,
        }
    }

    async fn query(&self, stage: BridgeStage, script: Script) -> Result<String> {
        let output = self
            .runner
            .run(&script)
            .await
            .map_err(|e| Error::bridge(stage, e))?;
        debug!("{}: {:?}", stage, output);
        Ok(output)
    }
}

fn tell(app_name: &str) -> String {
    format!("tell application \"{}\"", app_name)
}

fn player_state_script(app_name: &str) -> Script {
    Script::new([tell(app_name), "get player state".to_string(), "end tell".to_string()])
}

/// Emits id, name, album, artist and duration, one per line, in that order
fn now_playing_script(app_name: &str) -> Script {
    Script::new([
        "set output to \"\"".to_string(),
        tell(app_name),
        "set t_id to database id of current track".to_string(),
        "set t_name to name of current track".to_string(),
        "set t_album to album of current track".to_string(),
        "set t_artist to artist of current track".to_string(),
        "set t_duration to duration of current track".to_string(),
        "set output to \"\" & t_id & linefeed & t_name & linefeed & t_album & linefeed & t_artist & linefeed & t_duration"
            .to_string(),
        "end tell".to_string(),
        "return output".to_string(),
    ])
}

fn player_position_script(app_name: &str) -> Script {
    Script::new([
        tell(app_name),
        "set t_pos to player position".to_string(),
        "return t_pos".to_string(),
        "end tell".to_string(),
    ])
}

#[async_trait]
impl PlayerBridge for MusicAppBridge {
    async fn player_state(&self) -> Result<PlayerState> {
        let output = self
            .query(BridgeStage::PlayerState, player_state_script(&self.app_name))
            .await?;
        Ok(PlayerState::parse(&output))
    }

    async fn now_playing(&self) -> Result<TrackInfo> {
        let output = self
            .query(BridgeStage::NowPlaying, now_playing_script(&self.app_name))
            .await?;
        TrackInfo::parse(&output)
    }

    async fn player_position(&self) -> Result<f64> {
        let output = self
            .query(BridgeStage::PlayerPosition, player_position_script(&self.app_name))
            .await?;
        parse_seconds(&output).map_err(|reason| Error::bridge(BridgeStage::PlayerPosition, reason))
    }
}
