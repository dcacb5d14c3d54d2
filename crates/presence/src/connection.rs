use ampresence_core::{Error, PresencePayload, Result};
use discord_rich_presence::{activity, DiscordIpc, DiscordIpcClient};
use tracing::debug;

/// A live session with the presence service
pub trait PresenceConnection: Send {
    fn set_activity(&mut self, payload: &PresencePayload) -> Result<()>;

    fn clear_activity(&mut self) -> Result<()>;

    /// Close the session. Must not be used afterwards.
    fn close(&mut self);
}

/// Opens presence sessions for an application id
pub trait Connector: Send {
    fn connect(&self, client_id: &str) -> Result<Box<dyn PresenceConnection>>;
}

pub struct DiscordConnector;

impl Connector for DiscordConnector {
    fn connect(&self, client_id: &str) -> Result<Box<dyn PresenceConnection>> {
        let mut client = DiscordIpcClient::new(client_id).map_err(Error::publish)?;
        client.connect().map_err(Error::publish)?;
        debug!("Connected to Discord IPC");
        Ok(Box::new(DiscordConnection { client }))
    }
}

struct DiscordConnection {
    client: DiscordIpcClient,
}

impl PresenceConnection for DiscordConnection {
    fn set_activity(&mut self, payload: &PresencePayload) -> Result<()> {
        let mut assets = activity::Assets::new()
            .large_text(&payload.large_image_caption)
            .small_image(&payload.small_image_key);
        if let Some(url) = payload.large_image_url.as_deref() {
            assets = assets.large_image(url);
        }

        let activity = activity::Activity::new()
            .state(&payload.state)
            .details(&payload.details)
            .assets(assets)
            .timestamps(activity::Timestamps::new().end(payload.end_timestamp.timestamp()));

        self.client.set_activity(activity).map_err(Error::publish)
    }

    fn clear_activity(&mut self) -> Result<()> {
        self.client.clear_activity().map_err(Error::publish)
    }

    fn close(&mut self) {
        if let Err(e) = self.client.close() {
            debug!("Discord IPC close failed: {}", e);
        }
    }
}
