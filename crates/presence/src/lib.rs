//! Presence publishing over the Discord IPC socket

mod connection;
mod publisher;

pub use connection::{Connector, DiscordConnector, PresenceConnection};
pub use publisher::RichPresencePublisher;
