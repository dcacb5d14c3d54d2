use crate::connection::{Connector, DiscordConnector, PresenceConnection};
use ampresence_core::{Error, PresencePayload, PresencePublisher, Result};
use tracing::{debug, info, warn};

/// Connection lifecycle. `Disposed` reconnects on the next publish.
enum Handle {
    Uninitialized,
    Connected(Box<dyn PresenceConnection>),
    Disposed,
}

/// Presence publisher with lazy connect and duplicate suppression
pub struct RichPresencePublisher {
    client_id: String,
    connector: Box<dyn Connector>,
    handle: Handle,
    /// Payload currently shown, `None` once cleared or disconnected
    last_published: Option<PresencePayload>,
}

impl RichPresencePublisher {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self::with_connector(client_id, Box::new(DiscordConnector))
    }

    pub fn with_connector(client_id: impl Into<String>, connector: Box<dyn Connector>) -> Self {
        Self {
            client_id: client_id.into(),
            connector,
            handle: Handle::Uninitialized,
            last_published: None,
        }
    }

    fn connection(&mut self) -> Result<&mut Box<dyn PresenceConnection>> {
        if !matches!(self.handle, Handle::Connected(_)) {
            if matches!(self.handle, Handle::Disposed) {
                debug!("Reinitializing presence connection");
            }
            let connection = self.connector.connect(&self.client_id)?;
            self.handle = Handle::Connected(connection);
            info!("Presence connection established");
        }

        match &mut self.handle {
            Handle::Connected(connection) => Ok(connection),
            _ => Err(Error::publish("presence connection unavailable")),
        }
    }

    /// Close after a transport failure so the next call reconnects
    fn drop_connection(&mut self) {
        if let Handle::Connected(mut connection) = std::mem::replace(&mut self.handle, Handle::Disposed) {
            connection.close();
        }
        self.last_published = None;
    }
}

impl PresencePublisher for RichPresencePublisher {
    fn is_connected(&self) -> bool {
        matches!(self.handle, Handle::Connected(_))
    }

    fn is_displaying(&self) -> bool {
        self.last_published.is_some()
    }

    fn publish(&mut self, payload: &PresencePayload) -> Result<bool> {
        if self.is_connected() && self.last_published.as_ref() == Some(payload) {
            return Ok(false);
        }

        let result = self.connection()?.set_activity(payload);
        match result {
            Ok(()) => {
                self.last_published = Some(payload.clone());
                Ok(true)
            }
            Err(e) => {
                self.drop_connection();
                Err(e)
            }
        }
    }

    fn clear(&mut self) -> Result<()> {
        if self.last_published.is_none() {
            return Ok(());
        }

        let result = match &mut self.handle {
            Handle::Connected(connection) => connection.clear_activity(),
            _ => Ok(()),
        };
        match result {
            Ok(()) => {
                self.last_published = None;
                Ok(())
            }
            Err(e) => {
                warn!("Clearing presence failed, dropping connection");
                self.drop_connection();
                Err(e)
            }
        }
    }

    fn teardown(&mut self) {
        if let Handle::Connected(mut connection) = std::mem::replace(&mut self.handle, Handle::Disposed) {
            if self.last_published.is_some() {
                if let Err(e) = connection.clear_activity() {
                    debug!("Clearing presence before disconnect failed: {}", e);
                }
            }
            connection.close();
            debug!("Presence connection disposed");
        }
        self.last_published = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls {
        connects: usize,
        sets: Vec<PresencePayload>,
        clears: usize,
        closes: usize,
        fail_connect: bool,
        fail_set: bool,
    }

    struct FakeConnector(Arc<Mutex<Calls>>);

    struct FakeConnection(Arc<Mutex<Calls>>);

    impl Connector for FakeConnector {
        fn connect(&self, client_id: &str) -> Result<Box<dyn PresenceConnection>> {
            assert_eq!(client_id, "1234");
            let mut calls = self.0.lock().unwrap();
            if calls.fail_connect {
                return Err(Error::publish("Discord is not running"));
            }
            calls.connects += 1;
            Ok(Box::new(FakeConnection(self.0.clone())))
        }
    }

    impl PresenceConnection for FakeConnection {
        fn set_activity(&mut self, payload: &PresencePayload) -> Result<()> {
            let mut calls = self.0.lock().unwrap();
            if calls.fail_set {
                return Err(Error::publish("broken pipe"));
            }
            calls.sets.push(payload.clone());
            Ok(())
        }

        fn clear_activity(&mut self) -> Result<()> {
            self.0.lock().unwrap().clears += 1;
            Ok(())
        }

        fn close(&mut self) {
            self.0.lock().unwrap().closes += 1;
        }
    }

    fn publisher() -> (RichPresencePublisher, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let publisher = RichPresencePublisher::with_connector("1234", Box::new(FakeConnector(calls.clone())));
        (publisher, calls)
    }

    fn payload(title: &str) -> PresencePayload {
        PresencePayload {
            state: "Pink Floyd".to_string(),
            details: title.to_string(),
            large_image_url: None,
            large_image_caption: title.to_string(),
            small_image_key: "image_small".to_string(),
            end_timestamp: Utc.timestamp_opt(1_700_000_210, 0).unwrap(),
        }
    }

    #[test]
    fn test_connects_lazily_once() {
        let (mut publisher, calls) = publisher();
        assert!(!publisher.is_connected());

        assert!(publisher.publish(&payload("Time")).unwrap());
        assert!(publisher.publish(&payload("Money")).unwrap());

        assert!(publisher.is_connected());
        assert!(publisher.is_displaying());
        let calls = calls.lock().unwrap();
        assert_eq!(calls.connects, 1);
        assert_eq!(calls.sets.len(), 2);
    }

    #[test]
    fn test_identical_payload_is_skipped() {
        let (mut publisher, calls) = publisher();

        assert!(publisher.publish(&payload("Time")).unwrap());
        assert!(!publisher.publish(&payload("Time")).unwrap());
        assert_eq!(calls.lock().unwrap().sets.len(), 1);

        // After a clear the same payload is shown again
        publisher.clear().unwrap();
        assert!(publisher.publish(&payload("Time")).unwrap());
        assert_eq!(calls.lock().unwrap().sets.len(), 2);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (mut publisher, calls) = publisher();
        publisher.clear().unwrap();
        assert_eq!(calls.lock().unwrap().connects, 0);

        publisher.publish(&payload("Time")).unwrap();
        publisher.clear().unwrap();
        publisher.clear().unwrap();

        assert!(!publisher.is_displaying());
        assert_eq!(calls.lock().unwrap().clears, 1);
    }

    #[test]
    fn test_teardown_then_reconnect() {
        let (mut publisher, calls) = publisher();
        publisher.publish(&payload("Time")).unwrap();

        publisher.teardown();
        publisher.teardown();
        assert!(!publisher.is_connected());
        assert!(!publisher.is_displaying());
        assert_eq!(calls.lock().unwrap().closes, 1);

        assert!(publisher.publish(&payload("Time")).unwrap());
        let calls = calls.lock().unwrap();
        assert_eq!(calls.connects, 2);
        assert_eq!(calls.sets.len(), 2);
    }

    #[test]
    fn test_failed_set_drops_connection() {
        let (mut publisher, calls) = publisher();
        publisher.publish(&payload("Time")).unwrap();

        calls.lock().unwrap().fail_set = true;
        assert!(publisher.publish(&payload("Money")).is_err());
        assert!(!publisher.is_connected());
        assert_eq!(calls.lock().unwrap().closes, 1);

        calls.lock().unwrap().fail_set = false;
        assert!(publisher.publish(&payload("Money")).unwrap());
        assert_eq!(calls.lock().unwrap().connects, 2);
    }

    #[test]
    fn test_connect_failure_is_publish_error() {
        let (mut publisher, calls) = publisher();
        calls.lock().unwrap().fail_connect = true;

        let err = publisher.publish(&payload("Time")).unwrap_err();
        assert!(matches!(err, Error::PresencePublishFailed { .. }));
        assert!(!err.is_fatal());
        assert!(!publisher.is_connected());
    }
}
