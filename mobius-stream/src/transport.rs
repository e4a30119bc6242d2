//! Publish/subscribe transports delivering notifications
//!
//! [`NotificationTransport`] is the seam between the listener and the wire.
//! [`MqttTransport`] talks to the CSE's MQTT broker; [`MemoryTransport`] delivers
//! messages pushed through a [`MemoryBroker`] handle and is used wherever a real
//! broker is not available.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use onem2m_client::SubscriptionConfig;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    SubscribeReasonCode,
};
use tokio::sync::mpsc;

use crate::error::{Result, StreamError};

/// Capacity of the request queue between the MQTT client handle and its event loop
const REQUEST_CAPACITY: usize = 16;

/// How long a disconnect may take to flush before the connection is dropped
const DISCONNECT_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// One publish received from the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// A long-lived publish/subscribe connection.
///
/// The listener calls `connect`, then `subscribe`, then `next_message` until it is
/// told to stop, and finally `disconnect`. Implementations never reconnect on their own.
#[async_trait]
pub trait NotificationTransport: Send {
    /// Open the connection. Resolves once the broker accepted it.
    async fn connect(&mut self) -> Result<()>;

    /// Subscribe to a topic filter on the open connection
    async fn subscribe(&mut self, topic: &str) -> Result<()>;

    /// Wait for the next inbound publish.
    ///
    /// Returns `Ok(None)` once the connection was closed cleanly.
    async fn next_message(&mut self) -> Result<Option<InboundMessage>>;

    /// Close the connection. Calling it on a closed transport is a no-op.
    async fn disconnect(&mut self) -> Result<()>;
}

struct MqttSession {
    client: AsyncClient,
    eventloop: EventLoop,
}

/// MQTT transport backed by `rumqttc`
pub struct MqttTransport {
    host: String,
    port: u16,
    client_id: String,
    keep_alive: Duration,
    connect_timeout: Duration,
    max_packet_size: usize,
    topic: Option<String>,
    session: Option<MqttSession>,
}

impl MqttTransport {
    /// Transport for the broker of the configured CSE
    pub fn new(config: &SubscriptionConfig) -> Self {
        Self {
            host: config.host().to_string(),
            port: config.transport_port(),
            client_id: config.mqtt_client_id().to_string(),
            keep_alive: config.keep_alive(),
            connect_timeout: config.connect_timeout(),
            max_packet_size: config.max_packet_size(),
            topic: None,
            session: None,
        }
    }

    /// Broker address as `host:port`
    pub fn broker_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransport")
            .field("broker", &self.broker_address())
            .field("client_id", &self.client_id)
            .field("connected", &self.session.is_some())
            .finish()
    }
}

#[async_trait]
impl NotificationTransport for MqttTransport {
    async fn connect(&mut self) -> Result<()> {
        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        options.set_max_packet_size(self.max_packet_size, self.max_packet_size);

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        let handshake = async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => return Ok(ack),
                    Ok(_) => continue,
                    Err(e) => return Err(StreamError::ConnectFailed(e.to_string())),
                }
            }
        };

        let ack = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| {
                StreamError::ConnectFailed(format!(
                    "no answer from {} within {:?}",
                    self.broker_address(),
                    self.connect_timeout
                ))
            })??;

        if ack.code != ConnectReturnCode::Success {
            return Err(StreamError::ConnectFailed(format!(
                "broker refused connection: {:?}",
                ack.code
            )));
        }

        self.session = Some(MqttSession { client, eventloop });
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        // The event loop is not Sync, so only the client handle may live across the await
        let client = self
            .session
            .as_ref()
            .map(|session| session.client.clone())
            .ok_or_else(|| StreamError::Subscribe("not connected".to_string()))?;

        client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| StreamError::Subscribe(e.to_string()))?;

        self.topic = Some(topic.to_string());
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<InboundMessage>> {
        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };

        loop {
            match session.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(Some(InboundMessage {
                        topic: publish.topic,
                        payload: publish.payload,
                    }));
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    let topic = self.topic.as_deref().unwrap_or_default();
                    if ack.return_codes.contains(&SubscribeReasonCode::Failure) {
                        return Err(StreamError::Subscribe(format!(
                            "broker rejected subscription to '{}'",
                            topic
                        )));
                    }
                    tracing::info!("Subscription to '{}' created.", topic);
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => return Ok(None),
                Ok(_) => {}
                // Polling again would make rumqttc reconnect, which is left to the caller
                Err(e) => return Err(StreamError::ConnectionLost(e.to_string())),
            }
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        session
            .client
            .try_disconnect()
            .map_err(|e| StreamError::ConnectionLost(e.to_string()))?;

        let flush = async {
            loop {
                match session.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        if tokio::time::timeout(DISCONNECT_FLUSH_TIMEOUT, flush).await.is_err() {
            tracing::debug!("MQTT disconnect not flushed, dropping connection");
        }

        Ok(())
    }
}

/// Counters shared between a [`MemoryTransport`] and its [`MemoryBroker`]
#[derive(Debug, Default)]
struct MemoryStats {
    connect_attempts: AtomicUsize,
    disconnects: AtomicUsize,
    subscriptions: Mutex<Vec<String>>,
}

/// In-process transport fed by a [`MemoryBroker`]
#[derive(Debug)]
pub struct MemoryTransport {
    rx: mpsc::UnboundedReceiver<InboundMessage>,
    stats: Arc<MemoryStats>,
    refuse_with: Option<String>,
    connected: bool,
}

/// Sending side of a [`MemoryTransport`]
///
/// The transport reports a clean close once every broker handle is dropped.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    tx: mpsc::UnboundedSender<InboundMessage>,
    stats: Arc<MemoryStats>,
}

impl MemoryTransport {
    /// Create a connected transport/broker pair
    pub fn new() -> (Self, MemoryBroker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(MemoryStats::default());

        let transport = Self {
            rx,
            stats: Arc::clone(&stats),
            refuse_with: None,
            connected: false,
        };
        (transport, MemoryBroker { tx, stats })
    }

    /// Create a pair whose transport fails every connect attempt with `reason`
    pub fn refusing(reason: impl Into<String>) -> (Self, MemoryBroker) {
        let (mut transport, broker) = Self::new();
        transport.refuse_with = Some(reason.into());
        (transport, broker)
    }
}

impl MemoryBroker {
    /// Queue a message for delivery. Returns false if the transport is gone.
    pub fn publish(&self, topic: impl Into<String>, payload: impl Into<Bytes>) -> bool {
        self.tx.send(InboundMessage::new(topic, payload)).is_ok()
    }

    /// Number of times the transport tried to connect
    pub fn connect_attempts(&self) -> usize {
        self.stats.connect_attempts.load(Ordering::SeqCst)
    }

    /// Number of times an open connection was closed
    pub fn disconnects(&self) -> usize {
        self.stats.disconnects.load(Ordering::SeqCst)
    }

    /// Topic filters subscribed so far
    pub fn subscriptions(&self) -> Vec<String> {
        self.stats
            .subscriptions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationTransport for MemoryTransport {
    async fn connect(&mut self) -> Result<()> {
        self.stats.connect_attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = &self.refuse_with {
            return Err(StreamError::ConnectFailed(reason.clone()));
        }

        self.connected = true;
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        if !self.connected {
            return Err(StreamError::Subscribe("not connected".to_string()));
        }

        if let Ok(mut subscriptions) = self.stats.subscriptions.lock() {
            subscriptions.push(topic.to_string());
        }
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<InboundMessage>> {
        if !self.connected {
            return Ok(None);
        }
        Ok(self.rx.recv().await)
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.connected {
            self.connected = false;
            self.stats.disconnects.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SubscriptionConfig {
        SubscriptionConfig::builder("cse.example", "SubTest", "testcnt1")
            .transport_port(1884)
            .build()
            .unwrap()
    }

    #[test]
    fn test_mqtt_transport_from_config() {
        let transport = MqttTransport::new(&config());

        assert_eq!(transport.broker_address(), "cse.example:1884");
        assert_eq!(transport.keep_alive, Duration::from_secs(60));
        assert_eq!(transport.max_packet_size, 1024 * 1024);
        assert!(format!("{:?}", transport).contains("connected: false"));
    }

    #[tokio::test]
    async fn test_mqtt_disconnect_without_connect_is_noop() {
        let mut transport = MqttTransport::new(&config());

        assert!(transport.disconnect().await.is_ok());
        assert!(transport.next_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mqtt_connect_refused() {
        let config = SubscriptionConfig::builder("127.0.0.1", "SubTest", "testcnt1")
            .transport_port(1)
            .connect_timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let mut transport = MqttTransport::new(&config);

        assert!(matches!(
            transport.connect().await,
            Err(StreamError::ConnectFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_transport_delivers_in_order() {
        let (mut transport, broker) = MemoryTransport::new();
        transport.connect().await.unwrap();
        transport.subscribe("/oneM2M/req/+/o/#").await.unwrap();

        assert!(broker.publish("a", "1"));
        assert!(broker.publish("b", "2"));
        drop(broker);

        let first = transport.next_message().await.unwrap().unwrap();
        let second = transport.next_message().await.unwrap().unwrap();
        assert_eq!(first.topic, "a");
        assert_eq!(second.payload, Bytes::from("2"));
        assert!(transport.next_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_transport_refusing() {
        let (mut transport, broker) = MemoryTransport::refusing("broker down");

        assert!(matches!(
            transport.connect().await,
            Err(StreamError::ConnectFailed(reason)) if reason == "broker down"
        ));
        assert_eq!(broker.connect_attempts(), 1);
        assert!(transport.subscribe("t").await.is_err());
    }

    #[tokio::test]
    async fn test_memory_disconnect_counted_once() {
        let (mut transport, broker) = MemoryTransport::new();
        transport.connect().await.unwrap();

        transport.disconnect().await.unwrap();
        transport.disconnect().await.unwrap();
        assert_eq!(broker.disconnects(), 1);
    }
}
