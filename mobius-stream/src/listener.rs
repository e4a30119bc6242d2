//! Notification listener
//!
//! Owns one [`NotificationTransport`] for its whole life: connects, subscribes to
//! the origin-scoped topic filter, decodes every inbound message and hands it to
//! the caller's handler. Handlers run one at a time, in arrival order, on the
//! task driving [`NotificationListener::run`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use onem2m_client::SubscriptionConfig;
use tokio::sync::watch;

use crate::envelope::{decode, NotificationEnvelope};
use crate::error::StreamError;
use crate::transport::{InboundMessage, NotificationTransport};

/// A decoded notification together with the topic it arrived on
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub topic: String,
    pub envelope: NotificationEnvelope,
}

/// Why a listener stopped running
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerExit {
    /// Stopped on request
    Stopped,
    /// The initial connection failed; nothing was subscribed
    ConnectFailed(String),
    /// Connected, but the topic subscription could not be issued or the broker rejected it
    SubscribeFailed(String),
    /// The connection dropped after it was established
    ConnectionLost(String),
    /// The transport closed the connection cleanly
    Closed,
}

impl ListenerExit {
    /// True if the listener ended without being asked to
    pub fn is_failure(&self) -> bool {
        !matches!(self, ListenerExit::Stopped | ListenerExit::Closed)
    }
}

/// Sending half of a listener's stop signal
///
/// Triggering more than once has no further effect.
#[derive(Debug)]
pub struct StopTrigger {
    tx: watch::Sender<bool>,
}

impl StopTrigger {
    /// Ask the listener to stop. Returns false if it had already exited.
    pub fn trigger(&self) -> bool {
        self.tx.send(true).is_ok()
    }
}

/// Receiving half of a listener's stop signal
pub type StopSignal = watch::Receiver<bool>;

/// Create a linked stop trigger/signal pair
pub fn stop_channel() -> (StopTrigger, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopTrigger { tx }, rx)
}

/// Resolves once a stop was requested or the trigger was dropped
async fn stop_requested(signal: &mut StopSignal) {
    loop {
        if *signal.borrow() {
            return;
        }
        if signal.changed().await.is_err() {
            return;
        }
    }
}

/// Listener bound to one transport and one topic filter
pub struct NotificationListener<T> {
    transport: T,
    topic: String,
    broker: String,
}

impl<T: NotificationTransport> NotificationListener<T> {
    pub fn new(transport: T, config: &SubscriptionConfig) -> Self {
        Self {
            transport,
            topic: config.topic().to_string(),
            broker: format!("{}:{}", config.host(), config.transport_port()),
        }
    }

    /// Topic filter this listener subscribes to
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Connect, subscribe and deliver notifications until stopped.
    ///
    /// The handler is called sequentially for every decodable message. It runs on
    /// the task driving this future and must return quickly; a panic inside it is
    /// caught and logged. Messages that fail to decode are dropped.
    ///
    /// The connection is always closed before this returns.
    pub async fn run<F>(mut self, mut handler: F, mut stop: StopSignal) -> ListenerExit
    where
        F: FnMut(Notification),
    {
        let connected = tokio::select! {
            biased;
            _ = stop_requested(&mut stop) => return ListenerExit::Stopped,
            result = self.transport.connect() => result,
        };

        if let Err(e) = connected {
            tracing::error!("{}", e);
            return ListenerExit::ConnectFailed(e.to_string());
        }
        tracing::info!("Connected to MQTT broker at {}", self.broker);

        if let Err(e) = self.transport.subscribe(&self.topic).await {
            tracing::error!("{}", e);
            self.close().await;
            return ListenerExit::SubscribeFailed(e.to_string());
        }

        let exit = loop {
            tokio::select! {
                biased;
                _ = stop_requested(&mut stop) => break ListenerExit::Stopped,
                message = self.transport.next_message() => match message {
                    Ok(Some(message)) => dispatch(message, &mut handler),
                    Ok(None) => {
                        tracing::info!("MQTT connection to {} closed", self.broker);
                        break ListenerExit::Closed;
                    }
                    Err(e @ StreamError::Subscribe(_)) => {
                        tracing::error!("{}", e);
                        break ListenerExit::SubscribeFailed(e.to_string());
                    }
                    Err(e) => {
                        tracing::error!("{}", e);
                        break ListenerExit::ConnectionLost(e.to_string());
                    }
                },
            }
        };

        self.close().await;
        exit
    }

    async fn close(&mut self) {
        if let Err(e) = self.transport.disconnect().await {
            tracing::warn!("Failed to disconnect from MQTT broker: {}", e);
        }
    }
}

/// Decode one message, report it, and invoke the handler
fn dispatch<F>(message: InboundMessage, handler: &mut F)
where
    F: FnMut(Notification),
{
    tracing::info!("Message received on topic {}", message.topic);

    let envelope = match decode(&message.payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!("Failed to decode message as JSON: {}", e);
            return;
        }
    };

    match &envelope.subscription_resource {
        Some(sur) => tracing::info!("Subscription Resource (sur): {}", sur),
        None => tracing::warn!("Failed to extract 'sur' from the payload."),
    }

    match (&envelope.content, envelope.content_str()) {
        (_, Some(text)) => tracing::info!("Content (con): {}", text),
        (Some(value), None) => tracing::info!("Content (con): {}", value),
        (None, _) if envelope.verification_request => {
            tracing::debug!("Verification request carries no content")
        }
        (None, _) => tracing::warn!("Failed to extract 'con' from the payload."),
    }

    let notification = Notification {
        topic: message.topic,
        envelope,
    };

    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(notification))) {
        tracing::error!(
            "Notification handler panicked: {}",
            panic_message(payload.as_ref())
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    #[test]
    fn test_listener_exit_failure_classification() {
        assert!(!ListenerExit::Stopped.is_failure());
        assert!(!ListenerExit::Closed.is_failure());
        assert!(ListenerExit::ConnectFailed("x".to_string()).is_failure());
        assert!(ListenerExit::ConnectionLost("x".to_string()).is_failure());
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_stop_trigger_is_repeatable() {
        let (trigger, signal) = stop_channel();
        assert!(trigger.trigger());
        assert!(trigger.trigger());
        assert!(*signal.borrow());

        drop(signal);
        assert!(!trigger.trigger());
    }

    #[tokio::test]
    async fn test_stop_before_connect_skips_transport() {
        let config = onem2m_client::SubscriptionConfig::builder("cse.example", "SubTest", "testcnt1")
            .build()
            .unwrap();
        let (transport, broker) = MemoryTransport::new();
        let (trigger, signal) = stop_channel();
        trigger.trigger();

        let listener = NotificationListener::new(transport, &config);
        let exit = listener.run(|_| {}, signal).await;

        assert_eq!(exit, ListenerExit::Stopped);
        assert_eq!(broker.connect_attempts(), 0);
    }
}
