//! Lifecycle controller for one Mobius subscription
//!
//! Registration and deregistration run synchronously on the caller's thread;
//! the MQTT listener runs on a dedicated background thread.

use std::sync::{mpsc, Mutex, MutexGuard};

use mobius_stream::{ListenerExit, MqttTransport, Notification, NotificationTransport};
use onem2m_client::{
    Onem2mClient, RegistrationError, SubscriptionConfig, SubscriptionConfigBuilder, Unregistered,
};

use crate::error::{Result, SubscriptionError};
use crate::iter::NotificationIterator;
use crate::state::SubscriptionState;
use crate::worker::{spawn_listener_worker, ListenerWorker};

/// Outcome of the first [`MobiusSubscription::stop`] call
#[derive(Debug)]
pub struct ShutdownReport {
    /// How the listener ended; `None` if it did not confirm within the shutdown timeout
    pub listener: Option<ListenerExit>,
    /// Result of deleting the subscription resource
    pub deregistration: std::result::Result<Unregistered, RegistrationError>,
}

struct Inner<T> {
    state: SubscriptionState,
    transport: Option<T>,
    worker: Option<ListenerWorker>,
}

/// A subscription to changes of one Mobius endpoint
///
/// `start` creates the subscription resource over HTTP and, only if that
/// succeeded, attaches a listener on a background thread. `stop` detaches the
/// listener, deletes the resource and joins the thread. `stop` also runs when the
/// value is dropped, so leaving scope on any path cleans up the platform side.
///
/// # Example
///
/// ```rust,ignore
/// use mobius_subscription::{MobiusSubscription, SubscriptionConfig};
///
/// let config = SubscriptionConfig::builder("203.253.128.177", "SubTest", "testcnt1").build()?;
/// let subscription = MobiusSubscription::new(config);
///
/// subscription.start(|notification| {
///     println!("{:?}", notification.envelope.content);
/// })?;
///
/// // ... later, or implicitly on drop
/// subscription.stop()?;
/// ```
pub struct MobiusSubscription<T: NotificationTransport + 'static = MqttTransport> {
    config: SubscriptionConfig,
    client: Onem2mClient,
    inner: Mutex<Inner<T>>,
}

impl MobiusSubscription<MqttTransport> {
    /// Subscription delivering notifications over the CSE's MQTT broker
    pub fn new(config: SubscriptionConfig) -> Self {
        let transport = MqttTransport::new(&config);
        Self::with_transport(config, transport)
    }

    /// Build the configuration and create the subscription in one step
    pub fn from_builder(builder: SubscriptionConfigBuilder) -> Result<Self> {
        Ok(Self::new(builder.build()?))
    }
}

impl<T: NotificationTransport + 'static> MobiusSubscription<T> {
    /// Subscription delivering notifications over a custom transport
    pub fn with_transport(config: SubscriptionConfig, transport: T) -> Self {
        Self {
            client: Onem2mClient::new(&config),
            config,
            inner: Mutex::new(Inner {
                state: SubscriptionState::Unregistered,
                transport: Some(transport),
                worker: None,
            }),
        }
    }

    pub fn config(&self) -> &SubscriptionConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> SubscriptionState {
        self.lock()
            .map(|inner| inner.state)
            .unwrap_or(SubscriptionState::Stopped)
    }

    /// Register the subscription and start listening.
    ///
    /// Blocks for the registration round trip only; the listener connects in the
    /// background. `handler` is called for every decoded notification, one call at a
    /// time, on the listener thread, and should return quickly.
    ///
    /// # Errors
    /// - [`SubscriptionError::InvalidState`] unless the subscription is `Unregistered`
    /// - [`SubscriptionError::Registration`] if the resource could not be created; the
    ///   subscription is then `Stopped` and no connection is attempted
    pub fn start<F>(&self, handler: F) -> Result<()>
    where
        F: FnMut(Notification) + Send + 'static,
    {
        {
            let mut inner = self.lock()?;
            if inner.state != SubscriptionState::Unregistered {
                return Err(SubscriptionError::InvalidState {
                    expected: SubscriptionState::Unregistered,
                    actual: inner.state,
                });
            }
            inner.state = SubscriptionState::Registering;
        }

        // Registering keeps other start and stop calls out while the lock is released
        tracing::debug!("Registering subscription at {}", self.config.base_url());
        let created = self.client.create_subscription(&self.config);

        let mut inner = self.lock()?;
        if let Err(e) = created {
            inner.state = SubscriptionState::Stopped;
            return Err(e.into());
        }
        inner.state = SubscriptionState::Active;

        let Some(transport) = inner.transport.take() else {
            return Err(SubscriptionError::WorkerSpawn(
                "transport already consumed".to_string(),
            ));
        };

        match spawn_listener_worker(self.config.clone(), transport, handler) {
            Ok(worker) => {
                inner.worker = Some(worker);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to spawn listener worker: {}", e);
                // Do not leave a subscription behind that nobody listens to
                inner.state = SubscriptionState::Deregistering;
                if let Err(e) = self.client.delete_subscription(&self.config) {
                    tracing::warn!("Failed to remove subscription without listener: {}", e);
                }
                inner.state = SubscriptionState::Stopped;
                Err(SubscriptionError::WorkerSpawn(e.to_string()))
            }
        }
    }

    /// Register the subscription and receive notifications through an iterator.
    ///
    /// The iterator ends once the listener has exited, e.g. after [`stop`](Self::stop).
    pub fn start_streaming(&self) -> Result<NotificationIterator> {
        let (tx, rx) = mpsc::channel();

        self.start(move |notification| {
            if tx.send(notification).is_err() {
                tracing::debug!("Notification iterator dropped, discarding notification");
            }
        })?;

        Ok(NotificationIterator::new(rx))
    }

    /// Stop listening and delete the subscription resource.
    ///
    /// Only the first call on an active subscription does any work and returns a
    /// report; every other call returns `Ok(None)`. A failed deletion is reported,
    /// never propagated, and the subscription still ends up `Stopped`.
    ///
    /// The listener thread is joined once it confirmed its exit. If it does not
    /// confirm within [`SubscriptionConfig::shutdown_timeout`] (a handler that never
    /// returns), the resource is still deleted but the thread is detached instead of
    /// joined, and [`ShutdownReport::listener`] is `None`.
    pub fn stop(&self) -> Result<Option<ShutdownReport>> {
        let worker = {
            let mut inner = self.lock()?;
            if inner.state != SubscriptionState::Active {
                return Ok(None);
            }
            inner.state = SubscriptionState::Deregistering;
            inner.worker.take()
        };

        // No notification is handled once the listener confirmed its exit
        let listener = worker
            .as_ref()
            .and_then(|worker| worker.stop(self.config.shutdown_timeout()));

        if let Some(exit) = &listener {
            if exit.is_failure() {
                tracing::warn!("Listener had already stopped: {:?}", exit);
            }
        }

        let deregistration = self.client.delete_subscription(&self.config);

        if let Some(worker) = worker {
            if listener.is_some() || worker.is_finished() {
                worker.join();
            } else {
                tracing::warn!(
                    "Listener did not stop within {:?}, detaching its thread",
                    self.config.shutdown_timeout()
                );
            }
        }

        self.lock()?.state = SubscriptionState::Stopped;
        tracing::info!(
            "MobiusSubscription for '{}' stopped successfully.",
            self.config.base_url()
        );

        Ok(Some(ShutdownReport {
            listener,
            deregistration,
        }))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner<T>>> {
        self.inner.lock().map_err(|_| SubscriptionError::LockPoisoned)
    }
}

impl<T: NotificationTransport + 'static> Drop for MobiusSubscription<T> {
    fn drop(&mut self) {
        tracing::debug!(
            "MobiusSubscription for '{}' dropping in state {}",
            self.config.base_url(),
            self.state()
        );

        if let Err(e) = self.stop() {
            tracing::warn!("Failed to stop subscription during drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mobius_stream::MemoryTransport;

    fn unreachable_config() -> SubscriptionConfig {
        SubscriptionConfig::builder("127.0.0.1", "SubTest", "testcnt1")
            .http_port(1)
            .build()
            .unwrap()
    }

    #[test]
    fn test_initial_state() {
        let (transport, _broker) = MemoryTransport::new();
        let subscription = MobiusSubscription::with_transport(unreachable_config(), transport);

        assert_eq!(subscription.state(), SubscriptionState::Unregistered);
        assert_eq!(subscription.config().origin(), "UbicompSub_testcnt1");
    }

    #[test]
    fn test_stop_before_start_is_noop() {
        let (transport, broker) = MemoryTransport::new();
        let subscription = MobiusSubscription::with_transport(unreachable_config(), transport);

        assert!(subscription.stop().unwrap().is_none());
        assert!(subscription.stop().unwrap().is_none());
        assert_eq!(subscription.state(), SubscriptionState::Unregistered);
        assert_eq!(broker.connect_attempts(), 0);
    }

    #[test]
    fn test_unreachable_platform_never_connects() {
        let (transport, broker) = MemoryTransport::new();
        let subscription = MobiusSubscription::with_transport(unreachable_config(), transport);

        let result = subscription.start(|_| {});
        assert!(matches!(
            result,
            Err(SubscriptionError::Registration(
                RegistrationError::RegistrationFailed { status: None, .. }
            ))
        ));
        assert_eq!(subscription.state(), SubscriptionState::Stopped);
        assert_eq!(broker.connect_attempts(), 0);

        // No re-registration on the same instance
        assert!(matches!(
            subscription.start(|_| {}),
            Err(SubscriptionError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_from_builder_rejects_invalid_config() {
        let result = MobiusSubscription::from_builder(SubscriptionConfig::builder("", "a", "b"));
        assert!(matches!(result, Err(SubscriptionError::Config(_))));
    }
}
