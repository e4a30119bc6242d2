//! # Mobius Subscription
//!
//! Subscribe to changes of a Mobius (oneM2M) resource and receive the
//! notifications over MQTT, with a fully synchronous API.
//!
//! ## Overview
//!
//! A [`MobiusSubscription`] ties together the three steps of the handshake:
//!
//! 1. **Registration**: an HTTP `POST` creates a subscription resource under the
//!    watched endpoint, naming an MQTT notification target scoped to this client's origin
//! 2. **Listening**: a background thread connects to the CSE's broker, subscribes to
//!    `/oneM2M/req/+/{origin}/#` and decodes every notification
//! 3. **Deregistration**: on `stop` (or drop) the listener is detached first, then the
//!    subscription resource is deleted, then the background thread is joined
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mobius_subscription::{MobiusSubscription, SubscriptionConfig};
//!
//! let config = SubscriptionConfig::builder("203.253.128.177", "SubTest", "testcnt1")
//!     .identity("UbicompSub")
//!     .build()?;
//!
//! let subscription = MobiusSubscription::new(config);
//! for notification in subscription.start_streaming()? {
//!     if let Some(content) = notification.envelope.content_str() {
//!         println!("Content (con): {}", content);
//!     }
//! }
//! ```
//!
//! Failures never escape the background thread. Registration failures are
//! returned from `start`; everything else is logged through `tracing` (see
//! [`logging`]) and, for shutdown, summarised in a [`ShutdownReport`].

pub mod error;
pub mod iter;
pub mod logging;
pub mod manager;
pub mod state;
mod worker;

// Re-export main types for convenience
pub use error::{Result, SubscriptionError};
pub use iter::NotificationIterator;
pub use manager::{MobiusSubscription, ShutdownReport};
pub use state::SubscriptionState;

// Re-export commonly used types from dependencies
pub use mobius_stream::{
    ListenerExit, MemoryBroker, MemoryTransport, MqttTransport, Notification,
    NotificationEnvelope, NotificationTransport,
};
pub use onem2m_client::{
    ConfigError, Registered, RegistrationError, SubscriptionConfig, SubscriptionConfigBuilder,
    Unregistered,
};

/// Prelude module for convenient imports
///
/// ```rust
/// use mobius_subscription::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        MobiusSubscription, Notification, NotificationEnvelope, NotificationIterator, Result,
        ShutdownReport, SubscriptionConfig, SubscriptionError, SubscriptionState,
    };
}
