//! # mobius-stream
//!
//! Receives Mobius subscription notifications over MQTT.
//!
//! The crate has three parts:
//!
//! - [`envelope`]: decodes a raw notification into a [`NotificationEnvelope`]
//! - [`transport`]: the [`NotificationTransport`] seam with an MQTT and an in-memory implementation
//! - [`listener`]: drives a transport, decodes messages and calls a handler for each one
//!
//! ```rust,ignore
//! use mobius_stream::{stop_channel, MqttTransport, NotificationListener};
//!
//! let (trigger, signal) = stop_channel();
//! let listener = NotificationListener::new(MqttTransport::new(&config), &config);
//! let exit = listener
//!     .run(|n| println!("{:?}", n.envelope.content), signal)
//!     .await;
//! ```

pub mod envelope;
mod error;
pub mod listener;
pub mod transport;

pub use envelope::{decode, NotificationEnvelope};
pub use error::{Result, StreamError};
pub use listener::{
    stop_channel, ListenerExit, Notification, NotificationListener, StopSignal, StopTrigger,
};
pub use transport::{
    InboundMessage, MemoryBroker, MemoryTransport, MqttTransport, NotificationTransport,
};
