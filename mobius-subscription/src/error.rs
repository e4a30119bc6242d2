//! Error types for the mobius-subscription crate.

use onem2m_client::{ConfigError, RegistrationError};
use thiserror::Error;

use crate::state::SubscriptionState;

/// Errors that can occur while driving a subscription's lifecycle
#[derive(Error, Debug)]
pub enum SubscriptionError {
    /// Creating or deleting the subscription resource failed
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// The configuration could not be built
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The operation is not allowed in the current lifecycle state
    #[error("Invalid lifecycle state: expected {expected}, found {actual}")]
    InvalidState {
        expected: SubscriptionState,
        actual: SubscriptionState,
    },

    /// The background listener thread could not be started
    #[error("Failed to spawn listener worker: {0}")]
    WorkerSpawn(String),

    /// A thread panicked while holding the lifecycle lock
    #[error("Lifecycle lock poisoned")]
    LockPoisoned,
}

/// Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, SubscriptionError>;
