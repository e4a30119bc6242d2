//! Blocking oneM2M client for Mobius subscription resources
//!
//! This crate performs the two HTTP requests of the subscription handshake:
//! creating a subscription resource under a watched endpoint and deleting it
//! again. Status codes are translated into [`RegistrationError`] variants so
//! callers never have to inspect raw responses.

mod config;
mod error;
pub mod resource;

pub use config::{
    SubscriptionConfig, SubscriptionConfigBuilder, DEFAULT_HTTP_PORT, DEFAULT_IDENTITY,
    DEFAULT_MAX_PACKET_SIZE, DEFAULT_PLATFORM, DEFAULT_PROTOCOL_PREFIX, DEFAULT_SUBSCRIPTION_NAME,
    DEFAULT_TRANSPORT_PORT,
};
pub use error::{ConfigError, RegistrationError, Result};

use resource::{SubscriptionEnvelope, SUBSCRIPTION_RESOURCE_TYPE};

/// Header carrying the request identifier
pub const HEADER_REQUEST_ID: &str = "X-M2M-RI";
/// Header carrying the origin identity
pub const HEADER_ORIGIN: &str = "X-M2M-Origin";

/// A subscription resource was created (HTTP 201)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub status: u16,
    /// Resource identifier assigned by the platform, when the response carried one
    pub resource_id: Option<String>,
}

/// A subscription resource was deleted (HTTP 200 or 204)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unregistered {
    pub status: u16,
}

/// Minimal HTTP client for the subscription handshake
#[derive(Debug, Clone)]
pub struct Onem2mClient {
    agent: ureq::Agent,
}

impl Onem2mClient {
    /// Create a client whose requests are bounded by the config's request timeout
    pub fn new(config: &SubscriptionConfig) -> Self {
        let timeout = config.request_timeout();
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(timeout)
                .timeout(timeout)
                .build(),
        }
    }

    /// Create the subscription resource under the configured endpoint
    ///
    /// # Errors
    /// - [`RegistrationError::EndpointNotFound`] if the endpoint does not exist
    /// - [`RegistrationError::RegistrationFailed`] for any other status or a transport error
    pub fn create_subscription(&self, config: &SubscriptionConfig) -> Result<Registered> {
        let body = SubscriptionEnvelope::for_updates(
            config.subscription_name(),
            config.notification_uri(),
        );

        let result = self
            .agent
            .post(config.base_url())
            .set(HEADER_REQUEST_ID, config.request_id())
            .set(HEADER_ORIGIN, config.origin())
            .set(
                "Content-Type",
                &format!("application/json;ty={}", SUBSCRIPTION_RESOURCE_TYPE),
            )
            .set("Accept", "application/json")
            .send_json(&body);

        match result {
            Ok(response) if response.status() == 201 => {
                let status = response.status();
                // A body without `ri` is still a successful creation
                let resource_id = response
                    .into_json::<SubscriptionEnvelope>()
                    .ok()
                    .and_then(|created| created.subscription.resource_id);

                tracing::info!(
                    "Subscription on '{}' created successfully.",
                    config.resource_path()
                );
                Ok(Registered {
                    status,
                    resource_id,
                })
            }
            Ok(response) => {
                let status = response.status();
                let detail = response.into_string().unwrap_or_default();
                tracing::error!(
                    "Failed to create subscription. Status code: {}, Response: {}",
                    status,
                    detail
                );
                Err(RegistrationError::RegistrationFailed {
                    status: Some(status),
                    detail,
                })
            }
            Err(ureq::Error::Status(404, _)) => {
                tracing::error!("Endpoint not found: {}", config.resource_path());
                Err(RegistrationError::EndpointNotFound {
                    url: config.base_url().to_string(),
                })
            }
            Err(ureq::Error::Status(status, response)) => {
                let detail = response.into_string().unwrap_or_default();
                tracing::error!(
                    "Failed to create subscription. Status code: {}, Response: {}",
                    status,
                    detail
                );
                Err(RegistrationError::RegistrationFailed {
                    status: Some(status),
                    detail,
                })
            }
            Err(ureq::Error::Transport(transport)) => {
                tracing::error!("HTTP request failed: {}", transport);
                Err(RegistrationError::RegistrationFailed {
                    status: None,
                    detail: transport.to_string(),
                })
            }
        }
    }

    /// Delete the subscription resource
    ///
    /// # Errors
    /// [`RegistrationError::DeregistrationFailed`] for any status other than 200/204
    /// or a transport error.
    pub fn delete_subscription(&self, config: &SubscriptionConfig) -> Result<Unregistered> {
        let url = config.subscription_url();

        let result = self
            .agent
            .delete(&url)
            .set(HEADER_REQUEST_ID, config.request_id())
            .set(HEADER_ORIGIN, config.origin())
            .call();

        let (status, detail) = match result {
            Ok(response) if matches!(response.status(), 200 | 204) => {
                tracing::info!("Unsubscribed '{}' successfully.", url);
                return Ok(Unregistered {
                    status: response.status(),
                });
            }
            Ok(response) => {
                let status = response.status();
                (Some(status), response.into_string().unwrap_or_default())
            }
            Err(ureq::Error::Status(status, response)) => {
                (Some(status), response.into_string().unwrap_or_default())
            }
            Err(ureq::Error::Transport(transport)) => {
                tracing::warn!("HTTP request failed during unsubscribe: {}", transport);
                (None, transport.to_string())
            }
        };

        if let Some(code) = status {
            tracing::warn!(
                "Failed to unsubscribe '{}'. Status code: {}, Response: {}",
                url,
                code,
                detail
            );
        }

        Err(RegistrationError::DeregistrationFailed { status, detail })
    }
}
