//! Subscription configuration
//!
//! A [`SubscriptionConfig`] is built once through [`SubscriptionConfigBuilder`] and never
//! changes afterwards. Every derived value (origin, URLs, topic filter, request identifier)
//! is computed in [`SubscriptionConfigBuilder::build`] so that all components of one
//! subscription see exactly the same strings.

use std::time::Duration;

use uuid::Uuid;

use crate::error::ConfigError;

/// Default HTTP port of a Mobius CSE
pub const DEFAULT_HTTP_PORT: u16 = 7579;
/// Default MQTT port of a Mobius CSE
pub const DEFAULT_TRANSPORT_PORT: u16 = 1883;
/// Default CSE base name
pub const DEFAULT_PLATFORM: &str = "Mobius";
/// Default identity prefix used to build the origin
pub const DEFAULT_IDENTITY: &str = "UbicompSub";
/// Default resource name of the created subscription
pub const DEFAULT_SUBSCRIPTION_NAME: &str = "UbicompSub";
/// Default protocol prefix of the notification topic
pub const DEFAULT_PROTOCOL_PREFIX: &str = "oneM2M";
/// Default upper bound for one transport packet. A notification carries the whole
/// content instance, so this is far above the MQTT client's own default.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1024 * 1024;

const MIN_MAX_PACKET_SIZE: usize = 1024;

/// Immutable configuration of one subscription endpoint.
///
/// # Example
///
/// ```rust
/// use onem2m_client::SubscriptionConfig;
///
/// let config = SubscriptionConfig::builder("cse.example", "SubTest", "testcnt1")
///     .identity("UbicompSub")
///     .build()
///     .unwrap();
///
/// assert_eq!(config.origin(), "UbicompSub_testcnt1");
/// assert_eq!(config.base_url(), "http://cse.example:7579/Mobius/SubTest/testcnt1");
/// assert_eq!(config.topic(), "/oneM2M/req/+/UbicompSub_testcnt1/#");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionConfig {
    host: String,
    scheme: String,
    http_port: u16,
    transport_port: u16,
    platform: String,
    application: String,
    endpoint: String,
    identity: String,
    subscription_name: String,
    protocol_prefix: String,
    request_timeout: Duration,
    connect_timeout: Duration,
    keep_alive: Duration,
    shutdown_timeout: Duration,
    max_packet_size: usize,

    // Derived once at build time
    origin: String,
    request_id: String,
    base_url: String,
    topic: String,
    mqtt_client_id: String,
}

impl SubscriptionConfig {
    /// Start building a configuration for `endpoint` under `application` on `host`
    pub fn builder(
        host: impl Into<String>,
        application: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> SubscriptionConfigBuilder {
        SubscriptionConfigBuilder::new(host, application, endpoint)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn transport_port(&self) -> u16 {
        self.transport_port
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Resource name of the subscription created under the endpoint
    pub fn subscription_name(&self) -> &str {
        &self.subscription_name
    }

    pub fn protocol_prefix(&self) -> &str {
        &self.protocol_prefix
    }

    /// Upper bound for a single HTTP request
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Upper bound for establishing the transport connection
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Keep-alive interval of the transport connection
    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    /// How long shutdown waits for the listener to acknowledge it has stopped
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Largest transport packet, in bytes, accepted or sent
    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    /// Origin identity, `{identity}_{endpoint}`
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Request identifier sent with every HTTP request of this instance
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// URL of the watched endpoint resource
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the subscription resource itself
    pub fn subscription_url(&self) -> String {
        format!("{}/{}", self.base_url, self.subscription_name)
    }

    /// `/{platform}/{application}/{endpoint}`, used in status lines
    pub fn resource_path(&self) -> String {
        format!("{}/{}/{}", self.platform, self.application, self.endpoint)
    }

    /// Notification target announced to the platform
    pub fn notification_uri(&self) -> String {
        format!("mqtt://{}/{}?ct=json", self.host, self.origin)
    }

    /// Topic filter that receives every notification addressed to the origin
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn mqtt_client_id(&self) -> &str {
        &self.mqtt_client_id
    }
}

/// Builder for [`SubscriptionConfig`]
#[derive(Debug, Clone)]
pub struct SubscriptionConfigBuilder {
    host: String,
    application: String,
    endpoint: String,
    scheme: String,
    http_port: u16,
    transport_port: u16,
    platform: String,
    identity: String,
    subscription_name: String,
    protocol_prefix: String,
    request_timeout: Duration,
    connect_timeout: Duration,
    keep_alive: Duration,
    shutdown_timeout: Duration,
    max_packet_size: usize,
}

impl SubscriptionConfigBuilder {
    fn new(
        host: impl Into<String>,
        application: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            application: application.into(),
            endpoint: endpoint.into(),
            scheme: "http".to_string(),
            http_port: DEFAULT_HTTP_PORT,
            transport_port: DEFAULT_TRANSPORT_PORT,
            platform: DEFAULT_PLATFORM.to_string(),
            identity: DEFAULT_IDENTITY.to_string(),
            subscription_name: DEFAULT_SUBSCRIPTION_NAME.to_string(),
            protocol_prefix: DEFAULT_PROTOCOL_PREFIX.to_string(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            keep_alive: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(5),
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    pub fn transport_port(mut self, port: u16) -> Self {
        self.transport_port = port;
        self
    }

    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn subscription_name(mut self, name: impl Into<String>) -> Self {
        self.subscription_name = name.into();
        self
    }

    pub fn protocol_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.protocol_prefix = prefix.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn max_packet_size(mut self, bytes: usize) -> Self {
        self.max_packet_size = bytes;
        self
    }

    /// Validate the settings and derive the origin, URLs and topic
    pub fn build(self) -> Result<SubscriptionConfig, ConfigError> {
        self.validate()?;

        let origin = format!("{}_{}", self.identity, self.endpoint);
        let request_id = format!("{}_{}", self.identity, Uuid::new_v4());
        let base_url = format!(
            "{}://{}:{}/{}/{}/{}",
            self.scheme, self.host, self.http_port, self.platform, self.application, self.endpoint
        );
        let topic = format!("/{}/req/+/{}/#", self.protocol_prefix, origin);
        let client_suffix = Uuid::new_v4().simple().to_string();
        let mqtt_client_id = format!("{}-{}", origin, &client_suffix[..8]);

        Ok(SubscriptionConfig {
            host: self.host,
            scheme: self.scheme,
            http_port: self.http_port,
            transport_port: self.transport_port,
            platform: self.platform,
            application: self.application,
            endpoint: self.endpoint,
            identity: self.identity,
            subscription_name: self.subscription_name,
            protocol_prefix: self.protocol_prefix,
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            keep_alive: self.keep_alive,
            shutdown_timeout: self.shutdown_timeout,
            max_packet_size: self.max_packet_size,
            origin,
            request_id,
            base_url,
            topic,
            mqtt_client_id,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }

        if self.scheme != "http" && self.scheme != "https" {
            return Err(ConfigError::Invalid(format!(
                "unsupported scheme '{}', expected http or https",
                self.scheme
            )));
        }

        for (field, value) in [
            ("platform", &self.platform),
            ("application", &self.application),
            ("endpoint", &self.endpoint),
            ("identity", &self.identity),
            ("subscription name", &self.subscription_name),
            ("protocol prefix", &self.protocol_prefix),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", field)));
            }
            if value.contains('/') {
                return Err(ConfigError::Invalid(format!(
                    "{} '{}' must be a single path segment",
                    field, value
                )));
            }
        }

        // The origin is embedded in an MQTT topic filter
        if self.identity.contains(['+', '#']) || self.endpoint.contains(['+', '#']) {
            return Err(ConfigError::Invalid(
                "identity and endpoint must not contain MQTT wildcards".to_string(),
            ));
        }

        if self.http_port == 0 || self.transport_port == 0 {
            return Err(ConfigError::Invalid("ports must be non-zero".to_string()));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request timeout must be greater than 0".to_string(),
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "connect timeout must be greater than 0".to_string(),
            ));
        }

        if self.keep_alive < Duration::from_secs(5) {
            return Err(ConfigError::Invalid(
                "keep-alive must be at least 5 seconds".to_string(),
            ));
        }

        if self.shutdown_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "shutdown timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_packet_size < MIN_MAX_PACKET_SIZE {
            return Err(ConfigError::Invalid(format!(
                "max packet size must be at least {} bytes",
                MIN_MAX_PACKET_SIZE
            )));
        }

        Ok(())
    }
}
