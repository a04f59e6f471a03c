use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::ProtocolVersion;

/// Default retry interval of unacknowledged exchanges
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(3);
/// Default keep-alive interval, in seconds
pub const DEFAULT_KEEP_ALIVE: u16 = 30;
/// Default time to wait for connect acknowledgement
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default number of topics allowed in one subscribe or unsubscribe call
pub const DEFAULT_MAX_SUBSCRIPTIONS: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Mqtt client configuration
pub struct ClientConfig {
    #[serde(with = "secs")]
    pub(crate) retry_interval: Duration,
    pub(crate) keep_alive: u16,
    pub(crate) clean_session: bool,
    pub(crate) version: ProtocolVersion,
    #[serde(with = "secs")]
    pub(crate) connect_timeout: Duration,
    pub(crate) max_subscriptions: usize,
    pub(crate) max_packet_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) password: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        ClientConfig {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            keep_alive: DEFAULT_KEEP_ALIVE,
            clean_session: true,
            version: ProtocolVersion::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_subscriptions: DEFAULT_MAX_SUBSCRIPTIONS,
            max_packet_size: 0,
            username: None,
            password: None,
        }
    }

    /// Set retry interval.
    ///
    /// Unacknowledged publish, subscribe and unsubscribe packets are
    /// re-sent after this interval. A ping without response for the same
    /// interval terminates the connection.
    ///
    /// By default retry interval is set to 3 seconds.
    pub fn set_retry_interval(mut self, val: Duration) -> Self {
        self.retry_interval = val;
        self
    }

    /// A time interval measured in seconds.
    ///
    /// keep-alive is set to 30 seconds by default. To disable pings set value to 0.
    pub fn set_keep_alive(mut self, val: u16) -> Self {
        self.keep_alive = val;
        self
    }

    /// The handling of the Session state.
    pub fn set_clean_session(mut self, val: bool) -> Self {
        self.clean_session = val;
        self
    }

    /// Protocol version to announce in connect packet.
    pub fn set_version(mut self, val: ProtocolVersion) -> Self {
        self.version = val;
        self
    }

    /// Set connect acknowledgement timeout.
    ///
    /// By default timeout is set to 30 seconds.
    pub fn set_connect_timeout(mut self, val: Duration) -> Self {
        self.connect_timeout = val;
        self
    }

    /// Max number of topics in one subscribe or unsubscribe call.
    ///
    /// To disable limit set value to 0. By default limit is set to 8.
    pub fn set_max_subscriptions(mut self, val: usize) -> Self {
        self.max_subscriptions = val;
        self
    }

    /// Max incoming packet size.
    ///
    /// To disable max size limit set value to 0.
    pub fn set_max_packet_size(mut self, val: u32) -> Self {
        self.max_packet_size = val;
        self
    }

    /// Username and optional password used for authentication.
    pub fn set_auth<U>(mut self, username: U, password: Option<String>) -> Self
    where
        String: From<U>,
    {
        self.username = Some(username.into());
        self.password = password;
        self
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    pub fn keep_alive(&self) -> u16 {
        self.keep_alive
    }

    pub fn clean_session(&self) -> bool {
        self.clean_session
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn max_subscriptions(&self) -> usize {
        self.max_subscriptions
    }

    pub fn max_packet_size(&self) -> u32 {
        self.max_packet_size
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub(crate) fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.keep_alive))
    }
}

/// Durations are stored as fractional seconds
mod secs {
    use std::time::Duration;

    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(val: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(val.as_secs_f64())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
