// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection and synchronization settings.
//!
//! The host application owns these values; the coordinator only reads them.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use tuyapump_lib::config::{CloudConfig, ConnectionConfig, Region, SyncSettings};
//!
//! let cloud = CloudConfig::new("access-id", "access-secret", "bf0123456789abcdef")
//!     .with_region(Region::Us)
//!     .with_timeout(Duration::from_secs(5));
//! let connection = ConnectionConfig::Cloud(cloud);
//!
//! let settings = SyncSettings::default().with_poll_interval(Duration::from_secs(300));
//! assert_eq!(settings.poll_interval(), Duration::from_secs(300));
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

// ============================================================================
// Region
// ============================================================================

/// Cloud data center hosting the device account.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Region {
    /// Central Europe data center.
    #[default]
    Eu,
    /// Western America data center.
    Us,
    /// China data center.
    Cn,
    /// India data center.
    In,
    /// Any other endpoint, given as a full base URL.
    Custom(String),
}

impl Region {
    /// Returns the base URL of the region's open API.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Eu => "https://openapi.tuyaeu.com",
            Self::Us => "https://openapi.tuyaus.com",
            Self::Cn => "https://openapi.tuyacn.com",
            Self::In => "https://openapi.tuyain.com",
            Self::Custom(url) => url.trim_end_matches('/'),
        }
    }
}

impl FromStr for Region {
    type Err = Error;

    /// Accepts a region code (`eu`, `us`, `cn`, `in`, any case) or a full
    /// `http(s)://` URL.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "eu" => Ok(Self::Eu),
            "us" => Ok(Self::Us),
            "cn" => Ok(Self::Cn),
            "in" => Ok(Self::In),
            lower if lower.starts_with("http://") || lower.starts_with("https://") => {
                Ok(Self::Custom(trimmed.to_string()))
            }
            _ => Err(Error::InvalidConfiguration(format!(
                "unknown region: {trimmed}"
            ))),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eu => f.write_str("EU"),
            Self::Us => f.write_str("US"),
            Self::Cn => f.write_str("CN"),
            Self::In => f.write_str("IN"),
            Self::Custom(url) => f.write_str(url),
        }
    }
}

// ============================================================================
// CloudConfig
// ============================================================================

/// Credentials and addressing for the cloud REST transport.
#[derive(Clone)]
pub struct CloudConfig {
    access_id: String,
    access_secret: String,
    device_id: String,
    region: Region,
    timeout: Duration,
}

impl CloudConfig {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a cloud configuration in the default region.
    #[must_use]
    pub fn new(
        access_id: impl Into<String>,
        access_secret: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            access_id: access_id.into(),
            access_secret: access_secret.into(),
            device_id: device_id.into(),
            region: Region::default(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets the data center region.
    #[must_use]
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the access id (client id).
    #[must_use]
    pub fn access_id(&self) -> &str {
        &self.access_id
    }

    /// Returns the shared signing secret.
    #[must_use]
    pub fn access_secret(&self) -> &str {
        &self.access_secret
    }

    /// Returns the device id.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns the region.
    #[must_use]
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudConfig")
            .field("access_id", &self.access_id)
            .field("access_secret", &"<redacted>")
            .field("device_id", &self.device_id)
            .field("region", &self.region)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// LocalConfig
// ============================================================================

/// Addressing for the local socket transport.
///
/// The socket itself is owned by the device library handed to the
/// coordinator builder; these values identify the device and pick its
/// attribute map.
#[derive(Clone)]
pub struct LocalConfig {
    device_id: String,
    address: String,
    local_key: String,
    protocol_version: f32,
    model_id: Option<String>,
}

impl LocalConfig {
    /// Protocol version assumed when none is configured.
    pub const DEFAULT_PROTOCOL_VERSION: f32 = 3.4;

    /// Creates a local configuration.
    #[must_use]
    pub fn new(
        device_id: impl Into<String>,
        address: impl Into<String>,
        local_key: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            address: address.into(),
            local_key: local_key.into(),
            protocol_version: Self::DEFAULT_PROTOCOL_VERSION,
            model_id: None,
        }
    }

    /// Sets the protocol version spoken by the device.
    #[must_use]
    pub fn with_protocol_version(mut self, version: f32) -> Self {
        self.protocol_version = version;
        self
    }

    /// Pins the model whose attribute map should be used.
    ///
    /// Without it the local transport uses the default map, since model
    /// discovery needs the cloud API.
    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Returns the device id.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns the network address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the local encryption key.
    #[must_use]
    pub fn local_key(&self) -> &str {
        &self.local_key
    }

    /// Returns the protocol version.
    #[must_use]
    pub fn protocol_version(&self) -> f32 {
        self.protocol_version
    }

    /// Returns the pinned model id, if any.
    #[must_use]
    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }
}

impl fmt::Debug for LocalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalConfig")
            .field("device_id", &self.device_id)
            .field("address", &self.address)
            .field("local_key", &"<redacted>")
            .field("protocol_version", &self.protocol_version)
            .field("model_id", &self.model_id)
            .finish()
    }
}

// ============================================================================
// ConnectionConfig
// ============================================================================

/// Selects the transport. Exactly one is active for a coordinator's lifetime.
#[derive(Debug, Clone)]
pub enum ConnectionConfig {
    /// Poll the cloud REST API.
    Cloud(CloudConfig),
    /// Listen on the local socket.
    Local(LocalConfig),
}

impl ConnectionConfig {
    /// Returns the device id of either variant.
    #[must_use]
    pub fn device_id(&self) -> &str {
        match self {
            Self::Cloud(cfg) => cfg.device_id(),
            Self::Local(cfg) => cfg.device_id(),
        }
    }

    /// Returns true if this is a cloud connection.
    #[must_use]
    pub fn is_cloud(&self) -> bool {
        matches!(self, Self::Cloud(_))
    }

    /// Returns true if this is a local connection.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

// ============================================================================
// SyncSettings
// ============================================================================

/// Timing knobs of the coordinator.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tuyapump_lib::config::SyncSettings;
///
/// // Poll intervals below one minute are raised to one minute.
/// let settings = SyncSettings::default().with_poll_interval(Duration::from_secs(5));
/// assert_eq!(settings.poll_interval(), Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    poll_interval: Duration,
    online_slack: Duration,
    echo_timeout: Duration,
    debounce_delay: Duration,
    heartbeat_interval: Duration,
    loop_backoff: Duration,
    listen_idle: Duration,
    refresh_after_command: Option<Duration>,
}

impl SyncSettings {
    /// Default cloud poll interval.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3 * 60);
    /// Shortest cloud poll interval accepted.
    pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(60);
    /// Extra age tolerated on cloud timestamps before the device counts as offline.
    pub const DEFAULT_ONLINE_SLACK: Duration = Duration::from_secs(60);
    /// How long a sent value overrides contradicting device reports.
    pub const DEFAULT_ECHO_TIMEOUT: Duration = Duration::from_secs(8);
    /// Delay before a debounced local write reaches the wire.
    pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_secs(1);
    /// Period of local keep-alives.
    pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
    /// Pause after a failed background loop iteration.
    pub const DEFAULT_LOOP_BACKOFF: Duration = Duration::from_secs(5);
    /// Shortest time between two local receive calls.
    pub const DEFAULT_LISTEN_IDLE: Duration = Duration::from_millis(250);
    /// Delay of the refresh that follows a successful cloud write.
    pub const DEFAULT_REFRESH_AFTER_COMMAND: Duration = Duration::from_secs(2);

    /// Sets the cloud poll interval, clamped to [`Self::MIN_POLL_INTERVAL`].
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Self::MIN_POLL_INTERVAL);
        self
    }

    /// Sets the freshness slack used by cloud online inference.
    #[must_use]
    pub fn with_online_slack(mut self, slack: Duration) -> Self {
        self.online_slack = slack;
        self
    }

    /// Sets the echo suppression window.
    #[must_use]
    pub fn with_echo_timeout(mut self, timeout: Duration) -> Self {
        self.echo_timeout = timeout;
        self
    }

    /// Sets the local write debounce delay.
    #[must_use]
    pub fn with_debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    /// Sets the local keep-alive period.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the pause after a failed loop iteration.
    #[must_use]
    pub fn with_loop_backoff(mut self, backoff: Duration) -> Self {
        self.loop_backoff = backoff;
        self
    }

    /// Sets the shortest time between two local receive calls.
    ///
    /// Only matters for device libraries that return from `receive` at
    /// once when no push is waiting.
    #[must_use]
    pub fn with_listen_idle(mut self, idle: Duration) -> Self {
        self.listen_idle = idle;
        self
    }

    /// Sets or disables the refresh scheduled after a cloud write.
    #[must_use]
    pub fn with_refresh_after_command(mut self, delay: Option<Duration>) -> Self {
        self.refresh_after_command = delay;
        self
    }

    /// Returns the cloud poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Returns the online slack.
    #[must_use]
    pub fn online_slack(&self) -> Duration {
        self.online_slack
    }

    /// Returns the echo suppression window.
    #[must_use]
    pub fn echo_timeout(&self) -> Duration {
        self.echo_timeout
    }

    /// Returns the debounce delay.
    #[must_use]
    pub fn debounce_delay(&self) -> Duration {
        self.debounce_delay
    }

    /// Returns the heartbeat period.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Returns the loop backoff.
    #[must_use]
    pub fn loop_backoff(&self) -> Duration {
        self.loop_backoff
    }

    /// Returns the listen idle delay.
    #[must_use]
    pub fn listen_idle(&self) -> Duration {
        self.listen_idle
    }

    /// Returns the post-command refresh delay, if enabled.
    #[must_use]
    pub fn refresh_after_command(&self) -> Option<Duration> {
        self.refresh_after_command
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            online_slack: Self::DEFAULT_ONLINE_SLACK,
            echo_timeout: Self::DEFAULT_ECHO_TIMEOUT,
            debounce_delay: Self::DEFAULT_DEBOUNCE_DELAY,
            heartbeat_interval: Self::DEFAULT_HEARTBEAT_INTERVAL,
            loop_backoff: Self::DEFAULT_LOOP_BACKOFF,
            listen_idle: Self::DEFAULT_LISTEN_IDLE,
            refresh_after_command: Some(Self::DEFAULT_REFRESH_AFTER_COMMAND),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_endpoints() {
        assert_eq!(Region::Eu.endpoint(), "https://openapi.tuyaeu.com");
        assert_eq!(Region::Us.endpoint(), "https://openapi.tuyaus.com");
        assert_eq!(Region::Cn.endpoint(), "https://openapi.tuyacn.com");
        assert_eq!(Region::In.endpoint(), "https://openapi.tuyain.com");
    }

    #[test]
    fn region_parse_is_case_insensitive() {
        assert_eq!("EU".parse::<Region>().unwrap(), Region::Eu);
        assert_eq!(" us ".parse::<Region>().unwrap(), Region::Us);
    }

    #[test]
    fn region_parse_custom_url() {
        let region: Region = "http://127.0.0.1:8080/".parse().unwrap();
        assert_eq!(region.endpoint(), "http://127.0.0.1:8080");
    }

    #[test]
    fn region_parse_unknown() {
        assert!("mars".parse::<Region>().is_err());
    }

    #[test]
    fn cloud_config_defaults() {
        let config = CloudConfig::new("id", "secret", "dev");
        assert_eq!(config.region(), &Region::Eu);
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn cloud_config_debug_redacts_secret() {
        let config = CloudConfig::new("id", "top-secret", "dev");
        let debug = format!("{config:?}");
        assert!(!debug.contains("top-secret"));
    }

    #[test]
    fn local_config_defaults() {
        let config = LocalConfig::new("dev", "192.168.1.20", "key");
        assert!((config.protocol_version() - 3.4).abs() < f32::EPSILON);
        assert!(config.model_id().is_none());

        let config = config.with_model_id("000003jtyb").with_protocol_version(3.3);
        assert_eq!(config.model_id(), Some("000003jtyb"));
    }

    #[test]
    fn connection_config_device_id() {
        let cloud = ConnectionConfig::Cloud(CloudConfig::new("id", "secret", "dev-a"));
        let local = ConnectionConfig::Local(LocalConfig::new("dev-b", "10.0.0.2", "key"));
        assert_eq!(cloud.device_id(), "dev-a");
        assert!(cloud.is_cloud());
        assert_eq!(local.device_id(), "dev-b");
        assert!(local.is_local());
    }

    #[test]
    fn poll_interval_is_clamped() {
        let settings = SyncSettings::default().with_poll_interval(Duration::from_secs(1));
        assert_eq!(settings.poll_interval(), SyncSettings::MIN_POLL_INTERVAL);
    }

    #[test]
    fn settings_defaults() {
        let settings = SyncSettings::default();
        assert_eq!(settings.poll_interval(), Duration::from_secs(180));
        assert_eq!(settings.echo_timeout(), Duration::from_secs(8));
        assert_eq!(settings.debounce_delay(), Duration::from_secs(1));
        assert_eq!(settings.listen_idle(), Duration::from_millis(250));
        assert_eq!(
            settings.refresh_after_command(),
            Some(Duration::from_secs(2))
        );
    }
}
