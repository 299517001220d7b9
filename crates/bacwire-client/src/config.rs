use bacwire_datalink::{ForeignDevice, TransportConfig, DEFAULT_QUEUE_DEPTH};
use std::net::SocketAddr;
use std::time::Duration;

/// Shortest expiry scan period.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(100);
/// Longest expiry scan period.
pub const MAX_TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Settings for a [`BacnetClient`](crate::BacnetClient).
///
/// ```
/// use bacwire_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_bind_addr("0.0.0.0:47809".parse().unwrap())
///     .with_request_timeout(Duration::from_secs(5))
///     .with_max_retries(1);
/// assert_eq!(config.max_retries, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientConfig {
    pub transport: TransportConfig,
    /// Time to wait for a response before retransmitting.
    pub request_timeout: Duration,
    /// Retransmissions after the first send.
    pub max_retries: u8,
    /// Expiry scan period; see [`ClientConfig::effective_tick_interval`].
    pub tick_interval: Duration,
    /// Depth of the inbound datagram queue.
    pub incoming_queue: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            request_timeout: Duration::from_secs(3),
            max_retries: 3,
            tick_interval: MIN_TICK_INTERVAL,
            incoming_queue: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl ClientConfig {
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.transport.bind_addr = addr;
        self
    }

    pub fn with_broadcast_addr(mut self, addr: SocketAddr) -> Self {
        self.transport.broadcast_addr = addr;
        self
    }

    pub fn with_foreign_device(mut self, foreign_device: ForeignDevice) -> Self {
        self.transport.foreign_device = Some(foreign_device);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    pub fn with_max_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.clamp(MIN_TICK_INTERVAL, MAX_TICK_INTERVAL);
        self
    }

    pub fn with_incoming_queue(mut self, depth: usize) -> Self {
        self.incoming_queue = depth.max(1);
        self
    }

    /// The tick interval clamped to 100–250 ms, whatever was stored in the
    /// public field.
    pub fn effective_tick_interval(&self) -> Duration {
        self.tick_interval
            .clamp(MIN_TICK_INTERVAL, MAX_TICK_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::{ClientConfig, MAX_TICK_INTERVAL, MIN_TICK_INTERVAL};
    use bacwire_datalink::ForeignDevice;
    use std::time::Duration;

    #[test]
    fn defaults_match_documented_values() {
        let config = ClientConfig::default();
        assert_eq!(config.transport.bind_addr.to_string(), "0.0.0.0:47808");
        assert_eq!(config.transport.broadcast_addr.to_string(), "255.255.255.255:47808");
        assert!(config.transport.foreign_device.is_none());
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.tick_interval, Duration::from_millis(100));
        assert_eq!(config.incoming_queue, 256);
    }

    #[test]
    fn tick_interval_is_clamped() {
        let fast = ClientConfig::default().with_tick_interval(Duration::from_millis(10));
        assert_eq!(fast.tick_interval, MIN_TICK_INTERVAL);
        let slow = ClientConfig::default().with_tick_interval(Duration::from_secs(1));
        assert_eq!(slow.tick_interval, MAX_TICK_INTERVAL);

        let mut raw = ClientConfig::default();
        raw.tick_interval = Duration::from_millis(5);
        assert_eq!(raw.effective_tick_interval(), MIN_TICK_INTERVAL);
    }

    #[test]
    fn foreign_device_default_ttl() {
        let config = ClientConfig::default()
            .with_foreign_device(ForeignDevice::new("10.0.0.1:47808".parse().unwrap()));
        assert_eq!(config.transport.foreign_device.unwrap().ttl_seconds, 900);
    }
}
