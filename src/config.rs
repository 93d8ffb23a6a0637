//! Ambient configuration layer.
//!
//! A plain, programmatically constructed settings struct — no implicit
//! environment-variable reads inside library code. A CLI or embedding
//! application is free to populate it from argv, a file, or the
//! environment; this crate only defines the shape and sensible defaults.

use std::time::Duration;

/// Client-side tunables for the control-plane and data-plane transports.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    /// Default server host used when a caller doesn't name one explicitly.
    pub default_host: String,
    /// Default server control-plane port.
    pub default_port: u16,
    /// Multicast discovery port (`224.0.0.1:<port>`).
    pub discovery_port: u16,
    /// How long a discovered server is considered alive without a refresh.
    pub discovery_ttl: Duration,
    /// Connect and total timeout for control-plane HTTP requests.
    pub control_timeout: Duration,
    /// Upper bound on packed control-channel size, in floats, each
    /// direction.
    pub control_channel_capacity: usize,
    /// Data-plane master/slave latency parameter.
    pub transport_latency: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            default_host: "localhost".to_string(),
            default_port: 7777,
            discovery_port: 7770,
            discovery_ttl: Duration::from_secs(3),
            control_timeout: Duration::from_secs(15),
            control_channel_capacity: 8192,
            transport_latency: 5,
        }
    }
}

impl ClientConfig {
    /// The `host:port` identity string factory keys are hashed against.
    pub fn server_id(&self, host: &str, port: u16) -> String {
        format!("{host}:{port}")
    }

    /// Base URL for the control plane at the default host/port.
    pub fn default_base_url(&self) -> String {
        format!("http://{}:{}", self.default_host, self.default_port)
    }

    /// The multicast group/port a discovery listener should bind to
    /// (§6: `224.0.0.1:<port>`). The socket itself is an external
    /// collaborator (§1); this is the address this crate tells it to use.
    pub fn discovery_multicast_addr(&self) -> String {
        format!("224.0.0.1:{}", self.discovery_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_wire_constants() {
        let config = ClientConfig::default();
        assert_eq!(config.discovery_port, 7770);
        assert_eq!(config.control_channel_capacity, 8192);
        assert_eq!(config.discovery_ttl, Duration::from_secs(3));
        assert_eq!(config.control_timeout, Duration::from_secs(15));
    }

    #[test]
    fn server_id_combines_host_and_port() {
        let config = ClientConfig::default();
        assert_eq!(config.server_id("box", 9000), "box:9000");
    }

    #[test]
    fn discovery_multicast_addr_uses_the_configured_port() {
        let mut config = ClientConfig::default();
        config.discovery_port = 7770;
        assert_eq!(config.discovery_multicast_addr(), "224.0.0.1:7770");
    }
}
