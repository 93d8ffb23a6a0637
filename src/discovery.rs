//! Discovery agent (component H).
//!
//! A passive listener for OSC-style multicast advertisements: each
//! message carries `(pid, hostname)`, where hostname is encoded as
//! `<name>._<ip>:<port>._<displayName>` (§6). The listener itself is
//! black-boxed behind [`Advertisement`] — this module owns the liveness
//! table and its TTL, not the multicast socket plumbing, matching the
//! spec's own framing of the wire format as an external interface.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::config::ClientConfig;

/// One advertisement as received off the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Advertisement {
    pub pid: i32,
    pub hostname: String,
}

/// A decoded `<name>._<ip>:<port>._<displayName>` hostname.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerIdentity {
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub display_name: String,
}

impl ServerIdentity {
    pub fn parse(hostname: &str) -> Option<Self> {
        let mut parts = hostname.splitn(3, "._");
        let name = parts.next()?.to_string();
        let ip_port = parts.next()?;
        let display_name = parts.next()?.to_string();
        let (ip, port) = ip_port.rsplit_once(':')?;
        let port = port.parse().ok()?;
        Some(ServerIdentity {
            name,
            ip: ip.to_string(),
            port,
            display_name,
        })
    }
}

struct Record {
    identity: ServerIdentity,
    last_seen: Instant,
}

/// Liveness table of servers seen on the multicast group, guarded by a
/// single mutex (§4.H). The table is written by the discovery thread and
/// read by `list_alive` from the control thread; both paths go through the
/// same lock.
#[derive(Default)]
pub struct DiscoveryTable {
    records: Mutex<HashMap<String, Record>>,
}

impl DiscoveryTable {
    pub fn new() -> Self {
        DiscoveryTable::default()
    }

    /// Record or refresh an advertisement. Malformed hostnames are
    /// dropped silently — a discovery message we can't parse is not a
    /// protocol error worth surfacing to callers.
    pub fn observe(&self, ad: &Advertisement) {
        let Some(identity) = ServerIdentity::parse(&ad.hostname) else {
            return;
        };
        let key = format!("{}:{}", ad.hostname, ad.pid);
        trace!(key = %key, "discovery advertisement observed");
        let mut records = self.records.lock().unwrap();
        records.insert(
            key,
            Record {
                identity,
                last_seen: Instant::now(),
            },
        );
    }

    /// Every record whose last advertisement was seen within `ttl` of now,
    /// as `(displayName, ip, port)` triples.
    pub fn list_alive(&self, ttl: Duration) -> Vec<(String, String, u16)> {
        let records = self.records.lock().unwrap();
        let now = Instant::now();
        records
            .values()
            .filter(|r| now.duration_since(r.last_seen) <= ttl)
            .map(|r| (r.identity.display_name.clone(), r.identity.ip.clone(), r.identity.port))
            .collect()
    }

    /// [`list_alive`](Self::list_alive) using `config.discovery_ttl` as the
    /// liveness window, so the TTL a caller actually gets is the one
    /// carried in its `ClientConfig` rather than a value picked ad hoc at
    /// each call site.
    pub fn list_alive_configured(&self, config: &ClientConfig) -> Vec<(String, String, u16)> {
        self.list_alive(config.discovery_ttl)
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_documented_hostname_encoding() {
        let identity = ServerIdentity::parse("faustd._10.0.0.5:7777._Studio Mac").unwrap();
        assert_eq!(identity.name, "faustd");
        assert_eq!(identity.ip, "10.0.0.5");
        assert_eq!(identity.port, 7777);
        assert_eq!(identity.display_name, "Studio Mac");
    }

    #[test]
    fn malformed_hostname_is_dropped_not_errored() {
        let table = DiscoveryTable::new();
        table.observe(&Advertisement {
            pid: 1,
            hostname: "not-the-right-shape".to_string(),
        });
        assert!(table.is_empty());
    }

    #[test]
    fn fresh_advertisement_is_alive_stale_one_is_not() {
        let table = DiscoveryTable::new();
        table.observe(&Advertisement {
            pid: 42,
            hostname: "faustd._127.0.0.1:7777._local".to_string(),
        });
        assert_eq!(table.list_alive(Duration::from_secs(3)).len(), 1);
        assert_eq!(table.list_alive(Duration::from_secs(0)).len(), 0);
    }

    #[test]
    fn repeated_advertisement_refreshes_rather_than_duplicates() {
        let table = DiscoveryTable::new();
        let ad = Advertisement {
            pid: 42,
            hostname: "faustd._127.0.0.1:7777._local".to_string(),
        };
        table.observe(&ad);
        table.observe(&ad);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn list_alive_configured_uses_the_configs_ttl() {
        let table = DiscoveryTable::new();
        table.observe(&Advertisement {
            pid: 1,
            hostname: "faustd._127.0.0.1:7777._local".to_string(),
        });
        let mut config = ClientConfig::default();
        assert_eq!(table.list_alive_configured(&config).len(), 1);
        config.discovery_ttl = Duration::from_secs(0);
        assert_eq!(table.list_alive_configured(&config).len(), 0);
    }
}
