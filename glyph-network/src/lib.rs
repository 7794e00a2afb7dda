use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;

const GOSSIP_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_DHT_TTL: Duration = Duration::from_secs(300);

/// Fire-and-forget replication to known peer gateways. Failures are logged
/// and swallowed: gossip must never block or fail the client-facing request
/// that triggered it (spec.md §4.H, §5).
pub struct PeerGossip {
    client: reqwest::Client,
}

impl Default for PeerGossip {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerGossip {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(GOSSIP_TIMEOUT)
            .build()
            .expect("reqwest client with static config always builds");
        Self { client }
    }

    pub async fn broadcast_receipts<T: Serialize + Sync>(&self, peers: &[String], rows: &T) {
        self.broadcast(peers, "gossip/receipts", rows).await;
    }

    pub async fn broadcast_mint_proposals<T: Serialize + Sync>(&self, peers: &[String], proposals: &T) {
        self.broadcast(peers, "gossip/mint_proposals", proposals).await;
    }

    async fn broadcast<T: Serialize + Sync>(&self, peers: &[String], route: &str, body: &T) {
        for peer in peers {
            let url = format!("{}/{route}", peer.trim_end_matches('/'));
            if let Err(err) = self.client.post(&url).json(body).send().await {
                tracing::warn!(peer = %peer, error = %err, "gossip delivery failed");
            }
        }
    }
}

struct Expiring {
    value: Vec<u8>,
    expires_at: Instant,
}

/// Abstracts the DHT used for cross-gateway discovery (receipt heads,
/// epoch roots, price asks). Real DHT transport is out of scope; this
/// stands in for it with an in-process TTL store keyed by `(key, subkey)`
/// (spec.md §4.H).
pub trait Dht: Send + Sync {
    fn publish(&self, key: &str, subkey: &str, value: Vec<u8>, ttl: Duration);
    fn fetch(&self, key: &str, subkey: &str) -> Option<Vec<u8>>;
    /// All live (non-expired) subkeys published under `key`.
    fn fetch_all(&self, key: &str) -> Vec<(String, Vec<u8>)>;
}

#[derive(Default)]
pub struct InMemoryDht {
    store: RwLock<HashMap<(String, String), Expiring>>,
}

impl InMemoryDht {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Dht for InMemoryDht {
    fn publish(&self, key: &str, subkey: &str, value: Vec<u8>, ttl: Duration) {
        let mut store = self.store.write();
        store.insert(
            (key.to_string(), subkey.to_string()),
            Expiring {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn fetch(&self, key: &str, subkey: &str) -> Option<Vec<u8>> {
        let store = self.store.read();
        let entry = store.get(&(key.to_string(), subkey.to_string()))?;
        if entry.expires_at < Instant::now() {
            return None;
        }
        Some(entry.value.clone())
    }

    fn fetch_all(&self, key: &str) -> Vec<(String, Vec<u8>)> {
        let store = self.store.read();
        let now = Instant::now();
        store
            .iter()
            .filter(|((k, _), entry)| k == key && entry.expires_at >= now)
            .map(|((_, subkey), entry)| (subkey.clone(), entry.value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_then_fetch_round_trips() {
        let dht = InMemoryDht::new();
        dht.publish("receipts", "gw-pub", b"head-hash".to_vec(), DEFAULT_DHT_TTL);
        assert_eq!(dht.fetch("receipts", "gw-pub"), Some(b"head-hash".to_vec()));
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let dht = InMemoryDht::new();
        dht.publish("prices", "gw-pub", b"100".to_vec(), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(dht.fetch("prices", "gw-pub"), None);
    }

    #[test]
    fn fetch_all_only_returns_live_entries_for_key() {
        let dht = InMemoryDht::new();
        dht.publish("receipts", "a", b"1".to_vec(), DEFAULT_DHT_TTL);
        dht.publish("receipts", "b", b"2".to_vec(), DEFAULT_DHT_TTL);
        dht.publish("epochs", "c", b"3".to_vec(), DEFAULT_DHT_TTL);
        let mut all = dht.fetch_all("receipts");
        all.sort();
        assert_eq!(
            all,
            vec![("a".to_string(), b"1".to_vec()), ("b".to_string(), b"2".to_vec())]
        );
    }
}
