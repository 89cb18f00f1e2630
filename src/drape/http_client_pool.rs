//! Shared HTTP clients, one per API base URL.
//!
//! The generation client, the upload relay and gallery downloads all talk to the same few
//! hosts. Keeping one configured `reqwest::Client` per base URL reuses connections and TLS
//! sessions across a batch instead of reconnecting for every garment.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::time::Duration;

/// Global cache of HTTP clients indexed by base URL.
static CLIENT_POOL: Lazy<DashMap<String, reqwest::Client>> = Lazy::new(DashMap::new);

/// Creates or retrieves a shared HTTP client for the given base URL.
///
/// The client is configured with:
/// - up to 16 idle connections per host
/// - 90-second idle timeout for persistent connections
/// - TCP keepalive every 60 seconds
/// - 30-second connection timeout
///
/// No overall request timeout is set here. Generation calls legitimately take tens of
/// seconds, so callers bound them with their own deadline.
pub fn get_or_create_client(base_url: &str) -> reqwest::Client {
    CLIENT_POOL
        .entry(base_url.to_string())
        .or_insert_with(create_pooled_client)
        .clone()
}

fn create_pooled_client() -> reqwest::Client {
    reqwest::ClientBuilder::new()
        .pool_max_idle_per_host(16)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .connect_timeout(Duration::from_secs(30))
        .user_agent(concat!("drape/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            log::warn!(
                "drape::http_client_pool::create_pooled_client(): falling back to default client: {}",
                e
            );
            reqwest::Client::new()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_pool_caches_per_base_url() {
        let url = "https://api.replicate.com/v1";
        let _client1 = get_or_create_client(url);
        let _client2 = get_or_create_client(url);
        assert!(CLIENT_POOL.contains_key(url));

        let other = "https://replicate.delivery";
        let _client3 = get_or_create_client(other);
        assert!(CLIENT_POOL.contains_key(other));
        // Other tests may add entries concurrently.
        assert!(CLIENT_POOL.len() >= 2);
    }
}
