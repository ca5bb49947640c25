use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use super::Location;
use crate::retry::retry;

const LOOKUP_DEADLINE: Duration = Duration::from_secs(5);
const CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// IP-to-location lookup. Injected so tests can script results and
/// production can rate-limit; lookups are best-effort and must never block
/// a login beyond the deadline.
#[async_trait]
pub trait GeoResolver: Send + Sync {
    async fn resolve(&self, ip: &str) -> Option<Location>;
}

/// Resolver that never finds anything. Default for tests.
pub struct NoopGeoResolver;

#[async_trait]
impl GeoResolver for NoopGeoResolver {
    async fn resolve(&self, _ip: &str) -> Option<Location> {
        None
    }
}

#[derive(Debug, Deserialize)]
struct GeoApiResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    country: String,
    lat: Option<f64>,
    lon: Option<f64>,
}

pub struct HttpGeoResolver {
    client: Client,
    base_url: String,
    cache: Mutex<GeoCache>,
}

#[derive(Default)]
struct GeoCache {
    entries: HashMap<String, (Instant, Location)>,
    operation_count: u64,
}

impl GeoCache {
    fn get(&mut self, ip: &str) -> Option<Location> {
        self.maybe_cleanup();
        let (stored_at, location) = self.entries.get(ip)?;
        if stored_at.elapsed() > CACHE_TTL {
            return None;
        }
        Some(location.clone())
    }

    fn insert(&mut self, ip: &str, location: Location) {
        self.entries.insert(ip.to_string(), (Instant::now(), location));
    }

    fn maybe_cleanup(&mut self) {
        self.operation_count = self.operation_count.wrapping_add(1);
        if !self.operation_count.is_multiple_of(128) {
            return;
        }
        self.entries
            .retain(|_, (stored_at, _)| stored_at.elapsed() <= CACHE_TTL);
    }
}

impl HttpGeoResolver {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .user_agent("handovr/0.3")
                .timeout(LOOKUP_DEADLINE)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Mutex::new(GeoCache::default()),
        }
    }

    async fn fetch(&self, ip: &str) -> Result<GeoApiResponse, reqwest::Error> {
        let url = format!("{}/{ip}", self.base_url);
        self.client.get(&url).send().await?.json().await
    }
}

#[async_trait]
impl GeoResolver for HttpGeoResolver {
    async fn resolve(&self, ip: &str) -> Option<Location> {
        if let Some(cached) = self.cache.lock().await.get(ip) {
            return Some(cached);
        }

        // Connection failures get one cheap retry; a timeout already ate
        // the whole deadline and does not.
        let response = retry(
            2,
            Duration::from_millis(250),
            |e: &reqwest::Error| e.is_connect(),
            || self.fetch(ip),
        )
        .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                debug!("Geolocation lookup failed for {}: {}", ip, e);
                return None;
            }
        };

        if response.status != "success" {
            debug!("Geolocation provider returned {} for {}", response.status, ip);
            return None;
        }

        let (lat, lon) = (response.lat?, response.lon?);
        let location = Location::new(&response.city, &response.country, lat, lon);

        self.cache.lock().await.insert(ip, location.clone());

        Some(location)
    }
}
