use serde::{Deserialize, Serialize};
use std::net::IpAddr;

pub mod client;
pub mod device;

pub use client::{GeoResolver, HttpGeoResolver, NoopGeoResolver};
pub use device::{DeviceInfo, DeviceType, haversine_km, is_suspicious_travel, parse_device};

/// Resolved location of a request IP. `latitude`/`longitude` are absent for
/// synthetic results like the local-network placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub pretty: String,
}

impl Location {
    #[must_use]
    pub fn new(city: &str, country: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            city: city.to_string(),
            country: country.to_string(),
            latitude: Some(latitude),
            longitude: Some(longitude),
            pretty: format!("{city}, {country}"),
        }
    }

    #[must_use]
    pub fn local_network() -> Self {
        Self {
            city: "Local Network".to_string(),
            country: "Local Network".to_string(),
            latitude: None,
            longitude: None,
            pretty: "Local Network".to_string(),
        }
    }
}

/// Best-effort lookup. Private and loopback ranges short-circuit to the
/// synthetic local-network result; every failure mode is a `None` the
/// caller proceeds past.
pub async fn resolve_location(resolver: &dyn GeoResolver, ip: &str) -> Option<Location> {
    if is_private_ip(ip) {
        return Some(Location::local_network());
    }

    resolver.resolve(ip).await
}

#[must_use]
pub fn is_private_ip(ip: &str) -> bool {
    let Ok(addr) = ip.parse::<IpAddr>() else {
        return false;
    };

    match addr {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            let segments = v6.segments();
            v6.is_loopback()
                || v6.is_unspecified()
                || (segments[0] & 0xfe00) == 0xfc00
                || (segments[0] & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_ranges_are_detected() {
        assert!(is_private_ip("127.0.0.1"));
        assert!(is_private_ip("10.1.2.3"));
        assert!(is_private_ip("192.168.0.10"));
        assert!(is_private_ip("172.16.0.1"));
        assert!(is_private_ip("169.254.1.1"));
        assert!(is_private_ip("::1"));
        assert!(is_private_ip("fd00::1"));
        assert!(is_private_ip("fe80::1"));
    }

    #[test]
    fn public_addresses_are_not_private() {
        assert!(!is_private_ip("1.2.3.4"));
        assert!(!is_private_ip("8.8.8.8"));
        assert!(!is_private_ip("2001:4860:4860::8888"));
        assert!(!is_private_ip("not-an-ip"));
    }

    #[tokio::test]
    async fn loopback_short_circuits_to_local_network() {
        let resolver = NoopGeoResolver;
        let location = resolve_location(&resolver, "127.0.0.1").await.unwrap();
        assert_eq!(location.pretty, "Local Network");
        assert!(location.latitude.is_none());
    }

    #[tokio::test]
    async fn noop_resolver_yields_none_for_public_ips() {
        let resolver = NoopGeoResolver;
        assert!(resolve_location(&resolver, "1.2.3.4").await.is_none());
    }
}
