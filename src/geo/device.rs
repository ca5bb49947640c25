//! User-Agent parsing, device fingerprints, and travel plausibility.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
    Unknown,
}

impl DeviceType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub os: Option<String>,
    pub os_version: Option<String>,
    pub browser: Option<String>,
    pub browser_version: Option<String>,
    pub device_type: DeviceType,
}

impl DeviceInfo {
    /// Display form: `os[ version] - browser[ version] - deviceType`.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let os = match (&self.os, &self.os_version) {
            (Some(os), Some(version)) => format!("{os} {version}"),
            (Some(os), None) => os.clone(),
            (None, _) => "Unknown".to_string(),
        };

        let browser = match (&self.browser, &self.browser_version) {
            (Some(browser), Some(version)) => format!("{browser} {version}"),
            (Some(browser), None) => browser.clone(),
            (None, _) => "Unknown".to_string(),
        };

        format!("{os} - {browser} - {}", self.device_type)
    }

    /// Two fingerprints are the same device when OS, browser, and device
    /// type all match. Undefined fields are wildcards.
    #[must_use]
    pub fn same_device(&self, other: &Self) -> bool {
        fn field_matches(a: &Option<String>, b: &Option<String>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        }

        let type_matches = self.device_type == DeviceType::Unknown
            || other.device_type == DeviceType::Unknown
            || self.device_type == other.device_type;

        field_matches(&self.os, &other.os) && field_matches(&self.browser, &other.browser) && type_matches
    }
}

#[must_use]
pub fn parse_device(user_agent: &str) -> DeviceInfo {
    if user_agent.trim().is_empty() {
        return DeviceInfo {
            os: None,
            os_version: None,
            browser: None,
            browser_version: None,
            device_type: DeviceType::Unknown,
        };
    }

    let (os, os_version) = parse_os(user_agent);
    let (browser, browser_version) = parse_browser(user_agent);
    let device_type = parse_device_type(user_agent);

    DeviceInfo {
        os,
        os_version,
        browser,
        browser_version,
        device_type,
    }
}

fn parse_os(ua: &str) -> (Option<String>, Option<String>) {
    if let Some(rest) = substr_after(ua, "Windows NT ") {
        let version = match version_prefix(rest).as_str() {
            "10.0" => "10",
            "6.3" => "8.1",
            "6.2" => "8",
            "6.1" => "7",
            other => return (Some("Windows".into()), non_empty(other)),
        };
        return (Some("Windows".into()), Some(version.into()));
    }

    if ua.contains("iPhone OS") || ua.contains("iPad; CPU OS") {
        let marker = if ua.contains("iPhone OS") { "iPhone OS " } else { "CPU OS " };
        let version = substr_after(ua, marker)
            .map(|rest| version_prefix(&rest.replace('_', ".")))
            .and_then(|v| non_empty(&v));
        return (Some("iOS".into()), version);
    }

    if let Some(rest) = substr_after(ua, "Mac OS X ") {
        let version = version_prefix(&rest.replace('_', "."));
        return (Some("macOS".into()), non_empty(&version));
    }

    if let Some(rest) = substr_after(ua, "Android ") {
        let version = version_prefix(rest);
        return (Some("Android".into()), non_empty(&version));
    }

    if ua.contains("CrOS") {
        return (Some("Chrome OS".into()), None);
    }

    if ua.contains("Linux") {
        return (Some("Linux".into()), None);
    }

    (None, None)
}

fn parse_browser(ua: &str) -> (Option<String>, Option<String>) {
    // Order matters: Chromium-derived browsers also advertise Chrome and
    // Safari tokens.
    for (token, name) in [
        ("Edg/", "Edge"),
        ("OPR/", "Opera"),
        ("Firefox/", "Firefox"),
        ("Chrome/", "Chrome"),
    ] {
        if let Some(rest) = substr_after(ua, token) {
            return (Some(name.into()), non_empty(&version_prefix(rest)));
        }
    }

    if ua.contains("Safari/") {
        let version = substr_after(ua, "Version/").map(|rest| version_prefix(rest));
        return (Some("Safari".into()), version.and_then(|v| non_empty(&v)));
    }

    (None, None)
}

fn parse_device_type(ua: &str) -> DeviceType {
    if ua.contains("iPad") || ua.contains("Tablet") {
        return DeviceType::Tablet;
    }
    if ua.contains("iPhone") || ua.contains("Mobi") {
        return DeviceType::Mobile;
    }
    if ua.contains("Android") {
        // Android without a Mobile token is a tablet by convention
        return DeviceType::Tablet;
    }
    DeviceType::Desktop
}

fn substr_after<'a>(haystack: &'a str, needle: &str) -> Option<&'a str> {
    haystack.find(needle).map(|idx| &haystack[idx + needle.len()..])
}

fn version_prefix(rest: &str) -> String {
    let version: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    version.trim_end_matches('.').to_string()
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}

/// Great-circle distance in kilometers.
#[must_use]
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Travel is implausible at >= 500 km inside an hour, or >= 2000 km inside
/// three hours.
#[must_use]
pub fn is_suspicious_travel(distance_km: f64, elapsed_minutes: f64) -> bool {
    (distance_km >= 500.0 && elapsed_minutes < 60.0)
        || (distance_km >= 2000.0 && elapsed_minutes < 180.0)
}
