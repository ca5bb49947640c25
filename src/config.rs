use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Service configuration. Defaults suit local development; deployments
/// overlay everything through `HANDOVR_*` environment variables, which is
/// the only configuration surface in production.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub tokens: TokenConfig,

    pub object_store: ObjectStoreConfig,

    pub geo: GeoConfig,

    pub proxy: ProxyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    /// 0 lets tokio pick
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            worker_threads: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 6780,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:data/handovr.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// HMAC secret for access tokens. Must differ from the refresh secret.
    pub access_secret: String,

    pub refresh_secret: String,

    pub access_ttl_minutes: i64,

    pub refresh_ttl_days: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_secret: "dev-access-secret-change-me".to_string(),
            refresh_secret: "dev-refresh-secret-change-me".to_string(),
            access_ttl_minutes: 15,
            refresh_ttl_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    pub endpoint: String,

    pub bucket: String,

    pub access_key: String,

    pub secret_key: String,

    pub region: String,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9000".to_string(),
            bucket: "handovr-bundles".to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    pub enabled: bool,

    pub provider_url: String,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider_url: "http://ip-api.com/json".to_string(),
        }
    }
}

/// Egress proxy handed to desktop clients alongside the bundle. The
/// service itself never connects through it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub host: String,

    pub port: u16,

    pub username: String,

    pub password: String,
}

impl ProxyConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && self.port != 0
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            tokens: TokenConfig::default(),
            object_store: ObjectStoreConfig::default(),
            geo: GeoConfig::default(),
            proxy: ProxyConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        overlay(&mut self.general.log_level, "HANDOVR_LOG_LEVEL");
        overlay_parsed(&mut self.server.port, "HANDOVR_PORT");
        overlay(&mut self.database.url, "HANDOVR_DATABASE_URL");

        overlay(&mut self.tokens.access_secret, "HANDOVR_ACCESS_TOKEN_SECRET");
        overlay(&mut self.tokens.refresh_secret, "HANDOVR_REFRESH_TOKEN_SECRET");
        overlay_parsed(
            &mut self.tokens.access_ttl_minutes,
            "HANDOVR_ACCESS_TOKEN_TTL_MINUTES",
        );
        overlay_parsed(
            &mut self.tokens.refresh_ttl_days,
            "HANDOVR_REFRESH_TOKEN_TTL_DAYS",
        );

        overlay(&mut self.object_store.endpoint, "HANDOVR_S3_ENDPOINT");
        overlay(&mut self.object_store.bucket, "HANDOVR_S3_BUCKET");
        overlay(&mut self.object_store.access_key, "HANDOVR_S3_ACCESS_KEY");
        overlay(&mut self.object_store.secret_key, "HANDOVR_S3_SECRET_KEY");
        overlay(&mut self.object_store.region, "HANDOVR_S3_REGION");

        overlay(&mut self.geo.provider_url, "HANDOVR_GEO_URL");
        if let Ok(value) = std::env::var("HANDOVR_GEO_ENABLED") {
            self.geo.enabled = value != "false" && value != "0";
        }

        overlay(&mut self.proxy.host, "HANDOVR_PROXY_HOST");
        overlay_parsed(&mut self.proxy.port, "HANDOVR_PROXY_PORT");
        overlay(&mut self.proxy.username, "HANDOVR_PROXY_USERNAME");
        overlay(&mut self.proxy.password, "HANDOVR_PROXY_PASSWORD");
    }

    pub fn validate(&self) -> Result<()> {
        if self.tokens.access_secret.is_empty() || self.tokens.refresh_secret.is_empty() {
            bail!("Token signing secrets must not be empty");
        }

        if self.tokens.access_secret == self.tokens.refresh_secret {
            bail!("Access and refresh token secrets must be distinct");
        }

        if self.tokens.access_ttl_minutes <= 0 || self.tokens.refresh_ttl_days <= 0 {
            bail!("Token lifetimes must be positive");
        }

        if self.object_store.endpoint.is_empty() || self.object_store.bucket.is_empty() {
            bail!("Object store endpoint and bucket are required");
        }

        Ok(())
    }
}

fn overlay(target: &mut String, key: &str) {
    if let Ok(value) = std::env::var(key) {
        let value = value.trim();
        if !value.is_empty() {
            *target = value.to_string();
        }
    }
}

fn overlay_parsed<T: std::str::FromStr>(target: &mut T, key: &str) {
    if let Ok(value) = std::env::var(key) {
        if let Ok(parsed) = value.trim().parse() {
            *target = parsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = Config::default();
        config.validate().unwrap();
    }

    #[test]
    fn identical_secrets_are_rejected() {
        let mut config = Config::default();
        config.tokens.access_secret = "same".to_string();
        config.tokens.refresh_secret = "same".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn nonpositive_ttls_are_rejected() {
        let mut config = Config::default();
        config.tokens.access_ttl_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn proxy_requires_host_and_port() {
        let mut proxy = ProxyConfig::default();
        assert!(!proxy.is_configured());
        proxy.host = "proxy.example.com".to_string();
        proxy.port = 3128;
        assert!(proxy.is_configured());
    }
}
