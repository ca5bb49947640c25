use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::auth::TokenCodec;
use crate::config::Config;
use crate::db::Store;
use crate::geo::{GeoResolver, HttpGeoResolver, NoopGeoResolver};
use crate::services::{
    AlertService, AuthService, BillingService, BundleService, SeaOrmAuthService,
};
use crate::storage::ObjectStoreSigner;

/// Process-wide service context, constructed once at boot and passed into
/// handlers. Credentials and clients are injected here; nothing mutates
/// globals after start.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub tokens: TokenCodec,

    pub geo: Arc<dyn GeoResolver>,

    pub auth_service: Arc<dyn AuthService>,

    pub billing: BillingService,

    pub bundles: BundleService,

    pub alerts: AlertService,
}

impl SharedState {
    pub async fn new(config: Config) -> Result<Self> {
        let geo: Arc<dyn GeoResolver> = if config.geo.enabled {
            Arc::new(HttpGeoResolver::new(&config.geo.provider_url))
        } else {
            Arc::new(NoopGeoResolver)
        };

        Self::with_geo_resolver(config, geo).await
    }

    /// Constructor variant taking the geolocation resolver explicitly, so
    /// tests can script lookups.
    pub async fn with_geo_resolver(config: Config, geo: Arc<dyn GeoResolver>) -> Result<Self> {
        let store = Store::new(&config.database.url).await?;

        let tokens = TokenCodec::new(
            config.tokens.access_secret.as_bytes(),
            config.tokens.refresh_secret.as_bytes(),
            config.tokens.access_ttl_minutes * 60,
            config.tokens.refresh_ttl_days * 24 * 60 * 60,
        );

        let signer = ObjectStoreSigner::new(
            &config.object_store.endpoint,
            &config.object_store.bucket,
            &config.object_store.access_key,
            &config.object_store.secret_key,
            &config.object_store.region,
        )?;

        let auth_service: Arc<dyn AuthService> = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            tokens.clone(),
            geo.clone(),
        ));

        let billing = BillingService::new(store.clone());
        let bundles = BundleService::new(store.clone(), signer);
        let alerts = AlertService::new(store.clone());

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            tokens,
            geo,
            auth_service,
            billing,
            bundles,
            alerts,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
