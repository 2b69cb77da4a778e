//! Application state
//!
//! One instance of each process-scoped component, constructed at startup and
//! cloned (cheaply, via `Arc`) into handlers. Nothing here is rebuilt per
//! request.

use std::sync::Arc;

use crate::config::Config;
use crate::db::{self, PgPool};
use crate::rate_limit::RateGovernor;
use crate::services::{Geocoder, HttpGeocoder, NullGeocoder, PharmacySearchEngine, RequestLifecycle};
use crate::{Error, Result};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: Arc<PgPool>,
    pub rate_governor: Arc<RateGovernor>,
    pub search_engine: Arc<PharmacySearchEngine>,
    pub lifecycle: Arc<RequestLifecycle>,
    pub geocoder: Arc<dyn Geocoder>,
}

#[derive(Default)]
pub struct AppStateOptions {
    pub skip_migrations: bool,
    /// Test seam for the external geocoding collaborator.
    pub geocoder: Option<Arc<dyn Geocoder>>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        Self::new_with_options(config, AppStateOptions::default()).await
    }

    pub async fn new_with_options(config: Config, options: AppStateOptions) -> Result<Self> {
        let pool = PgPool::connect(&config.database)?;

        if !options.skip_migrations {
            let mut conn = pool.acquire().await?;
            db::MIGRATOR
                .run(&mut *conn)
                .await
                .map_err(|e| Error::Internal(format!("migration failed: {e}")))?;
            tracing::info!("Database migrations applied");
        }

        let rate_governor = RateGovernor::new(config.rate_limit.clone());
        let search_engine = Arc::new(PharmacySearchEngine::new(
            Arc::clone(&pool),
            config.search.clone(),
        ));
        let lifecycle = Arc::new(RequestLifecycle::new(Arc::clone(&pool)));

        let geocoder: Arc<dyn Geocoder> = match options.geocoder {
            Some(geocoder) => geocoder,
            None if !config.geocoder.endpoint.is_empty() => {
                Arc::new(HttpGeocoder::new(&config.geocoder)?)
            }
            None => Arc::new(NullGeocoder),
        };

        Ok(Self {
            config: Arc::new(config),
            pool,
            rate_governor,
            search_engine,
            lifecycle,
            geocoder,
        })
    }

    /// Tear down process-scoped components: stops background sweeps and
    /// fails in-flight pool waiters.
    pub fn shutdown(&self) {
        self.rate_governor.shutdown();
        self.pool.shutdown();
    }
}
