pub mod builders;

use anyhow::Context as _;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use caremesh::{
    api::create_router,
    config::{Config, DatabaseConfig, RouteQuota},
    state::AppState,
};
use sqlx::Connection as _;
use tower::ServiceExt as _;
use uuid::Uuid;

pub use builders::*;

/// A router plus state against a per-test Postgres schema.
///
/// Tests that need a database skip themselves when `DATABASE_URL` is not
/// set, so the suite stays green on machines without Postgres.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn spawn() -> anyhow::Result<Option<Self>> {
        Self::spawn_with_config(|_| {}).await
    }

    pub async fn spawn_with_config(
        configure: impl FnOnce(&mut Config),
    ) -> anyhow::Result<Option<Self>> {
        let Ok(admin_url) = std::env::var("DATABASE_URL") else {
            eprintln!("skipping: DATABASE_URL not set");
            return Ok(None);
        };

        // Per-test schema so parallel tests never see each other's rows.
        let schema = format!("test_{}", Uuid::new_v4().simple());
        let mut admin_conn = sqlx::PgConnection::connect(&admin_url)
            .await
            .context("connect admin db for schema create")?;
        sqlx::query(&format!(r#"CREATE SCHEMA "{schema}""#))
            .execute(&mut admin_conn)
            .await
            .context("create test schema")?;

        let mut config = base_config(&admin_url, &schema);
        configure(&mut config);

        let state = AppState::new(config)
            .await
            .map_err(|e| anyhow::anyhow!("initialize AppState: {e}"))?;
        let router = create_router(state.clone());

        Ok(Some(Self { router, state }))
    }
}

fn base_config(admin_url: &str, schema: &str) -> Config {
    let separator = if admin_url.contains('?') { '&' } else { '?' };
    // earthdistance lives in public; keep it on the search path.
    let url = format!("{admin_url}{separator}options=-csearch_path%3D{schema},public");

    Config {
        server: Default::default(),
        database: DatabaseConfig {
            url,
            pool_min_size: 0,
            // Small per-test pools so parallel tests don't exhaust Postgres.
            pool_max_size: 5,
            pool_acquire_timeout_seconds: 30,
            pool_idle_timeout_seconds: 300,
            pool_sweep_interval_seconds: 3600,
        },
        search: Default::default(),
        rate_limit: caremesh::config::RateLimitConfig {
            // Generous default so only the dedicated rate-limit tests hit it.
            default: RouteQuota {
                max_requests: 10_000,
                window_seconds: 60,
            },
            routes: Default::default(),
            sweep_interval_seconds: 3600,
        },
        geocoder: Default::default(),
        logging: Default::default(),
    }
}

/// Issue a GET through the router and decode the JSON body.
pub async fn get_json(
    router: &Router,
    uri: &str,
    headers: &[(&str, &str)],
) -> anyhow::Result<(StatusCode, serde_json::Value, axum::http::HeaderMap)> {
    let mut request = Request::builder().method("GET").uri(uri);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let response = router
        .clone()
        .oneshot(request.body(Body::empty())?)
        .await?;

    decode(response).await
}

/// Issue a POST with a JSON body through the router.
pub async fn post_json(
    router: &Router,
    uri: &str,
    headers: &[(&str, &str)],
    body: serde_json::Value,
) -> anyhow::Result<(StatusCode, serde_json::Value, axum::http::HeaderMap)> {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let response = router
        .clone()
        .oneshot(request.body(Body::from(body.to_string()))?)
        .await?;

    decode(response).await
}

async fn decode(
    response: axum::response::Response,
) -> anyhow::Result<(StatusCode, serde_json::Value, axum::http::HeaderMap)> {
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .with_context(|| format!("non-JSON body: {}", String::from_utf8_lossy(&bytes)))?
    };
    Ok((status, value, headers))
}
