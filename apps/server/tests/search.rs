//! End-to-end search endpoint tests.

mod support;

use axum::http::StatusCode;
use support::*;

#[tokio::test]
async fn returns_nearby_active_pharmacies_sorted_by_distance() -> anyhow::Result<()> {
    let Some(app) = TestApp::spawn().await? else {
        return Ok(());
    };

    // Distances from Tokyo Station: 0 km, ~2.9 km, ~23 km.
    let at_center = PharmacyBuilder::new("Center").insert(&app.state).await?;
    let near = PharmacyBuilder::new("Near")
        .at(35.7061, 139.7519)
        .insert(&app.state)
        .await?;
    let far = PharmacyBuilder::new("Far")
        .at(35.4437, 139.6380)
        .insert(&app.state)
        .await?;

    let (status, body, headers) = get_json(
        &app.router,
        "/api/pharmacies/search?lat=35.6812&lng=139.7671&radius=5",
        &[],
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    let pharmacies = body["pharmacies"].as_array().unwrap();
    assert_eq!(pharmacies.len(), 2);
    assert_eq!(body["total"], 2);
    assert_eq!(pharmacies[0]["id"], at_center.to_string());
    assert_eq!(pharmacies[0]["distance_km"], "0.0");
    assert_eq!(pharmacies[1]["id"], near.to_string());
    assert!(!pharmacies
        .iter()
        .any(|p| p["id"] == far.to_string()));

    // Short-lived caching hint and echoed query context.
    assert!(headers
        .get("cache-control")
        .unwrap()
        .to_str()?
        .contains("max-age=30"));
    assert_eq!(body["radius"], 5.0);
    assert_eq!(body["center"]["lat"], 35.6812);
    assert!(body["generated_at"].is_string());

    Ok(())
}

#[tokio::test]
async fn excludes_inactive_and_full_pharmacies() -> anyhow::Result<()> {
    let Some(app) = TestApp::spawn().await? else {
        return Ok(());
    };

    PharmacyBuilder::new("Pending")
        .status("pending")
        .insert(&app.state)
        .await?;
    PharmacyBuilder::new("Inactive")
        .status("inactive")
        .insert(&app.state)
        .await?;
    let full = PharmacyBuilder::new("Full")
        .capacity(10, 10)
        .insert(&app.state)
        .await?;

    let (status, body, _) = get_json(
        &app.router,
        "/api/pharmacies/search?lat=35.6812&lng=139.7671&radius=5",
        &[],
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0, "default excludes full and non-active");

    // The full pharmacy reappears when the caller asks for it.
    let (status, body, _) = get_json(
        &app.router,
        "/api/pharmacies/search?lat=35.6812&lng=139.7671&radius=5&exclude_full=false",
        &[],
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let pharmacies = body["pharmacies"].as_array().unwrap();
    assert_eq!(pharmacies.len(), 1);
    assert_eq!(pharmacies[0]["id"], full.to_string());
    assert_eq!(pharmacies[0]["distance_km"], "0.0");
    assert_eq!(pharmacies[0]["accepting_patients"], false);

    Ok(())
}

#[tokio::test]
async fn filters_by_required_capabilities() -> anyhow::Result<()> {
    let Some(app) = TestApp::spawn().await? else {
        return Ok(());
    };

    PharmacyBuilder::new("Narcotics only")
        .narcotics()
        .insert(&app.state)
        .await?;
    let qualified = PharmacyBuilder::new("Narcotics and clean room")
        .narcotics()
        .clean_room()
        .insert(&app.state)
        .await?;

    let (status, body, _) = get_json(
        &app.router,
        "/api/pharmacies/search?lat=35.6812&lng=139.7671&services=narcotics&services=clean_room",
        &[],
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    let pharmacies = body["pharmacies"].as_array().unwrap();
    assert_eq!(pharmacies.len(), 1);
    assert_eq!(pharmacies[0]["id"], qualified.to_string());

    Ok(())
}

#[tokio::test]
async fn rejects_bad_input_before_querying() -> anyhow::Result<()> {
    let Some(app) = TestApp::spawn().await? else {
        return Ok(());
    };

    let (status, body, _) = get_json(
        &app.router,
        "/api/pharmacies/search?lat=91&lng=139.7671",
        &[],
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_COORDINATES");

    let (status, body, _) = get_json(
        &app.router,
        "/api/pharmacies/search?lat=35.6812&lng=139.7671&radius=50.0001",
        &[],
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_RADIUS");

    let (status, body, _) = get_json(
        &app.router,
        "/api/pharmacies/search?lat=35.6812&lng=139.7671&services=helicopter",
        &[],
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION");

    let (status, body, _) = get_json(&app.router, "/api/pharmacies/search", &[]).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_COORDINATES");

    Ok(())
}

#[tokio::test]
async fn zero_budget_search_degrades_to_the_scan_path() -> anyhow::Result<()> {
    // An impossible primary-query budget forces every search onto the
    // client-side scan; callers must see the exact same response shape.
    let Some(app) = TestApp::spawn_with_config(|config| {
        config.search.query_timeout_ms = 0;
    })
    .await?
    else {
        return Ok(());
    };

    let at_center = PharmacyBuilder::new("Center").insert(&app.state).await?;
    let near = PharmacyBuilder::new("Near")
        .at(35.7061, 139.7519)
        .insert(&app.state)
        .await?;
    PharmacyBuilder::new("Far")
        .at(35.4437, 139.6380)
        .insert(&app.state)
        .await?;

    let fallbacks_before = caremesh::metrics::SEARCH_FALLBACK_TOTAL.get();

    let (status, body, _) = get_json(
        &app.router,
        "/api/pharmacies/search?lat=35.6812&lng=139.7671&radius=5",
        &[],
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    let pharmacies = body["pharmacies"].as_array().unwrap();
    assert_eq!(pharmacies.len(), 2);
    assert_eq!(body["total"], 2);
    assert_eq!(pharmacies[0]["id"], at_center.to_string());
    assert_eq!(pharmacies[0]["distance_km"], "0.0");
    assert_eq!(pharmacies[1]["id"], near.to_string());
    assert_eq!(body["center"]["lat"], 35.6812);
    assert!(body["generated_at"].is_string());

    assert!(
        caremesh::metrics::SEARCH_FALLBACK_TOTAL.get() >= fallbacks_before + 1.0,
        "degraded searches must be counted"
    );

    Ok(())
}

#[tokio::test]
async fn search_fails_only_when_both_paths_fail() -> anyhow::Result<()> {
    let Some(app) = TestApp::spawn().await? else {
        return Ok(());
    };

    // Pull the table out from under the engine so the indexed query and the
    // scan both have nothing to run against.
    {
        let mut conn = app
            .state
            .pool
            .acquire()
            .await
            .map_err(|e| anyhow::anyhow!("acquire: {e}"))?;
        sqlx::query("DROP TABLE pharmacies CASCADE")
            .execute(&mut *conn)
            .await?;
    }

    let (status, body, _) = get_json(
        &app.router,
        "/api/pharmacies/search?lat=35.6812&lng=139.7671",
        &[],
    )
    .await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "SEARCH_FAILED");
    assert!(body["incident_id"].is_string());

    Ok(())
}

#[tokio::test]
async fn limit_is_clamped_to_the_configured_maximum() -> anyhow::Result<()> {
    let Some(app) = TestApp::spawn_with_config(|config| {
        config.search.max_limit = 2;
    })
    .await?
    else {
        return Ok(());
    };

    for i in 0..3 {
        PharmacyBuilder::new(&format!("P{i}")).insert(&app.state).await?;
    }

    let (status, body, _) = get_json(
        &app.router,
        "/api/pharmacies/search?lat=35.6812&lng=139.7671&limit=50",
        &[],
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    Ok(())
}
