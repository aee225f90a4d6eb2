mod common;

use axum::http::StatusCode;
use tower::ServiceExt;
use uuid::Uuid;

use common::{app, body_bytes, body_json, get};

#[tokio::test]
async fn test_health() {
    let (app, _dir) = app();

    let response = app.oneshot(get("/api/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "koperasi-reporting");
}

#[tokio::test]
async fn test_ready_reports_unreachable_database() {
    let (app, _dir) = app();

    let response = app.oneshot(get("/api/ready")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["database"], "down");
}

#[tokio::test]
async fn test_trace_id_is_echoed_or_minted() {
    let (app, _dir) = app();

    let request = axum::http::Request::builder()
        .uri("/api/health")
        .header("x-trace-id", "trace-123")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-trace-id"], "trace-123");

    let response = app.oneshot(get("/api/health")).await.unwrap();
    let minted = response.headers()["x-trace-id"].to_str().unwrap().to_string();
    assert!(Uuid::parse_str(&minted).is_ok());
}

#[tokio::test]
async fn test_metrics_use_route_templates() {
    let (app, _dir) = app();

    let coop = Uuid::new_v4();
    let response = app
        .clone()
        .oneshot(get(&format!("/api/cooperatives/{}/consistency?year=24", coop)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(text.contains("http_request_duration_seconds"));
    assert!(text.contains(r#"path="/api/cooperatives/{cooperative_id}/consistency""#));
    assert!(!text.contains(&coop.to_string()));
}

#[tokio::test]
async fn test_year_out_of_range_is_rejected_before_database() {
    let (app, _dir) = app();

    let response = app
        .oneshot(get(&format!(
            "/api/cooperatives/{}/analytics/ratios?year=3000",
            Uuid::new_v4()
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("reporting_year"));
}

#[tokio::test]
async fn test_trend_range_is_checked() {
    let (app, _dir) = app();
    let coop = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(get(&format!(
            "/api/cooperatives/{}/analytics/trends?metric=total_assets&from=2024&to=2020",
            coop
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(get(&format!(
            "/api/cooperatives/{}/analytics/trends?metric=net_worth&from=2020&to=2024",
            coop
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unsupported_export_format() {
    let (app, _dir) = app();

    let response = app
        .oneshot(get(&format!(
            "/api/cooperatives/{}/reports/{}/export?format=pdf",
            Uuid::new_v4(),
            Uuid::new_v4()
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("pdf"));
}

#[tokio::test]
async fn test_batch_file_traversal_is_rejected() {
    let (app, _dir) = app();

    let response = app
        .oneshot(get(&format!(
            "/api/exports/batch/{}/files/..%2Fstatus.json",
            Uuid::new_v4()
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_batch_is_not_found() {
    let (app, _dir) = app();

    let response = app
        .oneshot(get(&format!("/api/exports/batch/{}", Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
