mod common;

use axum::http::StatusCode;
use koperasi_reporting::domain::report::{ReportContent, ReportStatus, ReportType};
use koperasi_reporting::services::export_service::{
    run_batch, BatchState, ExportDocument, ExportFormat,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use tower::ServiceExt;
use uuid::Uuid;

use common::{app, body_bytes, body_json, get, post_json};

fn balance_sheet_doc(code: &str) -> ExportDocument {
    let content = ReportContent::from_parts(
        ReportType::BalanceSheet,
        json!({
            "lines": [
                { "account_code": "1-110", "account_name": "Kas", "category": "current_asset", "role": "cash", "current_amount": 100000 },
                { "account_code": "3-110", "account_name": "Simpanan Pokok", "category": "equity", "role": "principal_savings", "current_amount": 100000 }
            ]
        }),
    )
    .unwrap();

    ExportDocument {
        report_id: Uuid::new_v4(),
        cooperative_code: code.to_string(),
        cooperative_name: "Koperasi Maju Bersama".to_string(),
        reporting_year: 2024,
        status: ReportStatus::Approved,
        content,
    }
}

#[tokio::test]
async fn test_batch_written_to_disk_is_served_over_http() {
    let (app, dir) = app();
    let id = Uuid::new_v4();

    let status = run_batch(dir.path(), id, ExportFormat::Json, &[balance_sheet_doc("KMB-07")])
        .await
        .unwrap();
    assert_eq!(status.state, BatchState::Completed);
    assert_eq!(status.files[0].name, "KMB-07_balance_sheet_2024.json");

    let response = app
        .clone()
        .oneshot(get(&format!("/api/exports/batch/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["state"], "completed");
    assert_eq!(json["processed"], 1);

    let response = app
        .oneshot(get(&format!(
            "/api/exports/batch/{}/files/KMB-07_balance_sheet_2024.json",
            id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    let bytes = body_bytes(response).await;
    assert_eq!(hex::encode(Sha256::digest(&bytes)), status.files[0].sha256);

    let exported: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(exported["cooperative"]["code"], "KMB-07");
    assert_eq!(exported["reporting_year"], 2024);
}

#[tokio::test]
async fn test_missing_file_in_existing_batch_is_not_found() {
    let (app, dir) = app();
    let id = Uuid::new_v4();
    run_batch(dir.path(), id, ExportFormat::Csv, &[balance_sheet_doc("KMB-07")])
        .await
        .unwrap();

    let response = app
        .oneshot(get(&format!("/api/exports/batch/{}/files/other.csv", id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_batch_request_is_rejected() {
    let (app, _dir) = app();

    let response = app
        .oneshot(post_json("/api/exports/batch", &json!({ "report_ids": [] })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("report_ids"));
}
