mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::{app, body_json, post_json};

fn balance_sheet(equity: i64) -> serde_json::Value {
    json!({
        "report_type": "balance_sheet",
        "content": {
            "lines": [
                { "account_code": "1-110", "account_name": "Kas", "category": "current_asset", "role": "cash", "current_amount": 100000 },
                { "account_code": "2-110", "account_name": "Simpanan Sukarela", "category": "current_liability", "role": "voluntary_savings", "current_amount": 40000 },
                { "account_code": "3-110", "account_name": "Simpanan Pokok", "category": "equity", "role": "principal_savings", "current_amount": equity }
            ]
        }
    })
}

#[tokio::test]
async fn test_validate_balanced_sheet() {
    let (app, _dir) = app();

    let response = app
        .oneshot(post_json("/api/validate", &balance_sheet(60000)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["report_type"], "balance_sheet");
    assert_eq!(json["can_submit"], true);
    assert_eq!(json["error_count"], 0);
    assert!(json.get("report_id").is_none());
}

#[tokio::test]
async fn test_validate_unbalanced_sheet_reports_error() {
    let (app, _dir) = app();

    let response = app
        .oneshot(post_json("/api/validate", &balance_sheet(50000)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["can_submit"], false);
    let issues = json["validation_report"]["issues"].as_array().unwrap();
    assert!(issues
        .iter()
        .any(|i| i["code"] == "BALANCE_EQUATION_MISMATCH" && i["severity"] == "ERROR"));
}

#[tokio::test]
async fn test_validate_rejects_content_of_wrong_shape() {
    let (app, _dir) = app();

    let body = json!({
        "report_type": "member_savings",
        "content": { "lines": [{ "member_number": "A-1" }] }
    });
    let response = app.oneshot(post_json("/api/validate", &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("member_savings"));
}

#[tokio::test]
async fn test_validate_rejects_unknown_report_type() {
    let (app, _dir) = app();

    let body = json!({ "report_type": "profit_and_loss", "content": {} });
    let response = app.oneshot(post_json("/api/validate", &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_malformed_json_uses_error_envelope() {
    let (app, _dir) = app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/validate")
                .header("content-type", "application/json")
                .body(Body::from("{ not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_member_shares_distribute_pools_exactly() {
    let (app, _dir) = app();

    let body = json!({
        "capital_pool": 10000,
        "business_pool": 5000,
        "participants": [
            { "member_number": "A-001", "member_name": "Siti", "capital_basis": 1, "business_basis": 1 },
            { "member_number": "A-002", "member_name": "Budi", "capital_basis": 1, "business_basis": 1 },
            { "member_number": "A-003", "member_name": "Wati", "capital_basis": 1, "business_basis": 0 }
        ]
    });
    let response = app
        .oneshot(post_json("/api/shu/member-shares", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total_distributed"], 15000);

    let shares = json["shares"].as_array().unwrap();
    assert_eq!(shares.len(), 3);
    let capital: i64 = shares.iter().map(|s| s["capital_share"].as_i64().unwrap()).sum();
    assert_eq!(capital, 10000);
    assert_eq!(shares[2]["business_share"], 0);
    assert_eq!(shares[0]["business_share"], 2500);
}

#[tokio::test]
async fn test_member_shares_reject_negative_pool() {
    let (app, _dir) = app();

    let body = json!({ "capital_pool": -1, "business_pool": 0, "participants": [] });
    let response = app
        .oneshot(post_json("/api/shu/member-shares", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_member_shares_reject_pool_beyond_limit() {
    let (app, _dir) = app();

    let body = json!({
        "capital_pool": i64::MAX,
        "business_pool": i64::MAX,
        "participants": [
            { "member_number": "A-001", "member_name": "Siti", "capital_basis": 1, "business_basis": 1 }
        ]
    });
    let response = app
        .oneshot(post_json("/api/shu/member-shares", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("exceed"));
}

#[tokio::test]
async fn test_validate_rejects_amount_beyond_limit() {
    let (app, _dir) = app();

    let body = json!({
        "report_type": "balance_sheet",
        "content": {
            "lines": [
                { "account_code": "1-110", "account_name": "Kas", "category": "current_asset", "current_amount": i64::MAX },
                { "account_code": "1-120", "account_name": "Bank", "category": "current_asset", "current_amount": i64::MAX }
            ]
        }
    });
    let response = app.oneshot(post_json("/api/validate", &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    let error = json["error"].as_str().unwrap();
    assert!(error.contains("content.lines[0].current_amount"), "{}", error);
}
