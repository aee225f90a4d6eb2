mod common;

use koperasi_reporting::domain::report::ReportType;
use koperasi_reporting::repos::dashboard_repo::WidgetType;
use koperasi_reporting::services::dashboard_service::{self, WidgetInput};
use koperasi_reporting::services::export_service::{
    self, BatchRequest, BatchState, ExportError, ExportFormat,
};
use koperasi_reporting::services::report_service::{self, CreateReportRequest};
use serial_test::serial;
use uuid::Uuid;

use common::db::{balanced_sheet, cleanup_cooperative, cleanup_widgets, insert_cooperative, test_pool};

fn widget(widget_type: WidgetType) -> WidgetInput {
    WidgetInput {
        widget_type,
        settings: None,
        is_visible: None,
    }
}

#[tokio::test]
#[serial]
async fn test_saved_layout_is_renumbered_and_replaced() {
    let Some(pool) = test_pool().await else { return };
    let user = Uuid::new_v4();

    let defaults = dashboard_service::get_widgets(&pool, user).await.unwrap();
    assert_eq!(defaults.len(), 5);
    assert!(defaults.iter().all(|w| w.id.is_nil()));

    let saved = dashboard_service::save_widgets(
        &pool,
        user,
        vec![
            widget(WidgetType::TrendChart),
            WidgetInput {
                widget_type: WidgetType::KpiCard,
                settings: Some(serde_json::json!({ "kpis": ["npl_ratio"] })),
                is_visible: Some(false),
            },
            widget(WidgetType::NplBreakdown),
        ],
    )
    .await
    .expect("Failed to save layout");
    assert_eq!(saved.len(), 3);

    let stored = dashboard_service::get_widgets(&pool, user).await.unwrap();
    let positions: Vec<i32> = stored.iter().map(|w| w.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
    assert_eq!(stored[0].widget_type, WidgetType::TrendChart);
    assert_eq!(stored[1].widget_type, WidgetType::KpiCard);
    assert!(!stored[1].is_visible);
    assert_eq!(stored[1].settings["kpis"][0], "npl_ratio");
    assert!(stored.iter().all(|w| !w.id.is_nil()));

    // Saving again replaces the whole layout
    dashboard_service::save_widgets(
        &pool,
        user,
        vec![widget(WidgetType::RatioTable), widget(WidgetType::ReportStatus)],
    )
    .await
    .expect("Failed to save layout");

    let stored = dashboard_service::get_widgets(&pool, user).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].widget_type, WidgetType::RatioTable);
    assert_eq!(stored[0].position, 0);
    assert_eq!(stored[1].position, 1);

    cleanup_widgets(&pool, user).await;
}

#[tokio::test]
#[serial]
async fn test_invalid_layout_keeps_previous_widgets() {
    let Some(pool) = test_pool().await else { return };
    let user = Uuid::new_v4();

    dashboard_service::save_widgets(&pool, user, vec![widget(WidgetType::KpiCard)])
        .await
        .expect("Failed to save layout");

    let result = dashboard_service::save_widgets(
        &pool,
        user,
        vec![WidgetInput {
            widget_type: WidgetType::TrendChart,
            settings: Some(serde_json::json!("total_assets")),
            is_visible: None,
        }],
    )
    .await;
    assert!(result.is_err());

    let stored = dashboard_service::get_widgets(&pool, user).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].widget_type, WidgetType::KpiCard);

    cleanup_widgets(&pool, user).await;
}

#[tokio::test]
#[serial]
async fn test_batch_scoped_to_cooperative() {
    let Some(pool) = test_pool().await else { return };
    let export_dir = tempfile::tempdir().unwrap();
    let coop = insert_cooperative(&pool).await;
    let other = insert_cooperative(&pool).await;

    let create = |cooperative_id| {
        report_service::create_report(
            &pool,
            cooperative_id,
            CreateReportRequest {
                reporting_year: 2024,
                created_by: Uuid::new_v4(),
                report_type: ReportType::BalanceSheet,
                content: balanced_sheet(150_000),
            },
        )
    };
    let own = create(coop).await.unwrap().report.id;
    let foreign = create(other).await.unwrap().report.id;

    let result = export_service::create_batch(
        &pool,
        export_dir.path(),
        BatchRequest {
            report_ids: vec![own, foreign],
            format: ExportFormat::Csv,
            cooperative_id: Some(coop),
        },
    )
    .await;
    assert!(matches!(result, Err(ExportError::NotFound(ref what)) if what.contains(&foreign.to_string())));

    // Repeated ids collapse into one file
    let status = export_service::create_batch(
        &pool,
        export_dir.path(),
        BatchRequest {
            report_ids: vec![own, own],
            format: ExportFormat::Json,
            cooperative_id: Some(coop),
        },
    )
    .await
    .expect("Failed to run batch");
    assert_eq!(status.state, BatchState::Completed);
    assert_eq!(status.total, 1);
    assert_eq!(status.files.len(), 1);

    // Without a scope any cooperative's reports may be combined
    let status = export_service::create_batch(
        &pool,
        export_dir.path(),
        BatchRequest {
            report_ids: vec![own, foreign],
            format: ExportFormat::Csv,
            cooperative_id: None,
        },
    )
    .await
    .expect("Failed to run batch");
    assert_eq!(status.files.len(), 2);

    cleanup_cooperative(&pool, other).await;
    cleanup_cooperative(&pool, coop).await;
}
