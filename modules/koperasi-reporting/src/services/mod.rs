pub mod analytics_service;
pub mod dashboard_service;
pub mod export_service;
pub mod report_service;
pub mod validation_service;
pub mod workflow_service;
