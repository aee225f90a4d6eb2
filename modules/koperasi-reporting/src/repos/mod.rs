pub mod audit_repo;
pub mod cooperative_repo;
pub mod dashboard_repo;
pub mod line_repo;
pub mod notification_repo;
pub mod report_repo;
