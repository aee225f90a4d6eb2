//! Export Service
//!
//! Renders reports as CSV or JSON files, one at a time or as a batch written
//! under `{export_dir}/batch-{id}/`. A batch keeps its progress in
//! `status.json`, rewritten (temp file + rename) after every file.

use chrono::{DateTime, Utc};
use csv::Writer;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::report::{Period, ReportContent, ReportStatus, ReportType};
use crate::repos::cooperative_repo::{self, Cooperative, CooperativeRepoError};
use crate::repos::line_repo::{self, LineRepoError};
use crate::repos::report_repo::{self, ReportHeader, ReportRepoError};

pub const MAX_BATCH_REPORTS: usize = 100;
const STATUS_FILE: &str = "status.json";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Stored report data is malformed: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<ReportRepoError> for ExportError {
    fn from(e: ReportRepoError) -> Self {
        match e {
            ReportRepoError::Database(e) => ExportError::Database(e),
            other => ExportError::Corrupt(other.to_string()),
        }
    }
}

impl From<LineRepoError> for ExportError {
    fn from(e: LineRepoError) -> Self {
        match e {
            LineRepoError::HeaderData(e) => ExportError::Corrupt(e.to_string()),
            LineRepoError::Database(e) => ExportError::Database(e),
        }
    }
}

impl From<CooperativeRepoError> for ExportError {
    fn from(e: CooperativeRepoError) -> Self {
        match e {
            CooperativeRepoError::NotFound(id) => ExportError::NotFound(format!("cooperative {}", id)),
            CooperativeRepoError::Database(e) => ExportError::Database(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("Unsupported export format: {}", other)),
        }
    }
}

/// Everything needed to render one report without touching the database
#[derive(Debug, Clone)]
pub struct ExportDocument {
    pub report_id: Uuid,
    pub cooperative_code: String,
    pub cooperative_name: String,
    pub reporting_year: i32,
    pub status: ReportStatus,
    pub content: ReportContent,
}

impl ExportDocument {
    pub fn new(header: &ReportHeader, cooperative: &Cooperative, content: ReportContent) -> Self {
        Self {
            report_id: header.id,
            cooperative_code: cooperative.code.clone(),
            cooperative_name: cooperative.name.clone(),
            reporting_year: header.reporting_year,
            status: header.status,
            content,
        }
    }

    pub fn report_type(&self) -> ReportType {
        self.content.report_type()
    }
}

/// A rendered export, ready to be sent or written
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// `{coop_code}_{report_type}_{year}.{ext}`; anything outside `[A-Za-z0-9_-]`
/// in the cooperative code becomes `_`
pub fn file_name(doc: &ExportDocument, format: ExportFormat) -> String {
    let code: String = doc
        .cooperative_code
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let code = if code.is_empty() { "coop".to_string() } else { code };
    format!(
        "{}_{}_{}.{}",
        code,
        doc.report_type(),
        doc.reporting_year,
        format.as_str()
    )
}

/// Serialized name of a unit-like enum, e.g. `current_asset`
fn label<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}

fn csv_table(content: &ReportContent) -> (Vec<&'static str>, Vec<Vec<String>>) {
    match content {
        ReportContent::BalanceSheet(r) => (
            vec!["account_code", "account_name", "category", "role", "is_contra", "current_amount", "previous_amount"],
            r.lines
                .iter()
                .map(|l| {
                    vec![
                        l.account_code.clone(),
                        l.account_name.clone(),
                        label(&l.category),
                        l.role.as_ref().map(label).unwrap_or_default(),
                        l.is_contra.to_string(),
                        l.current_amount.to_string(),
                        l.previous_amount.to_string(),
                    ]
                })
                .collect(),
        ),
        ReportContent::IncomeStatement(r) => (
            vec!["account_code", "account_name", "category", "current_amount", "previous_amount"],
            r.lines
                .iter()
                .map(|l| {
                    vec![
                        l.account_code.clone(),
                        l.account_name.clone(),
                        label(&l.category),
                        l.current_amount.to_string(),
                        l.previous_amount.to_string(),
                    ]
                })
                .collect(),
        ),
        ReportContent::CashFlow(r) => {
            let mut rows = vec![vec![
                String::new(),
                "Beginning cash".to_string(),
                r.beginning_cash.to_string(),
            ]];
            rows.extend(r.lines.iter().map(|l| {
                vec![label(&l.activity), l.description.clone(), l.amount.to_string()]
            }));
            rows.push(vec![
                String::new(),
                "Ending cash".to_string(),
                r.ending_cash.to_string(),
            ]);
            (vec!["activity", "description", "amount"], rows)
        }
        ReportContent::EquityChanges(r) => (
            vec!["component", "beginning_balance", "additions", "reductions", "ending_balance"],
            r.lines
                .iter()
                .map(|l| {
                    vec![
                        l.component.as_str().to_string(),
                        l.beginning_balance.to_string(),
                        l.additions.to_string(),
                        l.reductions.to_string(),
                        l.ending_balance.to_string(),
                    ]
                })
                .collect(),
        ),
        ReportContent::MemberSavings(r) => (
            vec!["member_number", "member_name", "principal_savings", "mandatory_savings", "voluntary_savings", "total_savings", "annual_transactions"],
            r.lines
                .iter()
                .map(|l| {
                    vec![
                        l.member_number.clone(),
                        l.member_name.clone(),
                        l.principal_savings.to_string(),
                        l.mandatory_savings.to_string(),
                        l.voluntary_savings.to_string(),
                        l.total_savings().to_string(),
                        l.annual_transactions.to_string(),
                    ]
                })
                .collect(),
        ),
        ReportContent::MemberReceivables(r) => (
            vec!["member_number", "member_name", "loan_amount", "outstanding_balance", "days_overdue", "collectibility"],
            r.lines
                .iter()
                .map(|l| {
                    vec![
                        l.member_number.clone(),
                        l.member_name.clone(),
                        l.loan_amount.to_string(),
                        l.outstanding_balance.to_string(),
                        l.days_overdue.to_string(),
                        l.collectibility.label().to_string(),
                    ]
                })
                .collect(),
        ),
        ReportContent::NonPerformingReceivables(r) => (
            vec!["member_number", "member_name", "outstanding_balance", "days_overdue", "collectibility", "collateral_value", "provision_amount", "required_provision"],
            r.lines
                .iter()
                .map(|l| {
                    vec![
                        l.member_number.clone(),
                        l.member_name.clone(),
                        l.outstanding_balance.to_string(),
                        l.days_overdue.to_string(),
                        l.collectibility.label().to_string(),
                        l.collateral_value.to_string(),
                        l.provision_amount.to_string(),
                        l.required_provision().to_string(),
                    ]
                })
                .collect(),
        ),
        ReportContent::ShuDistribution(r) => {
            let mut rows = vec![
                vec!["shu_before_tax".to_string(), String::new(), r.shu_before_tax.to_string()],
                vec!["income_tax".to_string(), String::new(), r.income_tax.to_string()],
                vec!["shu_after_tax".to_string(), String::new(), r.shu_after_tax.to_string()],
            ];
            rows.extend(r.allocations.iter().map(|a| {
                vec![
                    a.component.as_str().to_string(),
                    format!("{:.2}", a.percentage),
                    a.amount.to_string(),
                ]
            }));
            (vec!["component", "percentage", "amount"], rows)
        }
        ReportContent::BudgetPlan(r) => (
            vec!["category", "account_name", "previous_realization", "budget_amount", "growth_pct"],
            r.lines
                .iter()
                .map(|l| {
                    vec![
                        l.category.as_str().to_string(),
                        l.account_name.clone(),
                        l.previous_realization.to_string(),
                        l.budget_amount.to_string(),
                        l.growth_pct().map(|g| format!("{:.2}", g)).unwrap_or_default(),
                    ]
                })
                .collect(),
        ),
    }
}

/// Computed totals shipped alongside the lines in JSON exports
pub fn summary_for(content: &ReportContent) -> Result<serde_json::Value, serde_json::Error> {
    match content {
        ReportContent::BalanceSheet(r) => serde_json::to_value(r.totals(Period::Current)),
        ReportContent::IncomeStatement(r) => serde_json::to_value(r.totals(Period::Current)),
        ReportContent::CashFlow(r) => serde_json::to_value(r.totals()),
        ReportContent::EquityChanges(r) => serde_json::to_value(r.totals()),
        ReportContent::MemberSavings(r) => serde_json::to_value(r.totals()),
        ReportContent::MemberReceivables(r) => serde_json::to_value(r.summary()),
        ReportContent::NonPerformingReceivables(r) => serde_json::to_value(r.totals()),
        ReportContent::ShuDistribution(r) => Ok(serde_json::json!({
            "total_percentage": r.total_percentage(),
            "total_allocated": r.total_allocated(),
            "unallocated": r.shu_after_tax - r.total_allocated(),
        })),
        ReportContent::BudgetPlan(r) => serde_json::to_value(r.totals()),
    }
}

fn render_csv(doc: &ExportDocument) -> Result<Vec<u8>, ExportError> {
    let (headers, rows) = csv_table(&doc.content);
    let mut wtr = Writer::from_writer(Vec::new());
    wtr.write_record(&headers)?;
    for row in &rows {
        wtr.write_record(row)?;
    }
    wtr.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

fn render_json(doc: &ExportDocument) -> Result<Vec<u8>, ExportError> {
    let body = serde_json::json!({
        "report_id": doc.report_id,
        "cooperative": {
            "code": doc.cooperative_code,
            "name": doc.cooperative_name,
        },
        "reporting_year": doc.reporting_year,
        "title": doc.report_type().label(),
        "status": doc.status,
        "report": doc.content,
        "summary": summary_for(&doc.content)?,
    });
    Ok(serde_json::to_vec_pretty(&body)?)
}

pub fn render(doc: &ExportDocument, format: ExportFormat) -> Result<ExportedFile, ExportError> {
    let bytes = match format {
        ExportFormat::Csv => render_csv(doc)?,
        ExportFormat::Json => render_json(doc)?,
    };
    Ok(ExportedFile {
        file_name: file_name(doc, format),
        content_type: format.content_type(),
        bytes,
    })
}

/// Load a report of a cooperative with its content for export
pub async fn load_document(
    pool: &PgPool,
    cooperative_id: Uuid,
    id: Uuid,
) -> Result<ExportDocument, ExportError> {
    let header = report_repo::find_by_id(pool, cooperative_id, id)
        .await?
        .ok_or_else(|| ExportError::NotFound(format!("report {}", id)))?;
    let cooperative = cooperative_repo::get(pool, cooperative_id).await?;
    let content = line_repo::load_content(pool, &header).await?;
    Ok(ExportDocument::new(&header, &cooperative, content))
}

pub async fn export_report(
    pool: &PgPool,
    cooperative_id: Uuid,
    id: Uuid,
    format: ExportFormat,
) -> Result<ExportedFile, ExportError> {
    let doc = load_document(pool, cooperative_id, id).await?;
    let file = render(&doc, format)?;

    tracing::info!(
        report_id = %id,
        %cooperative_id,
        format = format.as_str(),
        bytes = file.bytes.len(),
        "Report exported"
    );
    Ok(file)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchState {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFile {
    pub name: String,
    pub sha256: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStatus {
    pub id: Uuid,
    pub state: BatchState,
    pub format: ExportFormat,
    pub total: usize,
    pub processed: usize,
    pub files: Vec<BatchFile>,
    pub errors: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub report_ids: Vec<Uuid>,
    #[serde(default)]
    pub format: ExportFormat,
    /// Restrict the batch to one cooperative's reports; ids of other
    /// cooperatives are then not found
    #[serde(default)]
    pub cooperative_id: Option<Uuid>,
}

pub fn batch_dir(export_dir: &Path, id: Uuid) -> PathBuf {
    export_dir.join(format!("batch-{}", id))
}

async fn write_status(dir: &Path, status: &mut BatchStatus) -> Result<(), ExportError> {
    status.updated_at = Utc::now();
    let tmp = dir.join(format!("{}.tmp", STATUS_FILE));
    tokio::fs::write(&tmp, serde_json::to_vec_pretty(status)?).await?;
    tokio::fs::rename(&tmp, dir.join(STATUS_FILE)).await?;
    Ok(())
}

/// `name`, or `stem-2.ext`, `stem-3.ext`, ... when an earlier file of the
/// batch already took it
fn unique_file_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{}", ext)),
        None => (name, String::new()),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}{}", stem, n, ext);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Write every document into a fresh batch directory. A document that fails
/// to render is recorded in `errors` and the batch ends `failed`; IO errors
/// abort the batch.
pub async fn run_batch(
    export_dir: &Path,
    id: Uuid,
    format: ExportFormat,
    documents: &[ExportDocument],
) -> Result<BatchStatus, ExportError> {
    let dir = batch_dir(export_dir, id);
    tokio::fs::create_dir_all(&dir).await?;

    let now = Utc::now();
    let mut status = BatchStatus {
        id,
        state: BatchState::Pending,
        format,
        total: documents.len(),
        processed: 0,
        files: Vec::new(),
        errors: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    write_status(&dir, &mut status).await?;

    status.state = BatchState::Processing;
    write_status(&dir, &mut status).await?;

    let mut used_names = HashSet::new();
    for doc in documents {
        match render(doc, format) {
            Ok(mut file) => {
                file.file_name = unique_file_name(&file.file_name, &mut used_names);
                if let Err(e) = tokio::fs::write(dir.join(&file.file_name), &file.bytes).await {
                    status.state = BatchState::Failed;
                    status.errors.push(format!("{}: {}", file.file_name, e));
                    if let Err(status_err) = write_status(&dir, &mut status).await {
                        tracing::error!(batch_id = %id, error = %status_err, "Failed to record batch failure");
                    }
                    return Err(e.into());
                }
                status.files.push(BatchFile {
                    sha256: hex::encode(Sha256::digest(&file.bytes)),
                    bytes: file.bytes.len() as u64,
                    name: file.file_name,
                });
            }
            Err(e) => {
                tracing::warn!(batch_id = %id, report_id = %doc.report_id, error = %e, "Report render failed");
                status.errors.push(format!("{}: {}", doc.report_id, e));
            }
        }
        status.processed += 1;
        write_status(&dir, &mut status).await?;
    }

    status.state = if status.errors.is_empty() {
        BatchState::Completed
    } else {
        BatchState::Failed
    };
    write_status(&dir, &mut status).await?;

    tracing::info!(
        batch_id = %id,
        files = status.files.len(),
        errors = status.errors.len(),
        state = ?status.state,
        "Export batch finished"
    );
    Ok(status)
}

/// Request order with repeated ids dropped
fn distinct_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Load the requested reports and run the batch. Every id must exist before
/// anything is written.
pub async fn create_batch(
    pool: &PgPool,
    export_dir: &Path,
    request: BatchRequest,
) -> Result<BatchStatus, ExportError> {
    if request.report_ids.is_empty() {
        return Err(ExportError::InvalidRequest("report_ids must not be empty".to_string()));
    }
    if request.report_ids.len() > MAX_BATCH_REPORTS {
        return Err(ExportError::InvalidRequest(format!(
            "A batch may hold at most {} reports",
            MAX_BATCH_REPORTS
        )));
    }

    let report_ids = distinct_ids(&request.report_ids);

    let mut cooperatives: HashMap<Uuid, Cooperative> = HashMap::new();
    let mut documents = Vec::with_capacity(report_ids.len());
    for id in &report_ids {
        let header = report_repo::find_any_by_id(pool, *id)
            .await?
            .filter(|h| request.cooperative_id.is_none_or(|c| c == h.cooperative_id))
            .ok_or_else(|| ExportError::NotFound(format!("report {}", id)))?;
        if !cooperatives.contains_key(&header.cooperative_id) {
            let coop = cooperative_repo::get(pool, header.cooperative_id).await?;
            cooperatives.insert(coop.id, coop);
        }
        let content = line_repo::load_content(pool, &header).await?;
        if let Some(coop) = cooperatives.get(&header.cooperative_id) {
            documents.push(ExportDocument::new(&header, coop, content));
        }
    }

    let batch_id = Uuid::new_v4();
    let cooperative_ids: Vec<Uuid> = cooperatives.keys().copied().collect();
    tracing::info!(
        %batch_id,
        reports = documents.len(),
        cooperatives = ?cooperative_ids,
        "Starting export batch"
    );
    run_batch(export_dir, batch_id, request.format, &documents).await
}

pub async fn read_status(export_dir: &Path, id: Uuid) -> Result<BatchStatus, ExportError> {
    let path = batch_dir(export_dir, id).join(STATUS_FILE);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ExportError::NotFound(format!("batch {}", id)));
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_slice(&bytes)?)
}

/// Path of a file inside a batch directory. Only a single plain file name is
/// accepted; separators, `..` and hidden names are rejected.
pub fn batch_file_path(export_dir: &Path, id: Uuid, name: &str) -> Result<PathBuf, ExportError> {
    let mut components = Path::new(name).components();
    let valid = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.starts_with('.')
        && !name.contains('\\');
    if !valid {
        return Err(ExportError::InvalidRequest(format!("Invalid file name: {}", name)));
    }
    Ok(batch_dir(export_dir, id).join(name))
}

pub async fn read_batch_file(
    export_dir: &Path,
    id: Uuid,
    name: &str,
) -> Result<ExportedFile, ExportError> {
    let path = batch_file_path(export_dir, id, name)?;
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ExportError::NotFound(format!("file {} in batch {}", name, id)));
        }
        Err(e) => return Err(e.into()),
    };
    let content_type = if name.ends_with(".csv") {
        ExportFormat::Csv.content_type()
    } else if name.ends_with(".json") {
        ExportFormat::Json.content_type()
    } else {
        "application/octet-stream"
    };
    Ok(ExportedFile {
        file_name: name.to_string(),
        content_type,
        bytes,
    })
}
