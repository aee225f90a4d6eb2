//! Report header types: report type, lifecycle status, and typed content
//!
//! The lifecycle is an explicit transition table. Handlers never compare
//! status strings; they ask `ReportStatus::apply` for the next state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::balance_sheet::BalanceSheet;
use super::budget::BudgetPlan;
use super::cash_flow::CashFlowStatement;
use super::equity_changes::EquityChangesStatement;
use super::income_statement::IncomeStatement;
use super::member_receivables::MemberReceivablesReport;
use super::member_savings::MemberSavingsReport;
use super::non_performing::NonPerformingReport;
use super::shu::ShuDistribution;
use super::validation::{Thresholds, ValidationReport};

/// Which year column of a comparative statement to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Current,
    Previous,
}

/// Report type enum matching database report_type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "report_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    BalanceSheet,
    IncomeStatement,
    CashFlow,
    EquityChanges,
    MemberSavings,
    MemberReceivables,
    NonPerformingReceivables,
    ShuDistribution,
    BudgetPlan,
}

impl ReportType {
    pub const ALL: [ReportType; 9] = [
        ReportType::BalanceSheet,
        ReportType::IncomeStatement,
        ReportType::CashFlow,
        ReportType::EquityChanges,
        ReportType::MemberSavings,
        ReportType::MemberReceivables,
        ReportType::NonPerformingReceivables,
        ReportType::ShuDistribution,
        ReportType::BudgetPlan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::BalanceSheet => "balance_sheet",
            ReportType::IncomeStatement => "income_statement",
            ReportType::CashFlow => "cash_flow",
            ReportType::EquityChanges => "equity_changes",
            ReportType::MemberSavings => "member_savings",
            ReportType::MemberReceivables => "member_receivables",
            ReportType::NonPerformingReceivables => "non_performing_receivables",
            ReportType::ShuDistribution => "shu_distribution",
            ReportType::BudgetPlan => "budget_plan",
        }
    }

    /// Indonesian display label used in exports
    pub fn label(&self) -> &'static str {
        match self {
            ReportType::BalanceSheet => "Neraca",
            ReportType::IncomeStatement => "Laporan Perhitungan Hasil Usaha",
            ReportType::CashFlow => "Laporan Arus Kas",
            ReportType::EquityChanges => "Laporan Perubahan Ekuitas",
            ReportType::MemberSavings => "Daftar Simpanan Anggota",
            ReportType::MemberReceivables => "Daftar Piutang Anggota",
            ReportType::NonPerformingReceivables => "Daftar Piutang Bermasalah",
            ReportType::ShuDistribution => "Pembagian SHU",
            ReportType::BudgetPlan => "Rencana Anggaran",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown report type: {}", s))
    }
}

/// Report status enum matching database report_status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "report_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

/// Lifecycle actions that move a report between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportAction {
    Edit,
    Submit,
    Approve,
    Reject,
    Delete,
}

impl ReportAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportAction::Edit => "edit",
            ReportAction::Submit => "submit",
            ReportAction::Approve => "approve",
            ReportAction::Reject => "reject",
            ReportAction::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot {action} a report in status '{from}'")]
pub struct InvalidTransition {
    pub from: &'static str,
    pub action: &'static str,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Draft => "draft",
            ReportStatus::Submitted => "submitted",
            ReportStatus::Approved => "approved",
            ReportStatus::Rejected => "rejected",
        }
    }

    /// Next status after `action`. Delete yields the current status; the
    /// caller removes the row.
    pub fn apply(self, action: ReportAction) -> Result<ReportStatus, InvalidTransition> {
        use ReportAction as A;
        use ReportStatus as S;

        match (self, action) {
            (S::Draft | S::Rejected, A::Edit) => Ok(S::Draft),
            (S::Draft, A::Submit) => Ok(S::Submitted),
            (S::Submitted, A::Approve) => Ok(S::Approved),
            (S::Submitted, A::Reject) => Ok(S::Rejected),
            (S::Draft | S::Rejected, A::Delete) => Ok(self),
            _ => Err(InvalidTransition {
                from: self.as_str(),
                action: action.as_str(),
            }),
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ReportStatus::Draft),
            "submitted" => Ok(ReportStatus::Submitted),
            "approved" => Ok(ReportStatus::Approved),
            "rejected" => Ok(ReportStatus::Rejected),
            other => Err(format!("Unknown report status: {}", other)),
        }
    }
}

/// Typed report content, tagged by report type on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "report_type", content = "content", rename_all = "snake_case")]
pub enum ReportContent {
    BalanceSheet(BalanceSheet),
    IncomeStatement(IncomeStatement),
    CashFlow(CashFlowStatement),
    EquityChanges(EquityChangesStatement),
    MemberSavings(MemberSavingsReport),
    MemberReceivables(MemberReceivablesReport),
    NonPerformingReceivables(NonPerformingReport),
    ShuDistribution(ShuDistribution),
    BudgetPlan(BudgetPlan),
}

impl ReportContent {
    /// Build typed content from a report type and its untyped JSON body
    pub fn from_parts(
        report_type: ReportType,
        content: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({
            "report_type": report_type,
            "content": content,
        }))
    }

    pub fn report_type(&self) -> ReportType {
        match self {
            ReportContent::BalanceSheet(_) => ReportType::BalanceSheet,
            ReportContent::IncomeStatement(_) => ReportType::IncomeStatement,
            ReportContent::CashFlow(_) => ReportType::CashFlow,
            ReportContent::EquityChanges(_) => ReportType::EquityChanges,
            ReportContent::MemberSavings(_) => ReportType::MemberSavings,
            ReportContent::MemberReceivables(_) => ReportType::MemberReceivables,
            ReportContent::NonPerformingReceivables(_) => ReportType::NonPerformingReceivables,
            ReportContent::ShuDistribution(_) => ReportType::ShuDistribution,
            ReportContent::BudgetPlan(_) => ReportType::BudgetPlan,
        }
    }

    pub fn validate(&self, thresholds: &Thresholds) -> ValidationReport {
        match self {
            ReportContent::BalanceSheet(r) => r.validate(thresholds),
            ReportContent::IncomeStatement(r) => r.validate(thresholds),
            ReportContent::CashFlow(r) => r.validate(thresholds),
            ReportContent::EquityChanges(r) => r.validate(thresholds),
            ReportContent::MemberSavings(r) => r.validate(thresholds),
            ReportContent::MemberReceivables(r) => r.validate(thresholds),
            ReportContent::NonPerformingReceivables(r) => r.validate(thresholds),
            ReportContent::ShuDistribution(r) => r.validate(thresholds),
            ReportContent::BudgetPlan(r) => r.validate(thresholds),
        }
    }

    /// Scalar fields stored in the report header's `data` column
    pub fn header_data(&self) -> serde_json::Value {
        match self {
            ReportContent::CashFlow(r) => serde_json::json!({
                "beginning_cash": r.beginning_cash,
                "ending_cash": r.ending_cash,
            }),
            ReportContent::ShuDistribution(r) => serde_json::json!({
                "shu_before_tax": r.shu_before_tax,
                "income_tax": r.income_tax,
                "shu_after_tax": r.shu_after_tax,
            }),
            _ => serde_json::json!({}),
        }
    }

    pub fn line_count(&self) -> usize {
        match self {
            ReportContent::BalanceSheet(r) => r.lines.len(),
            ReportContent::IncomeStatement(r) => r.lines.len(),
            ReportContent::CashFlow(r) => r.lines.len(),
            ReportContent::EquityChanges(r) => r.lines.len(),
            ReportContent::MemberSavings(r) => r.lines.len(),
            ReportContent::MemberReceivables(r) => r.lines.len(),
            ReportContent::NonPerformingReceivables(r) => r.lines.len(),
            ReportContent::ShuDistribution(r) => r.allocations.len(),
            ReportContent::BudgetPlan(r) => r.lines.len(),
        }
    }
}
