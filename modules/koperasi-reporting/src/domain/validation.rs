//! Validation report types shared by every statement validator
//!
//! Validators never fail with an error: they collect itemized issues into a
//! `ValidationReport`. Only `Error` severity blocks a submit.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Structured validation report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

/// Individual validation issue with a stable code for client handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,

    /// Stable code, e.g. "BALANCE_EQUATION_MISMATCH"
    pub code: String,

    pub message: String,

    /// Field or line the issue refers to, e.g. "lines[3].current_amount"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationSeverity {
    /// Blocks submission
    Error,
    /// Should be reviewed but does not block submission
    Warning,
    Info,
}

impl ValidationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationSeverity::Error => "error",
            ValidationSeverity::Warning => "warning",
            ValidationSeverity::Info => "info",
        }
    }
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        severity: ValidationSeverity,
        code: &str,
        message: impl Into<String>,
        field: Option<String>,
    ) {
        self.issues.push(ValidationIssue {
            severity,
            code: code.to_string(),
            message: message.into(),
            field,
            metadata: None,
        });
    }

    pub fn error(&mut self, code: &str, message: impl Into<String>, field: Option<String>) {
        self.push(ValidationSeverity::Error, code, message, field);
    }

    pub fn warning(&mut self, code: &str, message: impl Into<String>, field: Option<String>) {
        self.push(ValidationSeverity::Warning, code, message, field);
    }

    pub fn info(&mut self, code: &str, message: impl Into<String>, field: Option<String>) {
        self.push(ValidationSeverity::Info, code, message, field);
    }

    /// Attach metadata to the most recently pushed issue
    pub fn with_metadata(&mut self, metadata: serde_json::Value) {
        if let Some(last) = self.issues.last_mut() {
            last.metadata = Some(metadata);
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Warning)
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }
}

/// Check if a validation report contains blocking errors
pub fn has_blocking_errors(report: &ValidationReport) -> bool {
    report.errors().next().is_some()
}

/// Tunable thresholds for validators and consistency checks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Thresholds {
    /// Allowed absolute difference in the balance equation (rupiah)
    pub balance_tolerance: i64,
    /// Year-over-year change (percent) above which a line is flagged
    pub swing_warning_pct: f64,
    /// Budget growth over previous realization (percent) above which a line is flagged
    pub budget_growth_warning_pct: f64,
    /// Allowed absolute difference between figures of different reports (rupiah)
    pub consistency_tolerance: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            balance_tolerance: 0,
            swing_warning_pct: 50.0,
            budget_growth_warning_pct: 30.0,
            consistency_tolerance: 1,
        }
    }
}

/// Largest magnitude accepted for a single amount (100 trillion rupiah)
pub const MAX_AMOUNT: i64 = 100_000_000_000_000;

/// Most items accepted in a single list of a report
pub const MAX_LINES: usize = 5_000;

/// Reject submitted content whose integers or list lengths exceed the limits
/// above, so statement totals stay well inside `i64`. The error names the
/// first offending path, e.g. `content.lines[2].current_amount`.
pub fn check_limits(content: &serde_json::Value) -> Result<(), String> {
    fn walk(value: &serde_json::Value, path: &str) -> Result<(), String> {
        match value {
            serde_json::Value::Number(n) => {
                let too_large = match (n.as_i64(), n.as_u64()) {
                    (Some(v), _) => v.unsigned_abs() > MAX_AMOUNT.unsigned_abs(),
                    (None, Some(_)) => true,
                    (None, None) => false,
                };
                if too_large {
                    return Err(format!("{} is outside ±{}", path, MAX_AMOUNT));
                }
                Ok(())
            }
            serde_json::Value::Array(items) => {
                if items.len() > MAX_LINES {
                    return Err(format!("{} has more than {} items", path, MAX_LINES));
                }
                for (i, item) in items.iter().enumerate() {
                    walk(item, &format!("{}[{}]", path, i))?;
                }
                Ok(())
            }
            serde_json::Value::Object(map) => {
                for (key, item) in map {
                    walk(item, &format!("{}.{}", path, key))?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
    walk(content, "content")
}

/// Percentage change from `previous` to `current`, None when previous is zero
pub fn percent_change(current: i64, previous: i64) -> Option<f64> {
    if previous == 0 {
        return None;
    }
    Some((current as f64 - previous as f64) / (previous as f64).abs() * 100.0)
}

/// Flag unrealistic year-over-year swings on a single figure
pub fn check_swing(
    report: &mut ValidationReport,
    field: String,
    label: &str,
    current: i64,
    previous: i64,
    threshold_pct: f64,
) {
    if let Some(change) = percent_change(current, previous) {
        if change.abs() > threshold_pct {
            report.warning(
                "UNREALISTIC_CHANGE",
                format!(
                    "{} changed {:.1}% year over year ({} -> {})",
                    label, change, previous, current
                ),
                Some(field),
            );
            report.with_metadata(serde_json::json!({
                "previous": previous,
                "current": current,
                "change_pct": change,
            }));
        }
    }
}

/// Report every repeated key as a `DUPLICATE_*` error
pub fn check_duplicates<'a>(
    report: &mut ValidationReport,
    code: &str,
    what: &str,
    keys: impl Iterator<Item = &'a str>,
) {
    let mut seen = HashSet::new();
    for (idx, key) in keys.enumerate() {
        if !seen.insert(key) {
            report.error(
                code,
                format!("Duplicate {} '{}'", what, key),
                Some(format!("lines[{}]", idx)),
            );
        }
    }
}

/// Report a negative amount as a `NEGATIVE_AMOUNT` error
pub fn check_non_negative(report: &mut ValidationReport, field: String, label: &str, amount: i64) {
    if amount < 0 {
        report.error(
            "NEGATIVE_AMOUNT",
            format!("{} must not be negative, got {}", label, amount),
            Some(field),
        );
    }
}

/// Report an empty identifier as a `MISSING_FIELD` error
pub fn check_not_blank(report: &mut ValidationReport, field: String, label: &str, value: &str) {
    if value.trim().is_empty() {
        report.error("MISSING_FIELD", format!("{} cannot be empty", label), Some(field));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report_has_no_blocking_errors() {
        let report = ValidationReport::new();
        assert!(!has_blocking_errors(&report));
    }

    #[test]
    fn test_warning_does_not_block() {
        let mut report = ValidationReport::new();
        report.warning("UNREALISTIC_CHANGE", "big swing", None);
        assert!(!has_blocking_errors(&report));
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn test_error_blocks() {
        let mut report = ValidationReport::new();
        report.error("NEGATIVE_AMOUNT", "negative", Some("lines[0]".to_string()));
        assert!(has_blocking_errors(&report));
        assert!(report.has_code("NEGATIVE_AMOUNT"));
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(150, 100), Some(50.0));
        assert_eq!(percent_change(50, -100), Some(150.0));
        assert_eq!(percent_change(10, 0), None);
        assert!(percent_change(i64::MAX, i64::MIN).is_some());
    }

    #[test]
    fn test_check_limits() {
        let ok = serde_json::json!({
            "beginning_cash": MAX_AMOUNT,
            "lines": [{ "current_amount": -MAX_AMOUNT, "percentage": 12.5 }]
        });
        assert!(check_limits(&ok).is_ok());

        let big = serde_json::json!({ "lines": [{ "a": 1 }, { "current_amount": i64::MAX }] });
        let err = check_limits(&big).unwrap_err();
        assert!(err.contains("content.lines[1].current_amount"), "{}", err);

        let huge = serde_json::json!({ "amount": u64::MAX });
        assert!(check_limits(&huge).is_err());

        let long = serde_json::json!({ "lines": vec![0; MAX_LINES + 1] });
        assert!(check_limits(&long).unwrap_err().contains("items"));
    }

    #[test]
    fn test_check_swing_threshold_is_exclusive() {
        let mut report = ValidationReport::new();
        check_swing(&mut report, "x".to_string(), "Cash", 150, 100, 50.0);
        assert!(report.issues.is_empty());

        check_swing(&mut report, "x".to_string(), "Cash", 151, 100, 50.0);
        assert_eq!(report.warnings().count(), 1);
        assert!(report.issues[0].metadata.is_some());
    }

    #[test]
    fn test_check_duplicates_reports_second_occurrence() {
        let mut report = ValidationReport::new();
        let keys = ["1-100", "1-200", "1-100"];
        check_duplicates(&mut report, "DUPLICATE_ACCOUNT", "account code", keys.iter().copied());
        assert_eq!(report.errors().count(), 1);
        assert_eq!(report.issues[0].field.as_deref(), Some("lines[2]"));
    }

    #[test]
    fn test_severity_serializes_screaming_case() {
        let json = serde_json::to_string(&ValidationSeverity::Warning).unwrap();
        assert_eq!(json, "\"WARNING\"");
    }
}
