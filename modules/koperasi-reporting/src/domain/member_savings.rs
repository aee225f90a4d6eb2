//! Member savings register (simpanan pokok, wajib, sukarela)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::validation::{
    check_duplicates, check_non_negative, check_not_blank, Thresholds, ValidationReport,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemberSavingLine {
    pub member_number: String,
    pub member_name: String,
    pub principal_savings: i64,
    pub mandatory_savings: i64,
    #[serde(default)]
    pub voluntary_savings: i64,
    /// Member business volume with the cooperative during the year (basis for jasa usaha)
    #[serde(default)]
    pub annual_transactions: i64,
}

impl MemberSavingLine {
    pub fn total_savings(&self) -> i64 {
        self.principal_savings + self.mandatory_savings + self.voluntary_savings
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MemberSavingsReport {
    pub lines: Vec<MemberSavingLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MemberSavingsTotals {
    pub member_count: i64,
    pub principal_savings: i64,
    pub mandatory_savings: i64,
    pub voluntary_savings: i64,
    pub total_savings: i64,
    pub annual_transactions: i64,
}

impl MemberSavingsReport {
    pub fn totals(&self) -> MemberSavingsTotals {
        let mut t = MemberSavingsTotals {
            member_count: self.lines.len() as i64,
            ..Default::default()
        };
        for l in &self.lines {
            t.principal_savings += l.principal_savings;
            t.mandatory_savings += l.mandatory_savings;
            t.voluntary_savings += l.voluntary_savings;
            t.annual_transactions += l.annual_transactions;
        }
        t.total_savings = t.principal_savings + t.mandatory_savings + t.voluntary_savings;
        t
    }

    /// Most common principal savings amount (ties resolve to the smaller amount)
    fn typical_principal(&self) -> Option<i64> {
        let mut counts: HashMap<i64, usize> = HashMap::new();
        for l in &self.lines {
            *counts.entry(l.principal_savings).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(amount, _)| amount)
    }

    pub fn validate(&self, _thresholds: &Thresholds) -> ValidationReport {
        let mut report = ValidationReport::new();

        if self.lines.is_empty() {
            report.error("EMPTY_REPORT", "Member savings register has no members", None);
            return report;
        }

        for (idx, line) in self.lines.iter().enumerate() {
            check_not_blank(
                &mut report,
                format!("lines[{}].member_number", idx),
                "Member number",
                &line.member_number,
            );
            check_not_blank(
                &mut report,
                format!("lines[{}].member_name", idx),
                "Member name",
                &line.member_name,
            );
            for (field, value) in [
                ("principal_savings", line.principal_savings),
                ("mandatory_savings", line.mandatory_savings),
                ("voluntary_savings", line.voluntary_savings),
                ("annual_transactions", line.annual_transactions),
            ] {
                check_non_negative(
                    &mut report,
                    format!("lines[{}].{}", idx, field),
                    field,
                    value,
                );
            }
        }

        check_duplicates(
            &mut report,
            "DUPLICATE_MEMBER",
            "member number",
            self.lines.iter().map(|l| l.member_number.as_str()),
        );

        if let Some(typical) = self.typical_principal() {
            for (idx, line) in self.lines.iter().enumerate() {
                if line.principal_savings != typical {
                    report.warning(
                        "NON_UNIFORM_PRINCIPAL_SAVINGS",
                        format!(
                            "Member {} has principal savings {} while most members have {}",
                            line.member_number, line.principal_savings, typical
                        ),
                        Some(format!("lines[{}].principal_savings", idx)),
                    );
                }
            }
        }

        report
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::validation::has_blocking_errors;

    pub(crate) fn member(number: &str, principal: i64, mandatory: i64, voluntary: i64, tx: i64) -> MemberSavingLine {
        MemberSavingLine {
            member_number: number.to_string(),
            member_name: format!("Anggota {}", number),
            principal_savings: principal,
            mandatory_savings: mandatory,
            voluntary_savings: voluntary,
            annual_transactions: tx,
        }
    }

    pub(crate) fn register() -> MemberSavingsReport {
        MemberSavingsReport {
            lines: vec![
                member("A-001", 10_000, 20_000, 30_000, 100_000),
                member("A-002", 10_000, 25_000, 20_000, 50_000),
                member("A-003", 10_000, 15_000, 30_000, 250_000),
            ],
        }
    }

    #[test]
    fn test_totals() {
        let t = register().totals();
        assert_eq!(t.member_count, 3);
        assert_eq!(t.principal_savings, 30_000);
        assert_eq!(t.mandatory_savings, 60_000);
        assert_eq!(t.voluntary_savings, 80_000);
        assert_eq!(t.total_savings, 170_000);
        assert_eq!(t.annual_transactions, 400_000);
    }

    #[test]
    fn test_valid_register() {
        let report = register().validate(&Thresholds::default());
        assert!(report.issues.is_empty(), "{:?}", report);
    }

    #[test]
    fn test_non_uniform_principal_warns_on_outlier() {
        let mut r = register();
        r.lines[1].principal_savings = 5_000;
        let report = r.validate(&Thresholds::default());
        assert_eq!(report.warnings().count(), 1);
        assert_eq!(
            report.issues[0].field.as_deref(),
            Some("lines[1].principal_savings")
        );
        assert!(!has_blocking_errors(&report));
    }

    #[test]
    fn test_duplicate_member_number() {
        let mut r = register();
        r.lines[2].member_number = "A-001".to_string();
        assert!(r.validate(&Thresholds::default()).has_code("DUPLICATE_MEMBER"));
    }
}
