//! Statement of changes in equity (laporan perubahan ekuitas)

use serde::{Deserialize, Serialize};

use super::validation::{check_duplicates, check_non_negative, Thresholds, ValidationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "equity_component", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EquityComponent {
    PrincipalSavings,
    MandatorySavings,
    Reserve,
    Grants,
    UndistributedShu,
    Other,
}

impl EquityComponent {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquityComponent::PrincipalSavings => "principal_savings",
            EquityComponent::MandatorySavings => "mandatory_savings",
            EquityComponent::Reserve => "reserve",
            EquityComponent::Grants => "grants",
            EquityComponent::UndistributedShu => "undistributed_shu",
            EquityComponent::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EquityChangeLine {
    pub component: EquityComponent,
    pub beginning_balance: i64,
    pub additions: i64,
    pub reductions: i64,
    pub ending_balance: i64,
}

impl EquityChangeLine {
    pub fn computed_ending(&self) -> i64 {
        self.beginning_balance + self.additions - self.reductions
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EquityChangesStatement {
    pub lines: Vec<EquityChangeLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EquityChangesTotals {
    pub beginning_balance: i64,
    pub additions: i64,
    pub reductions: i64,
    pub ending_balance: i64,
}

impl EquityChangesStatement {
    pub fn totals(&self) -> EquityChangesTotals {
        self.lines
            .iter()
            .fold(EquityChangesTotals::default(), |mut t, l| {
                t.beginning_balance += l.beginning_balance;
                t.additions += l.additions;
                t.reductions += l.reductions;
                t.ending_balance += l.ending_balance;
                t
            })
    }

    pub fn component(&self, component: EquityComponent) -> Option<&EquityChangeLine> {
        self.lines.iter().find(|l| l.component == component)
    }

    pub fn validate(&self, thresholds: &Thresholds) -> ValidationReport {
        let mut report = ValidationReport::new();

        if self.lines.is_empty() {
            report.error("EMPTY_REPORT", "Statement of changes in equity has no components", None);
            return report;
        }

        check_duplicates(
            &mut report,
            "DUPLICATE_COMPONENT",
            "equity component",
            self.lines.iter().map(|l| l.component.as_str()),
        );

        for (idx, line) in self.lines.iter().enumerate() {
            check_non_negative(
                &mut report,
                format!("lines[{}].additions", idx),
                "Additions",
                line.additions,
            );
            check_non_negative(
                &mut report,
                format!("lines[{}].reductions", idx),
                "Reductions",
                line.reductions,
            );

            let difference = line.computed_ending() - line.ending_balance;
            if difference.abs() > thresholds.balance_tolerance {
                report.error(
                    "EQUITY_ROLLFORWARD_MISMATCH",
                    format!(
                        "{}: beginning ({}) + additions ({}) - reductions ({}) = {}, but ending balance is {}",
                        line.component.as_str(),
                        line.beginning_balance,
                        line.additions,
                        line.reductions,
                        line.computed_ending(),
                        line.ending_balance
                    ),
                    Some(format!("lines[{}].ending_balance", idx)),
                );
            }
        }

        report
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn statement() -> EquityChangesStatement {
        EquityChangesStatement {
            lines: vec![
                EquityChangeLine {
                    component: EquityComponent::PrincipalSavings,
                    beginning_balance: 28_000,
                    additions: 2_000,
                    reductions: 0,
                    ending_balance: 30_000,
                },
                EquityChangeLine {
                    component: EquityComponent::MandatorySavings,
                    beginning_balance: 50_000,
                    additions: 12_000,
                    reductions: 2_000,
                    ending_balance: 60_000,
                },
                EquityChangeLine {
                    component: EquityComponent::UndistributedShu,
                    beginning_balance: 8_000,
                    additions: 10_000,
                    reductions: 8_000,
                    ending_balance: 10_000,
                },
            ],
        }
    }

    #[test]
    fn test_rollforward_passes() {
        let report = statement().validate(&Thresholds::default());
        assert!(report.issues.is_empty(), "{:?}", report);
        assert_eq!(statement().totals().ending_balance, 100_000);
    }

    #[test]
    fn test_rollforward_mismatch() {
        let mut s = statement();
        s.lines[1].ending_balance = 61_000;
        assert!(s
            .validate(&Thresholds::default())
            .has_code("EQUITY_ROLLFORWARD_MISMATCH"));
    }

    #[test]
    fn test_duplicate_component() {
        let mut s = statement();
        s.lines[2].component = EquityComponent::PrincipalSavings;
        assert!(s.validate(&Thresholds::default()).has_code("DUPLICATE_COMPONENT"));
    }
}
