//! SHU (sisa hasil usaha) distribution and per-member shares
//!
//! Every split in this module uses largest-remainder apportionment, so the
//! distributed amounts always add up to the pool exactly.

use serde::{Deserialize, Serialize};

use super::validation::{check_duplicates, check_non_negative, Thresholds, ValidationReport};

/// Rounding slack allowed per allocation line (rupiah)
const LINE_ROUNDING_TOLERANCE: i64 = 1;
const PERCENT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "shu_component", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ShuComponent {
    Reserve,
    MemberCapitalService,
    MemberBusinessService,
    ManagementFund,
    EmployeeFund,
    EducationFund,
    SocialFund,
    RegionalDevelopmentFund,
    Other,
}

impl ShuComponent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShuComponent::Reserve => "reserve",
            ShuComponent::MemberCapitalService => "member_capital_service",
            ShuComponent::MemberBusinessService => "member_business_service",
            ShuComponent::ManagementFund => "management_fund",
            ShuComponent::EmployeeFund => "employee_fund",
            ShuComponent::EducationFund => "education_fund",
            ShuComponent::SocialFund => "social_fund",
            ShuComponent::RegionalDevelopmentFund => "regional_development_fund",
            ShuComponent::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShuAllocationLine {
    pub component: ShuComponent,
    pub percentage: f64,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ShuDistribution {
    pub shu_before_tax: i64,
    pub income_tax: i64,
    pub shu_after_tax: i64,
    pub allocations: Vec<ShuAllocationLine>,
}

impl ShuDistribution {
    pub fn total_percentage(&self) -> f64 {
        self.allocations.iter().map(|a| a.percentage).sum()
    }

    pub fn total_allocated(&self) -> i64 {
        self.allocations.iter().map(|a| a.amount).sum()
    }

    pub fn validate(&self, thresholds: &Thresholds) -> ValidationReport {
        let mut report = ValidationReport::new();

        check_non_negative(
            &mut report,
            "income_tax".to_string(),
            "Income tax",
            self.income_tax,
        );

        let expected_after_tax = self.shu_before_tax - self.income_tax;
        if expected_after_tax != self.shu_after_tax {
            report.error(
                "SHU_NET_MISMATCH",
                format!(
                    "SHU after tax ({}) must equal SHU before tax ({}) minus income tax ({})",
                    self.shu_after_tax, self.shu_before_tax, self.income_tax
                ),
                Some("shu_after_tax".to_string()),
            );
        }

        if self.shu_after_tax <= 0 {
            if !self.allocations.is_empty() {
                report.error(
                    "LOSS_DISTRIBUTED",
                    format!(
                        "SHU after tax is {}; a loss cannot be distributed",
                        self.shu_after_tax
                    ),
                    Some("allocations".to_string()),
                );
            }
            return report;
        }

        if self.allocations.is_empty() {
            report.error(
                "NO_ALLOCATIONS",
                "Positive SHU must be allocated to at least one component",
                Some("allocations".to_string()),
            );
            return report;
        }

        check_duplicates(
            &mut report,
            "DUPLICATE_COMPONENT",
            "SHU component",
            self.allocations.iter().map(|a| a.component.as_str()),
        );

        for (idx, line) in self.allocations.iter().enumerate() {
            if line.percentage < 0.0 || line.percentage > 100.0 {
                report.error(
                    "INVALID_PERCENTAGE",
                    format!(
                        "{}: percentage must be between 0 and 100, got {}",
                        line.component.as_str(),
                        line.percentage
                    ),
                    Some(format!("allocations[{}].percentage", idx)),
                );
                continue;
            }

            let expected = (self.shu_after_tax as f64 * line.percentage / 100.0).round() as i64;
            if (line.amount - expected).abs() > LINE_ROUNDING_TOLERANCE {
                report.error(
                    "ALLOCATION_AMOUNT_MISMATCH",
                    format!(
                        "{}: {}% of {} is {}, but {} was allocated",
                        line.component.as_str(),
                        line.percentage,
                        self.shu_after_tax,
                        expected,
                        line.amount
                    ),
                    Some(format!("allocations[{}].amount", idx)),
                );
            }
        }

        let total_pct = self.total_percentage();
        if (total_pct - 100.0).abs() > PERCENT_TOLERANCE {
            report.error(
                "PERCENTAGE_TOTAL_MISMATCH",
                format!("Allocation percentages add up to {:.2}%, expected 100%", total_pct),
                Some("allocations".to_string()),
            );
        }

        let difference = self.total_allocated() - self.shu_after_tax;
        if difference.abs() > thresholds.consistency_tolerance {
            report.error(
                "ALLOCATION_TOTAL_MISMATCH",
                format!(
                    "Allocated total ({}) differs from SHU after tax ({}) by {}",
                    self.total_allocated(),
                    self.shu_after_tax,
                    difference
                ),
                Some("allocations".to_string()),
            );
        }

        if !self
            .allocations
            .iter()
            .any(|a| a.component == ShuComponent::Reserve && a.percentage > 0.0)
        {
            report.warning(
                "NO_RESERVE_ALLOCATION",
                "No part of the SHU is set aside for the reserve fund (dana cadangan)",
                Some("allocations".to_string()),
            );
        }

        report
    }
}

/// Split `pool` proportionally to integer `weights`.
///
/// Floors every share, then hands the leftover units to the largest
/// remainders (earlier index wins ties). A non-positive pool or an all-zero
/// weight vector yields zeros.
pub fn apportion(pool: i64, weights: &[i64]) -> Vec<i64> {
    let total_weight: i128 = weights.iter().map(|w| (*w).max(0) as i128).sum();
    if pool <= 0 || total_weight == 0 {
        return vec![0; weights.len()];
    }

    let pool = pool as i128;
    let mut shares = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());
    for (idx, w) in weights.iter().enumerate() {
        let numerator = pool * (*w).max(0) as i128;
        shares.push((numerator / total_weight) as i64);
        remainders.push((numerator % total_weight, idx));
    }

    let distributed: i128 = shares.iter().map(|s| *s as i128).sum();
    let leftover = (pool - distributed) as usize;

    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for (_, idx) in remainders.into_iter().take(leftover) {
        shares[idx] += 1;
    }

    shares
}

/// Build allocation lines for `shu_after_tax` from component percentages.
/// Percentages are resolved to basis points before apportioning.
pub fn allocate(shu_after_tax: i64, plan: &[(ShuComponent, f64)]) -> Vec<ShuAllocationLine> {
    let weights: Vec<i64> = plan
        .iter()
        .map(|(_, pct)| (pct * 100.0).round() as i64)
        .collect();
    let amounts = apportion(shu_after_tax, &weights);

    plan.iter()
        .zip(amounts)
        .map(|((component, percentage), amount)| ShuAllocationLine {
            component: *component,
            percentage: *percentage,
            amount,
        })
        .collect()
}

/// Member participation used to split the member service pools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShuParticipant {
    pub member_number: String,
    pub member_name: String,
    /// Principal + mandatory savings (basis for jasa modal)
    pub capital_basis: i64,
    /// Business volume with the cooperative (basis for jasa usaha)
    pub business_basis: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberShuShare {
    pub member_number: String,
    pub member_name: String,
    pub capital_share: i64,
    pub business_share: i64,
    pub total_share: i64,
}

/// Split the jasa modal and jasa usaha pools across members
pub fn member_shares(
    capital_pool: i64,
    business_pool: i64,
    participants: &[ShuParticipant],
) -> Vec<MemberShuShare> {
    let capital_weights: Vec<i64> = participants.iter().map(|p| p.capital_basis).collect();
    let business_weights: Vec<i64> = participants.iter().map(|p| p.business_basis).collect();

    let capital = apportion(capital_pool, &capital_weights);
    let business = apportion(business_pool, &business_weights);

    participants
        .iter()
        .zip(capital.into_iter().zip(business))
        .map(|(p, (capital_share, business_share))| MemberShuShare {
            member_number: p.member_number.clone(),
            member_name: p.member_name.clone(),
            capital_share,
            business_share,
            total_share: capital_share + business_share,
        })
        .collect()
}
