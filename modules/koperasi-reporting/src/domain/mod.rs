//! Pure statement types and financial arithmetic. Nothing in here touches the
//! database or the network.

pub mod balance_sheet;
pub mod budget;
pub mod cash_flow;
pub mod consistency;
pub mod equity_changes;
pub mod income_statement;
pub mod member_receivables;
pub mod member_savings;
pub mod non_performing;
pub mod ratios;
pub mod report;
pub mod shu;
pub mod trends;
pub mod validation;
