pub mod eligibility;
pub mod track;
