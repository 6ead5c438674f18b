//! # Risk
//!
//! Onboarding risk assessment. `risk_score` maps an applicant's raw form
//! answers to an additive score in `0..=100`; `RiskBand` buckets it. The
//! scoring is pure and never fails: unparseable answers take the cautious
//! value of their table.

pub mod score;

pub use score::{assess, risk_score, ApplicantProfile, RiskBand};
