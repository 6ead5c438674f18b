use serde::{Deserialize, Serialize};
use std::fmt;

/// Applicant answers exactly as collected by the onboarding form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub age: String,
    pub annual_income: String,
    pub employment_status: String,
    pub trading_experience: String,
    pub risk_tolerance: String,
    pub politically_exposed: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=29 => RiskBand::Low,
            30..=59 => RiskBand::Medium,
            _ => RiskBand::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskBand::Low => "low",
            RiskBand::Medium => "medium",
            RiskBand::High => "high",
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Experience {
    None,
    Beginner,
    Intermediate,
    Advanced,
    Unknown,
}

const MAX_SCORE: u32 = 100;

fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Parses a form number such as `$85,000` or `1_200`.
fn parse_amount(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    let digits: String = trimmed
        .strip_prefix('$')
        .unwrap_or(trimmed)
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn age_points(raw: &str) -> u32 {
    match parse_amount(raw) {
        None => 25,
        Some(age) if age < 18 => 40,
        Some(18..=24) => 15,
        Some(25..=34) => 5,
        Some(35..=54) => 0,
        Some(55..=64) => 10,
        Some(_) => 20,
    }
}

fn income_points(raw: &str) -> u32 {
    match parse_amount(raw) {
        None => 20,
        Some(income) if income < 25_000 => 20,
        Some(income) if income < 50_000 => 12,
        Some(income) if income < 100_000 => 6,
        Some(_) => 0,
    }
}

fn employment_points(raw: &str) -> u32 {
    match normalize(raw).as_str() {
        "employed" => 0,
        "self-employed" | "self employed" | "self_employed" => 5,
        "retired" => 10,
        "student" => 15,
        "unemployed" => 25,
        _ => 20,
    }
}

fn experience(raw: &str) -> Experience {
    match normalize(raw).as_str() {
        "none" => Experience::None,
        "beginner" => Experience::Beginner,
        "intermediate" => Experience::Intermediate,
        "advanced" | "expert" => Experience::Advanced,
        _ => Experience::Unknown,
    }
}

fn experience_points(experience: Experience) -> u32 {
    match experience {
        Experience::None => 20,
        Experience::Beginner => 12,
        Experience::Intermediate => 5,
        Experience::Advanced => 0,
        Experience::Unknown => 20,
    }
}

/// Penalises a tolerance the applicant's experience does not back up.
fn tolerance_points(raw: &str, experience: Experience) -> u32 {
    match (normalize(raw).as_str(), experience) {
        ("high", Experience::None | Experience::Beginner) => 15,
        ("high", _) => 0,
        ("medium", Experience::None) => 5,
        ("medium", _) | ("low", _) => 0,
        _ => 10,
    }
}

fn exposure_points(raw: &str) -> u32 {
    match normalize(raw).as_str() {
        "no" | "false" | "n" => 0,
        _ => 30,
    }
}

/// Deterministic additive risk score in `0..=100`.
pub fn risk_score(profile: &ApplicantProfile) -> u8 {
    let experience = experience(&profile.trading_experience);
    let total = age_points(&profile.age)
        + income_points(&profile.annual_income)
        + employment_points(&profile.employment_status)
        + experience_points(experience)
        + tolerance_points(&profile.risk_tolerance, experience)
        + exposure_points(&profile.politically_exposed);

    // Bounded by MAX_SCORE, so the cast cannot truncate.
    total.min(MAX_SCORE) as u8
}

/// Score and band together.
pub fn assess(profile: &ApplicantProfile) -> (u8, RiskBand) {
    let score = risk_score(profile);
    (score, RiskBand::from_score(score))
}
