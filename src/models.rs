use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Raw per-component counts for one LTPS-style component of a subject.
///
/// Upstream extraction guarantees `attended <= conducted` and
/// `carry_forward <= conducted`; the calculation layer clamps rather than
/// panics if that ever fails to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub conducted: u32,
    pub attended: u32,
    pub carry_forward: u32,
}

/// One subject as extracted: display name plus its component counts, keyed by
/// component label (Lecture, Practical, ...). Labels are opaque; a subject may
/// carry any number of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub course_name: String,
    pub components: BTreeMap<String, ComponentRecord>,
}

/// Extracted data keyed by course code. A `BTreeMap` so every downstream pass
/// sees subjects in course-code order, which keeps tie-breaks reproducible.
pub type RawData = BTreeMap<String, SubjectRecord>;

/// How carry-forward ("TCBR") classes count toward the numerator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountingMode {
    #[default]
    Standard,
    CarryForwardCorrected,
}

impl AccountingMode {
    /// Unknown strings fall back to `Standard` rather than erroring.
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "carry-forward-corrected" | "corrected" | "tcbr" => Self::CarryForwardCorrected,
            _ => Self::Standard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::CarryForwardCorrected => "carry-forward-corrected",
        }
    }
}

/// Three-way risk classification against the user threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Safe,
    Borderline,
    Critical,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Borderline => "borderline",
            Self::Critical => "critical",
        }
    }
}

/// Classes needed to climb back to the threshold. Once a class has been
/// missed, a 100% target can never be recovered; that case is a tagged
/// variant so callers cannot do arithmetic on it by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassesNeeded {
    Needed(u32),
    Unreachable,
}

/// What happens to a component's percentage if the very next class is missed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MissSimulation {
    pub current: f64,
    pub after_miss: f64,
    pub drop: f64,
    pub crosses_threshold: bool,
}

/// Derived figures for a single component. Recomputed on every run; never
/// cached across threshold or mode changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentResult {
    pub label: String,
    pub conducted: u32,
    pub attended: u32,
    pub carry_forward: u32,
    pub effective_attended: u32,
    pub percentage: f64,
    pub status: Status,
    pub needed: ClassesNeeded,
    /// `None` means unbounded (threshold at or below zero).
    pub can_skip: Option<u32>,
    pub simulation: MissSimulation,
}

/// Derived figures for one subject across all of its components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectResult {
    pub course_code: String,
    pub course_name: String,
    pub percentage: f64,
    pub status: Status,
    pub danger_score: f64,
    pub weakest_component: Option<String>,
    /// Sum of positive per-component needs, capped at `calc::NEEDED_CAP`. A
    /// component with an unreachable target saturates the sum to the cap.
    pub total_needed: u32,
    pub can_skip: u32,
    pub total_conducted: u32,
    pub total_attended: u32,
    pub total_effective: u32,
    pub total_absent: u32,
    pub components: Vec<ComponentResult>,
}

/// Cross-subject rollup for the summary header.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateStats {
    pub subject_count: usize,
    pub mean_percentage: f64,
    pub safe: usize,
    pub borderline: usize,
    pub critical: usize,
    pub most_at_risk: Option<AtRiskSubject>,
}

/// The single lowest-percentage subject; first encountered wins on ties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtRiskSubject {
    pub course_code: String,
    pub course_name: String,
    pub percentage: f64,
}

/// Ordering applied before presentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Danger,
    Name,
    Percentage,
}

impl SortKey {
    /// Unknown strings fall back to `Danger`.
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Self::Name,
            "percentage" => Self::Percentage,
            _ => Self::Danger,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Danger => "danger",
            Self::Name => "name",
            Self::Percentage => "percentage",
        }
    }
}

/// Presentation preference, persisted alongside the numeric settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Self::Dark,
            _ => Self::Light,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_mode_falls_back_to_standard() {
        assert_eq!(
            AccountingMode::parse_or_default("standard"),
            AccountingMode::Standard
        );
        assert_eq!(
            AccountingMode::parse_or_default("carry-forward-corrected"),
            AccountingMode::CarryForwardCorrected
        );
        assert_eq!(
            AccountingMode::parse_or_default("bogus"),
            AccountingMode::Standard
        );
        assert_eq!(AccountingMode::parse_or_default(""), AccountingMode::Standard);
    }

    #[test]
    fn unknown_sort_key_falls_back_to_danger() {
        assert_eq!(SortKey::parse_or_default("percentage"), SortKey::Percentage);
        assert_eq!(SortKey::parse_or_default("NAME"), SortKey::Name);
        assert_eq!(SortKey::parse_or_default("alphabetical"), SortKey::Danger);
    }

    #[test]
    fn theme_defaults_to_light() {
        assert_eq!(Theme::parse_or_default("dark"), Theme::Dark);
        assert_eq!(Theme::parse_or_default("solarized"), Theme::Light);
    }
}
