use crate::models::{
    AccountingMode, AggregateStats, AtRiskSubject, ClassesNeeded, ComponentRecord,
    ComponentResult, MissSimulation, RawData, SortKey, Status, SubjectRecord, SubjectResult,
};

/// Margin above the threshold that still counts as borderline.
pub const SAFE_MARGIN: f64 = 5.0;
/// Width of the danger-score ramp above the threshold.
pub const DANGER_WINDOW: f64 = 10.0;
/// Danger-score floor for anything below the threshold, so every critical
/// subject outranks every safe one.
pub const CRITICAL_BASE: f64 = 50.0;
/// Display ceiling for skip capacity.
pub const SKIP_CAP: u32 = 100;
/// Display ceiling for total classes needed.
pub const NEEDED_CAP: u32 = 300;

/// Numerator used against `conducted`, depending on the accounting mode.
pub fn effective_attended(record: &ComponentRecord, mode: AccountingMode) -> u32 {
    match mode {
        AccountingMode::Standard => record.attended,
        AccountingMode::CarryForwardCorrected => {
            record.attended.saturating_add(record.carry_forward)
        }
    }
}

/// Attendance ratio as a percentage, clamped to [0, 100].
///
/// No conducted classes means there is nothing to have missed, so the record
/// counts as fully compliant (100) rather than an error.
pub fn ratio_percentage(effective: u32, conducted: u32) -> f64 {
    if conducted == 0 {
        return 100.0;
    }
    (effective as f64 / conducted as f64 * 100.0).clamp(0.0, 100.0)
}

pub fn component_percentage(record: &ComponentRecord, mode: AccountingMode) -> f64 {
    ratio_percentage(effective_attended(record, mode), record.conducted)
}

/// Unweighted mean of component percentages over components with at least one
/// conducted class. Component size deliberately carries no weight; this
/// mirrors the institution's own convention and must not be "fixed".
pub fn subject_percentage<'a, I>(components: I, mode: AccountingMode) -> f64
where
    I: IntoIterator<Item = &'a ComponentRecord>,
{
    let mut sum = 0.0;
    let mut count = 0usize;
    for record in components {
        if record.conducted > 0 {
            sum += component_percentage(record, mode);
            count += 1;
        }
    }
    if count == 0 {
        100.0
    } else {
        sum / count as f64
    }
}

/// Three-way classification with a fixed 5-point borderline buffer.
pub fn classify(percentage: f64, threshold: f64) -> Status {
    if percentage >= threshold + SAFE_MARGIN {
        Status::Safe
    } else if percentage >= threshold {
        Status::Borderline
    } else {
        Status::Critical
    }
}

/// Synthetic ordering key, not a percentage. Monotonically decreasing in
/// safety: the smaller the margin above threshold the higher the score, and
/// any below-threshold subject scores at least `CRITICAL_BASE`, putting it
/// above every at-or-over-threshold subject.
pub fn danger_score(percentage: f64, threshold: f64) -> f64 {
    if percentage >= threshold {
        (threshold + DANGER_WINDOW - percentage).max(0.0)
    } else {
        CRITICAL_BASE + (threshold - percentage)
    }
}

/// Minimum consecutive future attended classes to reach the threshold.
///
/// Solves `(a + x) / (c + x) >= t/100` for the smallest integer `x >= 0`.
/// With a 100% target the inequality has no solution once any class has been
/// missed, since `conducted` only ever grows.
pub fn classes_needed(effective: u32, conducted: u32, threshold: f64) -> ClassesNeeded {
    if ratio_percentage(effective, conducted) >= threshold {
        return ClassesNeeded::Needed(0);
    }
    if threshold >= 100.0 {
        return if effective >= conducted {
            ClassesNeeded::Needed(0)
        } else {
            ClassesNeeded::Unreachable
        };
    }
    let ratio = threshold / 100.0;
    let x = (ratio * conducted as f64 - effective as f64) / (1.0 - ratio);
    // Rounding can land a hair negative when already exactly at threshold.
    ClassesNeeded::Needed(x.ceil().max(0.0) as u32)
}

/// Maximum future missed classes while staying at or above the threshold.
///
/// Solves `a / (c + x) >= t/100` for the largest integer `x >= 0`. Returns
/// `None` for a non-positive threshold (unbounded); bounded results are
/// capped at `SKIP_CAP`.
pub fn classes_can_skip(effective: u32, conducted: u32, threshold: f64) -> Option<u32> {
    if threshold <= 0.0 {
        return None;
    }
    if ratio_percentage(effective, conducted) < threshold {
        return Some(0);
    }
    let ratio = threshold / 100.0;
    let x = (effective as f64 - ratio * conducted as f64) / ratio;
    Some((x.floor().max(0.0) as u32).min(SKIP_CAP))
}

/// Capped rendering of a skip capacity; unbounded shows as the cap.
pub fn display_skip(can_skip: Option<u32>) -> u32 {
    can_skip.unwrap_or(SKIP_CAP)
}

/// What-if for missing the very next class: one more conducted, attendance
/// unchanged.
pub fn simulate_miss(record: &ComponentRecord, threshold: f64, mode: AccountingMode) -> MissSimulation {
    let effective = effective_attended(record, mode);
    let current = ratio_percentage(effective, record.conducted);
    let after_miss = ratio_percentage(effective, record.conducted.saturating_add(1));
    MissSimulation {
        current,
        after_miss,
        drop: current - after_miss,
        crosses_threshold: current >= threshold && after_miss < threshold,
    }
}

fn component_result(
    label: &str,
    record: &ComponentRecord,
    threshold: f64,
    mode: AccountingMode,
) -> ComponentResult {
    let effective = effective_attended(record, mode);
    let percentage = ratio_percentage(effective, record.conducted);
    ComponentResult {
        label: label.to_string(),
        conducted: record.conducted,
        attended: record.attended,
        carry_forward: record.carry_forward,
        effective_attended: effective,
        percentage,
        status: classify(percentage, threshold),
        needed: classes_needed(effective, record.conducted, threshold),
        can_skip: classes_can_skip(effective, record.conducted, threshold),
        simulation: simulate_miss(record, threshold, mode),
    }
}

/// Full per-subject derivation: every component's figures, the weakest
/// component, and the subject-level rollups.
pub fn process_subject(
    course_code: &str,
    subject: &SubjectRecord,
    threshold: f64,
    mode: AccountingMode,
) -> SubjectResult {
    let components: Vec<ComponentResult> = subject
        .components
        .iter()
        .map(|(label, record)| component_result(label, record, threshold, mode))
        .collect();

    let percentage = subject_percentage(subject.components.values(), mode);

    let weakest_component = components
        .iter()
        .min_by(|a, b| {
            a.percentage
                .partial_cmp(&b.percentage)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|c| c.label.clone());

    let mut total_needed = 0u32;
    let mut unreachable = false;
    for component in &components {
        match component.needed {
            ClassesNeeded::Needed(n) => total_needed = total_needed.saturating_add(n),
            ClassesNeeded::Unreachable => unreachable = true,
        }
    }
    let total_needed = if unreachable {
        NEEDED_CAP
    } else {
        total_needed.min(NEEDED_CAP)
    };

    // Bottleneck rule: the smallest positive, bounded component capacity gates
    // the subject. With no such component (everything unbounded or already
    // zero) the subject reports 0, a conservative default kept on purpose.
    let can_skip = components
        .iter()
        .filter_map(|c| c.can_skip.filter(|&n| n > 0))
        .min()
        .unwrap_or(0)
        .min(SKIP_CAP);

    let total_conducted: u32 = components.iter().map(|c| c.conducted).sum();
    let total_attended: u32 = components.iter().map(|c| c.attended).sum();
    let total_effective: u32 = components.iter().map(|c| c.effective_attended).sum();

    SubjectResult {
        course_code: course_code.to_string(),
        course_name: subject.course_name.clone(),
        percentage,
        status: classify(percentage, threshold),
        danger_score: danger_score(percentage, threshold),
        weakest_component,
        total_needed,
        can_skip,
        total_conducted,
        total_attended,
        total_effective,
        total_absent: total_conducted.saturating_sub(total_attended),
        components,
    }
}

/// Batch entry point. Subjects come out in course-code order; an empty input
/// yields an empty list rather than an error.
pub fn process_all_subjects(raw: &RawData, threshold: f64, mode: AccountingMode) -> Vec<SubjectResult> {
    raw.iter()
        .map(|(code, subject)| process_subject(code, subject, threshold, mode))
        .collect()
}

/// Stable sort for presentation: danger descending, name ascending
/// (case-insensitive), or raw percentage ascending.
pub fn sort_subjects(subjects: &mut [SubjectResult], key: SortKey) {
    match key {
        SortKey::Danger => subjects.sort_by(|a, b| {
            b.danger_score
                .partial_cmp(&a.danger_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
        SortKey::Name => subjects.sort_by(|a, b| {
            a.course_name
                .to_lowercase()
                .cmp(&b.course_name.to_lowercase())
        }),
        SortKey::Percentage => subjects.sort_by(|a, b| {
            a.percentage
                .partial_cmp(&b.percentage)
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
    }
}

/// Cross-subject rollup. Ties for most-at-risk keep the first subject seen.
pub fn aggregate_stats(subjects: &[SubjectResult]) -> AggregateStats {
    if subjects.is_empty() {
        return AggregateStats::default();
    }

    let mut stats = AggregateStats {
        subject_count: subjects.len(),
        ..AggregateStats::default()
    };
    let mut sum = 0.0;
    let mut lowest: Option<&SubjectResult> = None;

    for subject in subjects {
        sum += subject.percentage;
        match subject.status {
            Status::Safe => stats.safe += 1,
            Status::Borderline => stats.borderline += 1,
            Status::Critical => stats.critical += 1,
        }
        if lowest.map_or(true, |low| subject.percentage < low.percentage) {
            lowest = Some(subject);
        }
    }

    stats.mean_percentage = sum / subjects.len() as f64;
    stats.most_at_risk = lowest.map(|subject| AtRiskSubject {
        course_code: subject.course_code.clone(),
        course_name: subject.course_name.clone(),
        percentage: subject.percentage,
    });
    stats
}
