use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::calc;
use crate::models::{AccountingMode, AggregateStats, ClassesNeeded, SubjectResult};

/// Projection figures rendered for humans; the unreachable case must never
/// come out looking like a number.
pub fn format_needed(needed: ClassesNeeded) -> String {
    match needed {
        ClassesNeeded::Needed(n) => n.to_string(),
        ClassesNeeded::Unreachable => "unreachable".to_string(),
    }
}

pub fn format_skip(can_skip: Option<u32>) -> String {
    match can_skip {
        Some(n) => n.to_string(),
        None => format!("{}+", calc::SKIP_CAP),
    }
}

pub fn build_report(
    subjects: &[SubjectResult],
    stats: &AggregateStats,
    threshold: f64,
    mode: AccountingMode,
    captured_at: Option<DateTime<Utc>>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Attendance Report");
    let _ = writeln!(
        output,
        "Threshold {:.0}%, {} accounting",
        threshold,
        mode.as_str()
    );
    if let Some(captured_at) = captured_at {
        let _ = writeln!(output, "Data captured {}", captured_at.format("%Y-%m-%d %H:%M UTC"));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");

    if stats.subject_count == 0 {
        let _ = writeln!(output, "No subjects extracted.");
        return output;
    }

    let _ = writeln!(
        output,
        "- {} subjects, mean attendance {:.1}%",
        stats.subject_count, stats.mean_percentage
    );
    let _ = writeln!(
        output,
        "- {} safe, {} borderline, {} critical",
        stats.safe, stats.borderline, stats.critical
    );
    if let Some(at_risk) = &stats.most_at_risk {
        let _ = writeln!(
            output,
            "- Most at risk: {} ({}) at {:.1}%",
            at_risk.course_name, at_risk.course_code, at_risk.percentage
        );
    }

    for subject in subjects {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "## {} ({}) — {:.1}% [{}]",
            subject.course_name, subject.course_code, subject.percentage, subject.status.as_str()
        );
        let _ = writeln!(
            output,
            "Attended {} of {} ({} effective, {} absent)",
            subject.total_attended,
            subject.total_conducted,
            subject.total_effective,
            subject.total_absent
        );
        let _ = writeln!(
            output,
            "Needs {} more classes; can skip {}",
            subject.total_needed, subject.can_skip
        );
        if let Some(weakest) = &subject.weakest_component {
            let _ = writeln!(output, "Weakest component: {}", weakest);
        }

        for component in &subject.components {
            let _ = writeln!(
                output,
                "- {}: {:.1}% ({}/{} conducted, carry {}) [{}] needs {}, can skip {}",
                component.label,
                component.percentage,
                component.effective_attended,
                component.conducted,
                component.carry_forward,
                component.status.as_str(),
                format_needed(component.needed),
                format_skip(component.can_skip),
            );
        }

        for component in &subject.components {
            if component.simulation.crosses_threshold {
                let _ = writeln!(
                    output,
                    "- Warning: missing the next {} class drops it to {:.1}%, below threshold",
                    component.label, component.simulation.after_miss
                );
            }
        }
    }

    output
}

/// One-line-per-subject listing for the terminal summary.
pub fn summarize_subject(subject: &SubjectResult) -> String {
    format!(
        "- {} ({}): {:.1}% [{}] needs {}, can skip {}",
        subject.course_name,
        subject.course_code,
        subject.percentage,
        subject.status.as_str(),
        subject.total_needed,
        subject.can_skip
    )
}
