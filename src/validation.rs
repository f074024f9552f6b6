//! Input integrity checks.
//!
//! Inspects the loaded records before scheduling. Detects:
//! - Duplicate section, period and slot rows
//! - Slot and availability rows that reference unknown periods
//! - Slot rows and demands that reference unknown sections
//! - Demands with no eligible teacher, or for sections with no slots
//!
//! None of these stop a run; the scheduler simply cannot use the bad rows.

use std::collections::HashSet;

use crate::data::{Period, ScheduleSlot, Section, SubjectDemand, TeacherAvailability};

/// Categories of input issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputIssueKind {
    DuplicateId,
    DuplicateSlot,
    UnknownPeriod,
    UnknownSection,
    NoEligibleTeacher,
    SectionWithoutSlots,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputIssue {
    pub kind: InputIssueKind,
    pub message: String,
}

impl InputIssue {
    fn new(kind: InputIssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Returns every issue found, in a stable order.
pub fn check_input(
    sections: &[Section],
    periods: &[Period],
    availabilities: &[TeacherAvailability],
    demands: &[SubjectDemand],
    slots: &[ScheduleSlot],
) -> Vec<InputIssue> {
    let mut issues = Vec::new();

    let mut section_ids = HashSet::new();
    for s in sections {
        if !section_ids.insert(s.id) {
            issues.push(InputIssue::new(
                InputIssueKind::DuplicateId,
                format!("Duplicate section ID: {}", s.id),
            ));
        }
    }

    let mut period_ids = HashSet::new();
    for p in periods {
        if !period_ids.insert(p.id) {
            issues.push(InputIssue::new(
                InputIssueKind::DuplicateId,
                format!("Duplicate period ID: {}", p.id),
            ));
        }
    }

    let mut seen_slots = HashSet::new();
    let mut sections_with_slots = HashSet::new();
    for row in slots {
        if !seen_slots.insert((row.section_id, row.slot())) {
            issues.push(InputIssue::new(
                InputIssueKind::DuplicateSlot,
                format!("Section {} has more than one row for {}", row.section_id, row.slot()),
            ));
        }
        if !period_ids.contains(&row.period_id) {
            issues.push(InputIssue::new(
                InputIssueKind::UnknownPeriod,
                format!(
                    "Slot row for section {} references unknown period {}",
                    row.section_id, row.period_id
                ),
            ));
        }
        if !section_ids.contains(&row.section_id) {
            issues.push(InputIssue::new(
                InputIssueKind::UnknownSection,
                format!("Slot row references unknown section {}", row.section_id),
            ));
        }
        sections_with_slots.insert(row.section_id);
    }

    for row in availabilities {
        if !period_ids.contains(&row.period_id) {
            issues.push(InputIssue::new(
                InputIssueKind::UnknownPeriod,
                format!(
                    "Availability of teacher {} references unknown period {}",
                    row.teacher_id, row.period_id
                ),
            ));
        }
    }

    for d in demands {
        if !section_ids.contains(&d.section_id) {
            issues.push(InputIssue::new(
                InputIssueKind::UnknownSection,
                format!(
                    "Subject {} is required by unknown section {}",
                    d.subject_id, d.section_id
                ),
            ));
        }
        if d.weekly_amount() == 0 {
            continue;
        }
        if d.eligible_teachers().is_empty() {
            issues.push(InputIssue::new(
                InputIssueKind::NoEligibleTeacher,
                format!(
                    "Subject {} for section {} has no eligible teacher",
                    d.subject_id, d.section_id
                ),
            ));
        }
        if !sections_with_slots.contains(&d.section_id) {
            issues.push(InputIssue::new(
                InputIssueKind::SectionWithoutSlots,
                format!(
                    "Section {} needs subject {} but has no timetable slots",
                    d.section_id, d.subject_id
                ),
            ));
        }
    }

    issues
}
