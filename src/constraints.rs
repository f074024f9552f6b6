//! Hard constraint checks.
//!
//! Everything here is a pure predicate over lookup tables that are built once
//! per run. `ScheduleIndex` answers "may this teacher teach here, now";
//! `Occupancy` answers "is this teacher or section already busy" and can be
//! marked and unmarked in place during search.

use itertools::Itertools;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::data::{
    Assignment, Demand, Period, PeriodId, ScheduleSlot, SectionId, Slot, SubjectDemand, SubjectId,
    TeacherAvailability, TeacherId,
};

#[derive(Debug, Clone)]
struct Requirement {
    section_id: SectionId,
    subject_id: SubjectId,
    teachers: HashSet<TeacherId>,
    amount: u32,
}

/// Lookup tables over one data snapshot.
#[derive(Debug, Clone, Default)]
pub struct ScheduleIndex {
    /// Availability in the order the rows were loaded.
    teacher_slots: HashMap<TeacherId, Vec<Slot>>,
    availability: HashSet<(TeacherId, Slot)>,
    section_slots: HashMap<SectionId, HashSet<Slot>>,
    /// Same slots as `section_slots`, ordered by day then period position.
    section_slot_order: HashMap<SectionId, Vec<Slot>>,
    /// One entry per `SubjectDemand`, by input position.
    requirements: Vec<Requirement>,
    period_rank: HashMap<PeriodId, usize>,
}

impl ScheduleIndex {
    pub fn build(
        periods: &[Period],
        availabilities: &[TeacherAvailability],
        demands: &[SubjectDemand],
        slots: &[ScheduleSlot],
    ) -> Self {
        let period_rank: HashMap<PeriodId, usize> = periods
            .iter()
            .sorted_by_key(|p| (p.order, p.id))
            .enumerate()
            .map(|(rank, p)| (p.id, rank))
            .collect();

        let mut teacher_slots: HashMap<TeacherId, Vec<Slot>> = HashMap::new();
        let mut availability = HashSet::new();
        for row in availabilities {
            if availability.insert((row.teacher_id, row.slot())) {
                teacher_slots.entry(row.teacher_id).or_default().push(row.slot());
            }
        }

        let mut section_slots: HashMap<SectionId, HashSet<Slot>> = HashMap::new();
        for row in slots {
            section_slots.entry(row.section_id).or_default().insert(row.slot());
        }
        let section_slot_order = section_slots
            .iter()
            .map(|(section, set)| {
                let ordered = set
                    .iter()
                    .copied()
                    .sorted_by_key(|s| {
                        (s.day, period_rank.get(&s.period_id).copied().unwrap_or(usize::MAX), s.period_id)
                    })
                    .collect();
                (*section, ordered)
            })
            .collect();

        let requirements = demands
            .iter()
            .map(|d| Requirement {
                section_id: d.section_id,
                subject_id: d.subject_id,
                teachers: d.eligible_teachers().into_iter().collect(),
                amount: d.weekly_amount(),
            })
            .collect();

        ScheduleIndex {
            teacher_slots,
            availability,
            section_slots,
            section_slot_order,
            requirements,
            period_rank,
        }
    }

    pub fn is_teacher_available(&self, teacher: TeacherId, slot: Slot) -> bool {
        self.availability.contains(&(teacher, slot))
    }

    pub fn teacher_can_teach(&self, teacher: TeacherId, demand: &Demand) -> bool {
        self.requirements
            .get(demand.origin)
            .is_some_and(|r| r.section_id == demand.section_id && r.subject_id == demand.subject_id)
            && self.is_qualified(teacher, demand.origin)
    }

    /// Whether the teacher may take lessons of the `origin`-th requirement.
    pub fn is_qualified(&self, teacher: TeacherId, origin: usize) -> bool {
        self.requirements
            .get(origin)
            .is_some_and(|r| r.teachers.contains(&teacher))
    }

    pub fn section_has_slot(&self, section: SectionId, slot: Slot) -> bool {
        self.section_slots
            .get(&section)
            .is_some_and(|slots| slots.contains(&slot))
    }

    pub fn teacher_slots(&self, teacher: TeacherId) -> &[Slot] {
        self.teacher_slots.get(&teacher).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of availability rows for a teacher.
    pub fn availability_count(&self, teacher: TeacherId) -> usize {
        self.teacher_slots(teacher).len()
    }

    pub fn section_slots(&self, section: SectionId) -> &[Slot] {
        self.section_slot_order
            .get(&section)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Weekly amount of the `origin`-th requirement, zero if there is none.
    pub fn demand_amount(&self, origin: usize) -> u32 {
        self.requirements.get(origin).map_or(0, |r| r.amount)
    }

    /// Whether an assignment belongs to the requirement it names.
    fn fills_requirement(&self, a: &Assignment) -> bool {
        self.requirements
            .get(a.origin)
            .is_some_and(|r| r.section_id == a.section_id && r.subject_id == a.subject_id)
    }

    /// Position of a period in the day, by sequence order.
    pub fn period_rank(&self, period: PeriodId) -> Option<usize> {
        self.period_rank.get(&period).copied()
    }

    /// Slots both in the teacher's availability and the section's timetable.
    pub fn shared_slots(&self, teacher: TeacherId, section: SectionId) -> Vec<Slot> {
        self.teacher_slots(teacher)
            .iter()
            .copied()
            .filter(|slot| self.section_has_slot(section, *slot))
            .collect()
    }
}

/// Which teachers and sections are busy at which slots.
#[derive(Debug, Clone, Default)]
pub struct Occupancy {
    teachers: HashSet<(TeacherId, Slot)>,
    sections: HashSet<(SectionId, Slot)>,
}

impl Occupancy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_teacher_conflict(&self, teacher: TeacherId, slot: Slot) -> bool {
        self.teachers.contains(&(teacher, slot))
    }

    pub fn has_section_conflict(&self, section: SectionId, slot: Slot) -> bool {
        self.sections.contains(&(section, slot))
    }

    pub fn is_free(&self, teacher: TeacherId, section: SectionId, slot: Slot) -> bool {
        !self.has_teacher_conflict(teacher, slot) && !self.has_section_conflict(section, slot)
    }

    pub fn mark(&mut self, assignment: &Assignment) {
        self.teachers.insert((assignment.teacher_id, assignment.slot()));
        self.sections.insert((assignment.section_id, assignment.slot()));
    }

    pub fn unmark(&mut self, assignment: &Assignment) {
        self.teachers.remove(&(assignment.teacher_id, assignment.slot()));
        self.sections.remove(&(assignment.section_id, assignment.slot()));
    }

    pub fn is_empty(&self) -> bool {
        self.teachers.is_empty() && self.sections.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    TeacherDoubleBooked,
    SectionDoubleBooked,
    SlotNotInSection,
    TeacherUnavailable,
    TeacherNotQualified,
    DemandExceeded,
}

/// A broken hard constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub message: String,
}

impl Violation {
    fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Checks every hard constraint across a full schedule.
///
/// Returns an empty list for a valid schedule. Runs in O(assignments).
pub fn validate_schedule(assignments: &[Assignment], index: &ScheduleIndex) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut occupancy = Occupancy::new();
    let mut placed: HashMap<usize, (SectionId, SubjectId, u32)> = HashMap::new();

    for a in assignments {
        let slot = a.slot();
        if occupancy.has_teacher_conflict(a.teacher_id, slot) {
            violations.push(Violation::new(
                ViolationKind::TeacherDoubleBooked,
                format!("Teacher {} is booked twice on {}", a.teacher_id, slot),
            ));
        }
        if occupancy.has_section_conflict(a.section_id, slot) {
            violations.push(Violation::new(
                ViolationKind::SectionDoubleBooked,
                format!("Section {} is booked twice on {}", a.section_id, slot),
            ));
        }
        occupancy.mark(a);

        if !index.section_has_slot(a.section_id, slot) {
            violations.push(Violation::new(
                ViolationKind::SlotNotInSection,
                format!("Section {} has no lesson slot on {}", a.section_id, slot),
            ));
        }
        if !index.is_teacher_available(a.teacher_id, slot) {
            violations.push(Violation::new(
                ViolationKind::TeacherUnavailable,
                format!("Teacher {} is not available on {}", a.teacher_id, slot),
            ));
        }
        if !index.fills_requirement(a) || !index.is_qualified(a.teacher_id, a.origin) {
            violations.push(Violation::new(
                ViolationKind::TeacherNotQualified,
                format!(
                    "Teacher {} may not teach subject {} to section {}",
                    a.teacher_id, a.subject_id, a.section_id
                ),
            ));
        }
        placed
            .entry(a.origin)
            .or_insert((a.section_id, a.subject_id, 0))
            .2 += 1;
    }

    for (origin, (section, subject, count)) in placed.into_iter().sorted() {
        let amount = index.demand_amount(origin);
        if count > amount {
            violations.push(Violation::new(
                ViolationKind::DemandExceeded,
                format!(
                    "Subject {} is placed {} times for section {}, but its requirement asks for {}",
                    subject, count, section, amount
                ),
            ));
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DayOfWeek::{Saturday, Sunday};

    fn period(id: PeriodId, order: i32) -> Period {
        Period {
            id,
            name: format!("P{id}"),
            order,
            start_time: "08:00".into(),
            end_time: "08:45".into(),
        }
    }

    fn index() -> ScheduleIndex {
        let periods = vec![period(2, 2), period(1, 1)];
        let availabilities = vec![
            TeacherAvailability { teacher_id: 1, day_of_week: Sunday, period_id: 1 },
            TeacherAvailability { teacher_id: 1, day_of_week: Saturday, period_id: 1 },
            TeacherAvailability { teacher_id: 1, day_of_week: Saturday, period_id: 1 },
        ];
        let demands = vec![SubjectDemand {
            section_id: 10,
            subject_id: 5,
            teacher_id: Some(1),
            candidate_teachers: vec![],
            amount: Some(1),
        }];
        let slots = vec![
            ScheduleSlot { section_id: 10, day_of_week: Saturday, period_id: 2, subject_id: None, teacher_id: None },
            ScheduleSlot { section_id: 10, day_of_week: Saturday, period_id: 1, subject_id: None, teacher_id: None },
            ScheduleSlot { section_id: 10, day_of_week: Sunday, period_id: 1, subject_id: None, teacher_id: None },
        ];
        ScheduleIndex::build(&periods, &availabilities, &demands, &slots)
    }

    fn lesson(teacher: TeacherId, day: crate::data::DayOfWeek, period: PeriodId) -> Assignment {
        Assignment {
            section_id: 10,
            subject_id: 5,
            teacher_id: teacher,
            day_of_week: day,
            period_id: period,
            origin: 0,
        }
    }

    #[test]
    fn index_keeps_availability_order_without_duplicates() {
        let index = index();
        assert_eq!(
            index.teacher_slots(1),
            &[Slot::new(Sunday, 1), Slot::new(Saturday, 1)]
        );
        assert_eq!(index.availability_count(1), 2);
        assert_eq!(index.availability_count(99), 0);
    }

    #[test]
    fn section_slots_are_ordered_by_day_then_period() {
        let index = index();
        assert_eq!(
            index.section_slots(10),
            &[Slot::new(Saturday, 1), Slot::new(Saturday, 2), Slot::new(Sunday, 1)]
        );
        assert_eq!(index.period_rank(1), Some(0));
        assert_eq!(index.period_rank(2), Some(1));
    }

    #[test]
    fn predicates_answer_membership() {
        let index = index();
        let demand = Demand {
            section_id: 10,
            subject_id: 5,
            eligible_teachers: vec![1],
            origin: 0,
        };
        assert!(index.is_teacher_available(1, Slot::new(Saturday, 1)));
        assert!(!index.is_teacher_available(1, Slot::new(Saturday, 2)));
        assert!(index.teacher_can_teach(1, &demand));
        assert!(!index.teacher_can_teach(2, &demand));

        let mut occupancy = Occupancy::new();
        let a = lesson(1, Saturday, 1);
        occupancy.mark(&a);
        assert!(occupancy.has_teacher_conflict(1, Slot::new(Saturday, 1)));
        assert!(occupancy.has_section_conflict(10, Slot::new(Saturday, 1)));
        assert!(!occupancy.has_teacher_conflict(1, Slot::new(Sunday, 1)));
        occupancy.unmark(&a);
        assert!(occupancy.is_empty());
    }

    #[test]
    fn valid_schedule_has_no_violations() {
        assert!(validate_schedule(&[lesson(1, Saturday, 1)], &index()).is_empty());
    }

    #[test]
    fn reports_each_broken_rule() {
        let index = index();
        let schedule = vec![
            lesson(1, Saturday, 1),
            lesson(1, Saturday, 1),
            lesson(2, Saturday, 2),
        ];
        let kinds: Vec<ViolationKind> = validate_schedule(&schedule, &index)
            .into_iter()
            .map(|v| v.kind)
            .collect();
        assert!(kinds.contains(&ViolationKind::TeacherDoubleBooked));
        assert!(kinds.contains(&ViolationKind::SectionDoubleBooked));
        assert!(kinds.contains(&ViolationKind::TeacherUnavailable));
        assert!(kinds.contains(&ViolationKind::TeacherNotQualified));
        assert!(kinds.contains(&ViolationKind::DemandExceeded));
        assert!(!kinds.contains(&ViolationKind::SlotNotInSection));
    }

    #[test]
    fn requirements_sharing_a_subject_are_checked_separately() {
        let periods = vec![period(1, 1), period(2, 2)];
        let availabilities = vec![
            TeacherAvailability { teacher_id: 1, day_of_week: Saturday, period_id: 1 },
            TeacherAvailability { teacher_id: 1, day_of_week: Saturday, period_id: 2 },
            TeacherAvailability { teacher_id: 2, day_of_week: Saturday, period_id: 2 },
        ];
        let requirement = |teacher| SubjectDemand {
            section_id: 10,
            subject_id: 5,
            teacher_id: Some(teacher),
            candidate_teachers: vec![],
            amount: Some(1),
        };
        let demands = vec![requirement(1), requirement(2)];
        let slots = vec![
            ScheduleSlot { section_id: 10, day_of_week: Saturday, period_id: 1, subject_id: None, teacher_id: None },
            ScheduleSlot { section_id: 10, day_of_week: Saturday, period_id: 2, subject_id: None, teacher_id: None },
        ];
        let index = ScheduleIndex::build(&periods, &availabilities, &demands, &slots);

        let mut second = lesson(1, Saturday, 2);
        second.origin = 1;
        let kinds: Vec<ViolationKind> = validate_schedule(&[lesson(1, Saturday, 1), second], &index)
            .into_iter()
            .map(|v| v.kind)
            .collect();
        assert_eq!(kinds, vec![ViolationKind::TeacherNotQualified]);

        let twice = vec![lesson(1, Saturday, 1), lesson(1, Saturday, 2)];
        let kinds: Vec<ViolationKind> = validate_schedule(&twice, &index)
            .into_iter()
            .map(|v| v.kind)
            .collect();
        assert_eq!(kinds, vec![ViolationKind::DemandExceeded]);

        let mut fine = lesson(2, Saturday, 2);
        fine.origin = 1;
        assert!(validate_schedule(&[lesson(1, Saturday, 1), fine], &index).is_empty());
    }

    #[test]
    fn lesson_naming_the_wrong_requirement_is_not_qualified() {
        let mut a = lesson(1, Saturday, 1);
        a.origin = 3;
        let violations = validate_schedule(&[a], &index());
        assert!(violations.iter().any(|v| v.kind == ViolationKind::TeacherNotQualified));
    }

    #[test]
    fn flags_slot_missing_from_section() {
        let index = index();
        let schedule = vec![lesson(1, Sunday, 2)];
        let violations = validate_schedule(&schedule, &index);
        assert!(violations.iter().any(|v| v.kind == ViolationKind::SlotNotInSection));
    }
}
