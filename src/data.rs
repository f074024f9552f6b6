use serde::{Deserialize, Serialize};
use std::fmt;

// Type aliases for clarity
pub type SectionId = u32;
pub type ClassroomId = u32;
pub type SubjectId = u32;
pub type TeacherId = u32;
pub type PeriodId = u32;

/// School week, saturday through thursday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Saturday,
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
}

impl DayOfWeek {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (day, period) coordinate in the weekly grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub day: DayOfWeek,
    pub period_id: PeriodId,
}

impl Slot {
    pub fn new(day: DayOfWeek, period_id: PeriodId) -> Self {
        Self { day, period_id }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} period {}", self.day, self.period_id)
    }
}

/// A teaching period of the school day.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub id: PeriodId,
    pub name: String,
    /// Position in the day; neighbouring values are adjacent periods.
    pub order: i32,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: SectionId,
    pub classroom_id: ClassroomId,
}

/// How many lessons of a subject a section needs each week, and who may teach them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectDemand {
    pub section_id: SectionId,
    pub subject_id: SubjectId,
    #[serde(default)]
    pub teacher_id: Option<TeacherId>,
    #[serde(default)]
    pub candidate_teachers: Vec<TeacherId>,
    /// Weekly occurrences; unset means one.
    #[serde(default)]
    pub amount: Option<u32>,
}

impl SubjectDemand {
    pub fn weekly_amount(&self) -> u32 {
        self.amount.unwrap_or(1)
    }

    /// The assigned teacher first, then the candidates, without duplicates.
    pub fn eligible_teachers(&self) -> Vec<TeacherId> {
        let mut teachers = Vec::with_capacity(self.candidate_teachers.len() + 1);
        for id in self.teacher_id.iter().chain(self.candidate_teachers.iter()) {
            if !teachers.contains(id) {
                teachers.push(*id);
            }
        }
        teachers
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherAvailability {
    pub teacher_id: TeacherId,
    pub day_of_week: DayOfWeek,
    pub period_id: PeriodId,
}

impl TeacherAvailability {
    pub fn slot(&self) -> Slot {
        Slot::new(self.day_of_week, self.period_id)
    }
}

/// One pre-created row of a section's weekly timetable.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSlot {
    pub section_id: SectionId,
    pub day_of_week: DayOfWeek,
    pub period_id: PeriodId,
    #[serde(default)]
    pub subject_id: Option<SubjectId>,
    #[serde(default)]
    pub teacher_id: Option<TeacherId>,
}

impl ScheduleSlot {
    pub fn slot(&self) -> Slot {
        Slot::new(self.day_of_week, self.period_id)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Teacher {
    pub id: TeacherId,
    pub name: String,
}

/// Everything the scheduler reads from, and writes back to, the school's records.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub periods: Vec<Period>,
    #[serde(default)]
    pub teacher_availabilities: Vec<TeacherAvailability>,
    #[serde(default)]
    pub subject_demands: Vec<SubjectDemand>,
    #[serde(default)]
    pub schedule_slots: Vec<ScheduleSlot>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub teachers: Vec<Teacher>,
}

/// One weekly lesson still to be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Demand {
    pub section_id: SectionId,
    pub subject_id: SubjectId,
    pub eligible_teachers: Vec<TeacherId>,
    /// Index of the `SubjectDemand` this lesson was expanded from.
    pub origin: usize,
}

/// Represents a single placed lesson.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub section_id: SectionId,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
    pub day_of_week: DayOfWeek,
    pub period_id: PeriodId,
    /// Index of the `SubjectDemand` this lesson fills.
    #[serde(skip)]
    pub origin: usize,
}

impl Assignment {
    pub fn for_demand(demand: &Demand, teacher_id: TeacherId, slot: Slot) -> Self {
        Assignment {
            section_id: demand.section_id,
            subject_id: demand.subject_id,
            teacher_id,
            day_of_week: slot.day,
            period_id: slot.period_id,
            origin: demand.origin,
        }
    }

    pub fn slot(&self) -> Slot {
        Slot::new(self.day_of_week, self.period_id)
    }

    pub fn set_slot(&mut self, slot: Slot) {
        self.day_of_week = slot.day;
        self.period_id = slot.period_id;
    }
}

/// An availability row that, if added, would unblock unplaced lessons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub teacher_id: TeacherId,
    pub day_of_week: DayOfWeek,
    pub period_id: PeriodId,
}

impl From<Suggestion> for TeacherAvailability {
    fn from(s: Suggestion) -> Self {
        TeacherAvailability {
            teacher_id: s.teacher_id,
            day_of_week: s.day_of_week,
            period_id: s.period_id,
        }
    }
}

/// Describes a soft constraint that was not met in the final schedule.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmetSoftConstraint {
    pub constraint_type: String,
    pub description: String,
}

impl fmt::Display for UnmetSoftConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.constraint_type, self.description)
    }
}

/// The final output of one generation run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Vec<Assignment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedules: Option<Vec<Vec<Assignment>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<Suggestion>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmet_soft_constraints: Option<Vec<UnmetSoftConstraint>>,
}

impl GenerationResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligible_teachers_puts_assigned_teacher_first_and_dedups() {
        let demand = SubjectDemand {
            section_id: 1,
            subject_id: 2,
            teacher_id: Some(7),
            candidate_teachers: vec![3, 7, 5, 3],
            amount: None,
        };
        assert_eq!(demand.eligible_teachers(), vec![7, 3, 5]);
        assert_eq!(demand.weekly_amount(), 1);
    }

    #[test]
    fn snapshot_reads_camel_case_json() {
        let json = r#"{
            "sections": [{"id": 1, "classroomId": 10}],
            "periods": [{"id": 1, "name": "First", "order": 1, "startTime": "08:00", "endTime": "08:45"}],
            "teacherAvailabilities": [{"teacherId": 4, "dayOfWeek": "saturday", "periodId": 1}],
            "subjectDemands": [{"sectionId": 1, "subjectId": 9, "teacherId": 4, "amount": 0}],
            "scheduleSlots": [{"sectionId": 1, "dayOfWeek": "saturday", "periodId": 1}]
        }"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.teacher_availabilities[0].day_of_week, DayOfWeek::Saturday);
        assert_eq!(snapshot.subject_demands[0].weekly_amount(), 0);
        assert!(snapshot.schedule_slots[0].subject_id.is_none());
        assert!(snapshot.teachers.is_empty());
    }

    #[test]
    fn days_order_from_saturday() {
        assert!(DayOfWeek::Saturday < DayOfWeek::Sunday);
        assert!(DayOfWeek::Wednesday < DayOfWeek::Thursday);
        assert_eq!(DayOfWeek::Thursday.to_string(), "thursday");
    }
}
