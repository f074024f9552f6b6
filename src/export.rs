//! Timetable views for display.
//!
//! Built from the persisted slot rows, so an export always reflects what was
//! committed rather than what a run computed.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::str::FromStr;

use crate::data::{
    DayOfWeek, Period, PeriodId, ScheduleSlot, SectionId, Subject, SubjectId, Teacher, TeacherId,
};
use crate::error::{SchedulerError, SchedulerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(SchedulerError::InvalidConfig(format!(
                "unknown export format '{}', expected json or csv",
                other
            ))),
        }
    }
}

/// Whose week the export is organised around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportView {
    #[default]
    BySection,
    ByTeacher,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimetableEntry {
    pub period: String,
    pub time: String,
    pub subject: Option<String>,
    pub teacher: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeacherTimetableEntry {
    pub period: String,
    pub time: String,
    pub section: SectionId,
    pub subject: Option<String>,
}

/// section -> day -> lessons in period order
pub type Timetable = BTreeMap<SectionId, BTreeMap<DayOfWeek, Vec<TimetableEntry>>>;

/// teacher -> day -> lessons in period order
pub type TeacherTimetable = BTreeMap<TeacherId, BTreeMap<DayOfWeek, Vec<TeacherTimetableEntry>>>;

/// Display names, falling back to ids.
#[derive(Debug, Clone, Default)]
pub struct NameDirectory {
    subjects: HashMap<SubjectId, String>,
    teachers: HashMap<TeacherId, String>,
}

impl NameDirectory {
    pub fn new(subjects: &[Subject], teachers: &[Teacher]) -> Self {
        Self {
            subjects: subjects.iter().map(|s| (s.id, s.name.clone())).collect(),
            teachers: teachers.iter().map(|t| (t.id, t.name.clone())).collect(),
        }
    }

    pub fn subject(&self, id: SubjectId) -> String {
        self.subjects
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("Subject {}", id))
    }

    pub fn teacher(&self, id: TeacherId) -> String {
        self.teachers
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("Teacher {}", id))
    }
}

struct PeriodLabels<'a> {
    by_id: HashMap<PeriodId, &'a Period>,
}

impl<'a> PeriodLabels<'a> {
    fn new(periods: &'a [Period]) -> Self {
        Self {
            by_id: periods.iter().map(|p| (p.id, p)).collect(),
        }
    }

    fn sort_key(&self, id: PeriodId) -> (i32, PeriodId) {
        (self.by_id.get(&id).map_or(i32::MAX, |p| p.order), id)
    }

    fn name(&self, id: PeriodId) -> String {
        self.by_id
            .get(&id)
            .map_or_else(|| format!("Period {}", id), |p| p.name.clone())
    }

    fn time(&self, id: PeriodId) -> String {
        self.by_id
            .get(&id)
            .map(|p| format!("{}-{}", p.start_time, p.end_time))
            .unwrap_or_default()
    }
}

pub fn build_timetable(slots: &[ScheduleSlot], periods: &[Period], names: &NameDirectory) -> Timetable {
    let labels = PeriodLabels::new(periods);
    let mut rows: Vec<&ScheduleSlot> = slots.iter().collect();
    rows.sort_by_key(|r| (r.section_id, r.day_of_week, labels.sort_key(r.period_id)));

    let mut timetable = Timetable::new();
    for row in rows {
        timetable
            .entry(row.section_id)
            .or_default()
            .entry(row.day_of_week)
            .or_default()
            .push(TimetableEntry {
                period: labels.name(row.period_id),
                time: labels.time(row.period_id),
                subject: row.subject_id.map(|id| names.subject(id)),
                teacher: row.teacher_id.map(|id| names.teacher(id)),
            });
    }
    timetable
}

/// Only rows with a teacher appear.
pub fn build_teacher_timetable(
    slots: &[ScheduleSlot],
    periods: &[Period],
    names: &NameDirectory,
) -> TeacherTimetable {
    let labels = PeriodLabels::new(periods);
    let mut rows: Vec<(TeacherId, &ScheduleSlot)> = slots
        .iter()
        .filter_map(|r| r.teacher_id.map(|t| (t, r)))
        .collect();
    rows.sort_by_key(|(t, r)| (*t, r.day_of_week, labels.sort_key(r.period_id), r.section_id));

    let mut timetable = TeacherTimetable::new();
    for (teacher_id, row) in rows {
        timetable
            .entry(teacher_id)
            .or_default()
            .entry(row.day_of_week)
            .or_default()
            .push(TeacherTimetableEntry {
                period: labels.name(row.period_id),
                time: labels.time(row.period_id),
                section: row.section_id,
                subject: row.subject_id.map(|id| names.subject(id)),
            });
    }
    timetable
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn render_timetable(timetable: &Timetable, format: ExportFormat) -> SchedulerResult<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(timetable)?),
        ExportFormat::Csv => {
            let mut out = String::from("section,day,period,time,subject,teacher\n");
            for (section, days) in timetable {
                for (day, entries) in days {
                    for e in entries {
                        writeln!(
                            out,
                            "{},{},{},{},{},{}",
                            section,
                            day,
                            csv_field(&e.period),
                            csv_field(&e.time),
                            csv_field(e.subject.as_deref().unwrap_or("")),
                            csv_field(e.teacher.as_deref().unwrap_or(""))
                        )?;
                    }
                }
            }
            Ok(out)
        }
    }
}

pub fn render_teacher_timetable(
    timetable: &TeacherTimetable,
    format: ExportFormat,
) -> SchedulerResult<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(timetable)?),
        ExportFormat::Csv => {
            let mut out = String::from("teacher,day,period,time,section,subject\n");
            for (teacher, days) in timetable {
                for (day, entries) in days {
                    for e in entries {
                        writeln!(
                            out,
                            "{},{},{},{},{},{}",
                            teacher,
                            day,
                            csv_field(&e.period),
                            csv_field(&e.time),
                            e.section,
                            csv_field(e.subject.as_deref().unwrap_or(""))
                        )?;
                    }
                }
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn periods() -> Vec<Period> {
        vec![
            Period {
                id: 2,
                name: "Second".into(),
                order: 2,
                start_time: "09:00".into(),
                end_time: "09:45".into(),
            },
            Period {
                id: 1,
                name: "First, early".into(),
                order: 1,
                start_time: "08:00".into(),
                end_time: "08:45".into(),
            },
        ]
    }

    fn slots() -> Vec<ScheduleSlot> {
        vec![
            ScheduleSlot {
                section_id: 1,
                day_of_week: DayOfWeek::Sunday,
                period_id: 2,
                subject_id: Some(5),
                teacher_id: Some(9),
            },
            ScheduleSlot {
                section_id: 1,
                day_of_week: DayOfWeek::Sunday,
                period_id: 1,
                subject_id: None,
                teacher_id: None,
            },
        ]
    }

    #[test]
    fn groups_by_section_and_day_in_period_order() {
        let names = NameDirectory::new(
            &[Subject {
                id: 5,
                name: "Math".into(),
            }],
            &[],
        );
        let timetable = build_timetable(&slots(), &periods(), &names);
        let day = &timetable[&1][&DayOfWeek::Sunday];
        assert_eq!(day.len(), 2);
        assert_eq!(day[0].period, "First, early");
        assert_eq!(day[0].subject, None);
        assert_eq!(day[1].time, "09:00-09:45");
        assert_eq!(day[1].subject.as_deref(), Some("Math"));
        assert_eq!(day[1].teacher.as_deref(), Some("Teacher 9"));
    }

    #[test]
    fn json_uses_day_names_as_keys() {
        let timetable = build_timetable(&slots(), &periods(), &NameDirectory::default());
        let json = render_timetable(&timetable, ExportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["1"]["sunday"][1]["subject"], "Subject 5");
    }

    #[test]
    fn csv_quotes_fields_with_commas() {
        let timetable = build_timetable(&slots(), &periods(), &NameDirectory::default());
        let csv = render_timetable(&timetable, ExportFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "section,day,period,time,subject,teacher");
        assert_eq!(lines[1], "1,sunday,\"First, early\",08:00-08:45,,");
        assert_eq!(lines[2], "1,sunday,Second,09:00-09:45,Subject 5,Teacher 9");
    }

    #[test]
    fn teacher_view_skips_empty_rows() {
        let timetable = build_teacher_timetable(&slots(), &periods(), &NameDirectory::default());
        assert_eq!(timetable.len(), 1);
        assert_eq!(timetable[&9][&DayOfWeek::Sunday][0].section, 1);
        let csv = render_teacher_timetable(&timetable, ExportFormat::Csv).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }

    #[test]
    fn parses_format_names() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("xml".parse::<ExportFormat>().is_err());
    }
}
