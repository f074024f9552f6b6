//! Boundary to wherever the school's records live.
//!
//! The generator only needs to read a snapshot, clear the timetable, and fill
//! existing slot rows, all inside one transaction. `InMemoryStore` implements
//! that over a `Snapshot`, which can be read from and written to JSON files.

use log::{info, warn};
use std::path::Path;

use crate::data::{
    DayOfWeek, Period, PeriodId, ScheduleSlot, Section, SectionId, Snapshot, Subject,
    SubjectDemand, SubjectId, Teacher, TeacherAvailability, TeacherId,
};
use crate::error::{SchedulerError, SchedulerResult};

/// Data source and sink for one generation run.
///
/// All writes between `begin` and `commit` must become visible together, and
/// `rollback` must restore the state seen at `begin`.
pub trait ScheduleStore {
    fn load_sections(&self) -> SchedulerResult<Vec<Section>>;

    /// Periods ordered by sequence.
    fn load_periods(&self) -> SchedulerResult<Vec<Period>>;

    fn load_teacher_availabilities(&self) -> SchedulerResult<Vec<TeacherAvailability>>;

    fn load_section_subject_demands(&self) -> SchedulerResult<Vec<SubjectDemand>>;

    fn load_existing_schedule_slots(&self) -> SchedulerResult<Vec<ScheduleSlot>>;

    /// Display names; only exports use them.
    fn load_subjects(&self) -> SchedulerResult<Vec<Subject>> {
        Ok(Vec::new())
    }

    fn load_teachers(&self) -> SchedulerResult<Vec<Teacher>> {
        Ok(Vec::new())
    }

    /// Clears subject and teacher on every slot row.
    fn reset_schedule_slots(&mut self) -> SchedulerResult<()>;

    /// Fills the matching slot row. Returns `false` when no row matches.
    fn save_assignment(
        &mut self,
        section_id: SectionId,
        day: DayOfWeek,
        period_id: PeriodId,
        subject_id: SubjectId,
        teacher_id: TeacherId,
    ) -> SchedulerResult<bool>;

    fn begin(&mut self) -> SchedulerResult<()>;

    fn commit(&mut self) -> SchedulerResult<()>;

    fn rollback(&mut self) -> SchedulerResult<()>;
}

/// A store holding everything in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    snapshot: Snapshot,
    /// State at `begin`, present while a transaction is open.
    saved: Option<Snapshot>,
}

impl InMemoryStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            saved: None,
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> SchedulerResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        info!(
            "Loaded {} sections, {} periods and {} slot rows from {}",
            snapshot.sections.len(),
            snapshot.periods.len(),
            snapshot.schedule_slots.len(),
            path.display()
        );
        Ok(Self::new(snapshot))
    }

    pub fn write_json_file(&self, path: impl AsRef<Path>) -> SchedulerResult<()> {
        let contents = serde_json::to_string_pretty(&self.snapshot)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn in_transaction(&self) -> bool {
        self.saved.is_some()
    }
}

impl ScheduleStore for InMemoryStore {
    fn load_sections(&self) -> SchedulerResult<Vec<Section>> {
        Ok(self.snapshot.sections.clone())
    }

    fn load_periods(&self) -> SchedulerResult<Vec<Period>> {
        let mut periods = self.snapshot.periods.clone();
        periods.sort_by_key(|p| p.order);
        Ok(periods)
    }

    fn load_teacher_availabilities(&self) -> SchedulerResult<Vec<TeacherAvailability>> {
        Ok(self.snapshot.teacher_availabilities.clone())
    }

    fn load_section_subject_demands(&self) -> SchedulerResult<Vec<SubjectDemand>> {
        Ok(self.snapshot.subject_demands.clone())
    }

    fn load_existing_schedule_slots(&self) -> SchedulerResult<Vec<ScheduleSlot>> {
        Ok(self.snapshot.schedule_slots.clone())
    }

    fn load_subjects(&self) -> SchedulerResult<Vec<Subject>> {
        Ok(self.snapshot.subjects.clone())
    }

    fn load_teachers(&self) -> SchedulerResult<Vec<Teacher>> {
        Ok(self.snapshot.teachers.clone())
    }

    fn reset_schedule_slots(&mut self) -> SchedulerResult<()> {
        for row in &mut self.snapshot.schedule_slots {
            row.subject_id = None;
            row.teacher_id = None;
        }
        Ok(())
    }

    fn save_assignment(
        &mut self,
        section_id: SectionId,
        day: DayOfWeek,
        period_id: PeriodId,
        subject_id: SubjectId,
        teacher_id: TeacherId,
    ) -> SchedulerResult<bool> {
        let row = self.snapshot.schedule_slots.iter_mut().find(|r| {
            r.section_id == section_id && r.day_of_week == day && r.period_id == period_id
        });
        match row {
            Some(row) => {
                row.subject_id = Some(subject_id);
                row.teacher_id = Some(teacher_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn begin(&mut self) -> SchedulerResult<()> {
        if self.saved.is_some() {
            return Err(SchedulerError::Store(
                "a transaction is already open".to_string(),
            ));
        }
        self.saved = Some(self.snapshot.clone());
        Ok(())
    }

    fn commit(&mut self) -> SchedulerResult<()> {
        match self.saved.take() {
            Some(_) => Ok(()),
            None => Err(SchedulerError::Store("no open transaction to commit".to_string())),
        }
    }

    fn rollback(&mut self) -> SchedulerResult<()> {
        match self.saved.take() {
            Some(saved) => {
                self.snapshot = saved;
                Ok(())
            }
            None => {
                warn!("Rollback requested with no open transaction");
                Ok(())
            }
        }
    }
}
