//! Runs one timetable generation against a store.
//!
//! A run is load, check input, reset, place, then either advise (nothing
//! could be placed) or optimise and save. Everything after `begin` is either
//! committed together or rolled back together.

use log::{error, info, trace, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::task::JoinHandle;

use crate::advisor::advise;
use crate::config::GenerationConfig;
use crate::constraints::{ScheduleIndex, validate_schedule};
use crate::data::{Assignment, Demand, GenerationResult};
use crate::demand::prepare_demands;
use crate::error::{SchedulerError, SchedulerResult};
use crate::export::{
    ExportFormat, ExportView, NameDirectory, build_teacher_timetable, build_timetable,
    render_teacher_timetable, render_timetable,
};
use crate::optimizer::{Optimizer, evaluate, score_breakdown};
use crate::solver::{enumerate_schedules, place_greedy};
use crate::status::StatusReporter;
use crate::store::ScheduleStore;
use crate::validation::check_input;

const UNEXPECTED_FAILURE: &str = "Schedule generation failed due to an unexpected error";
const INFEASIBLE: &str = "No valid schedule could be generated with the current availability";

enum RunOutcome {
    Commit(GenerationResult),
    Discard(GenerationResult),
}

pub struct ScheduleGenerator<S> {
    store: S,
    config: GenerationConfig,
    status: StatusReporter,
}

impl<S: ScheduleStore> ScheduleGenerator<S> {
    pub fn new(store: S, config: GenerationConfig) -> SchedulerResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            status: StatusReporter::new(),
        })
    }

    /// A handle onto this generator's progress.
    pub fn status(&self) -> StatusReporter {
        self.status.clone()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Generates, saves and commits a timetable, or rolls everything back.
    ///
    /// Never returns an error: failures become `success = false` results, and
    /// details of unexpected failures only go to the log.
    pub fn run(&mut self) -> GenerationResult {
        self.status.start("Loading data");

        if let Err(e) = self.store.begin() {
            error!("Could not open a transaction: {}", e);
            self.status.fail(UNEXPECTED_FAILURE);
            return GenerationResult::failure(UNEXPECTED_FAILURE);
        }

        let outcome = self.execute().and_then(|outcome| match outcome {
            RunOutcome::Commit(result) => {
                self.store.commit()?;
                Ok(RunOutcome::Commit(result))
            }
            discard => Ok(discard),
        });

        match outcome {
            Ok(RunOutcome::Commit(result)) => {
                self.status.complete(result.message.clone());
                result
            }
            Ok(RunOutcome::Discard(result)) => {
                self.rollback();
                self.status.fail(result.message.clone());
                result
            }
            Err(e) => {
                error!("Schedule generation aborted: {}", e);
                self.rollback();
                let message = match e {
                    SchedulerError::Integrity(detail) => {
                        format!("Schedule could not be saved: {}", detail)
                    }
                    _ => UNEXPECTED_FAILURE.to_string(),
                };
                self.status.fail(message.clone());
                GenerationResult::failure(message)
            }
        }
    }

    fn rollback(&mut self) {
        if let Err(e) = self.store.rollback() {
            error!("Rollback failed: {}", e);
        }
    }

    fn execute(&mut self) -> SchedulerResult<RunOutcome> {
        let sections = self.store.load_sections()?;
        let periods = self.store.load_periods()?;
        let availabilities = self.store.load_teacher_availabilities()?;
        let subject_demands = self.store.load_section_subject_demands()?;
        let slots = self.store.load_existing_schedule_slots()?;
        info!(
            "Loaded {} sections, {} periods, {} availability rows, {} section subjects and {} slot rows.",
            sections.len(),
            periods.len(),
            availabilities.len(),
            subject_demands.len(),
            slots.len()
        );

        for issue in check_input(&sections, &periods, &availabilities, &subject_demands, &slots) {
            warn!("{}", issue.message);
            self.status.record_error(issue.message);
        }
        self.status.progress(10, "Data loaded");

        let index = ScheduleIndex::build(&periods, &availabilities, &subject_demands, &slots);
        let demands = prepare_demands(&subject_demands, &index);
        self.status
            .progress(20, format!("{} weekly lessons prepared", demands.len()));

        self.store.reset_schedule_slots()?;

        if demands.is_empty() {
            info!("No lessons to place; timetable cleared.");
            return Ok(RunOutcome::Commit(GenerationResult {
                success: true,
                message: "No lessons to schedule".to_string(),
                schedule: Some(Vec::new()),
                score: Some(evaluate(&[], &index)),
                ..Default::default()
            }));
        }

        if self.config.get_all_schedules {
            self.generate_all(&demands, &index)
        } else {
            self.generate_greedy(&demands, &index)
        }
    }

    fn generate_greedy(&mut self, demands: &[Demand], index: &ScheduleIndex) -> SchedulerResult<RunOutcome> {
        let status = self.status.clone();
        let outcome = place_greedy(demands, index, |done, total| {
            let percent = 20 + done * 50 / total;
            status.progress(percent as u8, format!("Placed {} of {} lessons", done, total));
        });
        for e in &outcome.errors {
            warn!("{}", e);
            self.status.record_error(e.clone());
        }

        if outcome.assignments.is_empty() {
            let suggestions = advise(&outcome.unplaced, index, self.config.advisor)?;
            return Ok(RunOutcome::Discard(GenerationResult {
                success: false,
                message: INFEASIBLE.to_string(),
                suggestions: Some(suggestions),
                ..Default::default()
            }));
        }

        let suggestions = if outcome.is_complete() {
            None
        } else {
            Some(advise(&outcome.unplaced, index, self.config.advisor)?)
        };
        let schedule = self.maybe_optimize(outcome.assignments, index);
        self.persist(&schedule, index)?;
        let breakdown = score_breakdown(&schedule, index);

        let message = if outcome.unplaced.is_empty() {
            "Schedule generated successfully".to_string()
        } else {
            format!(
                "Schedule generated with {} of {} lessons unplaced",
                outcome.unplaced.len(),
                demands.len()
            )
        };
        Ok(RunOutcome::Commit(GenerationResult {
            success: true,
            message,
            schedule: Some(schedule),
            suggestions,
            score: Some(breakdown.total),
            unmet_soft_constraints: Some(breakdown.unmet_soft_constraints),
            ..Default::default()
        }))
    }

    fn generate_all(&mut self, demands: &[Demand], index: &ScheduleIndex) -> SchedulerResult<RunOutcome> {
        self.status.progress(30, "Searching for complete schedules");
        let found = enumerate_schedules(demands, index, self.config.max_found_schedules);
        let total = found.schedules.len();
        self.status
            .progress(70, format!("Found {} distinct complete schedules", total));

        if total == 0 {
            // the greedy pass names the lessons that block a solution
            let probe = place_greedy(demands, index, |_, _| {});
            for e in &probe.errors {
                self.status.record_error(e.clone());
            }
            let suggestions = advise(&probe.unplaced, index, self.config.advisor)?;
            return Ok(RunOutcome::Discard(GenerationResult {
                success: false,
                message: INFEASIBLE.to_string(),
                suggestions: Some(suggestions),
                total_count: Some(0),
                ..Default::default()
            }));
        }

        let mut schedules: Vec<Vec<Assignment>> = found
            .schedules
            .into_iter()
            .take(self.config.requested_schedules)
            .collect();
        let primary = self.maybe_optimize(schedules[0].clone(), index);
        schedules[0] = primary.clone();
        self.persist(&primary, index)?;
        let breakdown = score_breakdown(&primary, index);

        let message = if found.capped {
            format!("Found {} distinct valid schedules (search limit reached)", total)
        } else {
            format!("Found {} distinct valid schedules", total)
        };
        Ok(RunOutcome::Commit(GenerationResult {
            success: true,
            message,
            schedule: Some(primary),
            schedules: Some(schedules),
            total_count: Some(total),
            score: Some(breakdown.total),
            unmet_soft_constraints: Some(breakdown.unmet_soft_constraints),
            ..Default::default()
        }))
    }

    fn maybe_optimize(&self, schedule: Vec<Assignment>, index: &ScheduleIndex) -> Vec<Assignment> {
        if !self.config.optimize {
            return schedule;
        }
        self.status.progress(75, "Optimizing schedule");
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let outcome = Optimizer::new(self.config.optimizer()).optimize(&schedule, index, &mut rng);
        self.status
            .progress(90, format!("Optimization done, score {:.2}", outcome.score));
        outcome.schedule
    }

    fn persist(&mut self, schedule: &[Assignment], index: &ScheduleIndex) -> SchedulerResult<()> {
        let violations = validate_schedule(schedule, index);
        if !violations.is_empty() {
            return Err(SchedulerError::Internal(format!(
                "computed schedule breaks {} hard constraints, first: {}",
                violations.len(),
                violations[0]
            )));
        }

        self.status.progress(95, "Saving schedule");
        let mut missing = 0;
        for a in schedule {
            let saved = self.store.save_assignment(
                a.section_id,
                a.day_of_week,
                a.period_id,
                a.subject_id,
                a.teacher_id,
            )?;
            if !saved {
                missing += 1;
                let message = format!(
                    "No slot row for section {} on {}; lesson of subject {} not saved",
                    a.section_id,
                    a.slot(),
                    a.subject_id
                );
                warn!("{}", message);
                self.status.record_error(message);
            }
        }
        trace!("Saved {} assignments, {} without a slot row.", schedule.len() - missing, missing);

        if missing > 0 && self.config.strict_integrity {
            return Err(SchedulerError::Integrity(format!(
                "{} lessons had no matching slot row",
                missing
            )));
        }
        Ok(())
    }

    /// Renders the persisted timetable.
    pub fn export(&self, format: ExportFormat, view: ExportView) -> SchedulerResult<String> {
        let slots = self.store.load_existing_schedule_slots()?;
        let periods = self.store.load_periods()?;
        let names = NameDirectory::new(&self.store.load_subjects()?, &self.store.load_teachers()?);
        match view {
            ExportView::BySection => render_timetable(&build_timetable(&slots, &periods, &names), format),
            ExportView::ByTeacher => {
                render_teacher_timetable(&build_teacher_timetable(&slots, &periods, &names), format)
            }
        }
    }
}

/// A generation running on tokio's blocking pool.
pub struct GenerationJob<S> {
    status: StatusReporter,
    handle: JoinHandle<(GenerationResult, ScheduleGenerator<S>)>,
}

impl<S: ScheduleStore + Send + 'static> ScheduleGenerator<S> {
    /// Starts the run in the background. Must be called inside a tokio runtime.
    pub fn spawn(mut self) -> GenerationJob<S> {
        let status = self.status();
        let handle = tokio::task::spawn_blocking(move || {
            let result = self.run();
            (result, self)
        });
        GenerationJob { status, handle }
    }
}

impl<S: ScheduleStore> GenerationJob<S> {
    pub fn status(&self) -> &StatusReporter {
        &self.status
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the run and hands back its result and store.
    pub async fn wait(self) -> SchedulerResult<(GenerationResult, S)> {
        match self.handle.await {
            Ok((result, generator)) => Ok((result, generator.into_store())),
            Err(e) => {
                error!("Generation task did not finish: {}", e);
                self.status.fail(UNEXPECTED_FAILURE);
                Err(SchedulerError::Internal(format!("generation task failed: {}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DayOfWeek::{Saturday, Sunday};
    use crate::data::{
        DayOfWeek, Period, ScheduleSlot, Section, Snapshot, SubjectDemand, TeacherAvailability,
    };
    use crate::status::Phase;
    use crate::store::InMemoryStore;

    fn snapshot(teacher_slots: &[(DayOfWeek, u32)], amount: u32) -> Snapshot {
        let mut slots = Vec::new();
        for day in [Saturday, Sunday] {
            for period in 1..=2 {
                slots.push(ScheduleSlot {
                    section_id: 1,
                    day_of_week: day,
                    period_id: period,
                    subject_id: Some(99),
                    teacher_id: Some(99),
                });
            }
        }
        Snapshot {
            sections: vec![Section { id: 1, classroom_id: 1 }],
            periods: (1..=2)
                .map(|id| Period {
                    id,
                    name: format!("P{id}"),
                    order: id as i32,
                    start_time: "08:00".into(),
                    end_time: "08:45".into(),
                })
                .collect(),
            teacher_availabilities: teacher_slots
                .iter()
                .map(|(day, period)| TeacherAvailability {
                    teacher_id: 7,
                    day_of_week: *day,
                    period_id: *period,
                })
                .collect(),
            subject_demands: vec![SubjectDemand {
                section_id: 1,
                subject_id: 3,
                teacher_id: Some(7),
                candidate_teachers: vec![],
                amount: Some(amount),
            }],
            schedule_slots: slots,
            ..Default::default()
        }
    }

    fn filled(store: &InMemoryStore) -> usize {
        store
            .snapshot()
            .schedule_slots
            .iter()
            .filter(|s| s.subject_id == Some(3) && s.teacher_id == Some(7))
            .count()
    }

    #[test]
    fn commits_a_complete_greedy_schedule() {
        let store = InMemoryStore::new(snapshot(&[(Saturday, 1), (Sunday, 2)], 2));
        let mut generator = ScheduleGenerator::new(store, GenerationConfig::default()).unwrap();
        let result = generator.run();

        assert!(result.success);
        assert_eq!(result.schedule.as_ref().map(Vec::len), Some(2));
        assert!(result.suggestions.is_none());
        assert_eq!(generator.status().phase(), Phase::Completed);

        let store = generator.into_store();
        assert!(!store.in_transaction());
        assert_eq!(filled(&store), 2);
        // stale rows were cleared
        assert!(store.snapshot().schedule_slots.iter().all(|s| s.subject_id != Some(99)));
    }

    #[test]
    fn partial_schedule_succeeds_with_errors_and_suggestions() {
        let store = InMemoryStore::new(snapshot(&[(Saturday, 1)], 2));
        let mut generator = ScheduleGenerator::new(store, GenerationConfig::default()).unwrap();
        let result = generator.run();

        assert!(result.success);
        assert_eq!(result.schedule.as_ref().map(Vec::len), Some(1));
        assert!(!result.suggestions.unwrap_or_default().is_empty());
        assert_eq!(generator.status().snapshot().errors.len(), 1);
    }

    #[test]
    fn infeasible_run_rolls_back() {
        let store = InMemoryStore::new(snapshot(&[], 1));
        let mut generator = ScheduleGenerator::new(store, GenerationConfig::default()).unwrap();
        let result = generator.run();

        assert!(!result.success);
        assert!(result.schedule.is_none());
        assert_eq!(result.suggestions.as_ref().map(Vec::len), Some(1));
        assert_eq!(generator.status().phase(), Phase::Failed);

        let store = generator.into_store();
        assert!(store.snapshot().schedule_slots.iter().all(|s| s.subject_id == Some(99)));
    }

    #[test]
    fn all_schedules_mode_persists_the_first() {
        let store = InMemoryStore::new(snapshot(&[(Saturday, 1), (Saturday, 2), (Sunday, 1)], 2));
        let config = GenerationConfig {
            get_all_schedules: true,
            requested_schedules: 2,
            ..Default::default()
        };
        let mut generator = ScheduleGenerator::new(store, config).unwrap();
        let result = generator.run();

        assert!(result.success);
        assert_eq!(result.total_count, Some(3));
        assert_eq!(result.message, "Found 3 distinct valid schedules");
        assert_eq!(result.schedules.as_ref().map(Vec::len), Some(2));
        assert_eq!(filled(generator.store()), 2);
    }

    #[test]
    fn strict_integrity_turns_missing_rows_into_failure() {
        let mut snap = snapshot(&[(Saturday, 1)], 1);
        // the index sees the slot, but the store cannot find the row to save
        struct LossyStore(InMemoryStore);
        impl ScheduleStore for LossyStore {
            fn load_sections(&self) -> SchedulerResult<Vec<Section>> {
                self.0.load_sections()
            }
            fn load_periods(&self) -> SchedulerResult<Vec<Period>> {
                self.0.load_periods()
            }
            fn load_teacher_availabilities(&self) -> SchedulerResult<Vec<TeacherAvailability>> {
                self.0.load_teacher_availabilities()
            }
            fn load_section_subject_demands(&self) -> SchedulerResult<Vec<SubjectDemand>> {
                self.0.load_section_subject_demands()
            }
            fn load_existing_schedule_slots(&self) -> SchedulerResult<Vec<ScheduleSlot>> {
                self.0.load_existing_schedule_slots()
            }
            fn reset_schedule_slots(&mut self) -> SchedulerResult<()> {
                self.0.reset_schedule_slots()
            }
            fn save_assignment(
                &mut self,
                _: u32,
                _: DayOfWeek,
                _: u32,
                _: u32,
                _: u32,
            ) -> SchedulerResult<bool> {
                Ok(false)
            }
            fn begin(&mut self) -> SchedulerResult<()> {
                self.0.begin()
            }
            fn commit(&mut self) -> SchedulerResult<()> {
                self.0.commit()
            }
            fn rollback(&mut self) -> SchedulerResult<()> {
                self.0.rollback()
            }
        }
        snap.schedule_slots[0].subject_id = Some(42);

        let lenient = ScheduleGenerator::new(LossyStore(InMemoryStore::new(snap.clone())), GenerationConfig::default())
            .unwrap()
            .run();
        assert!(lenient.success);

        let config = GenerationConfig {
            strict_integrity: true,
            ..Default::default()
        };
        let mut generator = ScheduleGenerator::new(LossyStore(InMemoryStore::new(snap)), config).unwrap();
        let result = generator.run();
        assert!(!result.success);
        assert!(result.message.starts_with("Schedule could not be saved"));
        assert_eq!(generator.into_store().0.snapshot().schedule_slots[0].subject_id, Some(42));
    }

    #[test]
    fn store_failures_are_reported_generically() {
        struct BrokenStore;
        impl ScheduleStore for BrokenStore {
            fn load_sections(&self) -> SchedulerResult<Vec<Section>> {
                Err(SchedulerError::Store("connection reset by peer at 10.0.0.3".into()))
            }
            fn load_periods(&self) -> SchedulerResult<Vec<Period>> {
                Ok(Vec::new())
            }
            fn load_teacher_availabilities(&self) -> SchedulerResult<Vec<TeacherAvailability>> {
                Ok(Vec::new())
            }
            fn load_section_subject_demands(&self) -> SchedulerResult<Vec<SubjectDemand>> {
                Ok(Vec::new())
            }
            fn load_existing_schedule_slots(&self) -> SchedulerResult<Vec<ScheduleSlot>> {
                Ok(Vec::new())
            }
            fn reset_schedule_slots(&mut self) -> SchedulerResult<()> {
                Ok(())
            }
            fn save_assignment(
                &mut self,
                _: u32,
                _: DayOfWeek,
                _: u32,
                _: u32,
                _: u32,
            ) -> SchedulerResult<bool> {
                Ok(true)
            }
            fn begin(&mut self) -> SchedulerResult<()> {
                Ok(())
            }
            fn commit(&mut self) -> SchedulerResult<()> {
                Ok(())
            }
            fn rollback(&mut self) -> SchedulerResult<()> {
                Ok(())
            }
        }

        let result = ScheduleGenerator::new(BrokenStore, GenerationConfig::default())
            .unwrap()
            .run();
        assert!(!result.success);
        assert_eq!(result.message, UNEXPECTED_FAILURE);
        assert!(!result.message.contains("10.0.0.3"));
    }

    #[test]
    fn rejects_invalid_config() {
        let config = GenerationConfig {
            timeout: 4000,
            ..Default::default()
        };
        assert!(ScheduleGenerator::new(InMemoryStore::default(), config).is_err());
    }

    #[tokio::test]
    async fn background_job_reports_status() {
        let store = InMemoryStore::new(snapshot(&[(Saturday, 1), (Sunday, 2)], 2));
        let config = GenerationConfig {
            optimize: true,
            seed: Some(3),
            ..Default::default()
        };
        let job = ScheduleGenerator::new(store, config).unwrap().spawn();
        let status = job.status().clone();
        let (result, store) = job.wait().await.unwrap();

        assert!(result.success);
        assert_eq!(status.phase(), Phase::Completed);
        assert_eq!(status.snapshot().percent, 100);
        assert_eq!(filled(&store), 2);
    }
}
