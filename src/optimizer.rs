//! Soft-constraint scoring and local search over valid schedules.

use itertools::Itertools;
use log::{info, trace};
use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::HashMap;
use std::time::Instant;

use crate::config::OptimizerConfig;
use crate::constraints::{ScheduleIndex, validate_schedule};
use crate::data::{Assignment, DayOfWeek, SectionId, SubjectId, TeacherId, UnmetSoftConstraint};

// soft constraint weights
const WORKLOAD_WEIGHT: f64 = 100.0;
const CONSECUTIVE_BONUS: f64 = 10.0;
const GAP_PENALTY: f64 = 5.0;
const SPREAD_BONUS: f64 = 15.0;
const REPEAT_PENALTY: f64 = 0.5;

/// Each term of the evaluation, plus notes on what was not met.
#[derive(Debug, Clone, Default)]
pub struct ScoreBreakdown {
    pub workload_balance: f64,
    pub consecutive_bonus: f64,
    pub gap_penalty: f64,
    pub subject_spread: f64,
    pub total: f64,
    pub unmet_soft_constraints: Vec<UnmetSoftConstraint>,
}

/// Higher is better.
pub fn evaluate(schedule: &[Assignment], index: &ScheduleIndex) -> f64 {
    score_breakdown(schedule, index).total
}

/// Scores a schedule term by term.
///
/// Adjacency and idle periods use each period's position in the
/// sequence-ordered period list, so periods with orders 2 and 4 are
/// neighbours when no period has order 3.
pub fn score_breakdown(schedule: &[Assignment], index: &ScheduleIndex) -> ScoreBreakdown {
    let mut unmet = Vec::new();

    // even teacher workload
    let counts: Vec<f64> = schedule
        .iter()
        .map(|a| a.teacher_id)
        .counts()
        .into_values()
        .map(|c| c as f64)
        .collect();
    let variance = if counts.is_empty() {
        0.0
    } else {
        let mean = counts.iter().sum::<f64>() / counts.len() as f64;
        counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / counts.len() as f64
    };
    let workload_balance = WORKLOAD_WEIGHT / (1.0 + variance);

    // compact teacher days
    let teacher_days: HashMap<(TeacherId, DayOfWeek), Vec<usize>> = schedule
        .iter()
        .filter_map(|a| index.period_rank(a.period_id).map(|r| ((a.teacher_id, a.day_of_week), r)))
        .into_group_map();
    let mut consecutive_pairs = 0usize;
    for ranks in teacher_days.into_values() {
        consecutive_pairs += ranks
            .into_iter()
            .sorted()
            .tuple_windows()
            .filter(|(a, b)| b - a == 1)
            .count();
    }
    let consecutive_bonus = CONSECUTIVE_BONUS * consecutive_pairs as f64;

    // idle periods inside a section's day
    let section_days: HashMap<(SectionId, DayOfWeek), Vec<usize>> = schedule
        .iter()
        .filter_map(|a| index.period_rank(a.period_id).map(|r| ((a.section_id, a.day_of_week), r)))
        .into_group_map();
    let mut idle_periods = 0usize;
    for ((section_id, day), ranks) in section_days.into_iter().sorted_by_key(|(k, _)| *k) {
        let idle: usize = ranks
            .into_iter()
            .sorted()
            .tuple_windows()
            .map(|(a, b)| b.saturating_sub(a + 1))
            .sum();
        if idle > 0 {
            unmet.push(UnmetSoftConstraint {
                constraint_type: "Avoid Section Gaps".to_string(),
                description: format!(
                    "Section {} has {} idle period(s) between lessons on {}.",
                    section_id, idle, day
                ),
            });
        }
        idle_periods += idle;
    }
    let gap_penalty = GAP_PENALTY * idle_periods as f64;

    // subjects spread across the week
    let subject_days: HashMap<(SectionId, SubjectId), Vec<DayOfWeek>> = schedule
        .iter()
        .map(|a| ((a.section_id, a.subject_id), a.day_of_week))
        .into_group_map();
    let mut subject_spread = 0.0;
    for ((section_id, subject_id), days) in subject_days.into_iter().sorted_by_key(|(k, _)| *k) {
        let distinct = days.iter().unique().count();
        let repeats = days.len() - distinct;
        subject_spread += SPREAD_BONUS * distinct as f64 - REPEAT_PENALTY * repeats as f64;
        if repeats > 0 {
            unmet.push(UnmetSoftConstraint {
                constraint_type: "Spread Subjects".to_string(),
                description: format!(
                    "Subject {} repeats {} time(s) on the same day for section {}.",
                    subject_id, repeats, section_id
                ),
            });
        }
    }

    ScoreBreakdown {
        workload_balance,
        consecutive_bonus,
        gap_penalty,
        subject_spread,
        total: workload_balance + consecutive_bonus - gap_penalty + subject_spread,
        unmet_soft_constraints: unmet,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    SwapSlots,
    SwapTeachers,
    Reslot,
}

/// Result of a local search run.
#[derive(Debug, Clone)]
pub struct OptimizationOutcome {
    pub schedule: Vec<Assignment>,
    pub initial_score: f64,
    pub score: f64,
    pub iterations: u32,
    pub improvements: u32,
}

/// Hill climbing over random neighbours; only valid, strictly better
/// neighbours are accepted.
#[derive(Debug, Clone, Default)]
pub struct Optimizer {
    config: OptimizerConfig,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn optimize<R: Rng + ?Sized>(
        &self,
        schedule: &[Assignment],
        index: &ScheduleIndex,
        rng: &mut R,
    ) -> OptimizationOutcome {
        let start_time = Instant::now();
        let initial_score = evaluate(schedule, index);
        let mut best = schedule.to_vec();
        let mut best_score = initial_score;
        let mut iterations = 0;
        let mut improvements = 0;

        while iterations < self.config.max_iterations && start_time.elapsed() < self.config.timeout {
            iterations += 1;
            let Some(candidate) = neighbour(&best, index, rng) else {
                continue;
            };
            if !validate_schedule(&candidate, index).is_empty() {
                continue;
            }
            let score = evaluate(&candidate, index);
            if score > best_score {
                trace!("Iteration {}: score {:.2} -> {:.2}", iterations, best_score, score);
                best = candidate;
                best_score = score;
                improvements += 1;
            }
        }

        info!(
            "Optimizer ran {} iterations in {:.2?}, {} improvements, score {:.2} -> {:.2}.",
            iterations,
            start_time.elapsed(),
            improvements,
            initial_score,
            best_score
        );

        OptimizationOutcome {
            schedule: best,
            initial_score,
            score: best_score,
            iterations,
            improvements,
        }
    }
}

/// Two distinct positions, or `None` for fewer than two assignments.
fn pick_pair<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Option<(usize, usize)> {
    if len < 2 {
        return None;
    }
    let i = rng.random_range(0..len);
    let mut j = rng.random_range(0..len - 1);
    if j >= i {
        j += 1;
    }
    Some((i, j))
}

fn neighbour<R: Rng + ?Sized>(
    schedule: &[Assignment],
    index: &ScheduleIndex,
    rng: &mut R,
) -> Option<Vec<Assignment>> {
    let chosen = match rng.random_range(0..3) {
        0 => Move::SwapSlots,
        1 => Move::SwapTeachers,
        _ => Move::Reslot,
    };
    let mut candidate = schedule.to_vec();

    match chosen {
        Move::SwapSlots => {
            let (i, j) = pick_pair(candidate.len(), rng)?;
            let (a, b) = (candidate[i].slot(), candidate[j].slot());
            candidate[i].set_slot(b);
            candidate[j].set_slot(a);
        }
        Move::SwapTeachers => {
            let (i, j) = pick_pair(candidate.len(), rng)?;
            let teacher = candidate[i].teacher_id;
            candidate[i].teacher_id = candidate[j].teacher_id;
            candidate[j].teacher_id = teacher;
        }
        Move::Reslot => {
            if candidate.is_empty() {
                return None;
            }
            let i = rng.random_range(0..candidate.len());
            let current = candidate[i].slot();
            let targets: Vec<_> = index
                .shared_slots(candidate[i].teacher_id, candidate[i].section_id)
                .into_iter()
                .filter(|s| *s != current)
                .collect();
            let target = *targets.choose(rng)?;
            candidate[i].set_slot(target);
        }
    }
    Some(candidate)
}
