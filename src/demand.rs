//! Expands section/subject requirements into atomic weekly lessons and orders
//! them hardest first.

use log::trace;

use crate::constraints::ScheduleIndex;
use crate::data::{Demand, SubjectDemand};

/// One `Demand` per required weekly occurrence, in input order.
pub fn expand_demands(subject_demands: &[SubjectDemand]) -> Vec<Demand> {
    let mut demands = Vec::new();
    for (origin, sd) in subject_demands.iter().enumerate() {
        let eligible_teachers = sd.eligible_teachers();
        for _ in 0..sd.weekly_amount() {
            demands.push(Demand {
                section_id: sd.section_id,
                subject_id: sd.subject_id,
                eligible_teachers: eligible_teachers.clone(),
                origin,
            });
        }
    }
    trace!(
        "Expanded {} section subjects into {} weekly lessons.",
        subject_demands.len(),
        demands.len()
    );
    demands
}

/// Sum of availability rows over the eligible teachers. Lower is harder.
pub fn difficulty(demand: &Demand, index: &ScheduleIndex) -> usize {
    demand
        .eligible_teachers
        .iter()
        .map(|t| index.availability_count(*t))
        .sum()
}

/// Most constrained lessons first; equal scores keep their input order.
pub fn sort_by_difficulty(demands: &mut [Demand], index: &ScheduleIndex) {
    // sort_by_cached_key is stable
    demands.sort_by_cached_key(|d| difficulty(d, index));
}

pub fn prepare_demands(subject_demands: &[SubjectDemand], index: &ScheduleIndex) -> Vec<Demand> {
    let mut demands = expand_demands(subject_demands);
    sort_by_difficulty(&mut demands, index);
    demands
}
