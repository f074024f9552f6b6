//! Suggests teacher availability to add when lessons cannot be placed.
//!
//! Each unplaced lesson could be helped by any slot that its section has in
//! session but that an eligible teacher has not offered. Picking the fewest
//! such slots that help every lesson is a minimum hitting set problem, which
//! is NP-hard. The default solver is the greedy approximation: repeatedly take
//! the slot that helps the most lessons still unhelped. It is not guaranteed
//! to be minimal.
//!
//! With the `exact-advisor` feature the same cover relation can be solved as
//! a 0/1 integer program instead.

use log::{info, trace};
use std::collections::HashMap;

use crate::config::AdvisorMode;
use crate::constraints::ScheduleIndex;
use crate::data::{Demand, Suggestion};
use crate::error::{SchedulerError, SchedulerResult};

/// A slot that could be added, and the lessons it would help.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HelpOption {
    suggestion: Suggestion,
    covers: Vec<usize>,
}

/// Options in the order they are first discovered.
fn collect_options(demands: &[Demand], index: &ScheduleIndex) -> Vec<HelpOption> {
    let mut options: Vec<HelpOption> = Vec::new();
    let mut position: HashMap<Suggestion, usize> = HashMap::new();

    for (d, demand) in demands.iter().enumerate() {
        for &teacher_id in &demand.eligible_teachers {
            for &slot in index.section_slots(demand.section_id) {
                if index.is_teacher_available(teacher_id, slot) {
                    continue;
                }
                let suggestion = Suggestion {
                    teacher_id,
                    day_of_week: slot.day,
                    period_id: slot.period_id,
                };
                let at = *position.entry(suggestion).or_insert_with(|| {
                    options.push(HelpOption {
                        suggestion,
                        covers: Vec::new(),
                    });
                    options.len() - 1
                });
                let covers = &mut options[at].covers;
                if covers.last() != Some(&d) {
                    covers.push(d);
                }
            }
        }
    }
    options
}

/// Greedy hitting set over the unplaced lessons.
pub fn suggest_availability(demands: &[Demand], index: &ScheduleIndex) -> Vec<Suggestion> {
    let options = collect_options(demands, index);
    trace!(
        "Advisor found {} candidate availability slots for {} lessons.",
        options.len(),
        demands.len()
    );

    let mut covered = vec![false; demands.len()];
    let mut remaining = demands.len();
    let mut suggestions = Vec::new();

    while remaining > 0 {
        let mut best: Option<(usize, usize)> = None;
        for (i, option) in options.iter().enumerate() {
            let gain = option.covers.iter().filter(|d| !covered[**d]).count();
            if gain > best.map_or(0, |(_, g)| g) {
                best = Some((i, gain));
            }
        }
        let Some((i, gain)) = best else {
            break;
        };
        for &d in &options[i].covers {
            covered[d] = true;
        }
        remaining -= gain;
        suggestions.push(options[i].suggestion);
    }

    info!(
        "Advisor suggests {} availability additions; {} lessons remain without any option.",
        suggestions.len(),
        remaining
    );
    suggestions
}

#[cfg(feature = "exact-advisor")]
fn suggest_availability_exact(
    demands: &[Demand],
    index: &ScheduleIndex,
) -> SchedulerResult<Vec<Suggestion>> {
    use good_lp::{
        Expression, ProblemVariables, Solution, SolverModel, Variable, constraint, default_solver,
        variable,
    };

    let options = collect_options(demands, index);
    if options.is_empty() {
        return Ok(Vec::new());
    }

    let mut problem = ProblemVariables::new();
    let vars: Vec<Variable> = problem.add_vector(variable().binary(), options.len());
    let objective: Expression = vars.iter().copied().sum();

    let mut model = problem
        .minimise(objective)
        .using(default_solver)
        .set_option("threads", 1)
        .set_option("random_seed", 1234)
        .set_option("log_to_console", "false");

    // every lesson that some option helps must be helped at least once
    for d in 0..demands.len() {
        let helping: Vec<Variable> = options
            .iter()
            .zip(&vars)
            .filter(|(o, _)| o.covers.contains(&d))
            .map(|(_, v)| *v)
            .collect();
        if helping.is_empty() {
            continue;
        }
        let helped: Expression = helping.into_iter().sum();
        model.add_constraint(constraint!(helped >= 1));
    }

    let solution = model
        .solve()
        .map_err(|e| SchedulerError::Solver(format!("hitting set program failed: {}", e)))?;

    let suggestions: Vec<Suggestion> = options
        .iter()
        .zip(&vars)
        .filter(|(_, v)| solution.value(**v) > 0.9)
        .map(|(o, _)| o.suggestion)
        .collect();
    info!("Exact advisor suggests {} availability additions.", suggestions.len());
    Ok(suggestions)
}

/// Runs the advisor in the requested mode.
pub fn advise(
    demands: &[Demand],
    index: &ScheduleIndex,
    mode: AdvisorMode,
) -> SchedulerResult<Vec<Suggestion>> {
    match mode {
        AdvisorMode::Greedy => Ok(suggest_availability(demands, index)),
        #[cfg(feature = "exact-advisor")]
        AdvisorMode::Exact => suggest_availability_exact(demands, index),
        #[cfg(not(feature = "exact-advisor"))]
        AdvisorMode::Exact => Err(SchedulerError::InvalidConfig(
            "exact advisor requires the `exact-advisor` feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DayOfWeek::{Saturday, Sunday};
    use crate::data::{DayOfWeek, ScheduleSlot, TeacherAvailability};

    fn row(section: u32, day: DayOfWeek, period: u32) -> ScheduleSlot {
        ScheduleSlot {
            section_id: section,
            day_of_week: day,
            period_id: period,
            subject_id: None,
            teacher_id: None,
        }
    }

    fn lesson(section: u32, teachers: Vec<u32>) -> Demand {
        Demand {
            section_id: section,
            subject_id: 1,
            eligible_teachers: teachers,
            origin: section as usize,
        }
    }

    #[test]
    fn picks_the_slot_that_helps_most_lessons() {
        let slots = vec![row(1, Saturday, 1), row(1, Sunday, 1), row(2, Sunday, 1)];
        let availability = vec![TeacherAvailability {
            teacher_id: 7,
            day_of_week: Saturday,
            period_id: 1,
        }];
        let index = ScheduleIndex::build(&[], &availability, &[], &slots);

        let suggestions = suggest_availability(&[lesson(1, vec![7]), lesson(2, vec![7])], &index);
        assert_eq!(
            suggestions,
            vec![Suggestion {
                teacher_id: 7,
                day_of_week: Sunday,
                period_id: 1
            }]
        );
    }

    #[test]
    fn lessons_without_teachers_get_no_suggestion() {
        let index = ScheduleIndex::build(&[], &[], &[], &[row(1, Saturday, 1)]);
        assert!(suggest_availability(&[lesson(1, vec![])], &index).is_empty());
    }

    #[test]
    fn covers_every_lesson_that_has_an_option() {
        let slots = vec![row(1, Saturday, 1), row(2, Saturday, 2), row(3, Sunday, 3)];
        let index = ScheduleIndex::build(&[], &[], &[], &slots);
        let demands = vec![lesson(1, vec![4]), lesson(2, vec![5]), lesson(3, vec![4, 5])];

        let suggestions = suggest_availability(&demands, &index);
        for demand in &demands {
            assert!(suggestions.iter().any(|s| {
                demand.eligible_teachers.contains(&s.teacher_id)
                    && index.section_has_slot(demand.section_id, crate::data::Slot::new(s.day_of_week, s.period_id))
            }));
        }
        assert_eq!(suggestions.len(), 3);
    }

    #[cfg(not(feature = "exact-advisor"))]
    #[test]
    fn exact_mode_needs_the_feature() {
        let index = ScheduleIndex::default();
        assert!(advise(&[], &index, AdvisorMode::Exact).is_err());
    }

    #[cfg(feature = "exact-advisor")]
    #[test]
    fn exact_mode_finds_a_minimum_cover() {
        let slots = vec![row(1, Saturday, 1), row(1, Sunday, 1), row(2, Sunday, 1)];
        let index = ScheduleIndex::build(&[], &[], &[], &slots);
        let suggestions =
            advise(&[lesson(1, vec![7]), lesson(2, vec![7])], &index, AdvisorMode::Exact).unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].day_of_week, Sunday);
    }
}
