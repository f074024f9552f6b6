use crate::constraints::{Occupancy, ScheduleIndex};
use crate::data::{Assignment, Demand, Slot, TeacherId};
use log::{info, trace};

/// Result of one greedy pass.
#[derive(Debug, Clone, Default)]
pub struct GreedyOutcome {
    pub assignments: Vec<Assignment>,
    pub unplaced: Vec<Demand>,
    pub errors: Vec<String>,
}

impl GreedyOutcome {
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }
}

/// Result of the exhaustive search.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub schedules: Vec<Vec<Assignment>>,
    /// The search stopped at the schedule cap rather than exhausting the tree.
    pub capped: bool,
}

/// Places lessons one at a time, hardest first, on the first free slot.
///
/// For each lesson the eligible teachers are tried in listed order, and each
/// teacher's slots in availability order. A lesson nobody can take is left
/// out and reported; the pass carries on. `progress` receives
/// `(processed, total)` roughly every tenth of the work.
pub fn place_greedy(
    demands: &[Demand],
    index: &ScheduleIndex,
    mut progress: impl FnMut(usize, usize),
) -> GreedyOutcome {
    let total = demands.len();
    let step = (total / 10).max(1);
    let mut occupancy = Occupancy::new();
    let mut outcome = GreedyOutcome::default();

    for (i, demand) in demands.iter().enumerate() {
        match first_free_option(demand, index, &occupancy) {
            Some((teacher_id, slot)) => {
                let assignment = Assignment::for_demand(demand, teacher_id, slot);
                occupancy.mark(&assignment);
                outcome.assignments.push(assignment);
            }
            None => {
                outcome.errors.push(format!(
                    "Subject {} could not be assigned to section {}",
                    demand.subject_id, demand.section_id
                ));
                outcome.unplaced.push(demand.clone());
            }
        }
        if (i + 1) % step == 0 || i + 1 == total {
            progress(i + 1, total);
        }
    }

    info!(
        "Greedy pass placed {} of {} lessons.",
        outcome.assignments.len(),
        total
    );
    outcome
}

fn first_free_option(
    demand: &Demand,
    index: &ScheduleIndex,
    occupancy: &Occupancy,
) -> Option<(TeacherId, Slot)> {
    demand.eligible_teachers.iter().find_map(|&teacher| {
        index
            .teacher_slots(teacher)
            .iter()
            .find(|slot| {
                index.section_has_slot(demand.section_id, **slot)
                    && occupancy.is_free(teacher, demand.section_id, **slot)
            })
            .map(|slot| (teacher, *slot))
    })
}

/// Every (teacher, slot) a lesson could take ignoring other lessons, in
/// teacher order then availability order.
fn static_options(demand: &Demand, index: &ScheduleIndex) -> Vec<(TeacherId, Slot)> {
    demand
        .eligible_teachers
        .iter()
        .flat_map(|&teacher| {
            index
                .shared_slots(teacher, demand.section_id)
                .into_iter()
                .map(move |slot| (teacher, slot))
        })
        .collect()
}

struct Search<'a> {
    demands: &'a [Demand],
    options: Vec<Vec<(TeacherId, Slot)>>,
    occupancy: Occupancy,
    current: Vec<Assignment>,
    chosen: Vec<usize>,
    found: Vec<Vec<Assignment>>,
    limit: usize,
}

impl Search<'_> {
    /// Returns true once the cap is reached.
    fn descend(&mut self, depth: usize) -> bool {
        if depth == self.demands.len() {
            self.found.push(self.current.clone());
            return self.found.len() >= self.limit;
        }

        let demands = self.demands;
        let demand = &demands[depth];
        // Lessons expanded from the same requirement are interchangeable; only
        // visit them in increasing option order.
        let start = if depth > 0 && demands[depth - 1].origin == demand.origin {
            self.chosen[depth - 1] + 1
        } else {
            0
        };

        for k in start..self.options[depth].len() {
            let (teacher_id, slot) = self.options[depth][k];
            if !self.occupancy.is_free(teacher_id, demand.section_id, slot) {
                continue;
            }
            let assignment = Assignment::for_demand(demand, teacher_id, slot);
            self.occupancy.mark(&assignment);
            self.current.push(assignment);
            self.chosen.push(k);

            let done = self.descend(depth + 1);

            self.chosen.pop();
            if let Some(undone) = self.current.pop() {
                self.occupancy.unmark(&undone);
            }
            if done {
                return true;
            }
        }
        false
    }
}

/// Depth-first enumeration of complete schedules, stopping after `limit`.
///
/// Each branch marks the occupancy table, recurses, then unmarks, so no state
/// is copied between alternatives. Lessons from the same requirement are
/// interchangeable, so each distinct timetable is produced once rather than
/// once per ordering. An empty result means no complete placement exists.
pub fn enumerate_schedules(demands: &[Demand], index: &ScheduleIndex, limit: usize) -> SearchOutcome {
    let options: Vec<Vec<(TeacherId, Slot)>> =
        demands.iter().map(|d| static_options(d, index)).collect();
    trace!(
        "Backtracking over {} lessons with {} candidate placements.",
        demands.len(),
        options.iter().map(Vec::len).sum::<usize>()
    );

    if limit == 0 || options.iter().any(Vec::is_empty) {
        return SearchOutcome::default();
    }

    let mut search = Search {
        demands,
        options,
        occupancy: Occupancy::new(),
        current: Vec::with_capacity(demands.len()),
        chosen: Vec::with_capacity(demands.len()),
        found: Vec::new(),
        limit,
    };
    let capped = search.descend(0);
    info!(
        "Backtracking found {} distinct complete schedules{}.",
        search.found.len(),
        if capped { " (limit reached)" } else { "" }
    );

    SearchOutcome {
        schedules: search.found,
        capped,
    }
}
