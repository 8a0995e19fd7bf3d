use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration as WallDuration, Instant};

use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info};

use crate::{
    construction::{self, ConstructionParams, SeedStrategy},
    error::SolverError,
    problem::{instance::Problem, units::Cost},
    search::{
        driver::LocalSearch,
        perturb::{perturb, PerturbParams},
    },
    solution::solution::Solution,
};

#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Base seed; every stream derives its own from it.
    pub seed: u64,
    /// Perturbation rounds per stream.
    pub rounds: usize,
    /// Applied-move budget per descent.
    pub move_limit: usize,
    /// Cap on parallel streams; the full grid is regret depth x seed
    /// strategy.
    pub streams: usize,
    /// Regret depths explored across streams.
    pub regret_ks: Vec<usize>,
    /// Wall-clock bound. Determinism is only guaranteed for runs bounded by
    /// `rounds` alone.
    pub timeout: Option<WallDuration>,
    pub perturb: PerturbParams,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            seed: 0,
            rounds: 24,
            move_limit: 100_000,
            streams: 15,
            regret_ks: vec![2, 3, 4],
            timeout: None,
            perturb: PerturbParams::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    Pending,
    Running,
    Completed,
}

#[derive(Debug, Clone, Copy)]
struct StreamConfig {
    regret_k: usize,
    seed_strategy: SeedStrategy,
}

/// Multi-start facade: S independent streams (regret depth x seed strategy),
/// each owning its solution and rng, share nothing but the immutable problem
/// and the cancel flag. The best stream wins; ties go to the lowest stream
/// index, which keeps the whole solve deterministic for a fixed seed and
/// round budget.
pub struct Solver {
    problem: Arc<Problem>,
    params: SearchParams,
    cancel: AtomicBool,
    status: RwLock<SolverStatus>,
    best: RwLock<Option<(Cost, Solution)>>,
}

impl Solver {
    pub fn new(problem: Problem, params: SearchParams) -> Self {
        Solver {
            problem: Arc::new(problem),
            params,
            cancel: AtomicBool::new(false),
            status: RwLock::new(SolverStatus::Pending),
            best: RwLock::new(None),
        }
    }

    pub fn problem(&self) -> &Arc<Problem> {
        &self.problem
    }

    /// Requests cooperative cancellation; the running solve returns its best
    /// solution so far.
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn status(&self) -> SolverStatus {
        *self.status.read()
    }

    /// Best solution found so far, also available while solving.
    pub fn current_best(&self) -> Option<Solution> {
        self.best.read().as_ref().map(|(_, solution)| solution.clone())
    }

    pub fn solve(&self) -> Result<Solution, SolverError> {
        *self.status.write() = SolverStatus::Running;
        let deadline = self.params.timeout.map(|timeout| Instant::now() + timeout);

        let streams: Vec<StreamConfig> = self
            .params
            .regret_ks
            .iter()
            .flat_map(|&regret_k| {
                SeedStrategy::ALL.iter().map(move |&seed_strategy| StreamConfig {
                    regret_k,
                    seed_strategy,
                })
            })
            .take(self.params.streams.max(1))
            .collect();

        info!(
            streams = streams.len(),
            rounds = self.params.rounds,
            "starting multi-start search"
        );

        let results: Vec<Result<(Cost, Solution), SolverError>> = streams
            .par_iter()
            .enumerate()
            .map(|(index, config)| self.run_stream(index, *config, deadline))
            .collect();

        let mut best: Option<(Cost, Solution)> = None;
        for result in results {
            let (cost, solution) = result?;
            // Strict comparison: earlier streams win ties.
            if best.as_ref().is_none_or(|(b, _)| cost < *b) {
                best = Some((cost, solution));
            }
        }

        let (cost, solution) = best.expect("at least one stream ran");
        *self.best.write() = Some((cost, solution.clone()));
        *self.status.write() = SolverStatus::Completed;

        info!(
            objective = cost,
            unassigned = solution.unassigned().len(),
            routes = solution.used_routes(),
            "search finished"
        );

        Ok(solution)
    }

    fn run_stream(
        &self,
        index: usize,
        config: StreamConfig,
        deadline: Option<Instant>,
    ) -> Result<(Cost, Solution), SolverError> {
        let mut rng = StdRng::seed_from_u64(
            self.params
                .seed
                .wrapping_add(0x9E37_79B9_7F4A_7C15_u64.wrapping_mul(index as u64 + 1)),
        );

        let mut solution = construction::build_initial(
            &self.problem,
            ConstructionParams {
                regret_k: config.regret_k,
                seed: config.seed_strategy,
            },
        )?;

        let mut search = LocalSearch::new(self.problem.vehicles().len());
        search.descend(&mut solution, self.params.move_limit, &self.cancel);

        let mut best = solution.clone();
        let mut best_cost = solution.objective();
        self.offer(best_cost, &best);

        for round in 0..self.params.rounds {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            if let Some(deadline) = deadline
                && Instant::now() >= deadline
            {
                break;
            }

            perturb(&mut solution, &mut rng, round, self.params.perturb);
            search.descend(&mut solution, self.params.move_limit, &self.cancel);

            let cost = solution.objective();
            if cost < best_cost {
                best_cost = cost;
                best = solution.clone();
                self.offer(best_cost, &best);
            } else {
                // Greedy acceptance: restart the next kick from the best.
                solution = best.clone();
            }
        }

        debug!(stream = index, objective = best_cost, "stream finished");
        Ok((best_cost, best))
    }

    fn offer(&self, cost: Cost, solution: &Solution) {
        let mut shared = self.best.write();
        if shared.as_ref().is_none_or(|(b, _)| cost < *b) {
            *shared = Some((cost, solution.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    fn small_params() -> SearchParams {
        SearchParams {
            rounds: 6,
            streams: 4,
            ..SearchParams::default()
        }
    }

    #[test]
    fn test_solve_small_instance() {
        let problem = test_utils::problem_from_grid(8, &[3, 1, 4, 2, 5], &[0]);
        let solver = Solver::new(problem, small_params());

        let solution = solver.solve().unwrap();

        assert!(solution.unassigned().is_empty());
        assert_eq!(solution.objective(), 1000);
        assert_eq!(solver.status(), SolverStatus::Completed);
        solution.validate().unwrap();
    }

    #[test]
    fn test_solve_is_deterministic() {
        let run = || {
            let problem = test_utils::problem_from_grid(10, &[3, 1, 4, 2, 5, 8, 7], &[0, 9]);
            let solver = Solver::new(problem, small_params());
            let solution = solver.solve().unwrap();
            (
                solution.objective(),
                solution
                    .routes()
                    .iter()
                    .map(|route| route.tasks().to_vec())
                    .collect::<Vec<_>>(),
                solution.unassigned().iter().copied().collect::<Vec<_>>(),
            )
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_stop_before_solve_returns_construction() {
        let problem = test_utils::problem_from_grid(8, &[3, 1, 4, 2], &[0]);
        let solver = Solver::new(problem, small_params());

        solver.stop();
        let solution = solver.solve().unwrap();

        // Cancelled immediately: still a valid solution.
        solution.validate().unwrap();
        assert!(solution.unassigned().is_empty());
    }
}
