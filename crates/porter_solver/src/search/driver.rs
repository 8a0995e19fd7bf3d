use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace};

use crate::{
    problem::{units::Cost, vehicle::VehicleIdx},
    search::{
        cross_exchange::CrossExchange,
        exchange::Exchange,
        intra_or_opt::IntraOrOpt,
        intra_two_opt::IntraTwoOpt,
        or_opt::OrOpt,
        pd_shift::PdShift,
        priority_replace::PriorityReplace,
        r#move::{Move, Operator},
        relocate::Relocate,
        route_exchange::RouteExchange,
        two_opt::{ReverseTwoOpt, TwoOpt},
        unassign::UnassignOnNeed,
    },
    solution::solution::Solution,
};

#[derive(Debug, Clone)]
enum CacheEntry {
    Stale,
    NoMove,
    /// Gain, class rank in the catalog, and the move itself. The class rank
    /// rides along so equal gains can be settled across pairs.
    Best(Cost, usize, Move),
}

/// Best-improvement descent over the operator catalog.
///
/// The best move of every compatible route pair is cached and only
/// re-evaluated when one of its routes changed, so each applied move costs
/// one row and one column of re-evaluation instead of a full sweep. Equal
/// gains are settled by operator class first, across the whole move set,
/// then by route pair and generation order (lexicographic in route and
/// rank), which keeps the descent deterministic.
pub struct LocalSearch {
    cache: Vec<CacheEntry>,
    routes: usize,
}

impl LocalSearch {
    pub fn new(routes: usize) -> Self {
        LocalSearch {
            cache: vec![CacheEntry::Stale; routes * routes],
            routes,
        }
    }

    /// Applies strictly improving moves until none remains, the move budget
    /// runs out, or the cancel flag trips. Returns the number of applied
    /// moves.
    pub fn descend(
        &mut self,
        solution: &mut Solution,
        move_limit: usize,
        cancel: &AtomicBool,
    ) -> usize {
        debug_assert_eq!(self.routes, solution.routes().len());
        self.invalidate_all();

        let mut applied = 0;
        while applied < move_limit {
            if cancel.load(Ordering::Relaxed) {
                break;
            }

            self.refresh(solution);

            let Some((pair, cost)) = self.best_pair() else {
                break;
            };
            let CacheEntry::Best(_, _, best) = self.cache[pair].clone() else {
                unreachable!("best_pair only returns Best entries");
            };

            trace!(gain = cost, operator = best.name(), "applying move");
            best.apply(solution);
            solution.debug_validate();
            applied += 1;

            self.invalidate_after(&best);
        }

        debug!(applied, objective = solution.objective(), "descent finished");
        applied
    }

    fn refresh(&mut self, solution: &Solution) {
        for r1 in 0..self.routes {
            for r2 in 0..self.routes {
                let index = r1 * self.routes + r2;
                if !matches!(self.cache[index], CacheEntry::Stale) {
                    continue;
                }

                let pair = (VehicleIdx::new(r1), VehicleIdx::new(r2));
                if !solution.problem().vehicles_overlap(pair.0, pair.1) {
                    self.cache[index] = CacheEntry::NoMove;
                    continue;
                }

                self.cache[index] = evaluate_pair(solution, pair);
            }
        }
    }

    /// Index and gain of the best cached move, compared by
    /// `(gain, class rank)`: class priority is the primary tie-break over
    /// the whole move set, and the strict comparison leaves full ties to
    /// the earliest pair.
    fn best_pair(&self) -> Option<(usize, Cost)> {
        let mut best: Option<(usize, Cost, usize)> = None;
        for (index, entry) in self.cache.iter().enumerate() {
            if let CacheEntry::Best(cost, class, _) = entry
                && best.map_or(true, |(_, b_cost, b_class)| (*cost, *class) < (b_cost, b_class))
            {
                best = Some((index, *cost, *class));
            }
        }
        best.map(|(index, cost, _)| (index, cost))
    }

    fn invalidate_all(&mut self) {
        self.cache.fill(CacheEntry::Stale);
    }

    fn invalidate_after(&mut self, applied: &Move) {
        for touched in applied.updated_routes() {
            let t = touched.get();
            for other in 0..self.routes {
                self.cache[t * self.routes + other] = CacheEntry::Stale;
                self.cache[other * self.routes + t] = CacheEntry::Stale;
            }
        }

        // Moves referencing the unassigned set are stale everywhere once it
        // changed.
        if applied.touches_unassigned() {
            for r in 0..self.routes {
                self.cache[r * self.routes + r] = CacheEntry::Stale;
            }
        }
    }
}

/// Best valid improving move for one route pair, keyed by
/// `(gain, class rank)`; within a class the strict comparison keeps the
/// first candidate in generation order.
fn evaluate_pair(solution: &Solution, pair: (VehicleIdx, VehicleIdx)) -> CacheEntry {
    let mut best: Option<(Cost, usize, Move)> = None;

    macro_rules! scan {
        ($operator:ty, $variant:path, $class:expr) => {
            <$operator>::generate(solution, pair, |op| {
                let gain = op.gain(solution);
                let improves = gain < 0
                    && best
                        .as_ref()
                        .map_or(true, |(b_gain, b_class, _)| (gain, $class) < (*b_gain, *b_class));
                if improves && op.is_valid(solution) {
                    best = Some((gain, $class, $variant(op)));
                }
            });
        };
    }

    scan!(Relocate, Move::Relocate, 0);
    scan!(Exchange, Move::Exchange, 1);
    scan!(OrOpt, Move::OrOpt, 2);
    scan!(TwoOpt, Move::TwoOpt, 3);
    scan!(ReverseTwoOpt, Move::ReverseTwoOpt, 4);
    scan!(CrossExchange, Move::CrossExchange, 5);
    scan!(IntraTwoOpt, Move::IntraTwoOpt, 6);
    scan!(IntraOrOpt, Move::IntraOrOpt, 7);
    scan!(PdShift, Move::PdShift, 8);
    scan!(RouteExchange, Move::RouteExchange, 9);
    scan!(PriorityReplace, Move::PriorityReplace, 10);
    scan!(UnassignOnNeed, Move::UnassignOnNeed, 11);

    match best {
        Some((cost, class, mv)) => CacheEntry::Best(cost, class, mv),
        None => CacheEntry::NoMove,
    }
}
