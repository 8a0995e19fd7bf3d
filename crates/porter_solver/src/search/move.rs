use smallvec::SmallVec;

use crate::{
    problem::{instance::Problem, job::JobIdx, units::Cost, vehicle::VehicleIdx},
    solution::{route::Route, solution::Solution},
};

use super::{
    cross_exchange::CrossExchange,
    exchange::Exchange,
    intra_or_opt::IntraOrOpt,
    intra_two_opt::IntraTwoOpt,
    or_opt::OrOpt,
    pd_shift::PdShift,
    priority_replace::PriorityReplace,
    relocate::Relocate,
    route_exchange::RouteExchange,
    two_opt::{ReverseTwoOpt, TwoOpt},
    unassign::UnassignOnNeed,
};

/// One move family. Candidate generation feeds concrete moves to a consumer
/// in lexicographic position order; `gain` is the exact signed objective
/// delta; `is_valid` answers feasibility without mutating; `apply` commits
/// and recomputes the touched route caches.
pub trait Operator: Sized {
    fn generate<C>(solution: &Solution, pair: (VehicleIdx, VehicleIdx), consumer: C)
    where
        C: FnMut(Self);

    fn gain(&self, solution: &Solution) -> Cost;
    fn is_valid(&self, solution: &Solution) -> bool;
    fn apply(&self, solution: &mut Solution);
    fn updated_routes(&self) -> SmallVec<[VehicleIdx; 2]>;
}

/// Fixed-cost change when a route flips between used and unused.
pub(crate) fn fixed_delta(problem: &Problem, route: &Route, new_len: usize) -> Cost {
    let fixed = route.vehicle(problem).costs().fixed;
    match (route.is_empty(), new_len == 0) {
        (true, false) => fixed,
        (false, true) => -fixed,
        _ => 0,
    }
}

/// Segment replacement equivalent to "take the task at `from` out and
/// reinsert it just before the original slot `to`". Returns the replacement
/// segment and the replaced span.
pub(crate) fn rotate_single(
    tasks: &[JobIdx],
    from: usize,
    to: usize,
) -> (SmallVec<[JobIdx; 8]>, usize, usize) {
    debug_assert!(to != from && to != from + 1);
    let task = tasks[from];
    let mut seg = SmallVec::new();

    if from < to {
        seg.extend_from_slice(&tasks[from + 1..to]);
        seg.push(task);
        (seg, from, to)
    } else {
        seg.push(task);
        seg.extend_from_slice(&tasks[to..from]);
        (seg, to, from + 1)
    }
}

/// The closed catalog. Operators are a fixed set, so enum dispatch beats
/// virtual calls in the hot loop and keeps every kind inlinable.
#[derive(Debug, Clone)]
pub enum Move {
    Relocate(Relocate),
    Exchange(Exchange),
    OrOpt(OrOpt),
    TwoOpt(TwoOpt),
    ReverseTwoOpt(ReverseTwoOpt),
    CrossExchange(CrossExchange),
    IntraTwoOpt(IntraTwoOpt),
    IntraOrOpt(IntraOrOpt),
    PdShift(PdShift),
    RouteExchange(RouteExchange),
    PriorityReplace(PriorityReplace),
    UnassignOnNeed(UnassignOnNeed),
}

macro_rules! dispatch {
    ($self:expr, $op:ident => $body:expr) => {
        match $self {
            Move::Relocate($op) => $body,
            Move::Exchange($op) => $body,
            Move::OrOpt($op) => $body,
            Move::TwoOpt($op) => $body,
            Move::ReverseTwoOpt($op) => $body,
            Move::CrossExchange($op) => $body,
            Move::IntraTwoOpt($op) => $body,
            Move::IntraOrOpt($op) => $body,
            Move::PdShift($op) => $body,
            Move::RouteExchange($op) => $body,
            Move::PriorityReplace($op) => $body,
            Move::UnassignOnNeed($op) => $body,
        }
    };
}

impl Move {
    pub fn name(&self) -> &'static str {
        match self {
            Move::Relocate(_) => "relocate",
            Move::Exchange(_) => "exchange",
            Move::OrOpt(_) => "or-opt",
            Move::TwoOpt(_) => "two-opt",
            Move::ReverseTwoOpt(_) => "reverse-two-opt",
            Move::CrossExchange(_) => "cross-exchange",
            Move::IntraTwoOpt(_) => "intra-two-opt",
            Move::IntraOrOpt(_) => "intra-or-opt",
            Move::PdShift(_) => "pd-shift",
            Move::RouteExchange(_) => "route-exchange",
            Move::PriorityReplace(_) => "priority-replace",
            Move::UnassignOnNeed(_) => "unassign-on-need",
        }
    }

    pub fn gain(&self, solution: &Solution) -> Cost {
        dispatch!(self, op => op.gain(solution))
    }

    pub fn is_valid(&self, solution: &Solution) -> bool {
        dispatch!(self, op => op.is_valid(solution))
    }

    pub fn apply(&self, solution: &mut Solution) {
        dispatch!(self, op => op.apply(solution))
    }

    pub fn updated_routes(&self) -> SmallVec<[VehicleIdx; 2]> {
        dispatch!(self, op => op.updated_routes())
    }

    /// Whether applying this move changes the unassigned set, which
    /// invalidates cached moves that referenced it.
    pub fn touches_unassigned(&self) -> bool {
        matches!(self, Move::PriorityReplace(_) | Move::UnassignOnNeed(_))
    }
}
