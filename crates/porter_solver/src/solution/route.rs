use fxhash::FxHashMap;

use crate::problem::{
    amount::Amount,
    instance::Problem,
    job::JobIdx,
    location::LocationIdx,
    units::{Duration, Eval, TIME_HORIZON},
    vehicle::{Vehicle, VehicleIdx},
};
use crate::solution::schedule::{self, Schedule};

/// One vehicle's task sequence plus the cached state that makes move
/// evaluation cheap: prefix loads and peaks, the earliest schedule, latest
/// feasible service starts, and cumulative travel.
///
/// All caches are recomputed on commit ([`replace_segment`]); the query
/// methods never mutate.
///
/// [`replace_segment`]: Route::replace_segment
#[derive(Debug, Clone)]
pub struct Route {
    vehicle: VehicleIdx,
    tasks: Vec<JobIdx>,
    positions: FxHashMap<JobIdx, usize>,

    /// Earliest feasible timing of the current sequence.
    schedule: Schedule,
    /// Latest feasible service start per position, computed backward from
    /// the shift end. Only maintained while `timing_exact` holds.
    latest: Vec<Duration>,

    /// `load[i]` is the on-board amount after serving `i` tasks;
    /// `load[0]` is what leaves the start depot.
    load: Vec<Amount>,
    /// Prefix sums of depot-loaded (single-job) deliveries; length `n + 1`.
    fwd_initial: Vec<Amount>,
    /// `fwd_peak[i]` = component-wise max of `load[0..=i]`.
    fwd_peak: Vec<Amount>,
    /// `bwd_peak[i]` = component-wise max of `load[i..=n]`.
    bwd_peak: Vec<Amount>,

    /// `fwd_eval[i]` = travel from the route start through the arrival at
    /// task `i - 1`; `fwd_eval[0]` is zero.
    fwd_eval: Vec<Eval>,
    /// Whole-route travel including the final leg; zero for an unused route.
    total: Eval,

    /// Occurrences of each location in the sequence, for setup handling.
    loc_counts: FxHashMap<LocationIdx, u32>,
    /// When true, the incremental slack-based timing check is exact; breaks
    /// or repeated setup locations force the full-simulation fallback.
    timing_exact: bool,
}

impl Route {
    pub fn empty(problem: &Problem, vehicle: VehicleIdx) -> Self {
        let mut route = Route {
            vehicle,
            tasks: Vec::new(),
            positions: FxHashMap::default(),
            schedule: Schedule::default(),
            latest: Vec::new(),
            load: Vec::new(),
            fwd_initial: Vec::new(),
            fwd_peak: Vec::new(),
            bwd_peak: Vec::new(),
            fwd_eval: Vec::new(),
            total: Eval::ZERO,
            loc_counts: FxHashMap::default(),
            timing_exact: true,
        };
        route.recompute(problem);
        route
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[JobIdx] {
        &self.tasks
    }

    pub fn task(&self, position: usize) -> JobIdx {
        self.tasks[position]
    }

    pub fn position_of(&self, job: JobIdx) -> Option<usize> {
        self.positions.get(&job).copied()
    }

    pub fn contains(&self, job: JobIdx) -> bool {
        self.positions.contains_key(&job)
    }

    pub fn vehicle_idx(&self) -> VehicleIdx {
        self.vehicle
    }

    pub fn vehicle<'a>(&self, problem: &'a Problem) -> &'a Vehicle {
        problem.vehicle(self.vehicle)
    }

    /// Whole-route travel; zero when the route is unused.
    pub fn total(&self) -> Eval {
        self.total
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn latest(&self, position: usize) -> Duration {
        self.latest[position]
    }

    /// On-board amount after serving `count` tasks (`0` = leaving the start).
    pub fn load_after(&self, count: usize) -> &Amount {
        &self.load[count]
    }

    pub fn location_at(&self, problem: &Problem, position: usize) -> LocationIdx {
        problem.job(self.tasks[position]).location()
    }

    /// Location preceding insertion slot `position` (`0..=n`): the previous
    /// task, or the vehicle start.
    pub fn prev_location(&self, problem: &Problem, position: usize) -> Option<LocationIdx> {
        if position == 0 {
            self.vehicle(problem).start()
        } else {
            Some(self.location_at(problem, position - 1))
        }
    }

    /// Location occupying slot `position`: the task currently there, or the
    /// vehicle end past the last task.
    pub fn slot_location(&self, problem: &Problem, position: usize) -> Option<LocationIdx> {
        if position < self.tasks.len() {
            Some(self.location_at(problem, position))
        } else {
            self.vehicle(problem).end()
        }
    }

    /// One travel leg under this route's vehicle; zero on open ends.
    pub fn edge(
        &self,
        problem: &Problem,
        from: Option<LocationIdx>,
        to: Option<LocationIdx>,
    ) -> Eval {
        problem.eval_between(self.vehicle(problem), from, to)
    }

    /// Exact travel change if positions `[start, end)` were replaced by
    /// `seg`. Service, setup and waiting never enter travel, so this is also
    /// the route's exact cost delta.
    pub fn eval_delta_replace(
        &self,
        problem: &Problem,
        seg: &[JobIdx],
        start: usize,
        end: usize,
    ) -> Eval {
        let n = self.tasks.len();
        debug_assert!(start <= end && end <= n);

        let old = if end < n {
            self.fwd_eval[end + 1] - self.fwd_eval[start]
        } else {
            self.total - self.fwd_eval[start]
        };

        if seg.is_empty() && start == 0 && end == n {
            // The route becomes unused.
            return Eval::ZERO - old;
        }

        let vehicle = self.vehicle(problem);
        let mut new = Eval::ZERO;
        let mut prev = self.prev_location(problem, start);
        for &rank in seg {
            let location = problem.job(rank).location();
            new += problem.eval_between(vehicle, prev, Some(location));
            prev = Some(location);
        }
        new += problem.eval_between(vehicle, prev, self.slot_location(problem, end));

        new - old
    }

    /// Feasibility of replacing `[start, end)` by `seg` under every
    /// constraint this route carries.
    pub fn can_replace(
        &self,
        problem: &Problem,
        seg: &[JobIdx],
        start: usize,
        end: usize,
    ) -> bool {
        self.check_limits(problem, seg, start, end)
            && self.check_capacity(problem, seg, start, end)
            && self.check_timing(problem, seg, start, end)
    }

    fn check_limits(&self, problem: &Problem, seg: &[JobIdx], start: usize, end: usize) -> bool {
        let vehicle = self.vehicle(problem);

        if let Some(max_tasks) = vehicle.max_tasks()
            && self.tasks.len() - (end - start) + seg.len() > max_tasks
        {
            return false;
        }

        if vehicle.max_travel_time().is_some() || vehicle.max_distance().is_some() {
            let delta = self.eval_delta_replace(problem, seg, start, end);
            if let Some(max_travel_time) = vehicle.max_travel_time()
                && self.total.duration + delta.duration > max_travel_time
            {
                return false;
            }
            if let Some(max_distance) = vehicle.max_distance()
                && self.total.distance + delta.distance > max_distance
            {
                return false;
            }
        }

        true
    }

    fn check_capacity(&self, problem: &Problem, seg: &[JobIdx], start: usize, end: usize) -> bool {
        let capacity = self.vehicle(problem).capacity();

        // Change in what must leave the start depot.
        let mut delta_init = Amount::with_dimensions(problem.amount_dims());
        for &rank in seg {
            if let Some(initial) = problem.job(rank).initial_load() {
                delta_init += initial;
            }
        }
        delta_init -= &(&self.fwd_initial[end] - &self.fwd_initial[start]);

        // Every load position up to `start` shifts by the initial delta.
        if !(&self.fwd_peak[start] + &delta_init).fits_within(capacity) {
            return false;
        }

        // Walk the new segment.
        let mut running = &self.load[start] + &delta_init;
        for &rank in seg {
            problem.job(rank).apply_load_change(&mut running);
            if !running.fits_within(capacity) {
                return false;
            }
        }

        // Positions from `end` on shift by whatever the segment left behind.
        let delta_after = &running - &self.load[end];
        (&self.bwd_peak[end] + &delta_after).fits_within(capacity)
    }

    fn check_timing(&self, problem: &Problem, seg: &[JobIdx], start: usize, end: usize) -> bool {
        if !problem.has_time_windows() && !problem.has_unreachable_legs() {
            return true;
        }

        if !self.replace_timing_exact(problem, seg, start, end) {
            let mut candidate = Vec::with_capacity(self.tasks.len() - (end - start) + seg.len());
            candidate.extend_from_slice(&self.tasks[..start]);
            candidate.extend_from_slice(seg);
            candidate.extend_from_slice(&self.tasks[end..]);
            return schedule::simulate(problem, self.vehicle, &candidate).is_some();
        }

        let vehicle = self.vehicle(problem);
        let tw = vehicle.time_window();

        let mut t = if start == 0 {
            tw.start
        } else {
            self.schedule.departure[start - 1]
        };
        let mut prev = self.prev_location(problem, start);

        let suffix = &self.tasks[end..];
        for (index, &rank) in seg.iter().chain(suffix.iter()).enumerate() {
            let job = problem.job(rank);
            let leg = problem
                .eval_between(vehicle, prev, Some(job.location()))
                .duration;
            if leg >= TIME_HORIZON {
                return false;
            }

            let arrival = t + leg;
            let Some(service_start) = job.time_windows().earliest_from(arrival) else {
                return false;
            };

            let original = index.checked_sub(seg.len()).map(|offset| end + offset);
            if let Some(position) = original
                && service_start > self.latest[position]
            {
                return false;
            }

            let departure = service_start + job.setup() + job.service();
            if departure > tw.end {
                return false;
            }

            // Once an unchanged task leaves no later than before, the rest
            // of the route is untouched.
            if let Some(position) = original
                && departure <= self.schedule.departure[position]
            {
                return true;
            }

            t = departure;
            prev = Some(job.location());
        }

        let final_leg = problem.eval_between(vehicle, prev, vehicle.end()).duration;
        final_leg < TIME_HORIZON && t + final_leg <= tw.end
    }

    /// Whether the incremental timing walk is exact for this change. Breaks
    /// always force the fallback; so does any nonzero setup whose location
    /// occurs more than once across the untouched route and the segment.
    fn replace_timing_exact(
        &self,
        problem: &Problem,
        seg: &[JobIdx],
        start: usize,
        end: usize,
    ) -> bool {
        if !self.timing_exact {
            return false;
        }

        seg.iter().all(|&rank| {
            let job = problem.job(rank);
            if job.setup() == 0 {
                return true;
            }

            let location = job.location();
            let in_route = self.loc_counts.get(&location).copied().unwrap_or(0) as usize;
            let in_span = self.tasks[start..end]
                .iter()
                .filter(|&&t| problem.job(t).location() == location)
                .count();
            let in_seg = seg
                .iter()
                .filter(|&&t| problem.job(t).location() == location)
                .count();

            // Unique once the replaced span is gone.
            in_route == in_span && in_seg == 1
        })
    }

    /// True when some shipment has both halves inside `[start, end)`;
    /// reversing such a span would break the pickup-before-delivery order.
    pub fn span_contains_shipment_pair(
        &self,
        problem: &Problem,
        start: usize,
        end: usize,
    ) -> bool {
        self.tasks[start..end].iter().any(|&rank| {
            problem
                .partner(rank)
                .and_then(|partner| self.position_of(partner))
                .is_some_and(|pos| start <= pos && pos < end)
        })
    }

    /// True when some shipment straddles the cut: pickup before `cut`,
    /// delivery at or after it. Tail exchanges must refuse such cuts.
    pub fn splits_shipment(&self, problem: &Problem, cut: usize) -> bool {
        self.tasks[cut..].iter().any(|&rank| {
            problem
                .partner(rank)
                .and_then(|partner| self.position_of(partner))
                .is_some_and(|pos| pos < cut)
        })
    }

    /// Commits a segment replacement and rebuilds every cache.
    pub fn replace_segment(
        &mut self,
        problem: &Problem,
        seg: &[JobIdx],
        start: usize,
        end: usize,
    ) {
        self.tasks.splice(start..end, seg.iter().copied());
        self.recompute(problem);
    }

    fn recompute(&mut self, problem: &Problem) {
        let n = self.tasks.len();
        let vehicle = self.vehicle(problem);
        let dims = problem.amount_dims();

        self.positions.clear();
        self.positions
            .extend(self.tasks.iter().enumerate().map(|(i, &rank)| (rank, i)));
        debug_assert_eq!(self.positions.len(), n, "duplicate task in route");

        self.loc_counts.clear();
        for &rank in &self.tasks {
            *self.loc_counts.entry(problem.job(rank).location()).or_insert(0) += 1;
        }

        self.timing_exact = vehicle.breaks().is_empty()
            && !self.tasks.iter().any(|&rank| {
                let job = problem.job(rank);
                job.setup() > 0 && self.loc_counts[&job.location()] > 1
            });

        // Loads.
        self.load.clear();
        self.fwd_initial.clear();
        self.fwd_peak.clear();

        let mut initial = Amount::with_dimensions(dims);
        let mut fwd_initial_running = Amount::with_dimensions(dims);
        self.fwd_initial.push(fwd_initial_running.clone());
        for &rank in &self.tasks {
            if let Some(load) = problem.job(rank).initial_load() {
                initial += load;
                fwd_initial_running += load;
            }
            self.fwd_initial.push(fwd_initial_running.clone());
        }

        let mut running = initial;
        self.load.push(running.clone());
        for &rank in &self.tasks {
            problem.job(rank).apply_load_change(&mut running);
            self.load.push(running.clone());
        }

        let mut peak = Amount::with_dimensions(dims);
        for load in &self.load {
            peak.update_max(load);
            self.fwd_peak.push(peak.clone());
        }

        self.bwd_peak.clear();
        self.bwd_peak.resize(n + 1, Amount::with_dimensions(dims));
        let mut peak = Amount::with_dimensions(dims);
        for i in (0..=n).rev() {
            peak.update_max(&self.load[i]);
            self.bwd_peak[i].update(&peak);
        }

        // Travel.
        self.fwd_eval.clear();
        self.fwd_eval.push(Eval::ZERO);
        let mut cumulative = Eval::ZERO;
        let mut prev = vehicle.start();
        for &rank in &self.tasks {
            let location = problem.job(rank).location();
            cumulative += problem.eval_between(vehicle, prev, Some(location));
            self.fwd_eval.push(cumulative);
            prev = Some(location);
        }
        self.total = if n == 0 {
            Eval::ZERO
        } else {
            cumulative + problem.eval_between(vehicle, prev, vehicle.end())
        };

        // Timing.
        if n == 0 {
            self.schedule = Schedule {
                start_time: vehicle.time_window().start,
                end_time: vehicle.time_window().start,
                ..Schedule::default()
            };
            self.latest.clear();
            return;
        }

        self.schedule = schedule::simulate(problem, self.vehicle, &self.tasks)
            .expect("committed route must stay feasible");

        self.latest.clear();
        self.latest.resize(n, TIME_HORIZON);
        if self.timing_exact {
            let tw = vehicle.time_window();
            let mut bound = tw.end;
            let mut next_loc: Option<LocationIdx> = vehicle.end();
            for i in (0..n).rev() {
                let job = problem.job(self.tasks[i]);
                let leg = problem
                    .eval_between(vehicle, Some(job.location()), next_loc)
                    .duration;
                let start_bound = bound - leg - job.service() - job.setup();
                bound = job
                    .time_windows()
                    .latest_until(start_bound)
                    .expect("schedule exists, so a latest start must too");
                self.latest[i] = bound;
                next_loc = Some(job.location());
            }
        }
    }
}
