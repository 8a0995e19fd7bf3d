use std::collections::BTreeSet;
use std::sync::Arc;

use crate::{
    config::EngineConfig,
    problem::{
        instance::Problem,
        job::{JobIdx, JobKind},
        units::{Cost, Eval},
        vehicle::VehicleIdx,
    },
    solution::route::Route,
};

/// One route per vehicle plus the set of unassigned tasks. Streams own their
/// solution exclusively; the problem is shared read-only.
///
/// Iteration order of `unassigned` is part of the determinism contract, hence
/// the ordered set.
#[derive(Clone)]
pub struct Solution {
    problem: Arc<Problem>,
    routes: Vec<Route>,
    unassigned: BTreeSet<JobIdx>,
}

impl Solution {
    pub fn new(problem: Arc<Problem>) -> Self {
        let routes = VehicleIdx::all(problem.vehicles().len())
            .map(|vehicle| Route::empty(&problem, vehicle))
            .collect();
        let unassigned = JobIdx::all(problem.jobs().len()).collect();

        Solution {
            problem,
            routes,
            unassigned,
        }
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn problem_arc(&self) -> &Arc<Problem> {
        &self.problem
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn route(&self, vehicle: VehicleIdx) -> &Route {
        &self.routes[vehicle.get()]
    }

    pub fn route_mut(&mut self, vehicle: VehicleIdx) -> &mut Route {
        &mut self.routes[vehicle.get()]
    }

    pub fn unassigned(&self) -> &BTreeSet<JobIdx> {
        &self.unassigned
    }

    pub fn is_unassigned(&self, job: JobIdx) -> bool {
        self.unassigned.contains(&job)
    }

    pub fn mark_assigned(&mut self, job: JobIdx) {
        self.unassigned.remove(&job);
    }

    pub fn mark_unassigned(&mut self, job: JobIdx) {
        self.unassigned.insert(job);
    }

    /// Replaces a whole route's content in one commit, adjusting the
    /// unassigned set on both sides of the change.
    pub fn seed_route(&mut self, vehicle: VehicleIdx, tasks: &[JobIdx]) {
        let problem = Arc::clone(&self.problem);
        let route = &mut self.routes[vehicle.get()];
        let previous: Vec<JobIdx> = route.tasks().to_vec();
        let end = route.len();
        route.replace_segment(&problem, tasks, 0, end);

        for rank in previous {
            self.unassigned.insert(rank);
        }
        for &rank in tasks {
            self.unassigned.remove(&rank);
        }
    }

    /// Removes every task of a route, returning them to the unassigned set.
    pub fn clear_route(&mut self, vehicle: VehicleIdx) -> Vec<JobIdx> {
        let problem = Arc::clone(&self.problem);
        let route = &mut self.routes[vehicle.get()];
        let removed: Vec<JobIdx> = route.tasks().to_vec();
        let end = route.len();
        route.replace_segment(&problem, &[], 0, end);

        for &rank in &removed {
            self.unassigned.insert(rank);
        }
        removed
    }

    /// Removes one task (and its shipment partner) from wherever it is
    /// served, returning the affected vehicle.
    pub fn unassign_task(&mut self, job: JobIdx) -> Option<VehicleIdx> {
        let vehicle = self.route_of(job)?;
        let partner = self.problem.partner(job);

        let problem = Arc::clone(&self.problem);
        let route = &mut self.routes[vehicle.get()];
        let remaining: Vec<JobIdx> = route
            .tasks()
            .iter()
            .copied()
            .filter(|&task| task != job && Some(task) != partner)
            .collect();
        let end = route.len();
        route.replace_segment(&problem, &remaining, 0, end);

        self.unassigned.insert(job);
        if let Some(partner) = partner {
            self.unassigned.insert(partner);
        }
        Some(vehicle)
    }

    pub fn route_of(&self, job: JobIdx) -> Option<VehicleIdx> {
        self.routes
            .iter()
            .find(|route| route.contains(job))
            .map(Route::vehicle_idx)
    }

    pub fn used_routes(&self) -> usize {
        self.routes.iter().filter(|route| !route.is_empty()).count()
    }

    pub fn assigned_count(&self) -> usize {
        self.problem.jobs().len() - self.unassigned.len()
    }

    /// Total travel over all routes.
    pub fn travel(&self) -> Eval {
        self.routes.iter().map(Route::total).sum()
    }

    pub fn priority_penalty(&self) -> Cost {
        let weight = EngineConfig::global().priority_weight;
        self.unassigned
            .iter()
            .map(|&rank| self.problem.job(rank).priority() as Cost * weight)
            .sum()
    }

    /// The minimized objective: travel cost, fixed cost of used vehicles,
    /// and the weighted priority of whatever stays unassigned.
    pub fn objective(&self) -> Cost {
        let fixed: Cost = self
            .routes
            .iter()
            .filter(|route| !route.is_empty())
            .map(|route| route.vehicle(&self.problem).costs().fixed)
            .sum();

        self.travel().cost + fixed + self.priority_penalty()
    }

    /// Full invariant sweep, used by tests and debug builds after commits.
    pub fn validate(&self) -> Result<(), String> {
        let problem = &*self.problem;
        let mut seen = BTreeSet::new();

        for route in &self.routes {
            let vehicle = route.vehicle(problem);

            for (position, &rank) in route.tasks().iter().enumerate() {
                if !seen.insert(rank) {
                    return Err(format!("task {rank} served twice"));
                }
                if self.unassigned.contains(&rank) {
                    return Err(format!("task {rank} both served and unassigned"));
                }

                let job = problem.job(rank);

                if !vehicle.can_serve_skills(job.skills()) {
                    return Err(format!(
                        "vehicle {} lacks skills for job {}",
                        vehicle.id(),
                        job.id()
                    ));
                }

                if job.kind() == JobKind::Delivery {
                    let pickup = problem.partner(rank).expect("delivery has a partner");
                    match route.position_of(pickup) {
                        Some(pickup_pos) if pickup_pos < position => {}
                        _ => {
                            return Err(format!(
                                "delivery {} served without its pickup before it",
                                job.id()
                            ));
                        }
                    }
                }

                let start = route.schedule().service_start[position];
                if !job.time_windows().contains(start) {
                    return Err(format!("job {} served at {start} outside windows", job.id()));
                }
            }

            for count in 0..=route.len() {
                let load = route.load_after(count);
                if !load.fits_within(vehicle.capacity()) {
                    return Err(format!(
                        "route of vehicle {} overloaded after {count} tasks",
                        vehicle.id()
                    ));
                }
                if load.iter().any(|v| v < 0) {
                    return Err(format!(
                        "route of vehicle {} has negative load after {count} tasks",
                        vehicle.id()
                    ));
                }
            }

            if !route.is_empty() {
                let tw = vehicle.time_window();
                if route.schedule().start_time < tw.start || route.schedule().end_time > tw.end {
                    return Err(format!("route of vehicle {} leaves its shift", vehicle.id()));
                }
            }

            if let Some(max_tasks) = vehicle.max_tasks()
                && route.len() > max_tasks
            {
                return Err(format!("vehicle {} serves too many tasks", vehicle.id()));
            }
            if let Some(max_travel_time) = vehicle.max_travel_time()
                && route.total().duration > max_travel_time
            {
                return Err(format!("vehicle {} travels too long", vehicle.id()));
            }
            if let Some(max_distance) = vehicle.max_distance()
                && route.total().distance > max_distance
            {
                return Err(format!("vehicle {} travels too far", vehicle.id()));
            }
        }

        for rank in JobIdx::all(problem.jobs().len()) {
            if !seen.contains(&rank) && !self.unassigned.contains(&rank) {
                return Err(format!("task {rank} neither served nor unassigned"));
            }
        }

        Ok(())
    }

    /// Debug-build invariant check after every operator commit.
    #[inline]
    pub fn debug_validate(&self) {
        #[cfg(debug_assertions)]
        if let Err(violation) = self.validate() {
            panic!("solution invariant violated: {violation}");
        }
    }
}
