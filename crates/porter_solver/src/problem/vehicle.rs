use serde::Serialize;

use crate::{
    define_rank,
    problem::{
        amount::Amount,
        job::{Skill, Skills},
        location::LocationIdx,
        profile::ProfileIdx,
        time_window::{TimeWindow, TimeWindows},
        units::{Cost, Distance, Duration},
    },
};

define_rank!(VehicleIdx indexes "vehicles");

/// Per-vehicle cost coefficients. `per_hour` prices scaled travel duration,
/// `per_km` travel distance, `fixed` is charged once when the vehicle serves
/// at least one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VehicleCosts {
    pub fixed: Cost,
    pub per_hour: Cost,
    pub per_km: Cost,
}

impl Default for VehicleCosts {
    fn default() -> Self {
        // One cost unit per travel second, distance free.
        VehicleCosts {
            fixed: 0,
            per_hour: 3600,
            per_km: 0,
        }
    }
}

/// A driver break. Breaks are not part of the task sequence; they are
/// scheduled deterministically from it, in window order.
#[derive(Debug, Clone, Serialize)]
pub struct Break {
    pub id: u64,
    pub time_windows: TimeWindows,
    pub service: Duration,
    pub max_load: Option<Amount>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepKind {
    Start,
    End,
    Job,
    Pickup,
    Delivery,
    Break,
}

/// A user-forced step in a vehicle route.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct VehicleStep {
    pub kind: StepKind,
    pub id: Option<u64>,
    pub service_at: Option<Duration>,
    pub service_after: Option<Duration>,
    pub service_before: Option<Duration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Vehicle {
    id: u64,
    start: Option<LocationIdx>,
    end: Option<LocationIdx>,
    profile: ProfileIdx,
    capacity: Amount,
    skills: Skills,
    time_window: TimeWindow,
    breaks: Vec<Break>,
    costs: VehicleCosts,
    speed_factor: f64,
    max_tasks: Option<usize>,
    max_travel_time: Option<Duration>,
    max_distance: Option<Distance>,
    steps: Vec<VehicleStep>,
    description: String,
}

impl Vehicle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn start(&self) -> Option<LocationIdx> {
        self.start
    }

    pub fn end(&self) -> Option<LocationIdx> {
        self.end
    }

    pub fn profile(&self) -> ProfileIdx {
        self.profile
    }

    pub fn capacity(&self) -> &Amount {
        &self.capacity
    }

    pub fn skills(&self) -> &Skills {
        &self.skills
    }

    pub fn time_window(&self) -> TimeWindow {
        self.time_window
    }

    pub fn breaks(&self) -> &[Break] {
        &self.breaks
    }

    pub fn costs(&self) -> VehicleCosts {
        self.costs
    }

    pub fn speed_factor(&self) -> f64 {
        self.speed_factor
    }

    pub fn max_tasks(&self) -> Option<usize> {
        self.max_tasks
    }

    pub fn max_travel_time(&self) -> Option<Duration> {
        self.max_travel_time
    }

    pub fn max_distance(&self) -> Option<Distance> {
        self.max_distance
    }

    pub fn steps(&self) -> &[VehicleStep] {
        &self.steps
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// True when the same profile, speed and coefficients make two vehicles
    /// interchangeable for edge-cost purposes.
    pub fn costs_equal(&self, other: &Vehicle) -> bool {
        self.profile == other.profile
            && self.speed_factor == other.speed_factor
            && self.costs.per_hour == other.costs.per_hour
            && self.costs.per_km == other.costs.per_km
    }

    pub fn can_serve_skills(&self, required: &Skills) -> bool {
        required.is_subset(&self.skills)
    }
}

#[derive(Default)]
pub struct VehicleBuilder {
    id: Option<u64>,
    start: Option<usize>,
    end: Option<usize>,
    profile: Option<usize>,
    capacity: Option<Amount>,
    skills: Option<Vec<Skill>>,
    time_window: Option<TimeWindow>,
    breaks: Option<Vec<Break>>,
    costs: Option<VehicleCosts>,
    speed_factor: Option<f64>,
    max_tasks: Option<usize>,
    max_travel_time: Option<Duration>,
    max_distance: Option<Distance>,
    steps: Option<Vec<VehicleStep>>,
    description: Option<String>,
}

impl VehicleBuilder {
    pub fn set_id(&mut self, id: u64) -> &mut Self {
        self.id = Some(id);
        self
    }

    pub fn set_start(&mut self, start: usize) -> &mut Self {
        self.start = Some(start);
        self
    }

    pub fn set_end(&mut self, end: usize) -> &mut Self {
        self.end = Some(end);
        self
    }

    pub fn set_profile(&mut self, profile: usize) -> &mut Self {
        self.profile = Some(profile);
        self
    }

    pub fn set_capacity(&mut self, capacity: Amount) -> &mut Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn set_skills(&mut self, skills: Vec<Skill>) -> &mut Self {
        self.skills = Some(skills);
        self
    }

    pub fn set_time_window(&mut self, time_window: TimeWindow) -> &mut Self {
        self.time_window = Some(time_window);
        self
    }

    pub fn set_breaks(&mut self, breaks: Vec<Break>) -> &mut Self {
        self.breaks = Some(breaks);
        self
    }

    pub fn set_costs(&mut self, costs: VehicleCosts) -> &mut Self {
        self.costs = Some(costs);
        self
    }

    pub fn set_speed_factor(&mut self, speed_factor: f64) -> &mut Self {
        self.speed_factor = Some(speed_factor);
        self
    }

    pub fn set_max_tasks(&mut self, max_tasks: usize) -> &mut Self {
        self.max_tasks = Some(max_tasks);
        self
    }

    pub fn set_max_travel_time(&mut self, max_travel_time: Duration) -> &mut Self {
        self.max_travel_time = Some(max_travel_time);
        self
    }

    pub fn set_max_distance(&mut self, max_distance: Distance) -> &mut Self {
        self.max_distance = Some(max_distance);
        self
    }

    pub fn set_steps(&mut self, steps: Vec<VehicleStep>) -> &mut Self {
        self.steps = Some(steps);
        self
    }

    pub fn set_description(&mut self, description: String) -> &mut Self {
        self.description = Some(description);
        self
    }

    pub fn build(self) -> Vehicle {
        let mut breaks = self.breaks.unwrap_or_default();
        // Deterministic scheduling order: by first window, then id.
        breaks.sort_by_key(|b| {
            (
                b.time_windows.earliest_start(),
                b.time_windows.latest_end(),
                b.id,
            )
        });

        Vehicle {
            id: self.id.expect("vehicle id is required"),
            start: self.start.map(LocationIdx::new),
            end: self.end.map(LocationIdx::new),
            profile: ProfileIdx::new(self.profile.unwrap_or(0)),
            capacity: self.capacity.unwrap_or_default(),
            skills: Skills::from_iter(self.skills.unwrap_or_default()),
            time_window: self.time_window.unwrap_or_default(),
            breaks,
            costs: self.costs.unwrap_or_default(),
            speed_factor: self.speed_factor.unwrap_or(1.0),
            max_tasks: self.max_tasks,
            max_travel_time: self.max_travel_time,
            max_distance: self.max_distance,
            steps: self.steps.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
        }
    }
}
