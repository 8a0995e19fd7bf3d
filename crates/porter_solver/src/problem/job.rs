use fxhash::FxHashSet;
use serde::Serialize;

use crate::{
    define_rank,
    problem::{
        amount::Amount,
        location::LocationIdx,
        time_window::TimeWindows,
        units::Duration,
    },
};

define_rank!(JobIdx indexes "jobs");

pub type Skill = u64;
pub type Skills = FxHashSet<Skill>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobKind {
    /// Standalone task; its delivery leaves the start depot with the vehicle
    /// and its pickup rides along to the end.
    Single,
    /// First half of a shipment.
    Pickup,
    /// Second half of a shipment, served after its pickup on the same route.
    Delivery,
}

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    id: u64,
    kind: JobKind,
    location: LocationIdx,
    setup: Duration,
    service: Duration,
    delivery: Amount,
    pickup: Amount,
    skills: Skills,
    priority: u32,
    time_windows: TimeWindows,
    description: String,
}

impl Job {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn location(&self) -> LocationIdx {
        self.location
    }

    pub fn setup(&self) -> Duration {
        self.setup
    }

    pub fn service(&self) -> Duration {
        self.service
    }

    pub fn delivery(&self) -> &Amount {
        &self.delivery
    }

    pub fn pickup(&self) -> &Amount {
        &self.pickup
    }

    pub fn skills(&self) -> &Skills {
        &self.skills
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn time_windows(&self) -> &TimeWindows {
        &self.time_windows
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_shipment_part(&self) -> bool {
        self.kind != JobKind::Single
    }

    /// Contribution to the load the vehicle must carry out of its start
    /// depot. Shipment deliveries are picked up en route, not at the depot.
    pub fn initial_load(&self) -> Option<&Amount> {
        match self.kind {
            JobKind::Single => Some(&self.delivery),
            JobKind::Pickup | JobKind::Delivery => None,
        }
    }

    /// Signed load change when this task is served.
    pub fn apply_load_change(&self, load: &mut Amount) {
        *load += &self.pickup;
        *load -= &self.delivery;
    }
}

#[derive(Default)]
pub struct JobBuilder {
    id: Option<u64>,
    kind: Option<JobKind>,
    location: Option<usize>,
    setup: Option<Duration>,
    service: Option<Duration>,
    delivery: Option<Amount>,
    pickup: Option<Amount>,
    skills: Option<Vec<Skill>>,
    priority: Option<u32>,
    time_windows: Option<TimeWindows>,
    description: Option<String>,
}

impl JobBuilder {
    pub fn set_id(&mut self, id: u64) -> &mut Self {
        self.id = Some(id);
        self
    }

    pub fn set_kind(&mut self, kind: JobKind) -> &mut Self {
        self.kind = Some(kind);
        self
    }

    pub fn set_location(&mut self, location: usize) -> &mut Self {
        self.location = Some(location);
        self
    }

    pub fn set_setup(&mut self, setup: Duration) -> &mut Self {
        self.setup = Some(setup);
        self
    }

    pub fn set_service(&mut self, service: Duration) -> &mut Self {
        self.service = Some(service);
        self
    }

    pub fn set_delivery(&mut self, delivery: Amount) -> &mut Self {
        self.delivery = Some(delivery);
        self
    }

    pub fn set_pickup(&mut self, pickup: Amount) -> &mut Self {
        self.pickup = Some(pickup);
        self
    }

    pub fn set_skills(&mut self, skills: Vec<Skill>) -> &mut Self {
        self.skills = Some(skills);
        self
    }

    pub fn set_priority(&mut self, priority: u32) -> &mut Self {
        self.priority = Some(priority);
        self
    }

    pub fn set_time_windows(&mut self, time_windows: TimeWindows) -> &mut Self {
        self.time_windows = Some(time_windows);
        self
    }

    pub fn set_description(&mut self, description: String) -> &mut Self {
        self.description = Some(description);
        self
    }

    pub fn build(self) -> Job {
        Job {
            id: self.id.expect("job id is required"),
            kind: self.kind.unwrap_or(JobKind::Single),
            location: LocationIdx::new(self.location.expect("job location is required")),
            setup: self.setup.unwrap_or(0),
            service: self.service.unwrap_or(0),
            delivery: self.delivery.unwrap_or_default(),
            pickup: self.pickup.unwrap_or_default(),
            skills: Skills::from_iter(self.skills.unwrap_or_default()),
            priority: self.priority.unwrap_or(0),
            time_windows: self.time_windows.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
        }
    }
}
