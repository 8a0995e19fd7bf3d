use fxhash::FxHashSet;
use porter_matrix::UNREACHABLE;

use crate::{
    error::InputError,
    problem::{
        amount::Amount,
        compat::Compatibility,
        job::{Job, JobIdx, JobKind},
        location::{Location, LocationIdx},
        profile::{Profile, ProfileIdx},
        time_window::TimeWindow,
        units::{div_round, round_half_away, Duration, Eval, TIME_HORIZON},
        vehicle::{StepKind, Vehicle, VehicleIdx},
    },
};

/// Immutable, canonicalized problem instance shared read-only by every search
/// stream. All cross-references use dense indices; external ids only survive
/// for reporting.
#[derive(Debug)]
pub struct Problem {
    locations: Vec<Location>,
    jobs: Vec<Job>,
    /// For shipment halves, the rank of the other half. `None` for singles.
    partners: Vec<Option<JobIdx>>,
    vehicles: Vec<Vehicle>,
    profiles: Vec<Profile>,
    amount_dims: usize,
    compat: Compatibility,
    has_time_windows: bool,
    has_unreachable_legs: bool,
}

impl Problem {
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn location(&self, index: LocationIdx) -> &Location {
        &self.locations[index.get()]
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn job(&self, index: JobIdx) -> &Job {
        &self.jobs[index.get()]
    }

    pub fn partner(&self, index: JobIdx) -> Option<JobIdx> {
        self.partners[index.get()]
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn vehicle(&self, index: VehicleIdx) -> &Vehicle {
        &self.vehicles[index.get()]
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn profile(&self, index: ProfileIdx) -> &Profile {
        &self.profiles[index.get()]
    }

    pub fn amount_dims(&self) -> usize {
        self.amount_dims
    }

    pub fn has_time_windows(&self) -> bool {
        self.has_time_windows
    }

    /// True when some profile table contains an unreachable sentinel; the
    /// timing walks then have to vet every candidate leg.
    pub fn has_unreachable_legs(&self) -> bool {
        self.has_unreachable_legs
    }

    /// Ranks of the insertion units: every single job and every shipment
    /// pickup (a shipment inserts as one unit identified by its pickup).
    pub fn unit_ranks(&self) -> impl Iterator<Item = JobIdx> + '_ {
        self.jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| job.kind() != JobKind::Delivery)
            .map(|(rank, _)| JobIdx::new(rank))
    }

    /// Rank of the job with the given kind and external id.
    pub fn find_job(&self, kind: JobKind, id: u64) -> Option<JobIdx> {
        self.jobs
            .iter()
            .position(|job| job.kind() == kind && job.id() == id)
            .map(JobIdx::new)
    }

    pub fn is_reachable(&self, vehicle: &Vehicle, from: LocationIdx, to: LocationIdx) -> bool {
        self.profile(vehicle.profile())
            .matrices()
            .is_reachable(from.get(), to.get())
    }

    /// Travel duration scaled by the vehicle speed factor, rounded half away
    /// from zero. Unreachable legs come back as [`TIME_HORIZON`], which every
    /// feasibility walk rejects.
    pub fn scaled_duration(
        &self,
        vehicle: &Vehicle,
        from: LocationIdx,
        to: LocationIdx,
    ) -> Duration {
        let raw = self
            .profile(vehicle.profile())
            .matrices()
            .duration(from.get(), to.get());
        if raw == UNREACHABLE {
            return TIME_HORIZON;
        }

        let scaled = if vehicle.speed_factor() == 1.0 {
            raw
        } else {
            round_half_away(raw as f64 / vehicle.speed_factor())
        };
        scaled.min(TIME_HORIZON)
    }

    /// One travel leg under a vehicle's profile, speed and cost coefficients.
    pub fn eval(&self, vehicle: &Vehicle, from: LocationIdx, to: LocationIdx) -> Eval {
        let matrices = self.profile(vehicle.profile()).matrices();
        let duration = self.scaled_duration(vehicle, from, to);
        let distance = matrices.distance(from.get(), to.get()).min(TIME_HORIZON);

        let cost = match matrices.cost(from.get(), to.get()) {
            Some(explicit) => explicit.min(TIME_HORIZON),
            None => {
                let costs = vehicle.costs();
                div_round(costs.per_hour as i128 * duration as i128, 3600)
                    .saturating_add(div_round(costs.per_km as i128 * distance as i128, 1000))
                    .min(TIME_HORIZON)
            }
        };

        Eval::new(cost, duration, distance)
    }

    /// As [`eval`](Self::eval), but zero when either endpoint is absent
    /// (open-ended routes).
    pub fn eval_between(
        &self,
        vehicle: &Vehicle,
        from: Option<LocationIdx>,
        to: Option<LocationIdx>,
    ) -> Eval {
        match (from, to) {
            (Some(from), Some(to)) => self.eval(vehicle, from, to),
            _ => Eval::ZERO,
        }
    }

    #[inline]
    pub fn can_serve(&self, vehicle: VehicleIdx, job: JobIdx) -> bool {
        self.compat.vehicle_to_job(vehicle.get(), job.get())
    }

    #[inline]
    pub fn vehicles_overlap(&self, v1: VehicleIdx, v2: VehicleIdx) -> bool {
        self.compat.vehicle_to_vehicle(v1.get(), v2.get())
    }
}

#[derive(Default)]
pub struct ProblemBuilder {
    locations: Vec<Location>,
    jobs: Vec<Job>,
    partners: Vec<Option<JobIdx>>,
    vehicles: Vec<Vehicle>,
    profiles: Vec<Profile>,
    amount_dims: Option<usize>,
}

impl ProblemBuilder {
    pub fn set_locations(&mut self, locations: Vec<Location>) -> &mut Self {
        self.locations = locations;
        self
    }

    pub fn set_amount_dimensions(&mut self, dims: usize) -> &mut Self {
        self.amount_dims = Some(dims);
        self
    }

    pub fn add_job(&mut self, job: Job) -> &mut Self {
        self.jobs.push(job);
        self.partners.push(None);
        self
    }

    pub fn add_shipment(&mut self, pickup: Job, delivery: Job) -> &mut Self {
        let pickup_rank = JobIdx::new(self.jobs.len());
        let delivery_rank = JobIdx::new(self.jobs.len() + 1);
        self.jobs.push(pickup);
        self.jobs.push(delivery);
        self.partners.push(Some(delivery_rank));
        self.partners.push(Some(pickup_rank));
        self
    }

    pub fn set_vehicles(&mut self, vehicles: Vec<Vehicle>) -> &mut Self {
        self.vehicles = vehicles;
        self
    }

    pub fn set_profiles(&mut self, profiles: Vec<Profile>) -> &mut Self {
        self.profiles = profiles;
        self
    }

    pub fn build(self) -> Result<Problem, InputError> {
        let ProblemBuilder {
            locations,
            jobs,
            partners,
            vehicles,
            profiles,
            amount_dims,
        } = self;

        let amount_dims = amount_dims.unwrap_or_else(|| {
            vehicles
                .first()
                .map(|vehicle| vehicle.capacity().len())
                .unwrap_or(0)
        });

        for profile in &profiles {
            if profile.matrices().dim() < locations.len() {
                return Err(InputError::UnknownLocationIndex {
                    index: locations.len() - 1,
                    dim: profile.matrices().dim(),
                });
            }
        }

        validate_jobs(&jobs, &partners, &locations, amount_dims)?;
        validate_vehicles(&vehicles, &jobs, &locations, amount_dims)?;

        let has_time_windows = jobs
            .iter()
            .any(|job| job.time_windows().latest_end() != TimeWindow::HORIZON.end)
            || vehicles.iter().any(|vehicle| {
                vehicle.time_window() != TimeWindow::HORIZON || !vehicle.breaks().is_empty()
            });

        let has_unreachable_legs = profiles
            .iter()
            .any(|profile| profile.matrices().has_unreachable());

        let mut problem = Problem {
            locations,
            jobs,
            partners,
            vehicles,
            profiles,
            amount_dims,
            compat: Compatibility::default(),
            has_time_windows,
            has_unreachable_legs,
        };
        problem.compat = Compatibility::compute(&problem);

        Ok(problem)
    }
}

fn check_amount(
    amount: &Amount,
    entity: &'static str,
    id: u64,
    dims: usize,
) -> Result<(), InputError> {
    if amount.len() != dims && !amount.is_zero() {
        return Err(InputError::AmountDimensions {
            entity,
            id,
            expected: dims,
            got: amount.len(),
        });
    }
    Ok(())
}

fn validate_jobs(
    jobs: &[Job],
    partners: &[Option<JobIdx>],
    locations: &[Location],
    dims: usize,
) -> Result<(), InputError> {
    let mut single_ids = FxHashSet::default();
    let mut pickup_ids = FxHashSet::default();
    let mut delivery_ids = FxHashSet::default();

    for (rank, job) in jobs.iter().enumerate() {
        if job.location().get() >= locations.len() {
            return Err(InputError::UnknownLocationIndex {
                index: job.location().get(),
                dim: locations.len(),
            });
        }

        let ids = match job.kind() {
            JobKind::Single => &mut single_ids,
            JobKind::Pickup => &mut pickup_ids,
            JobKind::Delivery => &mut delivery_ids,
        };
        if !ids.insert(job.id()) {
            return Err(InputError::DuplicateId {
                entity: match job.kind() {
                    JobKind::Single => "job",
                    JobKind::Pickup => "pickup",
                    JobKind::Delivery => "delivery",
                },
                id: job.id(),
            });
        }

        if !job.time_windows().is_sorted_disjoint() {
            let first = job.time_windows().iter().find(|tw| !tw.is_valid());
            let (start, end) = first.map(|tw| (tw.start, tw.end)).unwrap_or((0, 0));
            return Err(InputError::MalformedTimeWindow {
                entity: "job",
                id: job.id(),
                start,
                end,
            });
        }

        if job.priority() > 100 {
            return Err(InputError::InvalidPriority {
                id: job.id(),
                priority: job.priority() as u64,
            });
        }

        check_amount(job.delivery(), "job", job.id(), dims)?;
        check_amount(job.pickup(), "job", job.id(), dims)?;

        // Shipment halves must agree on amount, skills and priority.
        if let Some(partner_rank) = partners[rank]
            && job.kind() == JobKind::Pickup
        {
            let delivery = &jobs[partner_rank.get()];
            let consistent = job.pickup() == delivery.delivery()
                && job.skills() == delivery.skills()
                && job.priority() == delivery.priority();
            if !consistent {
                return Err(InputError::InvalidShipment {
                    pickup: job.id(),
                    delivery: delivery.id(),
                });
            }
        }
    }

    Ok(())
}

fn validate_vehicles(
    vehicles: &[Vehicle],
    jobs: &[Job],
    locations: &[Location],
    dims: usize,
) -> Result<(), InputError> {
    let mut vehicle_ids = FxHashSet::default();

    for vehicle in vehicles {
        if !vehicle_ids.insert(vehicle.id()) {
            return Err(InputError::DuplicateId {
                entity: "vehicle",
                id: vehicle.id(),
            });
        }

        for location in [vehicle.start(), vehicle.end()].into_iter().flatten() {
            if location.get() >= locations.len() {
                return Err(InputError::UnknownLocationIndex {
                    index: location.get(),
                    dim: locations.len(),
                });
            }
        }

        if !vehicle.time_window().is_valid() {
            return Err(InputError::MalformedTimeWindow {
                entity: "vehicle",
                id: vehicle.id(),
                start: vehicle.time_window().start,
                end: vehicle.time_window().end,
            });
        }

        if vehicle.speed_factor() <= 0.0 || !vehicle.speed_factor().is_finite() {
            return Err(InputError::InvalidSpeedFactor {
                id: vehicle.id(),
                speed_factor: vehicle.speed_factor(),
            });
        }

        check_amount(vehicle.capacity(), "vehicle", vehicle.id(), dims)?;

        let mut break_ids = FxHashSet::default();
        for brk in vehicle.breaks() {
            if !break_ids.insert(brk.id) {
                return Err(InputError::DuplicateId {
                    entity: "break",
                    id: brk.id,
                });
            }
            if !brk.time_windows.is_sorted_disjoint() {
                let first = brk.time_windows.iter().find(|tw| !tw.is_valid());
                let (start, end) = first.map(|tw| (tw.start, tw.end)).unwrap_or((0, 0));
                return Err(InputError::MalformedTimeWindow {
                    entity: "break",
                    id: brk.id,
                    start,
                    end,
                });
            }
            if let Some(max_load) = &brk.max_load {
                check_amount(max_load, "break", brk.id, dims)?;
            }
        }

        // Forced steps may only reference tasks and breaks that exist.
        for step in vehicle.steps() {
            let Some(id) = step.id else { continue };
            let known = match step.kind {
                StepKind::Job => jobs
                    .iter()
                    .any(|job| job.kind() == JobKind::Single && job.id() == id),
                StepKind::Pickup => jobs
                    .iter()
                    .any(|job| job.kind() == JobKind::Pickup && job.id() == id),
                StepKind::Delivery => jobs
                    .iter()
                    .any(|job| job.kind() == JobKind::Delivery && job.id() == id),
                StepKind::Break => vehicle.breaks().iter().any(|brk| brk.id == id),
                StepKind::Start | StepKind::End => true,
            };
            if !known {
                return Err(InputError::UnknownStepId {
                    vehicle_id: vehicle.id(),
                    id,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    #[test]
    fn test_build_minimal() {
        let problem = test_utils::problem_from_grid(4, &[1, 2, 3], &[0]);

        assert_eq!(problem.jobs().len(), 3);
        assert_eq!(problem.vehicles().len(), 1);
        assert!(problem.can_serve(VehicleIdx::new(0), JobIdx::new(0)));
    }

    #[test]
    fn test_duplicate_job_id() {
        let mut builder = ProblemBuilder::default();
        builder.set_locations(test_utils::grid_locations(2));
        builder.set_profiles(vec![test_utils::grid_profile(2)]);
        builder.set_amount_dimensions(1);
        builder.add_job(test_utils::job(9, 1));
        builder.add_job(test_utils::job(9, 1));
        builder.set_vehicles(vec![test_utils::vehicle(0, 0)]);

        assert!(matches!(builder.build(), Err(InputError::DuplicateId { .. })));
    }

    #[test]
    fn test_speed_factor_scales_duration() {
        let problem = test_utils::problem(
            4,
            vec![test_utils::job(0, 1)],
            vec![test_utils::vehicle_with(0, 0, |builder| {
                builder.set_speed_factor(2.0);
            })],
        );

        let vehicle = problem.vehicle(VehicleIdx::new(0));
        let from = LocationIdx::new(0);
        let to = LocationIdx::new(3);

        // Grid legs take 100s per unit; factor 2 halves them.
        assert_eq!(problem.scaled_duration(vehicle, from, to), 150);
    }

    #[test]
    fn test_eval_cost_is_per_hour_scaled() {
        let problem = test_utils::problem_from_grid(3, &[1], &[0]);
        let vehicle = problem.vehicle(VehicleIdx::new(0));

        let eval = problem.eval(vehicle, LocationIdx::new(0), LocationIdx::new(2));
        // Default per_hour = 3600 prices one cost unit per second.
        assert_eq!(eval.cost, eval.duration);
    }
}
