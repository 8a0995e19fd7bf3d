use crate::{
    problem::{
        instance::Problem,
        job::Job,
        vehicle::Vehicle,
    },
    utils::bitset::Bitset,
};

/// Precomputed pairwise compatibility, built once per problem.
///
/// The job table prunes insertion candidates; the vehicle table prunes
/// inter-route operator pairs (two vehicles that cannot serve any common job
/// never profit from exchanging tasks).
#[derive(Debug, Clone, Default)]
pub struct Compatibility {
    job: Vec<Bitset>,
    vehicle: Vec<Vec<bool>>,
}

impl Compatibility {
    pub fn compute(problem: &Problem) -> Self {
        let jobs = problem.jobs();
        let vehicles = problem.vehicles();

        let job = vehicles
            .iter()
            .map(|vehicle| {
                let mut bits = Bitset::with_len(jobs.len());
                for (rank, job) in jobs.iter().enumerate() {
                    bits.set(rank, vehicle_serves_job(problem, vehicle, job));
                }
                bits
            })
            .collect::<Vec<_>>();

        let vehicle = (0..vehicles.len())
            .map(|v1| {
                (0..vehicles.len())
                    .map(|v2| v1 == v2 || job[v1].intersects(&job[v2]))
                    .collect()
            })
            .collect();

        Compatibility { job, vehicle }
    }

    #[inline]
    pub fn vehicle_to_job(&self, vehicle: usize, job: usize) -> bool {
        self.job[vehicle].get(job)
    }

    #[inline]
    pub fn vehicle_to_vehicle(&self, v1: usize, v2: usize) -> bool {
        self.vehicle[v1][v2]
    }
}

fn vehicle_serves_job(problem: &Problem, vehicle: &Vehicle, job: &Job) -> bool {
    if !vehicle.can_serve_skills(job.skills()) {
        return false;
    }

    if !job.delivery().fits_within(vehicle.capacity())
        || !job.pickup().fits_within(vehicle.capacity())
    {
        return false;
    }

    let location = job.location();
    if let Some(start) = vehicle.start()
        && !problem.is_reachable(vehicle, start, location)
    {
        return false;
    }
    if let Some(end) = vehicle.end()
        && !problem.is_reachable(vehicle, location, end)
    {
        return false;
    }

    // Timing: out, serve within a window, and back, all inside the shift.
    let tw = vehicle.time_window();
    let to_job = problem.eval_between(vehicle, vehicle.start(), Some(location));
    let from_job = problem.eval_between(vehicle, Some(location), vehicle.end());

    let arrival = tw.start + to_job.duration;
    let Some(service_start) = job.time_windows().earliest_from(arrival) else {
        return false;
    };
    if service_start + job.setup() + job.service() + from_job.duration > tw.end {
        return false;
    }

    if let Some(max_travel_time) = vehicle.max_travel_time()
        && to_job.duration + from_job.duration > max_travel_time
    {
        return false;
    }

    if let Some(max_distance) = vehicle.max_distance()
        && to_job.distance + from_job.distance > max_distance
    {
        return false;
    }

    true
}
