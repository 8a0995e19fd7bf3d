use porter_matrix::{Coord, RoutingOracle};
use serde::Serialize;

use crate::{
    error::SolverError,
    problem::{
        instance::Problem,
        job::JobKind,
        location::LocationIdx,
        units::{Cost, Distance, Duration},
    },
    solution::{route::Route, solution::Solution},
};

#[derive(Debug, Serialize)]
pub struct SolutionReport {
    pub summary: Summary,
    pub routes: Vec<RouteReport>,
    pub unassigned: Vec<UnassignedReport>,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub cost: Cost,
    pub routes: usize,
    pub unassigned: usize,
    pub duration: Duration,
    pub distance: Distance,
    pub waiting_time: Duration,
    /// Summed priority of everything served.
    pub priority: u64,
}

#[derive(Debug, Serialize)]
pub struct RouteReport {
    pub vehicle: u64,
    pub cost: Cost,
    pub duration: Duration,
    pub distance: Distance,
    pub waiting_time: Duration,
    pub steps: Vec<StepReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct StepReport {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<[f64; 2]>,
    pub location_index: Option<usize>,
    pub arrival: Duration,
    pub setup: Duration,
    pub service: Duration,
    pub waiting_time: Duration,
    pub load: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct UnassignedReport {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<[f64; 2]>,
}

fn coords_of(problem: &Problem, location: LocationIdx) -> Option<[f64; 2]> {
    problem
        .location(location)
        .coords()
        .map(|Coord { lon, lat }| [lon, lat])
}

fn kind_name(kind: JobKind) -> &'static str {
    match kind {
        JobKind::Single => "job",
        JobKind::Pickup => "pickup",
        JobKind::Delivery => "delivery",
    }
}

/// Serializes a solution: one route per used vehicle with its full step
/// sequence and timing, plus the unassigned list. With an oracle, each route
/// also carries its encoded geometry; oracle failures abort the encode.
pub fn encode_solution(
    solution: &Solution,
    geometry: Option<&dyn RoutingOracle>,
) -> Result<SolutionReport, SolverError> {
    let problem = solution.problem();

    let mut routes = Vec::new();
    for route in solution.routes() {
        if route.is_empty() {
            continue;
        }
        routes.push(encode_route(problem, route, geometry)?);
    }

    let unassigned: Vec<UnassignedReport> = solution
        .unassigned()
        .iter()
        .map(|&rank| {
            let job = problem.job(rank);
            UnassignedReport {
                id: job.id(),
                kind: kind_name(job.kind()),
                location: coords_of(problem, job.location()),
            }
        })
        .collect();

    let served_priority: u64 = solution
        .routes()
        .iter()
        .flat_map(|route| route.tasks())
        .map(|&rank| problem.job(rank).priority() as u64)
        .sum();

    let summary = Summary {
        cost: solution.objective() - solution.priority_penalty(),
        routes: routes.len(),
        unassigned: unassigned.len(),
        duration: solution.travel().duration,
        distance: solution.travel().distance,
        waiting_time: routes.iter().map(|route| route.waiting_time).sum(),
        priority: served_priority,
    };

    Ok(SolutionReport {
        summary,
        routes,
        unassigned,
    })
}

fn encode_route(
    problem: &Problem,
    route: &Route,
    geometry: Option<&dyn RoutingOracle>,
) -> Result<RouteReport, SolverError> {
    let vehicle = route.vehicle(problem);
    let schedule = route.schedule();
    let mut steps = Vec::with_capacity(route.len() + vehicle.breaks().len() + 2);
    let mut waiting_time = 0;

    if let Some(start) = vehicle.start() {
        steps.push(StepReport {
            kind: "start",
            id: None,
            location: coords_of(problem, start),
            location_index: Some(start.get()),
            arrival: schedule.start_time,
            setup: 0,
            service: 0,
            waiting_time: 0,
            load: route.load_after(0).iter().collect(),
        });
    }

    let mut breaks = schedule.breaks.iter().peekable();
    for position in 0..route.len() {
        while let Some(brk) = breaks.peek().filter(|brk| brk.position == position) {
            let definition = &vehicle.breaks()[brk.break_rank];
            waiting_time += brk.start - brk.arrival;
            steps.push(StepReport {
                kind: "break",
                id: Some(definition.id),
                location: None,
                location_index: None,
                arrival: brk.arrival,
                setup: 0,
                service: definition.service,
                waiting_time: brk.start - brk.arrival,
                load: route.load_after(position).iter().collect(),
            });
            breaks.next();
        }

        let rank = route.task(position);
        let job = problem.job(rank);
        let arrival = schedule.arrival[position];
        let waiting = schedule.service_start[position] - arrival;
        waiting_time += waiting;

        steps.push(StepReport {
            kind: kind_name(job.kind()),
            id: Some(job.id()),
            location: coords_of(problem, job.location()),
            location_index: Some(job.location().get()),
            arrival,
            setup: if schedule.setup_applied[position] {
                job.setup()
            } else {
                0
            },
            service: job.service(),
            waiting_time: waiting,
            load: route.load_after(position + 1).iter().collect(),
        });
    }

    for brk in breaks {
        let definition = &vehicle.breaks()[brk.break_rank];
        waiting_time += brk.start - brk.arrival;
        steps.push(StepReport {
            kind: "break",
            id: Some(definition.id),
            location: None,
            location_index: None,
            arrival: brk.arrival,
            setup: 0,
            service: definition.service,
            waiting_time: brk.start - brk.arrival,
            load: route.load_after(route.len()).iter().collect(),
        });
    }

    if let Some(end) = vehicle.end() {
        steps.push(StepReport {
            kind: "end",
            id: None,
            location: coords_of(problem, end),
            location_index: Some(end.get()),
            arrival: schedule.end_time,
            setup: 0,
            service: 0,
            waiting_time: 0,
            load: route.load_after(route.len()).iter().collect(),
        });
    }

    let geometry = match geometry {
        Some(oracle) => {
            let coords = route_coords(problem, route)?;
            Some(
                oracle
                    .geometry(&coords)
                    .map_err(SolverError::Routing)?,
            )
        }
        None => None,
    };

    Ok(RouteReport {
        vehicle: vehicle.id(),
        cost: route.total().cost + vehicle.costs().fixed,
        duration: route.total().duration,
        distance: route.total().distance,
        waiting_time,
        steps,
        geometry,
        description: vehicle.description().to_owned(),
    })
}

fn route_coords(problem: &Problem, route: &Route) -> Result<Vec<Coord>, SolverError> {
    let vehicle = route.vehicle(problem);
    let mut locations: Vec<LocationIdx> = Vec::with_capacity(route.len() + 2);

    if let Some(start) = vehicle.start() {
        locations.push(start);
    }
    for position in 0..route.len() {
        locations.push(route.location_at(problem, position));
    }
    if let Some(end) = vehicle.end() {
        locations.push(end);
    }

    locations
        .into_iter()
        .map(|location| {
            problem
                .location(location)
                .coords()
                .ok_or(SolverError::Routing(
                    porter_matrix::RoutingError::MissingCoordinates,
                ))
        })
        .collect()
}
