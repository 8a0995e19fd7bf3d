use std::collections::BTreeMap;

use fxhash::FxHashMap;
use porter_matrix::{Coord, MatrixSet, RoutingOracle, UNREACHABLE};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::{
    config::EngineConfig,
    error::{InputError, SolverError},
    problem::{
        amount::Amount,
        instance::{Problem, ProblemBuilder},
        job::{JobBuilder, JobKind},
        location::Location,
        profile::Profile,
        time_window::{TimeWindow, TimeWindows},
        units::Duration,
        vehicle::{Break, StepKind, VehicleBuilder, VehicleCosts, VehicleStep},
    },
};

/// The decoded request body: jobs and/or shipments, a fleet, and optional
/// custom travel matrices per profile.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct VrpInput {
    #[serde(default)]
    pub jobs: Vec<JsonJob>,
    #[serde(default)]
    pub shipments: Vec<JsonShipment>,
    pub vehicles: Vec<JsonVehicle>,
    #[serde(default)]
    pub matrices: BTreeMap<String, JsonMatrices>,
    /// Deprecated: interpreted as `matrices.<default>.durations`.
    #[serde(default)]
    pub matrix: Option<Vec<Vec<u64>>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JsonJob {
    pub id: u64,
    pub location: Option<[f64; 2]>,
    pub location_index: Option<usize>,
    pub setup: Option<u64>,
    pub service: Option<u64>,
    pub delivery: Option<Vec<u64>>,
    pub pickup: Option<Vec<u64>>,
    /// Deprecated: alias for `delivery`.
    pub amount: Option<Vec<u64>>,
    pub skills: Option<Vec<u64>>,
    pub priority: Option<u64>,
    pub time_windows: Option<Vec<[u64; 2]>>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JsonTask {
    pub id: u64,
    pub location: Option<[f64; 2]>,
    pub location_index: Option<usize>,
    pub setup: Option<u64>,
    pub service: Option<u64>,
    pub time_windows: Option<Vec<[u64; 2]>>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JsonShipment {
    pub pickup: JsonTask,
    pub delivery: JsonTask,
    pub amount: Option<Vec<u64>>,
    pub skills: Option<Vec<u64>>,
    pub priority: Option<u64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JsonVehicle {
    pub id: u64,
    pub start: Option<[f64; 2]>,
    pub start_index: Option<usize>,
    pub end: Option<[f64; 2]>,
    pub end_index: Option<usize>,
    pub profile: Option<String>,
    pub capacity: Option<Vec<u64>>,
    pub skills: Option<Vec<u64>>,
    pub tw: Option<[u64; 2]>,
    pub breaks: Option<Vec<JsonBreak>>,
    pub cost: Option<JsonVehicleCosts>,
    pub speed_factor: Option<f64>,
    pub max_tasks: Option<u64>,
    pub max_travel_time: Option<u64>,
    pub max_distance: Option<u64>,
    pub steps: Option<Vec<JsonVehicleStep>>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JsonVehicleCosts {
    pub fixed: Option<u64>,
    pub per_hour: Option<u64>,
    pub per_km: Option<u64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JsonBreak {
    pub id: u64,
    pub time_windows: Option<Vec<[u64; 2]>>,
    pub service: Option<u64>,
    pub max_load: Option<Vec<u64>>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JsonVehicleStep {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: Option<u64>,
    pub service_at: Option<u64>,
    pub service_after: Option<u64>,
    pub service_before: Option<u64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JsonMatrices {
    pub durations: Option<Vec<Vec<u64>>>,
    pub distances: Option<Vec<Vec<u64>>>,
    pub costs: Option<Vec<Vec<u64>>>,
}

/// Canonicalizes locations into a dense index. With custom matrices the
/// index space is the matrix dimension and every object must carry a
/// `location_index`; without, coordinates are interned in order of first
/// appearance.
struct LocationInterner {
    matrix_dim: Option<usize>,
    by_coords: FxHashMap<(u64, u64), usize>,
    coords: Vec<Option<Coord>>,
}

impl LocationInterner {
    fn new(matrix_dim: Option<usize>) -> Self {
        LocationInterner {
            matrix_dim,
            by_coords: FxHashMap::default(),
            coords: match matrix_dim {
                Some(dim) => vec![None; dim],
                None => Vec::new(),
            },
        }
    }

    fn resolve(
        &mut self,
        entity: &'static str,
        id: u64,
        coords: Option<[f64; 2]>,
        index: Option<usize>,
    ) -> Result<usize, InputError> {
        if let Some(dim) = self.matrix_dim {
            let index = index.ok_or(InputError::MissingLocation { entity, id })?;
            if index >= dim {
                return Err(InputError::UnknownLocationIndex { index, dim });
            }
            if let Some([lon, lat]) = coords {
                self.coords[index] = Some(Coord::new(lon, lat));
            }
            return Ok(index);
        }

        let [lon, lat] = coords.ok_or(InputError::MissingLocation { entity, id })?;
        let key = (lon.to_bits(), lat.to_bits());
        if let Some(&existing) = self.by_coords.get(&key) {
            return Ok(existing);
        }

        let index = self.coords.len();
        self.coords.push(Some(Coord::new(lon, lat)));
        self.by_coords.insert(key, index);
        Ok(index)
    }

    fn locations(&self) -> Vec<Location> {
        self.coords
            .iter()
            .enumerate()
            .map(|(index, coords)| Location::new(index, *coords))
            .collect()
    }
}

fn to_duration(value: u64) -> Duration {
    // Clamped to the planning horizon so sums of legs and services never
    // overflow.
    value.min(crate::problem::units::TIME_HORIZON as u64) as Duration
}

fn to_amount(values: Option<Vec<u64>>) -> Amount {
    match values {
        Some(values) => Amount::from_vec(values.into_iter().map(|v| v as i64).collect()),
        None => Amount::EMPTY,
    }
}

fn to_time_windows(
    windows: Option<Vec<[u64; 2]>>,
) -> TimeWindows {
    match windows {
        Some(windows) => TimeWindows::from_vec(
            windows
                .into_iter()
                .map(|[start, end]| TimeWindow::new(to_duration(start), to_duration(end)))
                .collect(),
        ),
        None => TimeWindows::horizon(),
    }
}

fn flatten_matrix(rows: Vec<Vec<u64>>, dim: usize) -> Result<Vec<i64>, InputError> {
    if rows.len() != dim || rows.iter().any(|row| row.len() != dim) {
        return Err(InputError::InvalidFormat(format!(
            "matrix is not square with dimension {dim}"
        )));
    }

    Ok(rows
        .into_iter()
        .flatten()
        .map(|value| {
            if value >= i64::MAX as u64 {
                UNREACHABLE
            } else {
                value as i64
            }
        })
        .collect())
}

fn shipment_half(
    task: JsonTask,
    kind: JobKind,
    amount: &Amount,
    skills: &[u64],
    priority: u32,
    interner: &mut LocationInterner,
) -> Result<crate::problem::job::Job, InputError> {
    let entity = if kind == JobKind::Pickup {
        "pickup"
    } else {
        "delivery"
    };
    let location = interner.resolve(entity, task.id, task.location, task.location_index)?;

    let mut jb = JobBuilder::default();
    jb.set_id(task.id)
        .set_kind(kind)
        .set_location(location)
        .set_setup(to_duration(task.setup.unwrap_or(0)))
        .set_service(to_duration(task.service.unwrap_or(0)))
        .set_skills(skills.to_vec())
        .set_priority(priority)
        .set_time_windows(to_time_windows(task.time_windows));
    if kind == JobKind::Pickup {
        jb.set_pickup(amount.clone());
    } else {
        jb.set_delivery(amount.clone());
    }
    if let Some(description) = task.description {
        jb.set_description(description);
    }
    Ok(jb.build())
}

fn step_kind(kind: &str, vehicle_id: u64) -> Result<StepKind, InputError> {
    match kind {
        "start" => Ok(StepKind::Start),
        "end" => Ok(StepKind::End),
        "job" => Ok(StepKind::Job),
        "pickup" => Ok(StepKind::Pickup),
        "delivery" => Ok(StepKind::Delivery),
        "break" => Ok(StepKind::Break),
        other => Err(InputError::InvalidFormat(format!(
            "invalid step type '{other}' for vehicle {vehicle_id}"
        ))),
    }
}

/// Validates and lowers the decoded input into an immutable [`Problem`],
/// resolving every profile's travel tables from the supplied matrices or the
/// routing oracle.
pub fn decode_problem(input: VrpInput, oracle: &dyn RoutingOracle) -> Result<Problem, SolverError> {
    let mut matrices = input.matrices;

    // Retro-compatibility: bare `matrix` is the default profile's durations.
    if let Some(matrix) = input.matrix {
        let default_profile = EngineConfig::global().default_profile.clone();
        matrices.entry(default_profile).or_insert(JsonMatrices {
            durations: Some(matrix),
            distances: None,
            costs: None,
        });
    }

    let matrix_dim = matrices
        .values()
        .find_map(|entry| entry.durations.as_ref().map(Vec::len));
    let mut interner = LocationInterner::new(matrix_dim);

    let amount_dims = input
        .vehicles
        .first()
        .and_then(|vehicle| vehicle.capacity.as_ref().map(Vec::len))
        .unwrap_or(0);

    let mut builder = ProblemBuilder::default();
    builder.set_amount_dimensions(amount_dims);

    for job in input.jobs {
        let location = interner.resolve("job", job.id, job.location, job.location_index)?;
        let delivery = job.delivery.or(job.amount);

        let mut jb = JobBuilder::default();
        jb.set_id(job.id)
            .set_kind(JobKind::Single)
            .set_location(location)
            .set_setup(to_duration(job.setup.unwrap_or(0)))
            .set_service(to_duration(job.service.unwrap_or(0)))
            .set_delivery(to_amount(delivery))
            .set_pickup(to_amount(job.pickup))
            .set_skills(job.skills.unwrap_or_default())
            .set_priority(job.priority.unwrap_or(0).min(u32::MAX as u64) as u32)
            .set_time_windows(to_time_windows(job.time_windows));
        if let Some(description) = job.description {
            jb.set_description(description);
        }
        builder.add_job(jb.build());
    }

    for shipment in input.shipments {
        let amount = to_amount(shipment.amount);
        let skills = shipment.skills.unwrap_or_default();
        let priority = shipment.priority.unwrap_or(0).min(u32::MAX as u64) as u32;

        let pickup = shipment_half(
            shipment.pickup,
            JobKind::Pickup,
            &amount,
            &skills,
            priority,
            &mut interner,
        )?;
        let delivery = shipment_half(
            shipment.delivery,
            JobKind::Delivery,
            &amount,
            &skills,
            priority,
            &mut interner,
        )?;
        builder.add_shipment(pickup, delivery);
    }

    // Profiles in order of first appearance across the fleet.
    let mut profile_names: Vec<String> = Vec::new();
    let default_profile = EngineConfig::global().default_profile.clone();

    let mut vehicles = Vec::with_capacity(input.vehicles.len());
    for vehicle in input.vehicles {
        let profile_name = vehicle.profile.clone().unwrap_or_else(|| default_profile.clone());
        let profile_rank = match profile_names.iter().position(|name| *name == profile_name) {
            Some(rank) => rank,
            None => {
                profile_names.push(profile_name);
                profile_names.len() - 1
            }
        };

        let mut vb = VehicleBuilder::default();
        vb.set_id(vehicle.id).set_profile(profile_rank);

        if vehicle.start.is_some() || vehicle.start_index.is_some() {
            vb.set_start(interner.resolve(
                "vehicle",
                vehicle.id,
                vehicle.start,
                vehicle.start_index,
            )?);
        }
        if vehicle.end.is_some() || vehicle.end_index.is_some() {
            vb.set_end(interner.resolve("vehicle", vehicle.id, vehicle.end, vehicle.end_index)?);
        }

        vb.set_capacity(to_amount(vehicle.capacity))
            .set_skills(vehicle.skills.unwrap_or_default())
            .set_speed_factor(vehicle.speed_factor.unwrap_or(1.0));

        if let Some([start, end]) = vehicle.tw {
            vb.set_time_window(TimeWindow::new(to_duration(start), to_duration(end)));
        }

        if let Some(costs) = vehicle.cost {
            let defaults = VehicleCosts::default();
            vb.set_costs(VehicleCosts {
                fixed: costs.fixed.map(|v| v as i64).unwrap_or(defaults.fixed),
                per_hour: costs.per_hour.map(|v| v as i64).unwrap_or(defaults.per_hour),
                per_km: costs.per_km.map(|v| v as i64).unwrap_or(defaults.per_km),
            });
        }

        if let Some(breaks) = vehicle.breaks {
            vb.set_breaks(
                breaks
                    .into_iter()
                    .map(|brk| Break {
                        id: brk.id,
                        time_windows: to_time_windows(brk.time_windows),
                        service: to_duration(brk.service.unwrap_or(0)),
                        max_load: brk.max_load.map(|load| to_amount(Some(load))),
                        description: brk.description.unwrap_or_default(),
                    })
                    .collect(),
            );
        }

        if let Some(max_tasks) = vehicle.max_tasks {
            vb.set_max_tasks(max_tasks as usize);
        }
        if let Some(max_travel_time) = vehicle.max_travel_time {
            vb.set_max_travel_time(to_duration(max_travel_time));
        }
        if let Some(max_distance) = vehicle.max_distance {
            vb.set_max_distance(to_duration(max_distance));
        }

        if let Some(steps) = vehicle.steps {
            let steps = steps
                .into_iter()
                .map(|step| {
                    Ok(VehicleStep {
                        kind: step_kind(&step.kind, vehicle.id)?,
                        id: step.id,
                        service_at: step.service_at.map(to_duration),
                        service_after: step.service_after.map(to_duration),
                        service_before: step.service_before.map(to_duration),
                    })
                })
                .collect::<Result<Vec<_>, InputError>>()?;
            vb.set_steps(steps);
        }

        if let Some(description) = vehicle.description {
            vb.set_description(description);
        }

        vehicles.push(vb.build());
    }

    let locations = interner.locations();

    let mut profiles = Vec::with_capacity(profile_names.len());
    for name in profile_names {
        let matrix_set = match matrices.remove(&name) {
            Some(entry) => {
                let dim = matrix_dim.ok_or_else(|| {
                    InputError::InvalidFormat(format!(
                        "profile '{name}' has matrices but no durations table"
                    ))
                })?;
                let durations = entry.durations.ok_or_else(|| {
                    InputError::InvalidFormat(format!(
                        "profile '{name}' needs a durations matrix"
                    ))
                })?;
                MatrixSet::from_tables(
                    dim,
                    flatten_matrix(durations, dim)?,
                    entry
                        .distances
                        .map(|distances| flatten_matrix(distances, dim))
                        .transpose()?,
                    entry
                        .costs
                        .map(|costs| flatten_matrix(costs, dim))
                        .transpose()?,
                )
                .map_err(SolverError::Routing)?
            }
            None => {
                let coords = locations
                    .iter()
                    .map(|location| {
                        location
                            .coords()
                            .ok_or(porter_matrix::RoutingError::MissingCoordinates)
                    })
                    .collect::<Result<Vec<Coord>, _>>()
                    .map_err(SolverError::Routing)?;
                oracle.matrices(&name, &coords).map_err(SolverError::Routing)?
            }
        };
        profiles.push(Profile::new(name, matrix_set));
    }

    builder.set_locations(locations);
    builder.set_profiles(profiles);
    builder.set_vehicles(vehicles);

    builder.build().map_err(SolverError::Input)
}

#[cfg(test)]
mod tests {
    use porter_matrix::great_circle::GreatCircleOracle;

    use super::*;

    fn decode(raw: &str) -> Result<Problem, SolverError> {
        let input: VrpInput = serde_json::from_str(raw).expect("test input parses");
        decode_problem(input, &GreatCircleOracle::default())
    }

    #[test]
    fn test_decode_with_coordinates() {
        let problem = decode(
            r#"{
                "jobs": [
                    {"id": 1, "location": [2.35, 48.85], "delivery": [1]},
                    {"id": 2, "location": [2.36, 48.86], "delivery": [1]}
                ],
                "vehicles": [
                    {"id": 7, "start": [2.34, 48.84], "end": [2.34, 48.84], "capacity": [10]}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(problem.jobs().len(), 2);
        assert_eq!(problem.locations().len(), 3);
        assert_eq!(problem.vehicles()[0].id(), 7);
    }

    #[test]
    fn test_decode_with_matrix() {
        let problem = decode(
            r#"{
                "jobs": [
                    {"id": 1, "location_index": 1},
                    {"id": 2, "location_index": 2}
                ],
                "vehicles": [{"id": 1, "start_index": 0, "end_index": 0}],
                "matrices": {
                    "car": {"durations": [[0, 10, 20], [10, 0, 10], [20, 10, 0]]}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(problem.locations().len(), 3);
        let vehicle = &problem.vehicles()[0];
        assert_eq!(
            problem
                .eval(
                    vehicle,
                    crate::problem::location::LocationIdx::new(0),
                    crate::problem::location::LocationIdx::new(2)
                )
                .duration,
            20
        );
    }

    #[test]
    fn test_deprecated_matrix_alias() {
        let problem = decode(
            r#"{
                "jobs": [{"id": 1, "location_index": 1}],
                "vehicles": [{"id": 1, "start_index": 0}],
                "matrix": [[0, 5], [5, 0]]
            }"#,
        )
        .unwrap();

        assert_eq!(problem.profiles()[0].name(), "car");
        assert_eq!(problem.locations().len(), 2);
    }

    #[test]
    fn test_deprecated_amount_alias() {
        let problem = decode(
            r#"{
                "jobs": [{"id": 1, "location_index": 1, "amount": [4]}],
                "vehicles": [{"id": 1, "start_index": 0, "capacity": [5]}],
                "matrix": [[0, 5], [5, 0]]
            }"#,
        )
        .unwrap();

        assert_eq!(
            problem.jobs()[0].delivery(),
            &Amount::from_vec(vec![4])
        );
    }

    #[test]
    fn test_unknown_location_index() {
        let result = decode(
            r#"{
                "jobs": [{"id": 1, "location_index": 9}],
                "vehicles": [{"id": 1, "start_index": 0}],
                "matrix": [[0, 5], [5, 0]]
            }"#,
        );

        assert!(matches!(
            result,
            Err(SolverError::Input(InputError::UnknownLocationIndex { index: 9, dim: 2 }))
        ));
    }

    #[test]
    fn test_missing_location() {
        let result = decode(
            r#"{
                "jobs": [{"id": 1}],
                "vehicles": [{"id": 1, "start": [0.0, 0.0]}]
            }"#,
        );

        assert!(matches!(
            result,
            Err(SolverError::Input(InputError::MissingLocation { .. }))
        ));
    }

    #[test]
    fn test_malformed_time_window() {
        let result = decode(
            r#"{
                "jobs": [{"id": 1, "location_index": 1, "time_windows": [[100, 50]]}],
                "vehicles": [{"id": 1, "start_index": 0}],
                "matrix": [[0, 5], [5, 0]]
            }"#,
        );

        assert!(matches!(
            result,
            Err(SolverError::Input(InputError::MalformedTimeWindow { .. }))
        ));
    }

    #[test]
    fn test_shipment_halves_share_amount() {
        let problem = decode(
            r#"{
                "shipments": [{
                    "pickup": {"id": 3, "location_index": 1},
                    "delivery": {"id": 4, "location_index": 2},
                    "amount": [2],
                    "priority": 10
                }],
                "vehicles": [{"id": 1, "start_index": 0, "capacity": [5]}],
                "matrix": [[0, 5, 9], [5, 0, 5], [9, 5, 0]]
            }"#,
        )
        .unwrap();

        let pickup = &problem.jobs()[0];
        let delivery = &problem.jobs()[1];
        assert_eq!(pickup.kind(), JobKind::Pickup);
        assert_eq!(delivery.kind(), JobKind::Delivery);
        assert_eq!(pickup.pickup(), delivery.delivery());
        assert_eq!(pickup.priority(), 10);
        assert_eq!(
            problem.partner(crate::problem::job::JobIdx::new(0)),
            Some(crate::problem::job::JobIdx::new(1))
        );
    }
}
