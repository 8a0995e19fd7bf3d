use crate::{
    coord::Coord,
    matrix_set::MatrixSet,
    oracle::{RoutingError, RoutingOracle},
    polyline,
};

/// Default average speed, in meters per second (roughly 50 km/h).
pub const DEFAULT_SPEED_MPS: f64 = 13.89;

/// As-the-crow-flies fallback provider: haversine distances and durations
/// derived from a single average speed. Useful for tests and for instances
/// where no routing back-end is available.
#[derive(Debug, Clone, Copy)]
pub struct GreatCircleOracle {
    speed_mps: f64,
}

impl GreatCircleOracle {
    pub fn new(speed_mps: f64) -> Self {
        GreatCircleOracle { speed_mps }
    }
}

impl Default for GreatCircleOracle {
    fn default() -> Self {
        GreatCircleOracle {
            speed_mps: DEFAULT_SPEED_MPS,
        }
    }
}

impl RoutingOracle for GreatCircleOracle {
    fn matrices(&self, _profile: &str, locations: &[Coord]) -> Result<MatrixSet, RoutingError> {
        let dim = locations.len();
        let mut durations = vec![0_i64; dim * dim];
        let mut distances = vec![0_i64; dim * dim];

        for (i, from) in locations.iter().enumerate() {
            for (j, to) in locations.iter().enumerate() {
                if i == j {
                    continue;
                }

                let meters = from.haversine_distance(to);
                distances[i * dim + j] = meters.round() as i64;
                durations[i * dim + j] = (meters / self.speed_mps).round() as i64;
            }
        }

        MatrixSet::from_tables(dim, durations, Some(distances), None)
    }

    fn geometry(&self, locations: &[Coord]) -> Result<String, RoutingError> {
        if locations.is_empty() {
            return Err(RoutingError::MissingCoordinates);
        }

        Ok(polyline::encode(locations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrices_are_symmetric() {
        let oracle = GreatCircleOracle::default();
        let locations = vec![
            Coord::new(2.3522, 48.8566),
            Coord::new(4.8357, 45.7640),
            Coord::new(-1.5536, 47.2184),
        ];

        let matrices = oracle.matrices("car", &locations).unwrap();

        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(matrices.distance(i, j), matrices.distance(j, i));
                assert_eq!(matrices.duration(i, j), matrices.duration(j, i));
            }
        }
    }

    #[test]
    fn test_duration_uses_speed() {
        let slow = GreatCircleOracle::new(10.0);
        let fast = GreatCircleOracle::new(20.0);
        let locations = vec![Coord::new(0.0, 0.0), Coord::new(1.0, 0.0)];

        let slow_m = slow.matrices("car", &locations).unwrap();
        let fast_m = fast.matrices("car", &locations).unwrap();

        assert_eq!(slow_m.distance(0, 1), fast_m.distance(0, 1));
        assert!(slow_m.duration(0, 1) > fast_m.duration(0, 1));
    }
}
