use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use serde::Serialize;

/// Relative time and durations, in seconds. The same scalar doubles as a time
/// point (seconds from the problem origin) and as a span between two points.
pub type Duration = i64;

/// Meters.
pub type Distance = i64;

/// Objective units.
pub type Cost = i64;

/// Values on the JSON boundary are unsigned.
pub type UserDuration = u64;
pub type UserDistance = u64;
pub type UserCost = u64;

/// Upper bound for open-ended time windows, small enough that sums of travel
/// and service never overflow an `i64`.
pub const TIME_HORIZON: Duration = i64::MAX / 8;

/// Rounds half away from zero, the discretization rule used everywhere a
/// fractional value enters the integer cost model.
pub fn round_half_away(value: f64) -> i64 {
    if value >= 0.0 {
        (value + 0.5).floor() as i64
    } else {
        (value - 0.5).ceil() as i64
    }
}

/// `numerator / denominator` rounded half away from zero, saturating at the
/// `i64` range. Used for the per-hour / per-km cost scaling.
pub fn div_round(numerator: i128, denominator: i128) -> i64 {
    debug_assert!(denominator > 0);
    let half = denominator / 2;
    let value = if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    };
    value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// One leg of travel under a specific vehicle: scaled duration, distance and
/// the resulting cost. Routes aggregate these; move gains are differences of
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Eval {
    pub cost: Cost,
    pub duration: Duration,
    pub distance: Distance,
}

impl Eval {
    pub const ZERO: Eval = Eval {
        cost: 0,
        duration: 0,
        distance: 0,
    };

    pub fn new(cost: Cost, duration: Duration, distance: Distance) -> Self {
        Eval {
            cost,
            duration,
            distance,
        }
    }
}

impl Add for Eval {
    type Output = Eval;

    fn add(self, rhs: Eval) -> Eval {
        Eval {
            cost: self.cost + rhs.cost,
            duration: self.duration + rhs.duration,
            distance: self.distance + rhs.distance,
        }
    }
}

impl Sub for Eval {
    type Output = Eval;

    fn sub(self, rhs: Eval) -> Eval {
        Eval {
            cost: self.cost - rhs.cost,
            duration: self.duration - rhs.duration,
            distance: self.distance - rhs.distance,
        }
    }
}

impl AddAssign for Eval {
    fn add_assign(&mut self, rhs: Eval) {
        self.cost += rhs.cost;
        self.duration += rhs.duration;
        self.distance += rhs.distance;
    }
}

impl SubAssign for Eval {
    fn sub_assign(&mut self, rhs: Eval) {
        self.cost -= rhs.cost;
        self.duration -= rhs.duration;
        self.distance -= rhs.distance;
    }
}

impl Sum for Eval {
    fn sum<I: Iterator<Item = Eval>>(iter: I) -> Eval {
        iter.fold(Eval::ZERO, |acc, eval| acc + eval)
    }
}
