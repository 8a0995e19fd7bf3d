use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::problem::units::{Duration, TIME_HORIZON};

/// Closed interval `[start, end]` of feasible service starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Duration,
    pub end: Duration,
}

impl TimeWindow {
    /// The whole planning horizon, used when an object has no window.
    pub const HORIZON: TimeWindow = TimeWindow {
        start: 0,
        end: TIME_HORIZON,
    };

    pub fn new(start: Duration, end: Duration) -> Self {
        TimeWindow { start, end }
    }

    pub fn contains(&self, t: Duration) -> bool {
        self.start <= t && t <= self.end
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        TimeWindow::HORIZON
    }
}

/// Sorted, disjoint windows. Jobs and breaks may carry several; a vehicle has
/// exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeWindows(SmallVec<[TimeWindow; 1]>);

impl TimeWindows {
    pub fn horizon() -> Self {
        TimeWindows(SmallVec::from_elem(TimeWindow::HORIZON, 1))
    }

    pub fn from_vec(mut windows: Vec<TimeWindow>) -> Self {
        if windows.is_empty() {
            return Self::horizon();
        }

        windows.sort_unstable_by_key(|tw| (tw.start, tw.end));
        TimeWindows(SmallVec::from_vec(windows))
    }

    pub fn single(window: TimeWindow) -> Self {
        TimeWindows(SmallVec::from_elem(window, 1))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimeWindow> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when every window is well-formed and windows do not overlap.
    pub fn is_sorted_disjoint(&self) -> bool {
        self.0.iter().all(TimeWindow::is_valid)
            && self.0.windows(2).all(|pair| pair[0].end < pair[1].start)
    }

    pub fn earliest_start(&self) -> Duration {
        self.0.first().map(|tw| tw.start).unwrap_or(0)
    }

    pub fn latest_end(&self) -> Duration {
        self.0.last().map(|tw| tw.end).unwrap_or(TIME_HORIZON)
    }

    /// Smallest feasible service start at or after `arrival`, or `None` when
    /// every window has already closed.
    pub fn earliest_from(&self, arrival: Duration) -> Option<Duration> {
        self.0
            .iter()
            .find(|tw| arrival <= tw.end)
            .map(|tw| arrival.max(tw.start))
    }

    /// Largest feasible service start at or before `bound`, or `None` when no
    /// window opens early enough.
    pub fn latest_until(&self, bound: Duration) -> Option<Duration> {
        self.0
            .iter()
            .rev()
            .find(|tw| tw.start <= bound)
            .map(|tw| bound.min(tw.end))
    }

    pub fn contains(&self, t: Duration) -> bool {
        self.0.iter().any(|tw| tw.contains(t))
    }
}

impl Default for TimeWindows {
    fn default() -> Self {
        Self::horizon()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows() -> TimeWindows {
        TimeWindows::from_vec(vec![TimeWindow::new(100, 200), TimeWindow::new(400, 500)])
    }

    #[test]
    fn test_from_vec_sorts() {
        let tws = TimeWindows::from_vec(vec![TimeWindow::new(400, 500), TimeWindow::new(100, 200)]);
        assert_eq!(tws.earliest_start(), 100);
        assert_eq!(tws.latest_end(), 500);
        assert!(tws.is_sorted_disjoint());
    }

    #[test]
    fn test_earliest_from() {
        let tws = windows();

        assert_eq!(tws.earliest_from(0), Some(100));
        assert_eq!(tws.earliest_from(150), Some(150));
        assert_eq!(tws.earliest_from(200), Some(200));
        assert_eq!(tws.earliest_from(201), Some(400));
        assert_eq!(tws.earliest_from(500), Some(500));
        assert_eq!(tws.earliest_from(501), None);
    }

    #[test]
    fn test_latest_until() {
        let tws = windows();

        assert_eq!(tws.latest_until(600), Some(500));
        assert_eq!(tws.latest_until(450), Some(450));
        assert_eq!(tws.latest_until(300), Some(200));
        assert_eq!(tws.latest_until(100), Some(100));
        assert_eq!(tws.latest_until(99), None);
    }

    #[test]
    fn test_zero_width_window() {
        let tws = TimeWindows::single(TimeWindow::new(50, 50));

        assert_eq!(tws.earliest_from(50), Some(50));
        assert_eq!(tws.earliest_from(49), Some(50));
        assert_eq!(tws.earliest_from(51), None);
        assert!(tws.contains(50));
        assert!(!tws.contains(51));
    }

    #[test]
    fn test_empty_becomes_horizon() {
        let tws = TimeWindows::from_vec(vec![]);
        assert_eq!(tws.earliest_from(123), Some(123));
    }

    #[test]
    fn test_overlapping_detected() {
        let tws = TimeWindows::from_vec(vec![TimeWindow::new(0, 100), TimeWindow::new(100, 200)]);
        assert!(!tws.is_sorted_disjoint());
    }
}
