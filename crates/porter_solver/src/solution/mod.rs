pub mod route;
pub mod schedule;
pub mod solution;

pub use route::Route;
pub use schedule::{Schedule, ScheduledBreak};
pub use solution::Solution;
