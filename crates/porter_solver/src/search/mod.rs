pub mod cross_exchange;
pub mod driver;
pub mod exchange;
pub mod intra_or_opt;
pub mod intra_two_opt;
pub mod r#move;
pub mod or_opt;
pub mod pd_shift;
pub mod perturb;
pub mod priority_replace;
pub mod relocate;
pub mod route_exchange;
pub mod two_opt;
pub mod unassign;

pub use driver::LocalSearch;
pub use r#move::{Move, Operator};
