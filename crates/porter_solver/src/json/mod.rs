pub mod input;
pub mod output;

pub use input::{decode_problem, VrpInput};
pub use output::{encode_solution, SolutionReport};
