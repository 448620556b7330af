//! Lin-Kernighan TSP solving over TSPLIB instances.
//! Candidate edges are ranked by a Held-Karp subgradient ascent; repeated
//! trials, tour merging, and an optional population layer drive the search.

mod error;
pub mod logging;
mod params;
mod problem;
mod solver;
mod spec_writer;
mod tour;

pub use error::{Error, Result};
pub use params::{InitialTourAlgorithm, Parameters};
pub use problem::{EdgeWeightFormat, EdgeWeightType, Problem, ProblemType};
pub use solver::{PLUS_INFINITY, RunStats, Solution, solve};
pub use tour::TourFile;
