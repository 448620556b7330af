//! Parameter-file model and parser.
//!
//! Parameter files are line-oriented `KEY = VALUE` text. Keys are
//! case-insensitive; `#` lines and `COMMENT` lines are skipped; unknown keys
//! are a fatal parse error reported with file, line, and offending token.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{Error, Result};

const DEFAULT_RUNS: usize = 10;
const DEFAULT_MAX_CANDIDATES: usize = 5;
const DEFAULT_ASCENT_CANDIDATES: usize = 50;
const DEFAULT_MOVE_TYPE: usize = 5;
const DEFAULT_PRECISION: i64 = 100;
const DEFAULT_SEED: u64 = 1;
const DEFAULT_INITIAL_STEP_SIZE: i64 = 1;
const DEFAULT_TRACE_LEVEL: usize = 1;
const MIN_MOVE_TYPE: usize = 2;
const MAX_MOVE_TYPE: usize = 5;

/// Algorithms accepted for `INITIAL_TOUR_ALGORITHM`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InitialTourAlgorithm {
    /// Candidate-biased random walk (the default).
    Walk,
    NearestNeighbor,
    Greedy,
    Boruvka,
    /// Space-filling-curve order over node coordinates.
    Sierpinski,
    /// Moore-curve order over node coordinates.
    Moore,
}

impl InitialTourAlgorithm {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "WALK" => Some(Self::Walk),
            "NEAREST-NEIGHBOR" | "NEAREST_NEIGHBOR" => Some(Self::NearestNeighbor),
            "GREEDY" => Some(Self::Greedy),
            "BORUVKA" => Some(Self::Boruvka),
            "SIERPINSKI" => Some(Self::Sierpinski),
            "MOORE" => Some(Self::Moore),
            _ => None,
        }
    }
}

/// Runtime configuration for a solver invocation.
///
/// Defaults follow the reference parameter set; fields left at `None` are
/// resolved against the problem dimension once it is known
/// (see [`Parameters::resolve`]).
#[derive(Clone, Debug)]
pub struct Parameters {
    /// Path of the problem file. Mandatory.
    pub problem_file: PathBuf,
    /// Tour file rewritten every time the best tour of the process improves.
    pub output_tour_file: Option<PathBuf>,
    /// Tour file written once, at the end of the final run.
    pub tour_file: Option<PathBuf>,
    /// Tour used verbatim as the first trial of run 1.
    pub initial_tour_file: Option<PathBuf>,
    /// Number of independent runs.
    pub runs: usize,
    /// Trials per run. Defaults to the problem dimension.
    pub max_trials: Option<usize>,
    /// Candidate edges kept per node after the ascent.
    pub max_candidates: usize,
    /// Neighbors per node examined when ranking candidate edges.
    pub ascent_candidates: usize,
    /// Sequential move depth: `k` activates sequential k-opt (2..=5).
    pub move_type: usize,
    /// Whether the first two search levels backtrack over candidates.
    pub backtracking: bool,
    /// Early trials run against a separately evolving backbone candidate set.
    pub backbone_trials: usize,
    /// Internal cost scaler; every reported cost is divisible by it.
    pub precision: i64,
    /// Base seed; each (run, trial) derives its own stream from it.
    pub seed: u64,
    /// Wall-clock limit per run, in seconds.
    pub time_limit: f64,
    /// Population capacity of the recombination layer; 0 or 1 disables it.
    pub max_population_size: usize,
    /// Stop as soon as a tour of cost `OPTIMUM` is found.
    pub stop_at_optimum: bool,
    /// Known optimal tour length, when the user supplies one.
    pub optimum: Option<i64>,
    /// Length of the first subgradient period. Defaults to dimension/2.
    pub initial_period: Option<usize>,
    /// Initial subgradient step size.
    pub initial_step_size: i64,
    pub initial_tour_algorithm: InitialTourAlgorithm,
    /// Whether pi-values are determined by subgradient optimization.
    pub subgradient: bool,
    /// Max candidate alpha as a fraction of the lower bound. Defaults to 1/dimension.
    pub excess: Option<f64>,
    /// Output verbosity; maps onto the log filter.
    pub trace_level: usize,
    /// File target for log output; stderr when unset.
    pub log_file: Option<PathBuf>,
    /// Prefix log lines with a millisecond timestamp.
    pub log_timestamp: bool,
    /// Subproblem partitioning size. Nonzero values are rejected: the
    /// partitioning strategies live outside this crate.
    pub subproblem_size: usize,
    /// Cap on tour flips per trial. Defaults to the problem dimension.
    pub max_swaps: Option<usize>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            problem_file: PathBuf::new(),
            output_tour_file: None,
            tour_file: None,
            initial_tour_file: None,
            runs: DEFAULT_RUNS,
            max_trials: None,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            ascent_candidates: DEFAULT_ASCENT_CANDIDATES,
            move_type: DEFAULT_MOVE_TYPE,
            backtracking: false,
            backbone_trials: 0,
            precision: DEFAULT_PRECISION,
            seed: DEFAULT_SEED,
            time_limit: f64::INFINITY,
            max_population_size: 0,
            stop_at_optimum: true,
            optimum: None,
            initial_period: None,
            initial_step_size: DEFAULT_INITIAL_STEP_SIZE,
            initial_tour_algorithm: InitialTourAlgorithm::Walk,
            subgradient: true,
            excess: None,
            trace_level: DEFAULT_TRACE_LEVEL,
            log_file: None,
            log_timestamp: false,
            subproblem_size: 0,
            max_swaps: None,
        }
    }
}

impl Parameters {
    /// Reads and parses a parameter file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Parses parameter text. `origin` names the source in error messages.
    pub fn parse(text: &str, origin: &str) -> Result<Self> {
        let mut params = Self::default();
        let mut saw_problem_file = false;

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.eq_ignore_ascii_case("EOF") {
                break;
            }
            let upper = line.to_ascii_uppercase();
            if upper.starts_with("COMMENT") {
                continue;
            }

            let Some((raw_key, raw_value)) = line.split_once('=') else {
                return Err(Error::parse(
                    origin,
                    line_no,
                    format!("expected KEY = VALUE, got '{line}'"),
                ));
            };
            let key = raw_key.trim().to_ascii_uppercase();
            let value = raw_value.trim();
            if value.is_empty() {
                return Err(Error::parse(origin, line_no, format!("missing value for {key}")));
            }

            match key.as_str() {
                "PROBLEM_FILE" => {
                    params.problem_file = PathBuf::from(value);
                    saw_problem_file = true;
                }
                "OUTPUT_TOUR_FILE" => params.output_tour_file = Some(PathBuf::from(value)),
                "TOUR_FILE" => params.tour_file = Some(PathBuf::from(value)),
                "INITIAL_TOUR_FILE" => params.initial_tour_file = Some(PathBuf::from(value)),
                "RUNS" => params.runs = parse_usize(origin, line_no, &key, value)?,
                "MAX_TRIALS" => {
                    params.max_trials = Some(parse_usize(origin, line_no, &key, value)?);
                }
                "MAX_CANDIDATES" => {
                    params.max_candidates = parse_usize(origin, line_no, &key, value)?;
                }
                "ASCENT_CANDIDATES" => {
                    params.ascent_candidates = parse_usize(origin, line_no, &key, value)?;
                }
                "MOVE_TYPE" => {
                    let move_type = parse_usize(origin, line_no, &key, value)?;
                    if !(MIN_MOVE_TYPE..=MAX_MOVE_TYPE).contains(&move_type) {
                        return Err(Error::parse(
                            origin,
                            line_no,
                            format!("MOVE_TYPE must be in {MIN_MOVE_TYPE}..={MAX_MOVE_TYPE}, got {move_type}"),
                        ));
                    }
                    params.move_type = move_type;
                }
                "BACKTRACKING" => params.backtracking = parse_yes_no(origin, line_no, &key, value)?,
                "BACKBONE_TRIALS" => {
                    params.backbone_trials = parse_usize(origin, line_no, &key, value)?;
                }
                "PRECISION" => {
                    let precision = parse_i64(origin, line_no, &key, value)?;
                    if precision <= 0 {
                        return Err(Error::parse(
                            origin,
                            line_no,
                            format!("PRECISION must be positive, got {precision}"),
                        ));
                    }
                    params.precision = precision;
                }
                "SEED" => {
                    params.seed = value.parse::<u64>().map_err(|e| {
                        Error::parse(origin, line_no, format!("bad SEED value '{value}': {e}"))
                    })?;
                }
                "TIME_LIMIT" => {
                    let limit = value.parse::<f64>().map_err(|e| {
                        Error::parse(origin, line_no, format!("bad TIME_LIMIT value '{value}': {e}"))
                    })?;
                    if limit < 0.0 {
                        return Err(Error::parse(
                            origin,
                            line_no,
                            format!("TIME_LIMIT must be non-negative, got {limit}"),
                        ));
                    }
                    params.time_limit = limit;
                }
                "POPULATION_SIZE" | "MAX_POPULATION_SIZE" => {
                    params.max_population_size = parse_usize(origin, line_no, &key, value)?;
                }
                "STOP_AT_OPTIMUM" => {
                    params.stop_at_optimum = parse_yes_no(origin, line_no, &key, value)?;
                }
                "OPTIMUM" => params.optimum = Some(parse_i64(origin, line_no, &key, value)?),
                "INITIAL_PERIOD" => {
                    params.initial_period = Some(parse_usize(origin, line_no, &key, value)?);
                }
                "INITIAL_STEP_SIZE" => {
                    params.initial_step_size = parse_i64(origin, line_no, &key, value)?;
                }
                "INITIAL_TOUR_ALGORITHM" => {
                    params.initial_tour_algorithm =
                        InitialTourAlgorithm::parse(value).ok_or_else(|| {
                            Error::parse(
                                origin,
                                line_no,
                                format!("unknown INITIAL_TOUR_ALGORITHM '{value}'"),
                            )
                        })?;
                }
                "SUBGRADIENT" => params.subgradient = parse_yes_no(origin, line_no, &key, value)?,
                "EXCESS" => {
                    params.excess = Some(value.parse::<f64>().map_err(|e| {
                        Error::parse(origin, line_no, format!("bad EXCESS value '{value}': {e}"))
                    })?);
                }
                "TRACE_LEVEL" => params.trace_level = parse_usize(origin, line_no, &key, value)?,
                "LOG_FILE" => params.log_file = Some(PathBuf::from(value)),
                "LOG_TIMESTAMP" => {
                    params.log_timestamp = parse_yes_no(origin, line_no, &key, value)?;
                }
                "SUBPROBLEM_SIZE" => {
                    // Only the size itself; partitioning selectors would follow it.
                    let first = value.split_whitespace().next().unwrap_or(value);
                    params.subproblem_size = parse_usize(origin, line_no, &key, first)?;
                }
                "MAX_SWAPS" => {
                    params.max_swaps = Some(parse_usize(origin, line_no, &key, value)?);
                }
                _ => {
                    return Err(Error::parse(origin, line_no, format!("unknown key '{raw_key}'", raw_key = raw_key.trim())));
                }
            }
        }

        if !saw_problem_file {
            return Err(Error::invalid_input(format!(
                "{origin}: PROBLEM_FILE is mandatory"
            )));
        }

        Ok(params)
    }

    /// Fills dimension-dependent defaults once the problem size is known.
    pub fn resolve(&mut self, dimension: usize) {
        if self.max_trials.is_none() {
            self.max_trials = Some(dimension);
        }
        if self.max_swaps.is_none() {
            self.max_swaps = Some(dimension);
        }
        if self.initial_period.is_none() {
            self.initial_period = Some((dimension / 2).max(100));
        }
        if self.excess.is_none() {
            self.excess = Some(1.0 / dimension.max(1) as f64);
        }
    }
}

fn parse_usize(origin: &str, line_no: usize, key: &str, value: &str) -> Result<usize> {
    value
        .parse::<usize>()
        .map_err(|e| Error::parse(origin, line_no, format!("bad {key} value '{value}': {e}")))
}

fn parse_i64(origin: &str, line_no: usize, key: &str, value: &str) -> Result<i64> {
    value
        .parse::<i64>()
        .map_err(|e| Error::parse(origin, line_no, format!("bad {key} value '{value}': {e}")))
}

fn parse_yes_no(origin: &str, line_no: usize, key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_uppercase().as_str() {
        "YES" | "TRUE" | "1" => Ok(true),
        "NO" | "FALSE" | "0" => Ok(false),
        _ => Err(Error::parse(
            origin,
            line_no,
            format!("bad {key} value '{value}' (expected YES or NO)"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{InitialTourAlgorithm, Parameters};

    #[test]
    fn parse_reads_recognized_keys() {
        let text = "\
PROBLEM_FILE = gr17.tsp
# a comment line
COMMENT ignored as well
OUTPUT_TOUR_FILE = out.tour
RUNS = 3
MAX_TRIALS = 200
MAX_CANDIDATES = 8
MOVE_TYPE = 3
BACKTRACKING = YES
PRECISION = 10
SEED = 42
TIME_LIMIT = 1.5
MAX_POPULATION_SIZE = 4
STOP_AT_OPTIMUM = NO
OPTIMUM = 2085
INITIAL_TOUR_ALGORITHM = NEAREST-NEIGHBOR
TRACE_LEVEL = 2
LOG_FILE = run.log
LOG_TIMESTAMP = YES
EOF
";
        let params = Parameters::parse(text, "test.par").expect("parse parameters");
        assert_eq!(params.problem_file.to_str(), Some("gr17.tsp"));
        assert_eq!(params.runs, 3);
        assert_eq!(params.max_trials, Some(200));
        assert_eq!(params.max_candidates, 8);
        assert_eq!(params.move_type, 3);
        assert!(params.backtracking);
        assert_eq!(params.precision, 10);
        assert_eq!(params.seed, 42);
        assert_eq!(params.time_limit, 1.5);
        assert_eq!(params.max_population_size, 4);
        assert!(!params.stop_at_optimum);
        assert_eq!(params.optimum, Some(2085));
        assert_eq!(
            params.initial_tour_algorithm,
            InitialTourAlgorithm::NearestNeighbor
        );
        assert_eq!(params.trace_level, 2);
        assert_eq!(params.log_file, Some(PathBuf::from("run.log")));
        assert!(params.log_timestamp);
    }

    #[test]
    fn log_output_defaults_to_stderr_without_timestamps() {
        let params =
            Parameters::parse("PROBLEM_FILE = a.tsp\n", "test.par").expect("parse parameters");
        assert_eq!(params.log_file, None);
        assert!(!params.log_timestamp);
    }

    #[test]
    fn parse_rejects_bad_log_timestamp_value() {
        let err = Parameters::parse("PROBLEM_FILE = a.tsp\nLOG_TIMESTAMP = MAYBE\n", "test.par")
            .expect_err("bad boolean should fail");
        assert!(err.to_string().contains("LOG_TIMESTAMP"));
    }

    #[test]
    fn parse_keys_are_case_insensitive() {
        let params = Parameters::parse("problem_file = a.tsp\nruns = 2\n", "test.par")
            .expect("parse parameters");
        assert_eq!(params.runs, 2);
    }

    #[test]
    fn parse_rejects_unknown_keys_with_location() {
        let err = Parameters::parse("PROBLEM_FILE = a.tsp\nBOGUS_KEY = 1\n", "test.par")
            .expect_err("unknown key should fail");
        let message = err.to_string();
        assert!(message.contains("test.par:2"));
        assert!(message.contains("BOGUS_KEY"));
    }

    #[test]
    fn parse_rejects_missing_problem_file() {
        let err = Parameters::parse("RUNS = 1\n", "test.par")
            .expect_err("missing PROBLEM_FILE should fail");
        assert!(err.to_string().contains("PROBLEM_FILE"));
    }

    #[test]
    fn parse_rejects_out_of_range_move_type() {
        let err = Parameters::parse("PROBLEM_FILE = a.tsp\nMOVE_TYPE = 7\n", "test.par")
            .expect_err("move type 7 should fail");
        assert!(err.to_string().contains("MOVE_TYPE"));
    }

    #[test]
    fn resolve_fills_dimension_defaults() {
        let mut params =
            Parameters::parse("PROBLEM_FILE = a.tsp\n", "test.par").expect("parse parameters");
        params.resolve(280);
        assert_eq!(params.max_trials, Some(280));
        assert_eq!(params.max_swaps, Some(280));
        assert_eq!(params.initial_period, Some(140));
        assert!((params.excess.expect("excess") - 1.0 / 280.0).abs() < 1e-12);
    }

    #[test]
    fn resolve_keeps_small_initial_period_floor() {
        let mut params =
            Parameters::parse("PROBLEM_FILE = a.tsp\n", "test.par").expect("parse parameters");
        params.resolve(17);
        assert_eq!(params.initial_period, Some(100));
    }
}
