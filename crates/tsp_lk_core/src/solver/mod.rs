//! The search engine: candidate construction, trial driver, and run loop.

pub(crate) mod ascent;
pub(crate) mod candidates;
pub(crate) mod genetic;
pub(crate) mod hash;
pub(crate) mod initial;
pub(crate) mod lk;
pub(crate) mod merge;
pub(crate) mod twolevel;

use std::{path::Path, time::Instant};

use log::{debug, info};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    Error, InitialTourAlgorithm, Parameters, Problem, Result, TourFile,
};
use candidates::{ALPHA_INFINITY, CandidateSet};
use genetic::Population;
use hash::{HashTable, TourHasher};
use lk::SearchLimits;
use merge::merge_tours;
use twolevel::TwoLevelTour;

/// Cost of "no tour found yet".
pub const PLUS_INFINITY: i64 = i64::MAX / 4;

#[derive(Clone, Debug)]
pub struct RunStats {
    pub run: usize,
    pub cost: i64,
    pub trials: usize,
    pub seconds: f64,
}

#[derive(Clone, Debug)]
pub struct Solution {
    /// Best tour in instance space (0-based ids); empty when none was found.
    pub tour: Vec<usize>,
    /// Cost of the best tour, or [`PLUS_INFINITY`].
    pub cost: i64,
    /// Held-Karp lower bound for the instance.
    pub lower_bound: f64,
    pub stats: Vec<RunStats>,
}

/// Solves a loaded problem under the given parameters.
pub fn solve(problem: Problem, mut params: Parameters) -> Result<Solution> {
    params.resolve(problem.dimension);
    if params.subproblem_size > 0 {
        return Err(Error::invalid_input(
            "SUBPROBLEM_SIZE > 0 requires an external partitioning strategy",
        ));
    }
    if problem.dimension <= 3 {
        return trivial_solution(&problem, &params);
    }
    Solver::new(problem, params)?.run()
}

/// Instances of up to three nodes have exactly one tour up to symmetry.
fn trivial_solution(problem: &Problem, params: &Parameters) -> Result<Solution> {
    let tour: Vec<usize> = (0..problem.dimension).collect();
    let cost = problem.tour_cost(&tour);
    write_tour(problem, params.output_tour_file.as_deref(), &tour, cost)?;
    write_tour(problem, params.tour_file.as_deref(), &tour, cost)?;
    Ok(Solution {
        tour: problem.reduce_tour(&tour),
        cost,
        lower_bound: cost as f64,
        stats: Vec::new(),
    })
}

fn write_tour(
    problem: &Problem,
    path: Option<&Path>,
    tour: &[usize],
    cost: i64,
) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    TourFile::from_tour(&problem.name, &problem.reduce_tour(tour), cost).write_to_file(path)
}

fn adjacency(tour: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let n = tour.len();
    let mut succ = vec![0; n];
    let mut pred = vec![0; n];
    for (at, &v) in tour.iter().enumerate() {
        let w = tour[(at + 1) % n];
        succ[v] = w;
        pred[w] = v;
    }
    (succ, pred)
}

/// Reproducible per-trial stream: a splitmix64 mix of seed, run, and trial.
fn trial_seed(seed: u64, run: usize, trial: usize) -> u64 {
    let mut x = seed
        ^ (run as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (trial as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

struct Solver {
    problem: Problem,
    params: Parameters,
    pi: Vec<i64>,
    cands: CandidateSet,
    hasher: TourHasher,
    hash: HashTable,
    population: Population,
    best_tour: Vec<usize>,
    best_cost: i64,
    better_tour: Vec<usize>,
    better_cost: i64,
    next_best_tour: Option<Vec<usize>>,
    /// Tour to use verbatim on the next run's first trial (user file or
    /// crossover child).
    pending_initial: Option<Vec<usize>>,
    ordinal_cost: i64,
    optimum: Option<i64>,
    lower_bound: i64,
    norm: i64,
    /// Set when the ascent's 1-tree is itself a tour.
    ascent_tour: Option<Vec<usize>>,
}

impl Solver {
    fn new(problem: Problem, params: Parameters) -> Result<Self> {
        let n = problem.dimension;
        let precision = params.precision;

        let outcome = if params.subgradient {
            ascent::ascent(
                n,
                |i, j| problem.distance(i, j),
                precision,
                params.initial_period.unwrap_or(100),
                params.initial_step_size,
            )
        } else {
            // Alpha ranking against the plain 1-tree, no potential search.
            let tree = ascent::minimum_one_tree(n, |i, j| problem.distance(i, j) * precision);
            let norm = tree.norm;
            let lower_bound = tree.total;
            ascent::AscentOutcome {
                pi: vec![0; n],
                lower_bound,
                norm,
                tree,
            }
        };
        info!(
            "Ascent: lower bound = {:.1}, norm = {}",
            outcome.lower_bound as f64 / precision as f64,
            outcome.norm
        );

        let pi = outcome.pi;
        let excess = params.excess.unwrap_or(1.0 / n as f64);
        let max_alpha = (excess * outcome.lower_bound.unsigned_abs() as f64) as i64;
        let c = |i: usize, j: usize| problem.distance(i, j) * precision + pi[i] + pi[j];
        let cands = CandidateSet::create(
            n,
            &c,
            &outcome.tree,
            params.max_candidates,
            params.ascent_candidates,
            max_alpha,
        );

        let ascent_tour = (outcome.norm == 0).then(|| outcome.tree.as_tour());
        let identity: Vec<usize> = (0..n).collect();
        let ordinal_cost = problem.tour_cost(&identity);

        let mut optimum = params.optimum;
        if optimum.is_none()
            && matches!(
                problem.problem_type,
                crate::ProblemType::Hcp | crate::ProblemType::Hpp
            )
        {
            // A Hamiltonian cycle uses only unit edges.
            optimum = Some(n as i64);
        }

        let hasher = TourHasher::new(n);
        let max_population_size = params.max_population_size;
        let mut solver = Self {
            problem,
            params,
            pi,
            cands,
            hasher,
            hash: HashTable::new(),
            population: Population::new(max_population_size),
            best_tour: Vec::new(),
            best_cost: PLUS_INFINITY,
            better_tour: Vec::new(),
            better_cost: PLUS_INFINITY,
            next_best_tour: None,
            pending_initial: None,
            ordinal_cost,
            optimum,
            lower_bound: outcome.lower_bound,
            norm: outcome.norm,
            ascent_tour,
        };
        solver.load_initial_tour_file()?;
        Ok(solver)
    }

    fn load_initial_tour_file(&mut self) -> Result<()> {
        let Some(path) = self.params.initial_tour_file.clone() else {
            return Ok(());
        };
        let base = TourFile::from_file(&path)?.zero_based_tour()?;
        if base.len() != self.problem.base_dimension {
            return Err(Error::invalid_data(format!(
                "initial tour has {} nodes, problem has {}",
                base.len(),
                self.problem.base_dimension
            )));
        }
        self.pending_initial = Some(self.problem.expand_tour(&base));
        Ok(())
    }

    fn run(&mut self) -> Result<Solution> {
        let precision = self.params.precision;
        let lower_bound = self.lower_bound as f64 / precision as f64;

        if self.norm == 0 {
            // The bound is achieved by the 1-tree itself; no search needed.
            let tour = self.ascent_tour.clone().expect("norm zero implies a tour");
            let cost = self.problem.tour_cost(&tour);
            info!("Ascent solved the instance: Cost = {cost}");
            self.best_tour = tour;
            self.best_cost = cost;
            self.optimum = Some(cost);
            write_tour(
                &self.problem,
                self.params.output_tour_file.as_deref(),
                &self.best_tour,
                cost,
            )?;
            write_tour(
                &self.problem,
                self.params.tour_file.as_deref(),
                &self.best_tour,
                cost,
            )?;
            return Ok(Solution {
                tour: self.problem.reduce_tour(&self.best_tour),
                cost,
                lower_bound,
                stats: Vec::new(),
            });
        }

        let runs = self.params.runs.max(1);
        let max_trials = self.params.max_trials.unwrap_or(self.problem.dimension);
        let mut stats = Vec::new();

        for run in 1..=runs {
            let run_start = Instant::now();
            let (mut cost, trials) = self.find_tour(run, max_trials)?;
            let mut seq = self.better_tour.clone();

            if cost < PLUS_INFINITY {
                if self.params.max_population_size > 1 {
                    for at in 0..self.population.len() {
                        let (merged, merged_cost) = self.merge_with(&seq, at)?;
                        if merged_cost < cost {
                            info!("  Merged with {}: Cost = {merged_cost}", at + 1);
                            seq = merged;
                            cost = merged_cost;
                        }
                    }
                } else if run > 1 && !self.best_tour.is_empty() {
                    let best = self.best_tour.clone();
                    let merged = self.merge_seqs(&seq, &best);
                    let merged_cost = self.problem.tour_cost(&merged);
                    if merged_cost < cost {
                        seq = merged;
                        cost = merged_cost;
                    }
                }
            }

            if cost < self.best_cost {
                self.best_cost = cost;
                self.best_tour = seq.clone();
                write_tour(
                    &self.problem,
                    self.params.output_tour_file.as_deref(),
                    &seq,
                    cost,
                )?;
                write_tour(&self.problem, self.params.tour_file.as_deref(), &seq, cost)?;
            }

            let old_optimum = self.optimum;
            if let Some(optimum) = self.optimum
                && cost < optimum
            {
                self.optimum = Some(cost);
                info!("*** New optimum = {cost} ***");
            }

            let seconds = run_start.elapsed().as_secs_f64();
            if cost < PLUS_INFINITY {
                let gap = old_optimum
                    .filter(|&o| o != 0)
                    .map(|o| format!(", Gap = {:.4}%", 100.0 * (cost - o) as f64 / o as f64))
                    .unwrap_or_default();
                info!("Run {run}: Cost = {cost}{gap}, Time = {seconds:.2} sec.");
            }
            stats.push(RunStats {
                run,
                cost,
                trials,
                seconds,
            });

            if self.params.stop_at_optimum && Some(cost) == old_optimum {
                break;
            }

            if self.params.max_population_size > 1
                && cost < PLUS_INFINITY
                && !self.population.has_fitness(cost)
            {
                if !self.population.is_full() {
                    self.population.add(cost, seq.clone());
                } else if self.population.worst_cost().is_some_and(|worst| cost < worst) {
                    let mut rng = StdRng::seed_from_u64(trial_seed(self.params.seed, run, 0));
                    self.population.replace(cost, seq.clone(), &mut rng);
                }
            }

            if self.population.len() >= 2 && self.population.is_full() && run < runs {
                self.breed_next_initial(run);
            }
        }

        if !self.best_tour.is_empty() {
            write_tour(
                &self.problem,
                self.params.tour_file.as_deref(),
                &self.best_tour.clone(),
                self.best_cost,
            )?;
        }
        self.log_statistics(&stats);

        Ok(Solution {
            tour: self.problem.reduce_tour(&self.best_tour),
            cost: self.best_cost,
            lower_bound,
            stats,
        })
    }

    /// One run: up to `max_trials` searches from randomized initial tours.
    fn find_tour(&mut self, run: usize, max_trials: usize) -> Result<(i64, usize)> {
        let Self {
            problem,
            params,
            pi,
            cands,
            hasher,
            hash,
            better_tour,
            better_cost,
            best_cost,
            next_best_tour,
            pending_initial,
            ordinal_cost,
            optimum,
            ..
        } = self;
        let n = problem.dimension;
        let precision = params.precision;
        let c = |i: usize, j: usize| problem.distance(i, j) * precision + pi[i] + pi[j];

        let entry = Instant::now();
        *better_cost = PLUS_INFINITY;
        better_tour.clear();
        *next_best_tour = None;
        hash.clear();
        if max_trials == 0 {
            return Ok((PLUS_INFINITY, 0));
        }

        let use_backbone = params.backbone_trials > 0 && params.backbone_trials < max_trials;
        if use_backbone {
            cands.init_backbone();
        }
        let mut backbone_active = false;

        let limits = SearchLimits {
            move_type: params.move_type,
            backtracking: params.backtracking,
            max_swaps: params.max_swaps.unwrap_or(n),
        };
        let mut trials_used = 0;

        for trial in 1..=max_trials {
            if trial > 1 && entry.elapsed().as_secs_f64() >= params.time_limit {
                info!("*** Time limit exceeded ***");
                break;
            }
            trials_used = trial;

            let mut rng = StdRng::seed_from_u64(trial_seed(params.seed, run, trial));
            let start = rng.random_range(0..n);
            let initial = if trial == 1 && pending_initial.is_some() {
                pending_initial.take().expect("checked above")
            } else {
                choose_initial(problem, params, cands, &c, trial, start, &mut rng)
            };

            let mut tour = TwoLevelTour::new(&initial);
            lk::optimize(&mut tour, &c, cands, &limits);
            let mut seq = tour.to_vec(start);
            let mut cost = problem.tour_cost(&seq);

            let duplicate = hash.search(hasher.signature(&seq), cost);
            if duplicate {
                debug!("  {trial}: Cost = {cost} (already seen)");
            } else {
                if !better_tour.is_empty() {
                    let merged = merge_tours(&c, &seq, better_tour);
                    let merged_cost = problem.tour_cost(&merged);
                    if merged_cost < cost {
                        seq = merged;
                        cost = merged_cost;
                    }
                }
                if cost >= *ordinal_cost && *better_cost > *ordinal_cost {
                    let identity: Vec<usize> = (0..n).collect();
                    let merged = merge_tours(&c, &seq, &identity);
                    let merged_cost = problem.tour_cost(&merged);
                    if merged_cost < cost {
                        seq = merged;
                        cost = merged_cost;
                    }
                }

                if cost < *better_cost {
                    let elapsed = entry.elapsed().as_secs_f64();
                    let gap = optimum
                        .filter(|&o| o != 0)
                        .map(|o| format!(", Gap = {:.4}%", 100.0 * (cost - o) as f64 / o as f64))
                        .unwrap_or_default();
                    info!("* {trial}: Cost = {cost}{gap}, Time = {elapsed:.2} sec.");

                    if !better_tour.is_empty() {
                        *next_best_tour = Some(better_tour.clone());
                    }
                    *better_cost = cost;
                    *better_tour = seq.clone();
                    if cost < *best_cost {
                        write_tour(problem, params.output_tour_file.as_deref(), &seq, cost)?;
                    }
                    if params.stop_at_optimum && Some(cost) == *optimum {
                        break;
                    }
                    let (succ, pred) = adjacency(better_tour);
                    let (next_succ, next_pred) = match next_best_tour {
                        Some(next) => {
                            let (s, p) = adjacency(next);
                            (Some(s), Some(p))
                        }
                        None => (None, None),
                    };
                    cands.adjust(&c, &succ, &pred, next_succ.as_deref(), next_pred.as_deref());
                    hash.clear();
                    hash.insert(hasher.signature(&seq), cost);
                } else {
                    debug!("  {trial}: Cost = {cost}");
                }
            }

            // Backbone recording: early trials evolve a second candidate set
            // that takes over for the late trials.
            if use_backbone && trial <= params.backbone_trials {
                cands.swap_backbone();
                backbone_active = true;
                if !better_tour.is_empty() {
                    let (succ, pred) = adjacency(better_tour);
                    cands.adjust(&c, &succ, &pred, None, None);
                }
                if trial == params.backbone_trials {
                    debug!("# {trial}: backbone candidates in effect");
                } else {
                    cands.swap_backbone();
                    backbone_active = false;
                }
            }
        }

        if backbone_active {
            cands.swap_backbone();
        }
        if use_backbone {
            cands.drop_backbone();
        }
        cands.reset();
        Ok((*better_cost, trials_used))
    }

    fn merge_seqs(&self, a: &[usize], b: &[usize]) -> Vec<usize> {
        let precision = self.params.precision;
        let problem = &self.problem;
        let pi = &self.pi;
        let c = |i: usize, j: usize| problem.distance(i, j) * precision + pi[i] + pi[j];
        merge_tours(&c, a, b)
    }

    fn merge_with(&self, seq: &[usize], member: usize) -> Result<(Vec<usize>, i64)> {
        let merged = self.merge_seqs(seq, &self.population.member(member).tour);
        let cost = self.problem.tour_cost(&merged);
        Ok((merged, cost))
    }

    /// Recombines two parents into the next run's initial tour and seeds the
    /// candidate lists with the child's edges.
    fn breed_next_initial(&mut self, run: usize) {
        let mut rng = StdRng::seed_from_u64(trial_seed(self.params.seed, run, usize::MAX));
        let (p1, p2) = self.population.select_parents(&mut rng);
        let child = genetic::crossover_erx(
            &self.population.member(p1).tour,
            &self.population.member(p2).tour,
            &self.cands,
        );

        if !matches!(
            self.problem.problem_type,
            crate::ProblemType::Hcp | crate::ProblemType::Hpp
        ) {
            let precision = self.params.precision;
            for (at, &u) in child.iter().enumerate() {
                let v = child[(at + 1) % child.len()];
                let cost = self.problem.distance(u, v) * precision + self.pi[u] + self.pi[v];
                self.cands.extend(u, v, cost, ALPHA_INFINITY);
                self.cands.extend(v, u, cost, ALPHA_INFINITY);
            }
        }
        self.pending_initial = Some(child);
    }

    fn log_statistics(&self, stats: &[RunStats]) {
        let successful: Vec<&RunStats> =
            stats.iter().filter(|s| s.cost < PLUS_INFINITY).collect();
        if successful.is_empty() {
            return;
        }
        let min = successful.iter().map(|s| s.cost).min().expect("non-empty");
        let max = successful.iter().map(|s| s.cost).max().expect("non-empty");
        let sum: i64 = successful.iter().map(|s| s.cost).sum();
        let time: f64 = stats.iter().map(|s| s.seconds).sum();
        info!(
            "Cost.min = {min}, Cost.avg = {:.2}, Cost.max = {max}, Runs = {}, Time.total = {time:.2} sec.",
            sum as f64 / successful.len() as f64,
            stats.len(),
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn choose_initial(
    problem: &Problem,
    params: &Parameters,
    cands: &CandidateSet,
    c: &dyn Fn(usize, usize) -> i64,
    trial: usize,
    start: usize,
    rng: &mut StdRng,
) -> Vec<usize> {
    let n = problem.dimension;
    match params.initial_tour_algorithm {
        InitialTourAlgorithm::Walk => initial::walk(start, cands, rng),
        InitialTourAlgorithm::NearestNeighbor => initial::nearest_neighbor(n, c, start),
        // The deterministic constructors seed the first trial only; later
        // trials need the diversity of the walk.
        InitialTourAlgorithm::Greedy if trial == 1 => initial::greedy(n, c, cands),
        InitialTourAlgorithm::Boruvka if trial == 1 => initial::boruvka(n, c, cands),
        InitialTourAlgorithm::Sierpinski | InitialTourAlgorithm::Moore if trial == 1 => {
            match problem.coordinates() {
                Some(points) => initial::space_filling(
                    points,
                    params.initial_tour_algorithm == InitialTourAlgorithm::Moore,
                ),
                None => initial::walk(start, cands, rng),
            }
        }
        _ => initial::walk(start, cands, rng),
    }
}
