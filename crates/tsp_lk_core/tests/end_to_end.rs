//! File-to-file pipeline tests: parameter file in, tour file out.

use std::{
    fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use tsp_lk_core::{Parameters, Problem, TourFile, solve};

fn unique_temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("tsp-lk-e2e-{name}-{nanos}"));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn grid_problem_text() -> String {
    let mut text = String::from(
        "NAME: grid9\nTYPE: TSP\nDIMENSION: 9\nEDGE_WEIGHT_TYPE: EUC_2D\nNODE_COORD_SECTION\n",
    );
    let mut id = 1;
    for y in 0..3 {
        for x in 0..3 {
            text.push_str(&format!("{id} {} {}\n", x * 10, y * 10));
            id += 1;
        }
    }
    text.push_str("EOF\n");
    text
}

#[test]
fn solver_writes_a_valid_output_tour_file() {
    let dir = unique_temp_dir("output");
    let problem_path = dir.join("grid9.tsp");
    let tour_path = dir.join("grid9.tour");
    fs::write(&problem_path, grid_problem_text()).expect("write problem file");

    let param_text = format!(
        "PROBLEM_FILE = {}\nOUTPUT_TOUR_FILE = {}\nRUNS = 1\nMAX_TRIALS = 20\nSEED = 1\nSTOP_AT_OPTIMUM = NO\n",
        problem_path.display(),
        tour_path.display(),
    );
    let params = Parameters::parse(&param_text, "grid9.par").expect("parse parameters");
    let problem = Problem::from_file(&params.problem_file).expect("parse problem");
    let solution = solve(problem, params).expect("solve");

    let written = TourFile::from_file(&tour_path).expect("read output tour");
    let tour = written.zero_based_tour().expect("zero based tour");
    assert_eq!(tour, solution.tour);

    let mut sorted = tour;
    sorted.sort_unstable();
    assert_eq!(sorted, (0..9).collect::<Vec<_>>());
    assert!(
        written
            .comment_lines
            .iter()
            .any(|line| line.contains(&format!("Length = {}", solution.cost)))
    );

    fs::remove_dir_all(&dir).expect("cleanup temp dir");
}

#[test]
fn same_parameter_file_reproduces_the_tour_file_bit_for_bit() {
    let dir = unique_temp_dir("repro");
    let problem_path = dir.join("grid9.tsp");
    fs::write(&problem_path, grid_problem_text()).expect("write problem file");

    let run_once = |tour_path: &PathBuf| {
        let param_text = format!(
            "PROBLEM_FILE = {}\nTOUR_FILE = {}\nRUNS = 2\nMAX_TRIALS = 15\nSEED = 99\nSTOP_AT_OPTIMUM = NO\n",
            problem_path.display(),
            tour_path.display(),
        );
        let params = Parameters::parse(&param_text, "repro.par").expect("parse parameters");
        let problem = Problem::from_file(&params.problem_file).expect("parse problem");
        solve(problem, params).expect("solve");
        fs::read(tour_path).expect("read tour file")
    };

    let first = run_once(&dir.join("a.tour"));
    let second = run_once(&dir.join("b.tour"));
    assert_eq!(first, second);

    fs::remove_dir_all(&dir).expect("cleanup temp dir");
}

#[test]
fn initial_tour_file_is_used_verbatim_on_the_first_trial() {
    let dir = unique_temp_dir("initial");
    let problem_path = dir.join("grid9.tsp");
    let initial_path = dir.join("seed.tour");
    fs::write(&problem_path, grid_problem_text()).expect("write problem file");

    // A boustrophedon walk over the grid, supplied as a file.
    let seed_tour = [0usize, 1, 2, 5, 4, 3, 6, 7, 8];
    TourFile::from_tour("seed", &seed_tour, 0)
        .write_to_file(&initial_path)
        .expect("write initial tour");

    // MAX_SWAPS = 0 freezes the search, so the recorded cost can only come
    // from the seed tour itself.
    let param_text = format!(
        "PROBLEM_FILE = {}\nINITIAL_TOUR_FILE = {}\nRUNS = 1\nMAX_TRIALS = 1\nMAX_SWAPS = 0\nSEED = 5\nSTOP_AT_OPTIMUM = NO\n",
        problem_path.display(),
        initial_path.display(),
    );
    let params = Parameters::parse(&param_text, "initial.par").expect("parse parameters");
    let problem = Problem::from_file(&params.problem_file).expect("parse problem");
    let expected = problem.tour_cost(&seed_tour);
    let solution = solve(problem, params).expect("solve");

    assert_eq!(solution.cost, expected);

    fs::remove_dir_all(&dir).expect("cleanup temp dir");
}

#[test]
fn unreadable_problem_file_is_an_error() {
    let dir = unique_temp_dir("missing");
    let params = Parameters::parse(
        &format!("PROBLEM_FILE = {}\n", dir.join("nope.tsp").display()),
        "missing.par",
    )
    .expect("parse parameters");
    assert!(Problem::from_file(&params.problem_file).is_err());

    fs::remove_dir_all(&dir).expect("cleanup temp dir");
}
