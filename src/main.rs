use std::{env, process::ExitCode};

use log::error;

use tsp_lk_core::{PLUS_INFINITY, Parameters, Problem, logging, solve};

const USAGE: &str = "Usage: tsp-lk <parameter-file>";

fn main() -> ExitCode {
    let mut args = env::args().skip(1);
    let (Some(parameter_file), None) = (args.next(), args.next()) else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };
    if parameter_file == "--help" || parameter_file == "-h" {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    match run(&parameter_file) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(parameter_file: &str) -> tsp_lk_core::Result<()> {
    let params = Parameters::from_file(parameter_file)?;
    logging::init_logger(&params)?;

    let problem = Problem::from_file(&params.problem_file)?;
    let solution = solve(problem, params)?;

    if solution.cost < PLUS_INFINITY {
        println!("Cost = {}", solution.cost);
        println!("Lower bound = {:.1}", solution.lower_bound);
    } else {
        println!("No tour found");
    }
    Ok(())
}
