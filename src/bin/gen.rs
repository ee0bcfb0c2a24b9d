use std::{env, process::ExitCode};

use log::{error, info};
use rand::{SeedableRng, rngs::StdRng};

use nomad::{
    NomadErr, Result,
    matrix::{generate_ratings, write_matrix},
};

fn parse<T: std::str::FromStr>(value: &str, what: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| NomadErr::Configuration(format!("invalid {what} {value:?}: {e}")))
}

fn run(args: &[String]) -> Result<()> {
    let (output, rows, cols, seed) = match args {
        [output, rows, cols] => (output, rows, cols, None),
        [output, rows, cols, seed] => (output, rows, cols, Some(seed)),
        _ => {
            return Err(NomadErr::Configuration(
                "usage: nomad-gen <output> <rows> <cols> [seed]".into(),
            ));
        }
    };

    let rows = parse(rows, "row count")?;
    let cols = parse(cols, "column count")?;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(parse(seed, "seed")?),
        None => StdRng::from_os_rng(),
    };

    let ratings = generate_ratings(rows, cols, &mut rng);
    let observed = ratings.iter().filter(|&&v| v != 0.).count();

    write_matrix(output, &ratings, 0)?;
    info!("wrote a {rows}x{cols} matrix with {observed} ratings to {output}");
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
