use std::{env, fs, process::ExitCode};

use log::{error, info};

use nomad::{
    NomadErr, Result,
    matrix::{from_triplets, write_matrix},
};

fn parse_dim(value: &str, what: &str) -> Result<usize> {
    value
        .parse()
        .map_err(|e| NomadErr::Configuration(format!("invalid {what} {value:?}: {e}")))
}

fn run(args: &[String]) -> Result<()> {
    let [input, output, rows, cols] = args else {
        return Err(NomadErr::Configuration(
            "usage: nomad-convert <records> <output> <rows> <cols>".into(),
        ));
    };

    let rows = parse_dim(rows, "row count")?;
    let cols = parse_dim(cols, "column count")?;

    let text = fs::read_to_string(input)?;
    let matrix = from_triplets(&text, rows, cols)?;
    let observed: usize = matrix.density().iter().sum();

    write_matrix(output, matrix.values(), 0)?;
    info!("converted {observed} ratings from {input} into a {rows}x{cols} matrix at {output}");
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
