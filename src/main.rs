use std::{env, process::ExitCode};

use log::{error, info};

use nomad::{
    NomadErr, RatingMatrix, Result, RunConfig, Topology, matrix::write_matrix, run_local, run_tcp,
};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{} failed: {e}", e.operation());
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let path = env::args()
        .nth(1)
        .ok_or_else(|| NomadErr::Configuration("usage: nomad <run-file.json>".into()))?;

    let config = RunConfig::read(&path)?;
    let topology = Topology::from_env()?;

    let matrix = RatingMatrix::read(&config.input)?;
    let (rows, cols) = matrix.shape();
    info!("loaded a {rows}x{cols} matrix from {}", config.input.display());

    let prediction = match topology {
        Topology::Local { world } => {
            info!("running {world} processes locally");
            run_local(&config.training, &matrix, world)
                .await?
                .into_iter()
                .find_map(|report| report.prediction)
        }
        Topology::Tcp { rank, peers } => {
            info!("running as rank {rank} of {}", peers.len());
            run_tcp(&config.training, &matrix, rank, &peers)
                .await?
                .prediction
        }
    };

    if let Some(prediction) = prediction {
        write_matrix(&config.output, &prediction, config.precision)?;
        info!("wrote the completed matrix to {}", config.output.display());
    }

    Ok(())
}
