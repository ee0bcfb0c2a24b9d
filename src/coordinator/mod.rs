//! Drives a run from partitioning to the final gather.

mod node;

use std::{fmt, io, net::SocketAddr};

use ndarray::Array2;
use tokio::task::JoinSet;

use crate::{
    cluster::Cluster,
    config::TrainConfig,
    error::{NomadErr, Result},
    matrix::RatingMatrix,
};

pub use node::Node;

/// The lifecycle of a process, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Seeding,
    Running,
    Finalizing,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Seeding => "seeding",
            Self::Running => "running",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        };

        f.write_str(name)
    }
}

/// What a process ends a run with.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub rank: usize,
    /// Tokens left in the process's queue once every process stopped.
    pub tokens: usize,
    /// Gradient steps applied by the process.
    pub updates: u64,
    /// The completed matrix, in original row order, only on process 0.
    pub prediction: Option<Array2<f64>>,
}

/// Runs `world` processes inside this one, joined by in-memory pipes.
///
/// # Arguments
/// * `config` - The training knobs.
/// * `matrix` - The rating matrix to complete.
/// * `world` - The amount of processes.
///
/// # Returns
/// The report of every process in rank order, or the first error any of
/// them ran into, which stops the others.
pub async fn run_local(
    config: &TrainConfig,
    matrix: &RatingMatrix,
    world: usize,
) -> Result<Vec<RunReport>> {
    let mut nodes = Vec::with_capacity(world);
    let mut states = Vec::with_capacity(world);

    for rank in 0..world {
        let (node, state) = Node::init(config, matrix, rank, world)?;
        nodes.push(node);
        states.push(state);
    }

    let clusters = Cluster::local(states).await?;

    let mut tasks = JoinSet::new();
    for (node, cluster) in nodes.into_iter().zip(clusters) {
        tasks.spawn(node.run(cluster));
    }

    let mut reports = Vec::with_capacity(world);
    while let Some(joined) = tasks.join_next().await {
        let report = joined.map_err(|e| NomadErr::Io(io::Error::other(e)))??;
        reports.push(report);
    }

    reports.sort_by_key(|report| report.rank);
    Ok(reports)
}

/// Runs this process as `rank` of a group talking over TCP.
///
/// # Arguments
/// * `config` - The training knobs, identical on every process.
/// * `matrix` - The rating matrix to complete, identical on every process.
/// * `rank` - This process's rank.
/// * `peers` - The address of every process, in rank order.
pub async fn run_tcp(
    config: &TrainConfig,
    matrix: &RatingMatrix,
    rank: usize,
    peers: &[SocketAddr],
) -> Result<RunReport> {
    let (node, state) = Node::init(config, matrix, rank, peers.len())?;
    let cluster = Cluster::tcp(state, peers).await?;
    node.run(cluster).await
}
