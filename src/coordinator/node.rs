use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use log::{debug, error, info};
use ndarray::Array2;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::prelude::*;
use tokio::task;

use super::{Phase, RunReport};
use crate::{
    cluster::{Cluster, LocalState},
    config::TrainConfig,
    error::{NomadErr, Result},
    initialization::RandParamGen,
    matrix::RatingMatrix,
    partition::Partition,
    sgd::{UpdateEngine, dot},
    storage::{COLUMN_HOME, ColumnSegment, RemoteHandle, RowFactors, ShardSnapshot},
    tokens::{LoadBalancer, TokenQueue},
};

/// Keeps the per-process seeds of a run apart.
const SEED_STRIDE: u64 = 1_234_567_890;

fn process_seed(base: Option<u64>, rank: usize) -> u64 {
    let base = base.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or_default()
    });

    base.wrapping_add(SEED_STRIDE.wrapping_mul(rank as u64))
}

/// A single training process.
pub struct Node {
    phase: Phase,
    rank: usize,
    world: usize,
    total_rows: usize,
    items: usize,
    width: usize,
    epochs: usize,
    rows: Vec<usize>,
    ratings: RatingMatrix,
    factors: RowFactors,
    segment: Option<Arc<ColumnSegment>>,
    engine: UpdateEngine,
    queue: TokenQueue,
    rng: StdRng,
}

impl Node {
    /// Prepares process `rank`: picks its rows, allocates its factors and, on
    /// process 0, the column segment.
    ///
    /// # Arguments
    /// * `config` - The training knobs.
    /// * `matrix` - The whole rating matrix.
    /// * `rank` - This process's rank.
    /// * `world` - The amount of processes.
    ///
    /// # Returns
    /// The node together with the state it exposes to its peers, or a
    /// `Configuration` error.
    pub fn init(
        config: &TrainConfig,
        matrix: &RatingMatrix,
        rank: usize,
        world: usize,
    ) -> Result<(Self, Arc<LocalState>)> {
        config.validate()?;

        if rank >= world {
            return Err(NomadErr::Configuration(format!(
                "rank {rank} is out of range for {world} processes"
            )));
        }

        let (total_rows, items) = matrix.shape();
        let partition = Partition::balanced(&matrix.density(), world)?;
        let width = config.embeddings_for(total_rows, items);

        let rows = partition.rows(rank).to_vec();
        let ratings = matrix.select(&rows);
        let factors = RowFactors::zeroed(rows.len(), width);

        let segment =
            (rank == COLUMN_HOME).then(|| Arc::new(ColumnSegment::zeroed(items, width)));
        let (state, queue) = LocalState::new(rank, world, segment.clone());

        let engine = UpdateEngine::new(
            rows.len(),
            items,
            width,
            config.schedule(),
            config.lambda,
            config.regularization,
        );

        info!(
            rank = rank;
            "{} of {total_rows} rows, {} ratings, K = {width}",
            rows.len(),
            partition.loads()[rank]
        );

        let node = Self {
            phase: Phase::Init,
            rank,
            world,
            total_rows,
            items,
            width,
            epochs: config.epochs,
            rows,
            ratings,
            factors,
            segment,
            engine,
            queue,
            rng: StdRng::seed_from_u64(process_seed(config.seed, rank)),
        };

        Ok((node, state))
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        info!(rank = self.rank; "{} -> {phase}", self.phase);
        self.phase = phase;
    }

    /// Runs every remaining phase and leaves the group.
    ///
    /// # Arguments
    /// * `cluster` - This process's view of the group.
    ///
    /// # Returns
    /// The run report, or the first error, which ends the run for this process.
    pub async fn run(mut self, cluster: Cluster) -> Result<RunReport> {
        let rank = self.rank;
        let report = self.drive(cluster).await;

        if let Err(e) = &report {
            error!(rank = rank; "{} failed: {e}", e.operation());
        }

        report
    }

    async fn drive(&mut self, cluster: Cluster) -> Result<RunReport> {
        self.enter(Phase::Seeding);
        self.seed(&cluster).await?;
        cluster.barrier().await?;

        self.enter(Phase::Running);
        let column = cluster.segment(COLUMN_HOME)?.resolve().await?;

        let mut updates = 0;
        for epoch in 0..self.epochs {
            updates += self.step(&cluster, &column, epoch).await? as u64;
        }

        cluster.barrier().await?;

        self.enter(Phase::Finalizing);
        let tokens = self.queue.len();
        let snapshot = self.factors.clone().into_snapshot(self.rows.clone());
        cluster.publish_shard(snapshot)?;
        cluster.barrier().await?;

        let prediction = match self.rank {
            COLUMN_HOME => Some(self.gather(&cluster, &column).await?),
            _ => None,
        };

        cluster.barrier().await?;

        self.enter(Phase::Done);
        cluster.shutdown().await?;

        Ok(RunReport {
            rank: self.rank,
            tokens,
            updates,
            prediction,
        })
    }

    /// Draws the initial factors and, on process 0, deals every item's token
    /// to a uniformly chosen process.
    async fn seed(&mut self, cluster: &Cluster) -> Result<()> {
        let limit = self.factors.rows() * self.width;
        self.factors
            .fill(&mut RandParamGen::embedding(&mut self.rng, limit, self.width)?);

        let Some(segment) = &self.segment else {
            return Ok(());
        };

        segment.fill(&mut RandParamGen::embedding(
            &mut self.rng,
            segment.len(),
            self.width,
        )?);

        for item in 0..self.items {
            let owner = self.rng.random_range(0..self.world);

            if owner == self.rank {
                self.queue.enqueue_local(item);
            } else {
                cluster.transfer(item, owner).await?;
            }
        }

        debug!(rank = self.rank; "dealt {} tokens", self.items);
        Ok(())
    }

    /// Processes at most one token.
    ///
    /// # Returns
    /// The amount of gradient steps applied.
    async fn step(&mut self, cluster: &Cluster, column: &RemoteHandle, epoch: usize) -> Result<usize> {
        let Some(item) = self.queue.pop_front() else {
            task::yield_now().await;
            return Ok(0);
        };

        let applied = self
            .engine
            .update(item, self.ratings.values(), &mut self.factors, column)
            .await?;

        let destination = LoadBalancer::choose(cluster).await?;
        cluster.transfer(item, destination).await?;

        debug!(
            rank = self.rank, epoch = epoch;
            "item {item}: {applied} updates, handed to {destination}"
        );

        Ok(applied)
    }

    /// Materializes the completed matrix out of every published shard.
    async fn gather(&self, cluster: &Cluster, column: &RemoteHandle) -> Result<Array2<f64>> {
        let mut columns = vec![0.; self.items * self.width];
        column.read(0, &mut columns).await?;

        let mut shards = Vec::with_capacity(self.world);
        for rank in 0..self.world {
            shards.push(cluster.fetch_shard(rank, self.width).await?);
        }

        predict(self.total_rows, self.width, &shards, &columns)
    }
}

/// Computes every `W_i · H_j` in original row order.
///
/// # Arguments
/// * `rows` - The amount of rows of the whole matrix.
/// * `width` - The embedding dimension.
/// * `shards` - The row factors of every process.
/// * `columns` - The flattened column factors.
///
/// # Returns
/// The predicted matrix, or an error if some row isn't covered by any shard.
fn predict(
    rows: usize,
    width: usize,
    shards: &[ShardSnapshot],
    columns: &[f64],
) -> Result<Array2<f64>> {
    let mut owned: Vec<Option<&[f64]>> = vec![None; rows];

    for shard in shards {
        for (local, &row) in shard.rows().iter().enumerate() {
            let slot = usize::try_from(row)
                .ok()
                .and_then(|row| owned.get_mut(row))
                .ok_or_else(|| {
                    NomadErr::remote(COLUMN_HOME, "gather", format!("row {row} is out of range"))
                })?;

            *slot = Some(shard.row(local));
        }
    }

    let owned = owned
        .into_iter()
        .enumerate()
        .map(|(row, factors)| {
            factors.ok_or_else(|| {
                NomadErr::remote(COLUMN_HOME, "gather", format!("row {row} has no owner"))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let items = columns.len().checked_div(width).unwrap_or_default();
    let values: Vec<f64> = owned
        .par_iter()
        .flat_map_iter(|w| columns.chunks_exact(width).map(move |h| dot(w, h)))
        .collect();

    Array2::from_shape_vec((rows, items), values)
        .map_err(|e| NomadErr::remote(COLUMN_HOME, "gather", e))
}
