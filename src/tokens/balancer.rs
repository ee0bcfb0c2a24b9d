use futures::future;

use super::DepthProbe;
use crate::error::Result;

/// Picks the process with the shallowest queue, the lowest rank among ties.
///
/// # Returns
/// `None` only if `depths` is empty.
pub fn choose_destination(depths: &[usize]) -> Option<usize> {
    depths
        .iter()
        .enumerate()
        .min_by_key(|&(rank, depth)| (*depth, rank))
        .map(|(rank, _)| rank)
}

/// Decides where a token goes after it has been processed.
pub struct LoadBalancer;

impl LoadBalancer {
    /// Queries every process's queue depth concurrently and picks the
    /// shallowest. The calling process is included and may pick itself.
    ///
    /// # Arguments
    /// * `probe` - The view of the processes' queues.
    ///
    /// # Returns
    /// The destination rank, or the first error any query ran into.
    pub async fn choose<P: DepthProbe + Sync>(probe: &P) -> Result<usize> {
        let world = probe.world_size();
        let depths = future::try_join_all((0..world).map(|rank| probe.queue_depth(rank))).await?;

        Ok(choose_destination(&depths).unwrap_or_default())
    }
}
