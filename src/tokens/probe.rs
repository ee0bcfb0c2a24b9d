use crate::error::Result;

/// Read access to the token-queue depth of every process.
#[trait_variant::make(DepthProbe: Send)]
pub trait DepthProbeTemplate {
    /// Returns the amount of processes.
    fn world_size(&self) -> usize;

    /// Asks `rank` how many tokens it's currently holding.
    ///
    /// # Arguments
    /// * `rank` - The process to ask, possibly the calling one.
    async fn queue_depth(&self, rank: usize) -> Result<usize>;
}
