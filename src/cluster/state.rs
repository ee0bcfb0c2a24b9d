use std::sync::{Arc, OnceLock};

use tokio::sync::{Barrier, watch};

use super::BARRIER_HOST;
use crate::{
    error::{NomadErr, Result},
    storage::{ColumnSegment, ShardSnapshot},
    tokens::{self, TokenMailbox, TokenQueue},
};

/// Everything a process exposes to its peers, shared by all of the
/// connections serving them.
#[derive(Debug)]
pub struct LocalState {
    rank: usize,
    segment: Option<Arc<ColumnSegment>>,
    mailbox: TokenMailbox,
    barrier: Option<Barrier>,
    shard: OnceLock<ShardSnapshot>,
    lost: watch::Sender<Option<usize>>,
}

impl LocalState {
    /// Creates the shared state of a process.
    ///
    /// # Arguments
    /// * `rank` - The process's rank.
    /// * `world` - The amount of processes in the run.
    /// * `segment` - The column factors, if this process hosts them.
    ///
    /// # Returns
    /// The state together with the token queue its mailbox feeds.
    pub fn new(
        rank: usize,
        world: usize,
        segment: Option<Arc<ColumnSegment>>,
    ) -> (Arc<Self>, TokenQueue) {
        let (mailbox, queue) = tokens::mailbox();
        let barrier = (rank == BARRIER_HOST).then(|| Barrier::new(world));
        let (lost, _) = watch::channel(None);

        let state = Self {
            rank,
            segment,
            mailbox,
            barrier,
            shard: OnceLock::new(),
            lost,
        };

        (Arc::new(state), queue)
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn segment(&self) -> Option<&Arc<ColumnSegment>> {
        self.segment.as_ref()
    }

    pub fn mailbox(&self) -> &TokenMailbox {
        &self.mailbox
    }

    /// Makes the final row factors of this process available to its peers.
    ///
    /// # Returns
    /// `false` if a shard was already published.
    pub fn publish_shard(&self, snapshot: ShardSnapshot) -> bool {
        self.shard.set(snapshot).is_ok()
    }

    pub fn shard(&self) -> Option<&ShardSnapshot> {
        self.shard.get()
    }

    /// Flags `peer` as gone, failing every pending and future barrier.
    pub(super) fn peer_lost(&self, peer: usize) {
        self.lost.send_replace(Some(peer));
    }

    /// Waits at the run-wide barrier, only valid on the barrier host.
    ///
    /// # Returns
    /// A `RemoteAccess` error if a peer dropped out before reaching it.
    pub async fn barrier_wait(&self) -> Result<()> {
        let Some(barrier) = &self.barrier else {
            return Err(NomadErr::remote(
                self.rank,
                "barrier",
                "this process doesn't host the barrier",
            ));
        };

        let mut lost = self.lost.subscribe();
        let lost = async move {
            let peer = lost.wait_for(Option::is_some).await.ok().and_then(|p| *p);
            peer.unwrap_or_default()
        };

        tokio::select! {
            _ = barrier.wait() => Ok(()),
            peer = lost => Err(NomadErr::remote(peer, "barrier", "peer dropped out")),
        }
    }
}
