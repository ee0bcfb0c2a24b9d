//! The process group: peer connections, the request service answering them and
//! the collective operations built on top.

mod bootstrap;
mod link;
mod service;
mod state;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    task::JoinSet,
};

use crate::{
    error::{NomadErr, Result},
    storage::{SegmentHandle, ShardSnapshot},
    tokens::DepthProbe,
};

pub use link::PeerLink;
pub use state::LocalState;

/// The process every barrier is hosted by.
pub const BARRIER_HOST: usize = 0;

type BoxedReader = Box<dyn AsyncRead + Unpin + Send>;
type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

enum Route<'a> {
    Local,
    Remote(&'a Arc<PeerLink>),
}

/// A process's view of the whole group.
#[derive(Debug)]
pub struct Cluster {
    state: Arc<LocalState>,
    links: Vec<Option<Arc<PeerLink>>>,
    services: Mutex<JoinSet<Result<()>>>,
}

impl Cluster {
    pub fn rank(&self) -> usize {
        self.state.rank()
    }

    pub fn world_size(&self) -> usize {
        self.links.len()
    }

    fn route(&self, rank: usize, op: &'static str) -> Result<Route<'_>> {
        if rank == self.rank() {
            return Ok(Route::Local);
        }

        match self.links.get(rank) {
            Some(Some(link)) => Ok(Route::Remote(link)),
            _ => Err(NomadErr::remote(rank, op, "no such process")),
        }
    }

    /// Returns an unresolved handle to the column segment hosted by `rank`.
    pub fn segment(&self, rank: usize) -> Result<SegmentHandle> {
        let handle = match self.route(rank, "resolve")? {
            Route::Local => SegmentHandle::local(rank, self.state.segment().cloned()),
            Route::Remote(link) => SegmentHandle::remote(rank, Arc::clone(link)),
        };

        Ok(handle)
    }

    /// Returns how many tokens `rank` holds.
    pub async fn queue_depth(&self, rank: usize) -> Result<usize> {
        match self.route(rank, "queue_depth")? {
            Route::Local => Ok(self.state.mailbox().depth()),
            Route::Remote(link) => link.queue_depth().await,
        }
    }

    /// Appends `item` to the token queue of `rank`, which may be this process.
    ///
    /// # Arguments
    /// * `item` - The token to hand over.
    /// * `rank` - The destination.
    pub async fn transfer(&self, item: usize, rank: usize) -> Result<()> {
        match self.route(rank, "transfer")? {
            Route::Local if self.state.mailbox().deliver(item) => Ok(()),
            Route::Local => Err(NomadErr::remote(rank, "transfer", "token queue is closed")),
            Route::Remote(link) => link.transfer(item).await,
        }
    }

    /// Blocks until every process has reached the barrier.
    pub async fn barrier(&self) -> Result<()> {
        match self.route(BARRIER_HOST, "barrier")? {
            Route::Local => self.state.barrier_wait().await,
            Route::Remote(link) => link.barrier().await,
        }
    }

    /// Makes this process's final row factors available to the group.
    pub fn publish_shard(&self, snapshot: ShardSnapshot) -> Result<()> {
        if !self.state.publish_shard(snapshot) {
            return Err(NomadErr::remote(
                self.rank(),
                "publish_shard",
                "row factors were already published",
            ));
        }

        Ok(())
    }

    /// Returns the row factors published by `rank`.
    ///
    /// # Arguments
    /// * `rank` - The process to fetch from.
    /// * `width` - The embedding dimension.
    pub async fn fetch_shard(&self, rank: usize, width: usize) -> Result<ShardSnapshot> {
        match self.route(rank, "fetch_shard")? {
            Route::Local => self.state.shard().cloned().ok_or_else(|| {
                NomadErr::remote(rank, "fetch_shard", "row factors aren't published yet")
            }),
            Route::Remote(link) => link.fetch_shard(width).await,
        }
    }

    /// Disconnects from every peer, then waits for every peer to disconnect
    /// from this process.
    pub async fn shutdown(mut self) -> Result<()> {
        for link in self.links.iter().flatten() {
            link.disconnect().await?;
        }

        let rank = self.rank();
        let services = self.services.get_mut();

        while let Some(joined) = services.join_next().await {
            joined.map_err(|e| NomadErr::remote(rank, "serve", e))??;
        }

        Ok(())
    }
}

impl DepthProbe for Cluster {
    fn world_size(&self) -> usize {
        self.links.len()
    }

    async fn queue_depth(&self, rank: usize) -> Result<usize> {
        Cluster::queue_depth(self, rank).await
    }
}
