use std::sync::Arc;

use super::{ColumnSegment, OutOfBoundsErr};
use crate::{
    cluster::PeerLink,
    error::{NomadErr, Result},
};

/// A reference to the column-factor segment of some process, not usable yet.
///
/// It has to be resolved into a `RemoteHandle` before any element access.
#[derive(Debug)]
pub struct SegmentHandle {
    rank: usize,
    target: Target,
}

#[derive(Debug)]
enum Target {
    Local(Option<Arc<ColumnSegment>>),
    Remote(Arc<PeerLink>),
}

impl SegmentHandle {
    pub(crate) fn local(rank: usize, segment: Option<Arc<ColumnSegment>>) -> Self {
        Self {
            rank,
            target: Target::Local(segment),
        }
    }

    pub(crate) fn remote(rank: usize, link: Arc<PeerLink>) -> Self {
        Self {
            rank,
            target: Target::Remote(link),
        }
    }

    /// The process hosting the segment.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Resolves the handle, asking the hosting process for the segment's size
    /// when it's remote.
    ///
    /// # Returns
    /// The usable handle, or an `AddressResolution` error if the process
    /// hosts no segment or can't be reached.
    pub async fn resolve(self) -> Result<RemoteHandle> {
        let rank = self.rank;

        let resolved = match self.target {
            Target::Local(Some(segment)) => Resolved::Local(segment),
            Target::Local(None) => {
                return Err(NomadErr::AddressResolution {
                    rank,
                    reason: "no column segment is hosted here".into(),
                });
            }
            Target::Remote(link) => {
                let len = link.resolve().await?;
                Resolved::Remote { link, len }
            }
        };

        Ok(RemoteHandle { rank, resolved })
    }
}

/// A resolved handle to a column-factor segment, either hosted by this process
/// or reached through a peer connection.
///
/// Accesses are one-sided from the point of view of the caller, the hosting
/// process's training loop is never involved.
#[derive(Debug, Clone)]
pub struct RemoteHandle {
    rank: usize,
    resolved: Resolved,
}

#[derive(Debug, Clone)]
enum Resolved {
    Local(Arc<ColumnSegment>),
    Remote { link: Arc<PeerLink>, len: usize },
}

impl RemoteHandle {
    /// The process hosting the segment.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Returns the total amount of values in the segment.
    pub fn len(&self) -> usize {
        match &self.resolved {
            Resolved::Local(segment) => segment.len(),
            Resolved::Remote { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bounds(&self, op: &'static str, offset: usize, len: usize) -> Result<()> {
        let capacity = self.len();

        match offset.checked_add(len) {
            Some(end) if end <= capacity => Ok(()),
            _ => Err(self.out_of_bounds(
                op,
                OutOfBoundsErr {
                    offset,
                    len,
                    capacity,
                },
            )),
        }
    }

    fn out_of_bounds(&self, op: &'static str, err: OutOfBoundsErr) -> NomadErr {
        NomadErr::remote(self.rank, op, err)
    }

    /// Reads a single value at `offset`.
    pub async fn get(&self, offset: usize) -> Result<f64> {
        let mut out = [0.];
        self.bounds("get", offset, 1)?;
        self.read(offset, &mut out).await?;
        Ok(out[0])
    }

    /// Overwrites a single value at `offset`.
    pub async fn put(&self, offset: usize, value: f64) -> Result<()> {
        self.bounds("put", offset, 1)?;
        self.write(offset, &[value]).await
    }

    /// Copies `out.len()` contiguous values starting at `offset` into `out`.
    ///
    /// # Arguments
    /// * `offset` - The first value to read.
    /// * `out` - A mutable slice where the values will be copied.
    ///
    /// # Returns
    /// A `RemoteAccess` error if the range is out of bounds or the peer fails.
    pub async fn read(&self, offset: usize, out: &mut [f64]) -> Result<()> {
        self.bounds("get", offset, out.len())?;

        match &self.resolved {
            Resolved::Local(segment) => segment
                .read(offset, out)
                .map_err(|e| self.out_of_bounds("get", e)),
            Resolved::Remote { link, .. } => link.read(offset, out).await,
        }
    }

    /// Overwrites `values.len()` contiguous values starting at `offset`.
    ///
    /// # Arguments
    /// * `offset` - The first value to write.
    /// * `values` - The new values.
    ///
    /// # Returns
    /// A `RemoteAccess` error if the range is out of bounds or the peer fails.
    pub async fn write(&self, offset: usize, values: &[f64]) -> Result<()> {
        self.bounds("put", offset, values.len())?;

        match &self.resolved {
            Resolved::Local(segment) => segment
                .write(offset, values)
                .map_err(|e| self.out_of_bounds("put", e)),
            Resolved::Remote { link, .. } => link.write(offset, values).await,
        }
    }
}
