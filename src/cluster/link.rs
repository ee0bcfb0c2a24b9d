use std::fmt;

use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg, Payload},
};
use tokio::sync::Mutex;

use super::{BoxedReader, BoxedWriter};
use crate::{
    error::{NomadErr, Result},
    storage::ShardSnapshot,
};

struct Channel {
    rx: OnoReceiver<BoxedReader>,
    tx: OnoSender<BoxedWriter>,
    rx_buf: Vec<u64>,
}

/// The requesting end of the connection to a single peer.
///
/// Requests are strictly one at a time, each waits for its reply before the
/// next one is sent.
pub struct PeerLink {
    rank: usize,
    channel: Mutex<Channel>,
}

impl fmt::Debug for PeerLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerLink").field("rank", &self.rank).finish()
    }
}

fn unexpected(reply: Msg) -> String {
    format!("unexpected reply {reply:?}")
}

impl PeerLink {
    /// Introduces this process to `peer` and wraps the connection.
    ///
    /// # Arguments
    /// * `local` - This process's rank.
    /// * `peer` - The rank on the other end.
    /// * `rx` - The receiving end of the connection.
    /// * `tx` - The sending end of the connection.
    pub(super) async fn open(
        local: usize,
        peer: usize,
        rx: OnoReceiver<BoxedReader>,
        mut tx: OnoSender<BoxedWriter>,
    ) -> Result<Self> {
        let hello = Msg::Control(Command::Hello { rank: local });
        tx.send(&hello)
            .await
            .map_err(|e| NomadErr::remote(peer, "hello", e))?;

        let channel = Channel {
            rx,
            tx,
            rx_buf: Vec::new(),
        };

        Ok(Self {
            rank: peer,
            channel: Mutex::new(channel),
        })
    }

    /// The rank on the other end.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Sends `request` and hands the reply to `on_reply`.
    ///
    /// # Arguments
    /// * `op` - The operation name, used for diagnostics.
    /// * `request` - The message to send.
    /// * `on_reply` - Turns the reply into the result.
    async fn request<T, F>(&self, op: &'static str, request: &Msg<'_>, on_reply: F) -> Result<T>
    where
        F: FnOnce(Msg<'_>) -> std::result::Result<T, String>,
    {
        let mut channel = self.channel.lock().await;
        let Channel { rx, tx, rx_buf } = &mut *channel;

        tx.send(request)
            .await
            .map_err(|e| NomadErr::remote(self.rank, op, e))?;

        let reply = rx
            .recv_into(rx_buf)
            .await
            .map_err(|e| NomadErr::remote(self.rank, op, e))?;

        match reply {
            Msg::Err(e) => Err(NomadErr::remote(self.rank, op, e)),
            reply => on_reply(reply).map_err(|e| NomadErr::remote(self.rank, op, e)),
        }
    }

    async fn expect_ack(&self, op: &'static str, request: &Msg<'_>) -> Result<()> {
        self.request(op, request, |reply| match reply {
            Msg::Control(Command::Ack) => Ok(()),
            reply => Err(unexpected(reply)),
        })
        .await
    }

    /// Asks the peer for the size of its column segment.
    ///
    /// # Returns
    /// The amount of values, or an `AddressResolution` error.
    pub async fn resolve(&self) -> Result<usize> {
        let request = Msg::Control(Command::Resolve);

        self.request("resolve", &request, |reply| match reply {
            Msg::Control(Command::Segment { len }) => Ok(len),
            reply => Err(unexpected(reply)),
        })
        .await
        .map_err(|e| NomadErr::AddressResolution {
            rank: self.rank,
            reason: e.to_string(),
        })
    }

    /// Copies `out.len()` values of the peer's column segment starting at `offset`.
    pub async fn read(&self, offset: usize, out: &mut [f64]) -> Result<()> {
        let request = Msg::Control(Command::Get {
            offset: offset as u64,
            len: out.len(),
        });

        self.request("get", &request, |reply| match reply {
            Msg::Data(Payload::Values { values, .. }) if values.len() == out.len() => {
                out.copy_from_slice(values);
                Ok(())
            }
            reply => Err(unexpected(reply)),
        })
        .await
    }

    /// Overwrites `values.len()` values of the peer's column segment starting at `offset`.
    pub async fn write(&self, offset: usize, values: &[f64]) -> Result<()> {
        let request = Msg::Data(Payload::Values {
            offset: offset as u64,
            values,
        });

        self.expect_ack("put", &request).await
    }

    /// Asks the peer how many tokens it holds.
    pub async fn queue_depth(&self) -> Result<usize> {
        let request = Msg::Control(Command::QueueDepth);

        self.request("queue_depth", &request, |reply| match reply {
            Msg::Control(Command::Depth { depth }) => Ok(depth),
            reply => Err(unexpected(reply)),
        })
        .await
    }

    /// Appends `item` to the peer's token queue.
    pub async fn transfer(&self, item: usize) -> Result<()> {
        let request = Msg::Control(Command::Transfer { item });
        self.expect_ack("transfer", &request).await
    }

    /// Waits at the barrier hosted by the peer.
    pub async fn barrier(&self) -> Result<()> {
        self.expect_ack("barrier", &Msg::Control(Command::Barrier)).await
    }

    /// Downloads the row factors published by the peer.
    ///
    /// # Arguments
    /// * `width` - The embedding dimension.
    pub async fn fetch_shard(&self, width: usize) -> Result<ShardSnapshot> {
        let request = Msg::Control(Command::FetchShard);

        self.request("fetch_shard", &request, |reply| match reply {
            Msg::Data(Payload::Shard { rows, factors }) => {
                ShardSnapshot::new(rows.to_vec(), width, factors.to_vec())
                    .ok_or_else(|| format!("shard doesn't hold {width} factors per row"))
            }
            reply => Err(unexpected(reply)),
        })
        .await
    }

    /// Tells the peer this process is done with it and waits for the echo.
    pub async fn disconnect(&self) -> Result<()> {
        let request = Msg::Control(Command::Disconnect);

        self.request("disconnect", &request, |reply| match reply {
            Msg::Control(Command::Disconnect) => Ok(()),
            reply => Err(unexpected(reply)),
        })
        .await
    }
}
