use std::{borrow::Cow, io, sync::Arc};

use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg, Payload},
};
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use super::LocalState;
use crate::error::{NomadErr, Result};

/// Serves the requests of a single peer until it disconnects.
///
/// Every reply is produced from `state` alone, the process's training loop
/// never takes part.
///
/// # Arguments
/// * `state` - The state exposed by this process.
/// * `rx` - The receiving end of the peer's connection.
/// * `tx` - The sending end of the peer's connection.
///
/// # Returns
/// `Ok(())` once the peer disconnects, a `RemoteAccess` error if the
/// connection breaks before that.
pub(super) async fn serve<R, W>(
    state: Arc<LocalState>,
    mut rx: OnoReceiver<R>,
    mut tx: OnoSender<W>,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let mut rx_buf: Vec<u64> = Vec::new();
    let mut values = Vec::new();

    let peer = match rx.recv_into(&mut rx_buf).await {
        Ok(Msg::Control(Command::Hello { rank })) => rank,
        Ok(msg) => {
            let reason = format!("expected Hello, got {msg:?}");
            return Err(NomadErr::remote(state.rank(), "hello", reason));
        }
        Err(e) => return Err(NomadErr::remote(state.rank(), "hello", e)),
    };

    debug!(peer = peer; "serving peer");

    loop {
        let msg = match rx.recv_into(&mut rx_buf).await {
            Ok(msg) => msg,
            Err(e) => {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    warn!(peer = peer; "connection closed without a disconnect");
                }

                state.peer_lost(peer);
                return Err(NomadErr::remote(peer, "serve", e));
            }
        };

        let reply = match msg {
            Msg::Control(Command::Disconnect) => {
                let bye = Msg::Control(Command::Disconnect);
                tx.send(&bye)
                    .await
                    .map_err(|e| NomadErr::remote(peer, "serve", e))?;

                debug!(peer = peer; "peer disconnected");
                return Ok(());
            }
            Msg::Control(cmd) => handle_command(&state, cmd, &mut values).await,
            Msg::Data(Payload::Values { offset, values }) => put(&state, offset, values),
            msg => Err(format!("unexpected request {msg:?}")),
        };

        let reply = reply.unwrap_or_else(|e| {
            warn!(peer = peer; "rejecting request: {e}");
            Msg::Err(Cow::Owned(e))
        });

        tx.send(&reply)
            .await
            .map_err(|e| NomadErr::remote(peer, "serve", e))?;
    }
}

/// Offsets that don't fit a `usize` saturate, so the bound checks reject them.
fn to_index(offset: u64) -> usize {
    usize::try_from(offset).unwrap_or(usize::MAX)
}

fn put<'a>(state: &LocalState, offset: u64, values: &[f64]) -> std::result::Result<Msg<'a>, String> {
    let segment = state.segment().ok_or("no column segment is hosted here")?;

    segment
        .write(to_index(offset), values)
        .map_err(|e| e.to_string())?;

    Ok(Msg::Control(Command::Ack))
}

async fn handle_command<'a>(
    state: &'a LocalState,
    cmd: Command,
    values: &'a mut Vec<f64>,
) -> std::result::Result<Msg<'a>, String> {
    let reply = match cmd {
        Command::Resolve => {
            let segment = state.segment().ok_or("no column segment is hosted here")?;
            Command::Segment { len: segment.len() }
        }
        Command::Get { offset, len } => {
            let segment = state.segment().ok_or("no column segment is hosted here")?;
            let start = to_index(offset);
            segment.check(start, len).map_err(|e| e.to_string())?;

            values.resize(len, 0.);
            segment.read(start, values).map_err(|e| e.to_string())?;

            let values: &[f64] = values;
            return Ok(Msg::Data(Payload::Values { offset, values }));
        }
        Command::QueueDepth => Command::Depth {
            depth: state.mailbox().depth(),
        },
        Command::Transfer { item } => {
            if !state.mailbox().deliver(item) {
                return Err(format!("token {item} arrived after the queue was closed"));
            }

            Command::Ack
        }
        Command::Barrier => {
            state.barrier_wait().await.map_err(|e| e.to_string())?;
            Command::Ack
        }
        Command::FetchShard => {
            let shard = state.shard().ok_or("the row factors aren't published yet")?;

            let payload = Payload::Shard {
                rows: shard.rows(),
                factors: shard.factors(),
            };
            return Ok(Msg::Data(payload));
        }
        cmd => return Err(format!("unexpected command {cmd:?}")),
    };

    Ok(Msg::Control(reply))
}
