use std::{net::SocketAddr, sync::Arc, time::Duration};

use comms::{OnoReceiver, OnoSender};
use log::{debug, info};
use parking_lot::Mutex;
use tokio::{
    io::{self, AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
    task::JoinSet,
    time,
};

use super::{BoxedReader, BoxedWriter, Cluster, LocalState, PeerLink, service};
use crate::error::{NomadErr, Result};

const PIPE_CAPACITY: usize = 1 << 16;
const CONNECT_ATTEMPTS: usize = 100;
const CONNECT_BACKOFF: Duration = Duration::from_millis(100);

fn boxed<R, W>(rx: R, tx: W) -> (OnoReceiver<BoxedReader>, OnoSender<BoxedWriter>)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    comms::channel(Box::new(rx) as BoxedReader, Box::new(tx) as BoxedWriter)
}

impl Cluster {
    /// Wires up a group living inside this process, every pair of ranks joined
    /// by an in-memory pipe.
    ///
    /// # Arguments
    /// * `states` - The state of every process, in rank order.
    ///
    /// # Returns
    /// One `Cluster` per process, in rank order.
    pub async fn local(states: Vec<Arc<LocalState>>) -> Result<Vec<Self>> {
        let world = states.len();
        let mut links = vec![vec![None; world]; world];
        let mut services: Vec<_> = (0..world).map(|_| JoinSet::new()).collect();

        for from in 0..world {
            for to in (0..world).filter(|&to| to != from) {
                let (client, server) = io::duplex(PIPE_CAPACITY);

                let (rx, tx) = io::split(server);
                let (rx, tx) = comms::channel(rx, tx);
                services[to].spawn(service::serve(Arc::clone(&states[to]), rx, tx));

                let (rx, tx) = io::split(client);
                let (rx, tx) = boxed(rx, tx);
                let link = PeerLink::open(from, to, rx, tx).await?;
                links[from][to] = Some(Arc::new(link));
            }
        }

        let clusters = states
            .into_iter()
            .zip(links)
            .zip(services)
            .map(|((state, links), services)| Self {
                state,
                links,
                services: Mutex::new(services),
            })
            .collect();

        Ok(clusters)
    }

    /// Joins a group of processes talking over TCP.
    ///
    /// Binds to this process's own address, then connects to every peer,
    /// retrying while they come up.
    ///
    /// # Arguments
    /// * `state` - The state of this process.
    /// * `addrs` - The address of every process, in rank order.
    pub async fn tcp(state: Arc<LocalState>, addrs: &[SocketAddr]) -> Result<Self> {
        let rank = state.rank();
        let world = addrs.len();

        let addr = addrs.get(rank).ok_or_else(|| {
            NomadErr::Configuration(format!("rank {rank} has no address among {world}"))
        })?;

        let listener = TcpListener::bind(addr).await?;
        info!("listening at {addr}");

        let mut services = JoinSet::new();
        services.spawn(accept_peers(listener, world - 1, Arc::clone(&state)));

        let mut links = vec![None; world];
        for (peer, &addr) in addrs.iter().enumerate().filter(|&(peer, _)| peer != rank) {
            let stream = connect(peer, addr).await?;
            let (rx, tx) = stream.into_split();
            let (rx, tx) = boxed(rx, tx);

            let link = PeerLink::open(rank, peer, rx, tx).await?;
            links[peer] = Some(Arc::new(link));
        }

        info!("connected to {} peers", world - 1);
        Ok(Self {
            state,
            links,
            services: Mutex::new(services),
        })
    }
}

async fn connect(peer: usize, addr: SocketAddr) -> Result<TcpStream> {
    let mut attempt = 1;

    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) if attempt < CONNECT_ATTEMPTS => {
                debug!("rank {peer} at {addr} isn't up yet ({e}), attempt {attempt}");
                attempt += 1;
                time::sleep(CONNECT_BACKOFF).await;
            }
            Err(e) => return Err(NomadErr::remote(peer, "connect", e)),
        }
    }
}

async fn accept_peers(listener: TcpListener, peers: usize, state: Arc<LocalState>) -> Result<()> {
    let mut sessions = JoinSet::new();

    for _ in 0..peers {
        let (stream, addr) = listener.accept().await?;
        stream.set_nodelay(true)?;
        debug!("accepted connection from {addr}");

        let (rx, tx) = stream.into_split();
        let (rx, tx) = comms::channel(rx, tx);
        sessions.spawn(service::serve(Arc::clone(&state), rx, tx));
    }

    while let Some(joined) = sessions.join_next().await {
        joined.map_err(|e| NomadErr::remote(state.rank(), "serve", e))??;
    }

    Ok(())
}
