//! Connection setup and the two-duty session harness.
//!
//! A session owns one TCP stream split into halves: the spawned receive task
//! is the only reader and [`Session::sender`] is the only writer, so the
//! stream itself needs no lock.

use std::io;
use std::net::SocketAddr;

use tokio::io::BufReader;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{Config, Event, Receiver, Result, Sender};

/// Binds the listening side. Call [`accept_one`] to wait for the peer.
pub async fn bind(addr: impl ToSocketAddrs) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    Ok(listener)
}

/// Accepts exactly one peer, then stops listening.
pub async fn accept_one(listener: TcpListener) -> Result<(TcpStream, SocketAddr)> {
    let (stream, peer) = listener.accept().await?;
    drop(listener);
    stream.set_nodelay(true)?;
    info!(%peer, "peer connected");
    Ok((stream, peer))
}

/// Connects to a listening peer.
pub async fn connect(addr: impl ToSocketAddrs) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    info!(peer = %stream.peer_addr()?, "connected");
    Ok(stream)
}

/// A live conversation with one peer.
#[derive(Debug)]
pub struct Session {
    sender: Sender<OwnedWriteHalf>,
    events: UnboundedReceiver<Event>,
    receiver: JoinHandle<Result<()>>,
    peer: SocketAddr,
}

impl Session {
    /// Splits `stream` and spawns its receive task on the current runtime.
    pub fn start(stream: TcpStream, config: Config) -> Result<Self> {
        let peer = stream.peer_addr()?;
        let (read, write) = stream.into_split();
        let (tx, events) = mpsc::unbounded_channel();
        let sender = Sender::new(write, config.chunk());
        let receiver = tokio::spawn(Receiver::new(BufReader::new(read), config, tx).run());
        debug!(%peer, "session started");
        Ok(Self {
            sender,
            events,
            receiver,
            peer,
        })
    }

    /// Address of the connected peer.
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// The write side of the session.
    pub fn sender(&mut self) -> &mut Sender<OwnedWriteHalf> {
        &mut self.sender
    }

    /// Waits for the next event from the receive task.
    ///
    /// Returns `None` once [`Event::Closed`] has been delivered.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Tears the session down.
    ///
    /// Shuts down the write direction so the peer sees end of stream, then
    /// stops the receive task if it is still blocked on a read. Returns the
    /// receive task's error, if it ended with one.
    pub async fn close(mut self) -> Result<()> {
        if let Err(e) = self.sender.shutdown().await {
            debug!(error = %e, "shutdown of write half failed");
        }
        self.receiver.abort();
        match self.receiver.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(io::Error::other(e).into()),
        }
    }
}
