//! Datagram transports the game server talks through
//!
//! The server never touches sockets directly. It sees connections as opaque
//! [`ConnectionId`]s and exchanges whole messages with them through the
//! [`Transport`] trait, which keeps the tick loop identical whether it runs
//! over UDP or over the in-process [`MemoryTransport`] used by tests.

use log::{error, info, warn};
use shared::BUFFER_SIZE;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// Handle for one remote peer, unique for the lifetime of a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unknown connection {0:?}")]
    UnknownConnection(ConnectionId),
    #[error("transport channel closed")]
    ChannelClosed,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait Transport {
    /// Connections that appeared since the last call
    fn accept(&mut self) -> Vec<ConnectionId>;

    /// Drains every message queued for `connection`, oldest first.
    fn receive(&mut self, connection: ConnectionId) -> Vec<Vec<u8>>;

    /// Sends immediately. Fails if the connection is unknown or the
    /// underlying send fails.
    fn send(&mut self, connection: ConnectionId, bytes: &[u8]) -> Result<(), TransportError>;

    /// Queues a message for sending without waiting for it.
    fn async_send(&mut self, connection: ConnectionId, bytes: Vec<u8>);

    /// Forgets a connection. Later messages from the same peer show up as a
    /// new connection.
    fn disconnect(&mut self, connection: ConnectionId);

    /// Connections the transport saw close since the last call
    fn take_disconnected(&mut self) -> Vec<ConnectionId> {
        Vec::new()
    }
}

#[derive(Debug)]
struct UdpPeer {
    addr: SocketAddr,
    inbox: VecDeque<Vec<u8>>,
}

/// UDP transport: one tokio task receives datagrams, another sends the
/// queued ones. Peers are identified by their source address.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    inbound_rx: mpsc::UnboundedReceiver<(SocketAddr, Vec<u8>)>,
    outbound_tx: mpsc::UnboundedSender<(SocketAddr, Vec<u8>)>,
    connections: HashMap<SocketAddr, ConnectionId>,
    peers: HashMap<ConnectionId, UdpPeer>,
    accepted: Vec<ConnectionId>,
    next_connection: u32,
}

impl UdpTransport {
    /// Binds the socket and spawns the network tasks. Must be called from
    /// inside a tokio runtime.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Self::spawn_network_receiver(Arc::clone(&socket), inbound_tx);
        Self::spawn_network_sender(Arc::clone(&socket), outbound_rx);

        Ok(Self {
            socket,
            inbound_rx,
            outbound_tx,
            connections: HashMap::new(),
            peers: HashMap::new(),
            accepted: Vec::new(),
            next_connection: 0,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn peer_addr(&self, connection: ConnectionId) -> Option<SocketAddr> {
        self.peers.get(&connection).map(|p| p.addr)
    }

    fn spawn_network_receiver(
        socket: Arc<UdpSocket>,
        inbound_tx: mpsc::UnboundedSender<(SocketAddr, Vec<u8>)>,
    ) {
        tokio::spawn(async move {
            let mut buffer = [0u8; BUFFER_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if inbound_tx.send((addr, buffer[..len].to_vec())).is_err() {
                            // Transport dropped
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    fn spawn_network_sender(
        socket: Arc<UdpSocket>,
        mut outbound_rx: mpsc::UnboundedReceiver<(SocketAddr, Vec<u8>)>,
    ) {
        tokio::spawn(async move {
            while let Some((addr, bytes)) = outbound_rx.recv().await {
                if let Err(e) = socket.send_to(&bytes, addr).await {
                    error!("Failed to send packet to {}: {}", addr, e);
                }
            }
        });
    }

    /// Moves everything the receiver task collected into per-peer inboxes.
    fn pump(&mut self) {
        while let Ok((addr, bytes)) = self.inbound_rx.try_recv() {
            let connection = match self.connections.get(&addr) {
                Some(&connection) => connection,
                None => {
                    let connection = ConnectionId(self.next_connection);
                    self.next_connection = self.next_connection.wrapping_add(1);
                    self.connections.insert(addr, connection);
                    self.peers.insert(
                        connection,
                        UdpPeer {
                            addr,
                            inbox: VecDeque::new(),
                        },
                    );
                    self.accepted.push(connection);
                    info!("New peer {:?} from {}", connection, addr);
                    connection
                }
            };

            if let Some(peer) = self.peers.get_mut(&connection) {
                peer.inbox.push_back(bytes);
            }
        }
    }
}

impl Transport for UdpTransport {
    fn accept(&mut self) -> Vec<ConnectionId> {
        self.pump();
        std::mem::take(&mut self.accepted)
    }

    fn receive(&mut self, connection: ConnectionId) -> Vec<Vec<u8>> {
        self.pump();
        self.peers
            .get_mut(&connection)
            .map(|peer| peer.inbox.drain(..).collect())
            .unwrap_or_default()
    }

    fn send(&mut self, connection: ConnectionId, bytes: &[u8]) -> Result<(), TransportError> {
        let addr = self
            .peer_addr(connection)
            .ok_or(TransportError::UnknownConnection(connection))?;
        self.socket.try_send_to(bytes, addr)?;
        Ok(())
    }

    fn async_send(&mut self, connection: ConnectionId, bytes: Vec<u8>) {
        let Some(addr) = self.peer_addr(connection) else {
            warn!("Dropping packet for unknown connection {:?}", connection);
            return;
        };
        if self.outbound_tx.send((addr, bytes)).is_err() {
            error!("Failed to queue packet for {}: sender task stopped", addr);
        }
    }

    fn disconnect(&mut self, connection: ConnectionId) {
        if let Some(peer) = self.peers.remove(&connection) {
            self.connections.remove(&peer.addr);
            info!("Peer {:?} at {} disconnected", connection, peer.addr);
        }
    }
}

#[derive(Debug, Default)]
struct MemoryLink {
    to_server: VecDeque<Vec<u8>>,
    to_peer: VecDeque<Vec<u8>>,
    closed: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    links: HashMap<ConnectionId, MemoryLink>,
    accepted: Vec<ConnectionId>,
    closed_by_peer: Vec<ConnectionId>,
    next_connection: u32,
}

impl MemoryState {
    /// Forgets a closed link once neither side has anything left to read.
    fn prune(&mut self, connection: ConnectionId) {
        let drained = self.links.get(&connection).is_some_and(|link| {
            link.closed && link.to_server.is_empty() && link.to_peer.is_empty()
        });
        if drained {
            self.links.remove(&connection);
        }
    }
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process transport. Every [`MemoryPeer`] handed out by
/// [`MemoryTransport::connect`] behaves like a remote client.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self) -> MemoryPeer {
        let mut state = lock(&self.state);
        let connection = ConnectionId(state.next_connection);
        state.next_connection += 1;
        state.links.insert(connection, MemoryLink::default());
        state.accepted.push(connection);

        MemoryPeer {
            connection,
            state: Arc::clone(&self.state),
        }
    }

    pub fn connection_count(&self) -> usize {
        lock(&self.state)
            .links
            .values()
            .filter(|link| !link.closed)
            .count()
    }

    /// Links still held in memory, open or waiting to be drained
    pub fn link_count(&self) -> usize {
        lock(&self.state).links.len()
    }
}

impl Transport for MemoryTransport {
    fn accept(&mut self) -> Vec<ConnectionId> {
        std::mem::take(&mut lock(&self.state).accepted)
    }

    fn receive(&mut self, connection: ConnectionId) -> Vec<Vec<u8>> {
        let mut state = lock(&self.state);
        let messages: Vec<Vec<u8>> = state
            .links
            .get_mut(&connection)
            .map(|link| link.to_server.drain(..).collect())
            .unwrap_or_default();
        state.prune(connection);
        messages
    }

    fn send(&mut self, connection: ConnectionId, bytes: &[u8]) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        match state.links.get_mut(&connection) {
            Some(link) if !link.closed => {
                link.to_peer.push_back(bytes.to_vec());
                Ok(())
            }
            _ => Err(TransportError::UnknownConnection(connection)),
        }
    }

    fn async_send(&mut self, connection: ConnectionId, bytes: Vec<u8>) {
        let mut state = lock(&self.state);
        match state.links.get_mut(&connection) {
            Some(link) if !link.closed => link.to_peer.push_back(bytes),
            _ => warn!("Dropping packet for unknown connection {:?}", connection),
        }
    }

    fn disconnect(&mut self, connection: ConnectionId) {
        let mut state = lock(&self.state);
        if let Some(link) = state.links.get_mut(&connection) {
            link.closed = true;
        }
        state.prune(connection);
    }

    fn take_disconnected(&mut self) -> Vec<ConnectionId> {
        std::mem::take(&mut lock(&self.state).closed_by_peer)
    }
}

/// Client end of a [`MemoryTransport`] connection
#[derive(Debug)]
pub struct MemoryPeer {
    connection: ConnectionId,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryPeer {
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn send(&self, bytes: Vec<u8>) {
        if let Some(link) = lock(&self.state).links.get_mut(&self.connection) {
            if !link.closed {
                link.to_server.push_back(bytes);
            }
        }
    }

    /// Drains every message the server sent to this peer.
    pub fn receive(&self) -> Vec<Vec<u8>> {
        let mut state = lock(&self.state);
        let messages: Vec<Vec<u8>> = state
            .links
            .get_mut(&self.connection)
            .map(|link| link.to_peer.drain(..).collect())
            .unwrap_or_default();
        state.prune(self.connection);
        messages
    }

    /// True once either side closed the connection
    pub fn is_closed(&self) -> bool {
        lock(&self.state)
            .links
            .get(&self.connection)
            .map_or(true, |link| link.closed)
    }

    /// Drops the connection from the peer side, like a transport-level
    /// disconnect.
    pub fn close(&self) {
        let mut state = lock(&self.state);
        let closed = match state.links.get_mut(&self.connection) {
            Some(link) if !link.closed => {
                link.closed = true;
                true
            }
            _ => false,
        };
        if closed {
            state.closed_by_peer.push(self.connection);
            state.prune(self.connection);
        }
    }
}
