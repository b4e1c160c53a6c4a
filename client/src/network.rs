//! UDP connection to the game server
//!
//! The render loop runs on the main thread and must never wait on the
//! network, so socket I/O lives on a background thread with its own tokio
//! runtime. The main thread only touches channels, except for [`NetworkClient::send`]
//! which writes straight to the socket for messages that must go out before
//! the process exits.

use log::{debug, error, info};
use shared::BUFFER_SIZE;
use std::net::{SocketAddr, ToSocketAddrs};
use std::thread::JoinHandle;
use tokio::sync::mpsc;

pub struct NetworkClient {
    socket: std::net::UdpSocket,
    server_addr: SocketAddr,
    outbound_tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    inbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    worker: Option<JoinHandle<()>>,
}

impl NetworkClient {
    /// Binds a local socket, points it at `server` and starts the network
    /// thread.
    pub fn connect(server: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let server_addr = server
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| format!("could not resolve {}", server))?;

        let bind_addr = if server_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = std::net::UdpSocket::bind(bind_addr)?;
        socket.connect(server_addr)?;
        socket.set_nonblocking(true)?;
        let worker_socket = socket.try_clone()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let worker = std::thread::Builder::new()
            .name("network".to_owned())
            .spawn(move || {
                runtime.block_on(Self::network_loop(worker_socket, outbound_rx, inbound_tx));
            })?;

        info!("Connecting to {} from {}", server_addr, socket.local_addr()?);

        Ok(Self {
            socket,
            server_addr,
            outbound_tx: Some(outbound_tx),
            inbound_rx,
            worker: Some(worker),
        })
    }

    async fn network_loop(
        socket: std::net::UdpSocket,
        mut outbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
        inbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    ) {
        let socket = match tokio::net::UdpSocket::from_std(socket) {
            Ok(socket) => socket,
            Err(e) => {
                error!("Failed to register socket: {}", e);
                return;
            }
        };

        let mut buffer = [0u8; BUFFER_SIZE];
        loop {
            tokio::select! {
                result = socket.recv(&mut buffer) => match result {
                    Ok(len) => {
                        if inbound_tx.send(buffer[..len].to_vec()).is_err() {
                            break;
                        }
                    }
                    // ICMP errors while the server is not up yet
                    Err(e) => debug!("Error receiving packet: {}", e),
                },
                outgoing = outbound_rx.recv() => match outgoing {
                    Some(bytes) => {
                        if let Err(e) = socket.send(&bytes).await {
                            error!("Failed to send packet: {}", e);
                        }
                    }
                    None => break,
                },
            }
        }
        debug!("Network thread stopped");
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Writes a datagram right away, bypassing the send queue.
    pub fn send(&self, bytes: &[u8]) -> std::io::Result<()> {
        self.socket.send(bytes)?;
        Ok(())
    }

    /// Queues a datagram for the network thread.
    pub fn async_send(&self, bytes: Vec<u8>) {
        let queued = self
            .outbound_tx
            .as_ref()
            .map_or(false, |tx| tx.send(bytes).is_ok());
        if !queued {
            error!("Network thread is gone, dropping packet");
        }
    }

    /// Every datagram received since the last call, oldest first
    pub fn messages(&mut self) -> Vec<Vec<u8>> {
        let mut messages = Vec::new();
        while let Ok(bytes) = self.inbound_rx.try_recv() {
            messages.push(bytes);
        }
        messages
    }
}

impl Drop for NetworkClient {
    fn drop(&mut self) {
        // Closing the queue ends the network loop
        self.outbound_tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Network thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_for_messages(client: &mut NetworkClient) -> Vec<Vec<u8>> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let messages = client.messages();
            if !messages.is_empty() || Instant::now() > deadline {
                return messages;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_exchange_with_echo_server() {
        let server = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        server
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let mut client = NetworkClient::connect(&server.local_addr().unwrap().to_string()).unwrap();

        client.send(&[1, 2, 3]).unwrap();
        client.async_send(vec![4]);

        let mut buffer = [0u8; 16];
        let (len, from) = server.recv_from(&mut buffer).unwrap();
        assert_eq!(&buffer[..len], &[1, 2, 3]);
        let (len, _) = server.recv_from(&mut buffer).unwrap();
        assert_eq!(&buffer[..len], &[4]);

        server.send_to(&[9, 9], from).unwrap();
        assert_eq!(wait_for_messages(&mut client), vec![vec![9, 9]]);
    }

    #[test]
    fn test_unresolvable_server_is_an_error() {
        assert!(NetworkClient::connect("not an address").is_err());
    }
}
