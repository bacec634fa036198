use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use homelink::discovery::{BEACON_INTERVAL, Beacon, DISCOVERY_PORT, MULTICAST_ADDRESS};
use homelink::response::Response;

use serde_json::Value;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::task::JoinHandle;

use tokio_util::sync::CancellationToken;

use tracing::{error, info, warn};

use crate::command::CommandHandler;
use crate::error::{Error, ErrorKind, Result};

/// Maximum size of a single request, in bytes.
pub const BUFFER_SIZE: usize = 4096;

// Remote address used to select the outgoing interface. No packet is sent.
const ROUTE_TARGET: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 80);

fn network_error(description: String) -> Error {
    Error::new(ErrorKind::Network, description)
}

/// The network front-end of a device.
///
/// It runs two independent tasks:
///
/// - A discovery beacon, which periodically announces the device on a
///   multicast group
/// - A command server, which accepts `TCP` connections and serves each of
///   them on its own task, handing every received request to a
///   [`CommandHandler`]
#[derive(Debug)]
pub struct NetworkHandler {
    handler: CommandHandler,
    bind_address: IpAddr,
    port: u16,
    advertised_address: Option<IpAddr>,
    discovery_address: SocketAddr,
    beacon_interval: Duration,
}

impl NetworkHandler {
    /// Creates a [`NetworkHandler`] listening on all interfaces at the
    /// given port.
    ///
    /// Beacons are sent to the default multicast group every
    /// [`BEACON_INTERVAL`].
    #[must_use]
    #[inline]
    pub fn new(handler: CommandHandler, port: u16) -> Self {
        Self {
            handler,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port,
            advertised_address: None,
            discovery_address: SocketAddr::new(IpAddr::V4(MULTICAST_ADDRESS), DISCOVERY_PORT),
            beacon_interval: BEACON_INTERVAL,
        }
    }

    /// Sets the address the command server binds to.
    #[must_use]
    #[inline]
    pub fn bind_address(mut self, bind_address: IpAddr) -> Self {
        self.bind_address = bind_address;
        self
    }

    /// Sets the address announced in beacons.
    ///
    /// When not set, the address of the interface used to reach the
    /// network is announced.
    #[must_use]
    #[inline]
    pub fn advertised_address(mut self, advertised_address: IpAddr) -> Self {
        self.advertised_address = Some(advertised_address);
        self
    }

    /// Sets the destination of beacons.
    #[must_use]
    #[inline]
    pub fn discovery_address(mut self, discovery_address: SocketAddr) -> Self {
        self.discovery_address = discovery_address;
        self
    }

    /// Sets the interval between two beacons.
    #[must_use]
    #[inline]
    pub fn beacon_interval(mut self, beacon_interval: Duration) -> Self {
        self.beacon_interval = beacon_interval;
        self
    }

    /// Binds the sockets and starts both the discovery beacon and the
    /// command server.
    ///
    /// # Errors
    ///
    /// An error is returned if a socket cannot be bound or the beacon
    /// cannot be serialized.
    pub async fn start(self) -> Result<ServerHandle> {
        let listener = TcpListener::bind((self.bind_address, self.port))
            .await
            .map_err(|e| {
                network_error(format!(
                    "Failed to bind the command server on port {}: {e}",
                    self.port
                ))
            })?;
        let local_address = listener.local_addr()?;

        let advertised_address = match self.advertised_address {
            Some(address) => address,
            None => outgoing_address(self.bind_address).await,
        };

        let device = self.handler.device();
        let beacon = Beacon::new(
            device.kind(),
            device.id(),
            advertised_address.to_string(),
            local_address.port(),
        );
        let payload = serde_json::to_vec(&beacon)?;

        let unspecified = if self.discovery_address.is_ipv4() {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        };
        let socket = UdpSocket::bind((unspecified, 0))
            .await
            .map_err(|e| network_error(format!("Failed to bind the beacon socket: {e}")))?;

        let cancellation_token = CancellationToken::new();

        info!(
            "Device `{}`: command server listening on {local_address}, beacons sent to {}",
            device.id(),
            self.discovery_address
        );

        let beacon_task = tokio::spawn(run_beacon(
            socket,
            payload,
            self.discovery_address,
            self.beacon_interval,
            cancellation_token.clone(),
        ));

        let server_task = tokio::spawn(run_server(
            listener,
            self.handler,
            cancellation_token.clone(),
        ));

        Ok(ServerHandle {
            local_address,
            beacon,
            cancellation_token,
            beacon_task,
            server_task,
        })
    }
}

/// A handle to the running tasks of a [`NetworkHandler`].
#[derive(Debug)]
pub struct ServerHandle {
    local_address: SocketAddr,
    beacon: Beacon,
    cancellation_token: CancellationToken,
    beacon_task: JoinHandle<()>,
    server_task: JoinHandle<()>,
}

impl ServerHandle {
    /// Returns the address the command server is bound to.
    #[must_use]
    #[inline]
    pub const fn local_address(&self) -> SocketAddr {
        self.local_address
    }

    /// Returns the announced [`Beacon`].
    #[must_use]
    #[inline]
    pub const fn beacon(&self) -> &Beacon {
        &self.beacon
    }

    /// Stops the discovery beacon, the command server and every open
    /// connection.
    pub async fn stop(self) {
        // Stop the infinite loops
        self.cancellation_token.cancel();

        if let Err(e) = self.beacon_task.await {
            error!("Failed to await the beacon task: {e}");
        }

        if let Err(e) = self.server_task.await {
            error!("Failed to await the server task: {e}");
        }
    }
}

async fn outgoing_address(bind_address: IpAddr) -> IpAddr {
    if !bind_address.is_unspecified() {
        return bind_address;
    }

    match route_address().await {
        Ok(address) => address,
        Err(e) => {
            warn!("Unable to detect the outgoing address, announcing loopback: {e}");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

async fn route_address() -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.connect(ROUTE_TARGET).await?;
    Ok(socket.local_addr()?.ip())
}

async fn run_beacon(
    socket: UdpSocket,
    payload: Vec<u8>,
    destination: SocketAddr,
    period: Duration,
    cancellation_token: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            // Use the cancellation token to stop the loop
            () = cancellation_token.cancelled() => { break; }
            _ = interval.tick() => {
                if let Err(e) = socket.send_to(&payload, destination).await {
                    warn!("Failed to send a beacon to {destination}: {e}");
                }
            }
        }
    }
}

async fn run_server(
    listener: TcpListener,
    handler: CommandHandler,
    cancellation_token: CancellationToken,
) {
    loop {
        tokio::select! {
            // Use the cancellation token to stop the loop
            () = cancellation_token.cancelled() => { break; }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        info!("Client connected from {peer}");
                        // Connection tasks are stopped through the child token.
                        let _ = tokio::spawn(serve_connection(
                            stream,
                            peer,
                            handler.clone(),
                            cancellation_token.child_token(),
                        ));
                    }
                    Err(e) => error!("Failed to accept a connection: {e}"),
                }
            }
        }
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    handler: CommandHandler,
    cancellation_token: CancellationToken,
) {
    let mut buffer = vec![0; BUFFER_SIZE];

    loop {
        let read = tokio::select! {
            () = cancellation_token.cancelled() => { break; }
            read = stream.read(&mut buffer) => read,
        };

        let length = match read {
            Ok(0) => {
                info!("Client {peer} disconnected");
                break;
            }
            Ok(length) => length,
            Err(e) => {
                warn!("Failed to read from {peer}: {e}");
                break;
            }
        };

        let response = process(&handler, &buffer[..length]);

        let bytes = match serde_json::to_vec(&response) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to serialize the response for {peer}: {e}");
                break;
            }
        };

        if let Err(e) = stream.write_all(&bytes).await {
            warn!("Failed to write to {peer}: {e}");
            break;
        }
    }
}

fn process(handler: &CommandHandler, payload: &[u8]) -> Response {
    match serde_json::from_slice::<Value>(payload.trim_ascii()) {
        Ok(request) => handler.handle(&request),
        Err(e) => Response::bad_request(format!("Invalid JSON format: {e}")),
    }
}
