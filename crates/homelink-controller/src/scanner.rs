use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};

use homelink::discovery::{Beacon, DISCOVERY_PORT, MULTICAST_ADDRESS};

use indexmap::IndexMap;

use socket2::{Domain, Protocol, Socket, Type};

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use tokio_util::sync::CancellationToken;

use tracing::{debug, error, info};

use crate::error::{Error, ErrorKind, Result};

// Maximum size of a beacon.
const BEACON_SIZE: usize = 1024;

// Beacons are identified by device identifier and address.
type ScannedDevices = IndexMap<(String, String), Beacon>;

#[derive(Debug)]
struct Listener {
    cancellation_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Listener {
    fn is_running(&self) -> bool {
        !self.cancellation_token.is_cancelled() && !self.handle.is_finished()
    }
}

/// A listener for the beacons devices send to the discovery group.
///
/// A scan runs in the background from [`DeviceScanner::start_scan`] until
/// it is stopped or the listener fails. Found devices are kept in the
/// order they announced themselves, and a device announcing itself again
/// from the same address is recorded only once.
#[derive(Debug)]
pub struct DeviceScanner {
    group: Ipv4Addr,
    port: u16,
    devices: Arc<Mutex<ScannedDevices>>,
    last_error: Arc<Mutex<Option<String>>>,
    listener: Option<Listener>,
}

impl Default for DeviceScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceScanner {
    /// Creates a [`DeviceScanner`] listening on the default discovery group.
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::with_group(MULTICAST_ADDRESS, DISCOVERY_PORT)
    }

    /// Creates a [`DeviceScanner`] listening on the given multicast group
    /// and port.
    #[must_use]
    #[inline]
    pub fn with_group(group: Ipv4Addr, port: u16) -> Self {
        Self {
            group,
            port,
            devices: Arc::new(Mutex::new(IndexMap::new())),
            last_error: Arc::new(Mutex::new(None)),
            listener: None,
        }
    }

    /// Starts a scan in the background.
    ///
    /// Devices found by a previous scan and its error are discarded. A
    /// previous listener still closing its socket is aborted, and it cannot
    /// alter the results of the new scan.
    ///
    /// # Errors
    ///
    /// An error is returned if a scan is already running.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a `tokio` runtime.
    pub fn start_scan(&mut self) -> Result<()> {
        if self.is_scanning() {
            return Err(Error::new(
                ErrorKind::Scanner,
                "A scan is already running, stop it before starting a new one.",
            ));
        }

        if let Some(previous) = self.listener.take() {
            previous.cancellation_token.cancel();
            previous.handle.abort();
        }

        // Each scan owns its results.
        self.devices = Arc::new(Mutex::new(IndexMap::new()));
        self.last_error = Arc::new(Mutex::new(None));

        let cancellation_token = CancellationToken::new();
        let handle = tokio::spawn(listen(
            self.group,
            self.port,
            Arc::clone(&self.devices),
            Arc::clone(&self.last_error),
            cancellation_token.clone(),
        ));

        self.listener = Some(Listener {
            cancellation_token,
            handle,
        });

        info!("Scan started on {}:{}", self.group, self.port);

        Ok(())
    }

    /// Stops the running scan.
    ///
    /// The listener closes its socket in the background.
    pub fn stop_scan(&self) {
        if let Some(listener) = &self.listener {
            listener.cancellation_token.cancel();
        }
    }

    /// Stops the running scan and waits for the listener to close its
    /// socket.
    pub async fn stop_scan_and_wait(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };

        listener.cancellation_token.cancel();

        if let Err(e) = listener.handle.await {
            error!("Scanner listener terminated abnormally: {e}");
        }

        info!("Scan stopped");
    }

    /// Returns whether a scan is running.
    #[must_use]
    #[inline]
    pub fn is_scanning(&self) -> bool {
        self.listener.as_ref().is_some_and(Listener::is_running)
    }

    /// Returns the devices found so far.
    #[must_use]
    pub fn scanned_devices(&self) -> Vec<Beacon> {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Returns the error which terminated the last scan, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Clears the error of the last scan.
    pub fn clear_last_error(&self) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Drop for DeviceScanner {
    fn drop(&mut self) {
        self.stop_scan();
    }
}

fn bind(group: Ipv4Addr, port: u16) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    // More processes on the same host may listen for beacons.
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)).into())?;
    socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;

    UdpSocket::from_std(socket.into())
}

fn record(devices: &Mutex<ScannedDevices>, datagram: &[u8]) {
    let beacon = match serde_json::from_slice::<Beacon>(datagram) {
        Ok(beacon) => beacon,
        Err(e) => {
            debug!("Discarded an invalid beacon: {e}");
            return;
        }
    };

    let mut devices = devices.lock().unwrap_or_else(PoisonError::into_inner);
    let key = (beacon.id.clone(), beacon.ip_address.clone());

    if !devices.contains_key(&key) {
        info!(
            "Found {} `{}` at {}:{}",
            beacon.kind, beacon.id, beacon.ip_address, beacon.port
        );
        let _ = devices.insert(key, beacon);
    }
}

async fn listen(
    group: Ipv4Addr,
    port: u16,
    devices: Arc<Mutex<ScannedDevices>>,
    last_error: Arc<Mutex<Option<String>>>,
    cancellation_token: CancellationToken,
) {
    let fail = |message: String| {
        error!("{message}");
        *last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(message);
    };

    let socket = match bind(group, port) {
        Ok(socket) => socket,
        Err(e) => {
            fail(format!(
                "Failed to listen on the discovery group {group}:{port}: {e}"
            ));
            return;
        }
    };

    let mut buffer = [0; BEACON_SIZE];

    loop {
        tokio::select! {
            // Stop the infinite loop
            () = cancellation_token.cancelled() => { break; }
            received = socket.recv_from(&mut buffer) => {
                match received {
                    Ok((size, _)) => record(&devices, &buffer[..size]),
                    Err(e) => {
                        fail(format!("Failed to receive a beacon: {e}"));
                        break;
                    }
                }
            }
        }
    }
}
