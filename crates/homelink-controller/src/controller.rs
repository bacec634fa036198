use std::sync::Arc;
use std::time::Duration;

use homelink::discovery::Beacon;

use tracing::info;

use crate::error::{Error, ErrorKind, Result};
use crate::proxy::{DeviceProxy, KindProxy};
use crate::scanner::DeviceScanner;

/// A controller for discovering and interacting with homelink devices.
///
/// All proxies created by a controller share its client identifier.
#[derive(Debug)]
pub struct Controller {
    client_id: Arc<str>,
    scanner: DeviceScanner,
}

impl Controller {
    /// Creates a [`Controller`] scanning the default discovery group.
    #[must_use]
    #[inline]
    pub fn new(client_id: &str) -> Self {
        Self::with_scanner(client_id, DeviceScanner::new())
    }

    /// Creates a [`Controller`] with the given [`DeviceScanner`].
    #[must_use]
    #[inline]
    pub fn with_scanner(client_id: &str, scanner: DeviceScanner) -> Self {
        Self {
            client_id: Arc::from(client_id),
            scanner,
        }
    }

    /// Returns the client identifier.
    #[must_use]
    #[inline]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the [`DeviceScanner`].
    #[must_use]
    #[inline]
    pub const fn scanner(&self) -> &DeviceScanner {
        &self.scanner
    }

    /// Returns the [`DeviceScanner`] mutably, to run scans manually.
    #[must_use]
    #[inline]
    pub const fn scanner_mut(&mut self) -> &mut DeviceScanner {
        &mut self.scanner
    }

    /// Scans the network for the given duration and returns the devices
    /// found.
    ///
    /// # Errors
    ///
    /// An error is returned if a scan is already running or the scanner
    /// fails while listening.
    pub async fn scan_for(&mut self, duration: Duration) -> Result<Vec<Beacon>> {
        self.scanner.start_scan()?;

        tokio::time::sleep(duration).await;

        self.scanner.stop_scan_and_wait().await;

        if let Some(e) = self.scanner.last_error() {
            return Err(Error::new(ErrorKind::Scanner, e));
        }

        let devices = self.scanner.scanned_devices();

        info!("Scan completed, {} devices found", devices.len());

        Ok(devices)
    }

    /// Creates a [`DeviceProxy`] for the device described by a [`Beacon`].
    #[must_use]
    #[inline]
    pub fn proxy(&self, beacon: Beacon) -> DeviceProxy {
        DeviceProxy::new(beacon, Arc::clone(&self.client_id))
    }

    /// Creates a proxy typed after the kind of the device described by a
    /// [`Beacon`].
    #[must_use]
    #[inline]
    pub fn kind_proxy(&self, beacon: Beacon) -> KindProxy {
        self.proxy(beacon).into()
    }

    /// Creates a typed proxy for each device found by the last scan.
    #[must_use]
    pub fn proxies(&self) -> Vec<KindProxy> {
        self.scanner
            .scanned_devices()
            .into_iter()
            .map(|beacon| self.kind_proxy(beacon))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use homelink::device::DeviceKind;
    use homelink::discovery::{Beacon, MULTICAST_ADDRESS};

    use serial_test::serial;

    use tracing::warn;

    use crate::error::ErrorKind;
    use crate::proxy::KindProxy;
    use crate::scanner::DeviceScanner;
    use crate::scanner::tests::{encode, free_udp_port, init_logging, send};

    use super::Controller;

    #[test]
    fn test_shared_client_id() {
        let controller = Controller::new("client-1");

        let light = controller.proxy(Beacon::new(DeviceKind::Light, "light-1", "127.0.0.1", 80));
        let fan = controller.kind_proxy(Beacon::new(DeviceKind::Fan, "fan-1", "127.0.0.1", 81));

        assert_eq!(controller.client_id(), "client-1");
        assert_eq!(light.client_id(), "client-1");
        assert_eq!(fan.client_id(), "client-1");
        assert!(matches!(fan, KindProxy::Fan(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[serial]
    async fn test_scan_for() {
        init_logging();

        let port = free_udp_port();
        let mut controller =
            Controller::with_scanner("client-1", DeviceScanner::with_group(MULTICAST_ADDRESS, port));

        let beacon = Beacon::new(DeviceKind::Ac, "ac-1", "192.168.1.40", 8081);
        let datagram = encode(&beacon);

        let sender = tokio::spawn(async move {
            for _ in 0..5 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                send(port, &datagram);
            }
        });

        let devices = match controller.scan_for(Duration::from_millis(800)).await {
            Ok(devices) => devices,
            Err(e) if e.kind() == ErrorKind::Scanner => {
                warn!("Skipping the scan test: {e}");
                return;
            }
            Err(e) => panic!("Unexpected error: {e}"),
        };
        sender.await.unwrap();

        assert_eq!(devices, vec![beacon]);

        let proxies = controller.proxies();
        assert_eq!(proxies.len(), 1);
        assert!(matches!(proxies[0], KindProxy::Ac(_)));
        assert_eq!(proxies[0].id(), "ac-1");
    }
}
