use alloc::string::String;

use core::net::Ipv4Addr;
use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::DeviceKind;

/// Multicast group on which devices announce themselves.
pub const MULTICAST_ADDRESS: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// Port of the multicast group on which devices announce themselves.
pub const DISCOVERY_PORT: u16 = 1900;

/// Interval between two consecutive beacons sent by a device.
pub const BEACON_INTERVAL: Duration = Duration::from_secs(5);

/// A discovery beacon.
///
/// A device periodically sends a beacon to the multicast group to announce
/// its kind, its identifier, and the address where its command server
/// listens. Beacons are neither authenticated nor acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beacon {
    /// Device kind.
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    /// Device identifier.
    pub id: String,
    /// Address of the device command server.
    #[serde(rename = "ipAddress")]
    pub ip_address: String,
    /// Port of the device command server.
    pub port: u16,
}

impl Beacon {
    /// Creates a [`Beacon`].
    #[must_use]
    #[inline]
    pub fn new(
        kind: DeviceKind,
        id: impl Into<String>,
        ip_address: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            kind,
            id: id.into(),
            ip_address: ip_address.into(),
            port,
        }
    }

    /// Returns whether two beacons describe the same device.
    ///
    /// Two beacons describe the same device when both the identifier
    /// and the address coincide, regardless of the announced port.
    #[must_use]
    #[inline]
    pub fn same_device(&self, other: &Self) -> bool {
        self.id == other.id && self.ip_address == other.ip_address
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::device::DeviceKind;
    use crate::{deserialize, serialize};

    use super::Beacon;

    #[test]
    fn test_beacon() {
        let beacon = Beacon::new(DeviceKind::Fan, "fan-1", "192.168.1.20", 8080);

        assert_eq!(
            serialize(beacon.clone()),
            json!({
                "type": "Fan",
                "id": "fan-1",
                "ipAddress": "192.168.1.20",
                "port": 8080,
            })
        );

        assert_eq!(
            deserialize::<Beacon>(json!({
                "type": "Fan",
                "id": "fan-1",
                "ipAddress": "192.168.1.20",
                "port": 8080,
            })),
            beacon
        );
    }

    #[test]
    fn test_malformed_beacon() {
        // Missing port.
        assert!(
            serde_json::from_value::<Beacon>(json!({
                "type": "Light",
                "id": "light-1",
                "ipAddress": "10.0.0.2",
            }))
            .is_err()
        );

        // Wrongly typed port.
        assert!(
            serde_json::from_value::<Beacon>(json!({
                "type": "Light",
                "id": "light-1",
                "ipAddress": "10.0.0.2",
                "port": "8080",
            }))
            .is_err()
        );

        // Unknown kind.
        assert!(
            serde_json::from_value::<Beacon>(json!({
                "type": "Heater",
                "id": "heater-1",
                "ipAddress": "10.0.0.2",
                "port": 8080,
            }))
            .is_err()
        );
    }

    #[test]
    fn test_same_device() {
        let first = Beacon::new(DeviceKind::Light, "light-1", "10.0.0.2", 8080);
        let moved_port = Beacon::new(DeviceKind::Light, "light-1", "10.0.0.2", 9090);
        let other_address = Beacon::new(DeviceKind::Light, "light-1", "10.0.0.3", 8080);

        assert!(first.same_device(&moved_port));
        assert!(!first.same_device(&other_address));
    }
}
