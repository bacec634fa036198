use std::path::Path;

use homelink::device::DeviceKind;
use homelink::discovery::Beacon;

use serde::{Deserialize, Serialize};

use tracing::{debug, info};

use crate::error::{Error, ErrorKind, Result};

fn home_error(description: String) -> Error {
    Error::new(ErrorKind::Home, description)
}

/// A device assigned to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Device identifier.
    pub id: String,
    /// Device kind, unknown until the device is found by a scan.
    ///
    /// An unknown kind is stored as `"Unknown"`.
    #[serde(rename = "type", default, with = "kind_or_unknown")]
    pub kind: Option<DeviceKind>,
    /// Whether the device has been found by the last scan.
    pub available: bool,
}

mod kind_or_unknown {
    use core::str::FromStr;

    use homelink::device::DeviceKind;

    use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error};

    const UNKNOWN: &str = "Unknown";

    pub(super) fn serialize<S: Serializer>(
        kind: &Option<DeviceKind>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match kind {
            Some(kind) => kind.serialize(serializer),
            None => serializer.serialize_str(UNKNOWN),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DeviceKind>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(kind) if kind == UNKNOWN => Ok(None),
            Some(kind) => DeviceKind::from_str(&kind).map(Some).map_err(D::Error::custom),
        }
    }
}

/// A room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Room name.
    pub name: String,
    /// Devices assigned to the room.
    #[serde(default)]
    pub devices: Vec<DeviceStatus>,
}

/// A home.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Home {
    /// Home name.
    pub name: String,
    /// Home rooms.
    #[serde(default)]
    pub rooms: Vec<Room>,
}

/// The homes managed by a controller, persisted as a `JSON` file.
///
/// Homes and rooms are addressed by their position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Homes {
    #[serde(default)]
    homes: Vec<Home>,
}

impl Homes {
    /// Creates an empty set of [`Homes`].
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self { homes: Vec::new() }
    }

    /// Loads [`Homes`] from a file.
    ///
    /// A missing file is an empty set of homes.
    ///
    /// # Errors
    ///
    /// An error is returned when the file cannot be read or its content is
    /// not valid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            debug!("No homes file at {}", path.display());
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| home_error(format!("Failed to read {}: {e}", path.display())))?;

        let homes: Self = serde_json::from_str(&content)
            .map_err(|e| home_error(format!("Invalid homes file {}: {e}", path.display())))?;

        info!("Loaded {} homes from {}", homes.homes.len(), path.display());

        Ok(homes)
    }

    /// Saves [`Homes`] to a file.
    ///
    /// # Errors
    ///
    /// An error is returned when the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| home_error(format!("Failed to serialize homes: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| home_error(format!("Failed to write {}: {e}", path.display())))?;

        debug!("Saved {} homes to {}", self.homes.len(), path.display());

        Ok(())
    }

    /// Returns all homes.
    #[must_use]
    #[inline]
    pub fn homes(&self) -> &[Home] {
        &self.homes
    }

    /// Returns the home at the given position.
    #[must_use]
    #[inline]
    pub fn home(&self, index: usize) -> Option<&Home> {
        self.homes.get(index)
    }

    /// Adds a home and returns its position.
    pub fn add_home(&mut self, name: impl Into<String>) -> usize {
        self.homes.push(Home {
            name: name.into(),
            rooms: Vec::new(),
        });
        self.homes.len() - 1
    }

    /// Renames a home.
    ///
    /// # Errors
    ///
    /// An error is returned if the home does not exist.
    pub fn rename_home(&mut self, index: usize, name: impl Into<String>) -> Result<()> {
        self.home_mut(index)?.name = name.into();
        Ok(())
    }

    /// Removes a home and returns it.
    ///
    /// # Errors
    ///
    /// An error is returned if the home does not exist.
    pub fn remove_home(&mut self, index: usize) -> Result<Home> {
        let _ = self.home_mut(index)?;
        Ok(self.homes.remove(index))
    }

    /// Adds a room to a home and returns its position.
    ///
    /// # Errors
    ///
    /// An error is returned if the home does not exist.
    pub fn add_room(&mut self, home: usize, name: impl Into<String>) -> Result<usize> {
        let rooms = &mut self.home_mut(home)?.rooms;
        rooms.push(Room {
            name: name.into(),
            devices: Vec::new(),
        });
        Ok(rooms.len() - 1)
    }

    /// Renames a room.
    ///
    /// # Errors
    ///
    /// An error is returned if the home or the room does not exist.
    pub fn rename_room(
        &mut self,
        home: usize,
        room: usize,
        name: impl Into<String>,
    ) -> Result<()> {
        self.room_mut(home, room)?.name = name.into();
        Ok(())
    }

    /// Removes a room from a home and returns it.
    ///
    /// # Errors
    ///
    /// An error is returned if the home or the room does not exist.
    pub fn remove_room(&mut self, home: usize, room: usize) -> Result<Room> {
        let _ = self.room_mut(home, room)?;
        Ok(self.home_mut(home)?.rooms.remove(room))
    }

    /// Assigns a device to a room.
    ///
    /// The device is unavailable until found by a scan. Returns `false`
    /// if the device was already assigned to the room.
    ///
    /// # Errors
    ///
    /// An error is returned if the home or the room does not exist.
    pub fn add_device(
        &mut self,
        home: usize,
        room: usize,
        id: &str,
        kind: Option<DeviceKind>,
    ) -> Result<bool> {
        let devices = &mut self.room_mut(home, room)?.devices;

        if devices.iter().any(|device| device.id == id) {
            return Ok(false);
        }

        devices.push(DeviceStatus {
            id: id.into(),
            kind,
            available: false,
        });

        Ok(true)
    }

    /// Removes a device from a room.
    ///
    /// Returns `false` if the device was not assigned to the room.
    ///
    /// # Errors
    ///
    /// An error is returned if the home or the room does not exist.
    pub fn remove_device(&mut self, home: usize, room: usize, id: &str) -> Result<bool> {
        let devices = &mut self.room_mut(home, room)?.devices;
        let before = devices.len();
        devices.retain(|device| device.id != id);
        Ok(devices.len() != before)
    }

    /// Updates the availability of all assigned devices from the result of
    /// a scan.
    ///
    /// A device is available when a beacon with the same identifier has
    /// been received. The device takes the kind of the first such beacon.
    pub fn mark_availability(&mut self, scanned: &[Beacon]) {
        let devices = self
            .homes
            .iter_mut()
            .flat_map(|home| home.rooms.iter_mut())
            .flat_map(|room| room.devices.iter_mut());

        for device in devices {
            let found = scanned.iter().find(|beacon| beacon.id == device.id);

            device.available = found.is_some();
            if let Some(beacon) = found {
                device.kind = Some(beacon.kind);
            }
        }
    }

    fn home_mut(&mut self, index: usize) -> Result<&mut Home> {
        self.homes
            .get_mut(index)
            .ok_or_else(|| home_error(format!("No home at position {index}.")))
    }

    fn room_mut(&mut self, home: usize, room: usize) -> Result<&mut Room> {
        self.home_mut(home)?
            .rooms
            .get_mut(room)
            .ok_or_else(|| home_error(format!("No room at position {room} in home {home}.")))
    }
}
