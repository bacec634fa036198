use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Minimum temperature, in Celsius degrees, accepted by an air conditioner.
pub const MIN_TEMPERATURE: i64 = 18;

/// Maximum temperature, in Celsius degrees, accepted by an air conditioner.
pub const MAX_TEMPERATURE: i64 = 30;

/// Temperature, in Celsius degrees, of a freshly created air conditioner.
pub const DEFAULT_TEMPERATURE: i64 = 24;

/// Maximum speed level of a fan.
///
/// A fan accepts speed levels in the `0..=MAX_FAN_SPEED` range.
pub const MAX_FAN_SPEED: i64 = 3;

/// Returns whether a temperature is accepted by an air conditioner.
#[must_use]
#[inline]
pub const fn is_valid_temperature(temperature: i64) -> bool {
    temperature >= MIN_TEMPERATURE && temperature <= MAX_TEMPERATURE
}

/// Returns whether a speed level is accepted by a fan.
#[must_use]
#[inline]
pub const fn is_valid_speed(speed: i64) -> bool {
    speed >= 0 && speed <= MAX_FAN_SPEED
}

/// Device kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Light.
    Light,
    /// Fan.
    Fan,
    /// Air conditioner.
    #[serde(rename = "AC")]
    Ac,
}

impl DeviceKind {
    /// Returns the wire name of a [`DeviceKind`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Light => "Light",
            Self::Fan => "Fan",
            Self::Ac => "AC",
        }
    }
}

impl core::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a string does not name a [`DeviceKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownDeviceKind;

impl core::fmt::Display for UnknownDeviceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("unknown device kind, expected one of `light`, `fan`, `ac`")
    }
}

impl core::error::Error for UnknownDeviceKind {}

impl FromStr for DeviceKind {
    type Err = UnknownDeviceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("light") {
            Ok(Self::Light)
        } else if s.eq_ignore_ascii_case("fan") {
            Ok(Self::Fan)
        } else if s.eq_ignore_ascii_case("ac") {
            Ok(Self::Ac)
        } else {
            Err(UnknownDeviceKind)
        }
    }
}

/// Power states of a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    /// The device is on.
    On,
    /// The device is off.
    #[default]
    Off,
}

impl PowerState {
    /// Returns whether the state is [`PowerState::On`].
    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

impl core::fmt::Display for PowerState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::On => "on",
            Self::Off => "off",
        })
    }
}

/// Operating modes of an air conditioner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcMode {
    /// Cooling mode.
    #[default]
    Cool,
    /// Heating mode.
    Heat,
    /// Dehumidifying mode.
    Dry,
}

impl core::fmt::Display for AcMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Cool => "cool",
            Self::Heat => "heat",
            Self::Dry => "dry",
        })
    }
}
