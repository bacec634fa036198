use alloc::string::String;

use serde::{Deserialize, Serialize};

use crate::device::{AcMode, PowerState};

/// Summary information about a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device identifier.
    pub id: String,
    /// Power state.
    pub state: PowerState,
    /// Instantaneous power consumption, in watts.
    pub power: u32,
}

/// Device runtime, in seconds, over the current calendar periods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeReport {
    /// Runtime during the current day.
    pub daily: u64,
    /// Runtime during the current month.
    pub monthly: u64,
    /// Runtime during the current year.
    pub yearly: u64,
}

/// Detailed information about a device.
///
/// It extends [`DeviceInfo`] with usage accounting and the attributes
/// specific to a device kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedInfo {
    /// Summary information.
    #[serde(flatten)]
    pub info: DeviceInfo,
    /// Energy consumed since the device was created, in watt-seconds.
    pub cumulative_power: u64,
    /// Runtime over the current calendar periods.
    pub runtime: RuntimeReport,
    /// Air conditioner mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<AcMode>,
    /// Air conditioner temperature, in Celsius degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<i64>,
    /// Fan speed level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<u8>,
}

impl DetailedInfo {
    /// Creates a [`DetailedInfo`] without kind-specific attributes.
    #[must_use]
    #[inline]
    pub const fn new(info: DeviceInfo, cumulative_power: u64, runtime: RuntimeReport) -> Self {
        Self {
            info,
            cumulative_power,
            runtime,
            mode: None,
            temperature: None,
            speed: None,
        }
    }

    /// Adds air conditioner attributes.
    #[must_use]
    #[inline]
    pub fn climate(mut self, mode: AcMode, temperature: i64) -> Self {
        self.mode = Some(mode);
        self.temperature = Some(temperature);
        self
    }

    /// Adds fan attributes.
    #[must_use]
    #[inline]
    pub fn speed(mut self, speed: u8) -> Self {
        self.speed = Some(speed);
        self
    }
}
