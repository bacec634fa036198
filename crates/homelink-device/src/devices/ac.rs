use homelink::device::{AcMode, DEFAULT_TEMPERATURE, DeviceKind, is_valid_temperature};
use homelink::info::DetailedInfo;

use crate::device::{Appliance, ClimateControl};
use crate::error::{Error, ErrorKind, Result};

// Power drawn by an air conditioner, in watts.
const AC_POWER: u32 = 100;

/// An air conditioner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AirConditioner {
    mode: AcMode,
    temperature: i64,
}

impl Default for AirConditioner {
    fn default() -> Self {
        Self::new()
    }
}

impl AirConditioner {
    /// Creates an [`AirConditioner`] in cooling mode at the default
    /// temperature.
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self {
            mode: AcMode::Cool,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl Appliance for AirConditioner {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Ac
    }

    fn power(&self) -> u32 {
        AC_POWER
    }

    fn describe(&self, info: DetailedInfo) -> DetailedInfo {
        info.climate(self.mode, self.temperature)
    }

    fn climate_control(&mut self) -> Option<&mut dyn ClimateControl> {
        Some(self)
    }
}

impl ClimateControl for AirConditioner {
    fn mode(&self) -> AcMode {
        self.mode
    }

    fn set_mode(&mut self, mode: AcMode) {
        self.mode = mode;
    }

    fn temperature(&self) -> i64 {
        self.temperature
    }

    fn set_temperature(&mut self, temperature: i64) -> Result<()> {
        if !is_valid_temperature(temperature) {
            return Err(Error::new(
                ErrorKind::OutOfRange,
                "Temperature out of range.",
            ));
        }
        self.temperature = temperature;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use homelink::device::AcMode;

    use crate::device::{Appliance, ClimateControl};

    use super::AirConditioner;

    #[test]
    fn test_ac_defaults() {
        let mut ac = AirConditioner::new();

        assert_eq!(ac.mode(), AcMode::Cool);
        assert_eq!(ac.temperature(), 24);
        assert_eq!(ac.power(), 100);
        assert!(ac.climate_control().is_some());
        assert!(ac.speed_control().is_none());
    }

    #[test]
    fn test_ac_temperature_bounds() {
        let mut ac = AirConditioner::new();

        assert!(ac.set_temperature(17).is_err());
        assert!(ac.set_temperature(31).is_err());
        assert_eq!(ac.temperature(), 24);

        ac.set_temperature(18).unwrap();
        ac.set_temperature(30).unwrap();
        assert_eq!(ac.temperature(), 30);

        ac.set_mode(AcMode::Heat);
        assert_eq!(ac.mode(), AcMode::Heat);
    }
}
