use homelink::device::{DeviceKind, is_valid_speed};
use homelink::info::DetailedInfo;

use crate::device::{Appliance, SpeedControl};
use crate::error::{Error, ErrorKind, Result};

// Power drawn for each speed level, in watts.
const POWER_PER_LEVEL: u32 = 20;

/// A fan.
///
/// Its power grows linearly with the speed level. A fan turned on at
/// speed level 0 starts at the first level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fan {
    speed: u8,
}

impl Fan {
    /// Creates a [`Fan`] at speed level 0.
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self { speed: 0 }
    }
}

impl Appliance for Fan {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Fan
    }

    fn power(&self) -> u32 {
        POWER_PER_LEVEL * u32::from(self.speed)
    }

    fn prepare_on(&mut self) {
        if self.speed == 0 {
            self.speed = 1;
        }
    }

    fn describe(&self, info: DetailedInfo) -> DetailedInfo {
        info.speed(self.speed)
    }

    fn speed_control(&mut self) -> Option<&mut dyn SpeedControl> {
        Some(self)
    }
}

impl SpeedControl for Fan {
    fn speed(&self) -> u8 {
        self.speed
    }

    fn set_speed(&mut self, speed: i64) -> Result<()> {
        if !is_valid_speed(speed) {
            return Err(Error::new(ErrorKind::OutOfRange, "Invalid speed level."));
        }

        self.speed = u8::try_from(speed)
            .map_err(|_| Error::new(ErrorKind::OutOfRange, "Invalid speed level."))?;

        Ok(())
    }
}
