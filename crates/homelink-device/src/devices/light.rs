use homelink::device::DeviceKind;

use crate::device::Appliance;

// Power drawn by a light, in watts.
const LIGHT_POWER: u32 = 10;

/// A light.
///
/// It draws a fixed power and has no attributes to control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Light;

impl Light {
    /// Creates a [`Light`].
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self
    }
}

impl Appliance for Light {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Light
    }

    fn power(&self) -> u32 {
        LIGHT_POWER
    }
}
