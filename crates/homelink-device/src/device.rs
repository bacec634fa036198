use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Local};

use homelink::device::{AcMode, DeviceKind, PowerState};
use homelink::info::{DetailedInfo, DeviceInfo};
use homelink::request::TimerAction;

use tracing::{info, warn};

use crate::auth::AuthenticationManager;
use crate::devices::{ac::AirConditioner, fan::Fan, light::Light};
use crate::error::{Error, ErrorKind, Result};
use crate::runtime::RuntimeTracker;
use crate::timer::{TimerCallback, TimerManager};

/// Behavior specific to a device kind.
///
/// Optional operation sets are exposed as capabilities: a device kind
/// returns them only when it supports the related actions.
pub trait Appliance: std::fmt::Debug + Send {
    /// Returns the device kind.
    fn kind(&self) -> DeviceKind;

    /// Returns the power drawn while the device is on, in watts.
    fn power(&self) -> u32;

    /// Prepares the appliance attributes right before turning on.
    fn prepare_on(&mut self) {}

    /// Adds the kind-specific attributes to the detailed information.
    fn describe(&self, info: DetailedInfo) -> DetailedInfo {
        info
    }

    /// Returns the speed control capability.
    fn speed_control(&mut self) -> Option<&mut dyn SpeedControl> {
        None
    }

    /// Returns the climate control capability.
    fn climate_control(&mut self) -> Option<&mut dyn ClimateControl> {
        None
    }
}

/// Capability of changing a speed level.
pub trait SpeedControl {
    /// Returns the speed level.
    fn speed(&self) -> u8;

    /// Changes the speed level.
    ///
    /// # Errors
    ///
    /// An error is returned if the speed level is out of range.
    fn set_speed(&mut self, speed: i64) -> Result<()>;
}

/// Capability of changing an operating mode and a target temperature.
pub trait ClimateControl {
    /// Returns the operating mode.
    fn mode(&self) -> AcMode;

    /// Changes the operating mode.
    fn set_mode(&mut self, mode: AcMode);

    /// Returns the target temperature, in Celsius degrees.
    fn temperature(&self) -> i64;

    /// Changes the target temperature.
    ///
    /// # Errors
    ///
    /// An error is returned if the temperature is out of range.
    fn set_temperature(&mut self, temperature: i64) -> Result<()>;
}

/// Creates the [`Appliance`] associated with a device kind.
#[must_use]
pub fn appliance(kind: DeviceKind) -> Box<dyn Appliance> {
    match kind {
        DeviceKind::Light => Box::new(Light::new()),
        DeviceKind::Fan => Box::new(Fan::new()),
        DeviceKind::Ac => Box::new(AirConditioner::new()),
    }
}

pub(crate) fn unsupported(kind: DeviceKind, action: &str) -> Error {
    Error::new(
        ErrorKind::UnsupportedAction,
        format!("Unsupported action for {kind}: {action}"),
    )
}

#[derive(Debug)]
struct DeviceCore {
    id: Arc<str>,
    state: PowerState,
    power: u32,
    appliance: Box<dyn Appliance>,
    tracker: RuntimeTracker,
}

impl DeviceCore {
    fn turn_on(&mut self) -> Result<()> {
        self.turn_on_at(Local::now())
    }

    fn turn_on_at(&mut self, now: DateTime<Local>) -> Result<()> {
        let kind = self.appliance.kind();
        if self.state.is_on() {
            return Err(Error::new(
                ErrorKind::InvalidStateTransition,
                format!("{kind} is already on."),
            ));
        }

        self.appliance.prepare_on();
        self.state = PowerState::On;
        self.power = self.appliance.power();
        self.tracker.start_timer_at(self.power, now)?;

        info!("Device `{}`: {kind} turned on at {}W", self.id, self.power);

        Ok(())
    }

    fn turn_off(&mut self) -> Result<()> {
        self.turn_off_at(Local::now())
    }

    fn turn_off_at(&mut self, now: DateTime<Local>) -> Result<()> {
        let kind = self.appliance.kind();
        if !self.state.is_on() {
            return Err(Error::new(
                ErrorKind::InvalidStateTransition,
                format!("{kind} is already off."),
            ));
        }

        self.state = PowerState::Off;
        self.power = 0;
        self.tracker.stop_timer_at(now)?;

        info!("Device `{}`: {kind} turned off", self.id);

        Ok(())
    }

    fn apply(&mut self, action: TimerAction) -> Result<()> {
        match action {
            TimerAction::TurnOn => self.turn_on(),
            TimerAction::TurnOff => self.turn_off(),
        }
    }

    fn set_speed(&mut self, speed: i64) -> Result<()> {
        self.set_speed_at(speed, Local::now())
    }

    fn set_speed_at(&mut self, speed: i64, now: DateTime<Local>) -> Result<()> {
        let kind = self.appliance.kind();
        self.appliance
            .speed_control()
            .ok_or_else(|| unsupported(kind, "set_speed"))?
            .set_speed(speed)?;

        // Account the rest of the interval at the new rate.
        if self.state.is_on() {
            self.tracker.stop_timer_at(now)?;
            self.power = self.appliance.power();
            self.tracker.start_timer_at(self.power, now)?;
        }

        info!("Device `{}`: speed set to {speed}", self.id);

        Ok(())
    }

    fn climate(&mut self, action: &str) -> Result<&mut dyn ClimateControl> {
        let kind = self.appliance.kind();
        self.appliance
            .climate_control()
            .ok_or_else(|| unsupported(kind, action))
    }

    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            id: self.id.to_string(),
            state: self.state,
            power: self.power,
        }
    }
}

/// A device.
///
/// It is a cheap handle: clones share the same power state, usage
/// accounting, timers and credentials.
///
/// Request-driven and timer-driven transitions are serialized on the same
/// lock, so a device never observes two transitions at once.
#[derive(Debug, Clone)]
pub struct Device {
    id: Arc<str>,
    kind: DeviceKind,
    core: Arc<Mutex<DeviceCore>>,
    timers: Arc<TimerManager>,
    auth: Arc<AuthenticationManager>,
}

impl Device {
    /// Creates a [`Device`] of the given kind.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a `tokio` runtime, since the device
    /// spawns its timer worker.
    #[must_use]
    #[inline]
    pub fn new(kind: DeviceKind, id: &str, password: &str) -> Self {
        Self::with_appliance(appliance(kind), id, AuthenticationManager::new(password))
    }

    /// Creates a [`Device`] from an [`Appliance`] and an
    /// [`AuthenticationManager`].
    ///
    /// # Panics
    ///
    /// Panics when called outside of a `tokio` runtime.
    #[must_use]
    pub fn with_appliance(
        appliance: Box<dyn Appliance>,
        id: &str,
        auth: AuthenticationManager,
    ) -> Self {
        let id: Arc<str> = Arc::from(id);
        let kind = appliance.kind();

        let core = Arc::new(Mutex::new(DeviceCore {
            id: Arc::clone(&id),
            state: PowerState::Off,
            power: 0,
            appliance,
            tracker: RuntimeTracker::new(),
        }));

        let timers = TimerManager::new(timer_callback(Arc::downgrade(&core)));

        info!("Device `{id}`: {kind} created");

        Self {
            id,
            kind,
            core,
            timers: Arc::new(timers),
            auth: Arc::new(auth),
        }
    }

    /// Returns the device identifier.
    #[must_use]
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the device kind.
    #[must_use]
    #[inline]
    pub const fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Returns the [`AuthenticationManager`] of the device.
    #[must_use]
    #[inline]
    pub fn auth(&self) -> &AuthenticationManager {
        &self.auth
    }

    /// Returns the power state.
    #[must_use]
    pub fn state(&self) -> PowerState {
        self.lock().state
    }

    /// Returns the power drawn, in watts.
    #[must_use]
    pub fn power(&self) -> u32 {
        self.lock().power
    }

    /// Turns the device on.
    ///
    /// # Errors
    ///
    /// An error is returned if the device is already on.
    pub fn turn_on(&self) -> Result<()> {
        self.lock().turn_on()
    }

    /// Turns the device off.
    ///
    /// # Errors
    ///
    /// An error is returned if the device is already off.
    pub fn turn_off(&self) -> Result<()> {
        self.lock().turn_off()
    }

    /// Schedules a power transition after the given number of seconds.
    ///
    /// # Errors
    ///
    /// An error is returned if the timer worker is not running.
    #[inline]
    pub fn set_timer(&self, seconds: u64, action: TimerAction) -> Result<()> {
        self.timers.set_timer(seconds, action)
    }

    /// Cancels every scheduled power transition.
    #[inline]
    pub fn cancel_all_timers(&self) {
        self.timers.cancel_all_timers();
    }

    /// Changes the speed level of a fan.
    ///
    /// When the device is on, usage is accounted at the new power from
    /// this instant on.
    ///
    /// # Errors
    ///
    /// An error is returned if the device has no speed control or the
    /// speed level is out of range.
    pub fn set_speed(&self, speed: i64) -> Result<()> {
        self.lock().set_speed(speed)
    }

    /// Changes the operating mode of an air conditioner.
    ///
    /// # Errors
    ///
    /// An error is returned if the device has no climate control.
    pub fn set_mode(&self, mode: AcMode) -> Result<()> {
        let mut core = self.lock();
        core.climate("set_mode")?.set_mode(mode);
        info!("Device `{}`: mode set to {mode}", self.id);
        Ok(())
    }

    /// Changes the target temperature of an air conditioner.
    ///
    /// # Errors
    ///
    /// An error is returned if the device has no climate control or the
    /// temperature is out of range.
    pub fn set_temperature(&self, temperature: i64) -> Result<()> {
        let mut core = self.lock();
        core.climate("set_temperature")?
            .set_temperature(temperature)?;
        info!("Device `{}`: temperature set to {temperature}", self.id);
        Ok(())
    }

    /// Returns summary information.
    #[must_use]
    pub fn info(&self) -> DeviceInfo {
        self.lock().info()
    }

    /// Returns detailed information.
    ///
    /// Calendar counters are brought up to date before being reported.
    #[must_use]
    pub fn detailed_info(&self) -> DetailedInfo {
        let mut core = self.lock();
        core.tracker.update_runtime();

        let info = DetailedInfo::new(
            core.info(),
            core.tracker.cumulative_power(),
            core.tracker.report(),
        );

        core.appliance.describe(info)
    }

    /// Stops the timer worker.
    #[inline]
    pub fn shutdown(&self) {
        self.timers.shutdown();
    }

    fn lock(&self) -> MutexGuard<'_, DeviceCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn timer_callback(core: Weak<Mutex<DeviceCore>>) -> TimerCallback {
    Arc::new(move |action: TimerAction| -> Result<()> {
        let Some(core) = core.upgrade() else {
            warn!("Timer `{action}` fired after the device was dropped");
            return Ok(());
        };

        let mut core = core.lock().unwrap_or_else(PoisonError::into_inner);
        core.apply(action)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{DateTime, Local, TimeZone};

    use homelink::device::{AcMode, DeviceKind, PowerState};
    use homelink::request::TimerAction;

    use crate::error::ErrorKind;
    use crate::runtime::RuntimeTracker;

    use super::{Device, DeviceCore, appliance};

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 5, 10, hour, minute, second)
            .single()
            .unwrap()
    }

    fn core(kind: DeviceKind, now: DateTime<Local>) -> DeviceCore {
        DeviceCore {
            id: Arc::from("device-1"),
            state: PowerState::Off,
            power: 0,
            appliance: appliance(kind),
            tracker: RuntimeTracker::new_at(now),
        }
    }

    async fn wait(millis: u64) {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }

    #[tokio::test]
    async fn test_power_transitions() {
        let light = Device::new(DeviceKind::Light, "light-1", "secret");
        assert_eq!(light.state(), PowerState::Off);
        assert_eq!(light.power(), 0);

        light.turn_on().unwrap();
        assert_eq!(light.state(), PowerState::On);
        assert_eq!(light.power(), 10);

        let error = light.turn_on().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidStateTransition);
        assert_eq!(error.description(), "Light is already on.");

        light.turn_off().unwrap();
        assert_eq!(light.power(), 0);

        let error = light.turn_off().unwrap_err();
        assert_eq!(error.description(), "Light is already off.");
    }

    #[tokio::test]
    async fn test_kind_power() {
        let fan = Device::new(DeviceKind::Fan, "fan-1", "secret");
        fan.turn_on().unwrap();
        // Speed defaults to 1 when turning on.
        assert_eq!(fan.power(), 20);
        assert_eq!(fan.detailed_info().speed, Some(1));

        let ac = Device::new(DeviceKind::Ac, "ac-1", "secret");
        ac.turn_on().unwrap();
        assert_eq!(ac.power(), 100);
    }

    #[tokio::test]
    async fn test_fan_speed() {
        let fan = Device::new(DeviceKind::Fan, "fan-1", "secret");

        for speed in 0..=3 {
            fan.set_speed(speed).unwrap();
        }
        for speed in [-1, 4, 10] {
            let error = fan.set_speed(speed).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::OutOfRange);
            assert_eq!(error.description(), "Invalid speed level.");
        }

        fan.set_speed(2).unwrap();
        fan.turn_on().unwrap();
        assert_eq!(fan.power(), 40);

        // Changing speed while on changes the power right away.
        fan.set_speed(3).unwrap();
        assert_eq!(fan.power(), 60);

        fan.set_speed(0).unwrap();
        assert_eq!(fan.power(), 0);
        assert_eq!(fan.state(), PowerState::On);
    }

    #[test]
    fn test_speed_change_accounting() {
        let mut fan = core(DeviceKind::Fan, at(10, 0, 0));

        // Speed 1 draws 20W.
        fan.turn_on_at(at(10, 0, 0)).unwrap();
        assert_eq!(fan.power, 20);

        // The first second is accounted at 20W, the next one at 60W.
        fan.set_speed_at(3, at(10, 0, 1)).unwrap();
        assert_eq!(fan.power, 60);
        assert!(fan.tracker.is_running());
        assert_eq!(fan.tracker.cumulative_power(), 20);
        assert_eq!(fan.tracker.daily_runtime(), 1);

        fan.turn_off_at(at(10, 0, 2)).unwrap();
        assert_eq!(fan.tracker.cumulative_power(), 80);
        assert_eq!(fan.tracker.daily_runtime(), 2);
        assert_eq!(fan.tracker.total_runtime(), 2);

        // Changing speed while off accounts nothing.
        fan.set_speed_at(2, at(10, 1, 0)).unwrap();
        assert_eq!(fan.tracker.cumulative_power(), 80);
        assert!(!fan.tracker.is_running());
    }

    #[tokio::test]
    async fn test_ac_attributes() {
        let ac = Device::new(DeviceKind::Ac, "ac-1", "secret");

        let details = ac.detailed_info();
        assert_eq!(details.mode, Some(AcMode::Cool));
        assert_eq!(details.temperature, Some(24));

        for temperature in 18..=30 {
            ac.set_temperature(temperature).unwrap();
        }
        for temperature in [17, 31, -5] {
            let error = ac.set_temperature(temperature).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::OutOfRange);
            assert_eq!(error.description(), "Temperature out of range.");
        }

        ac.set_mode(AcMode::Dry).unwrap();
        let details = ac.detailed_info();
        assert_eq!(details.mode, Some(AcMode::Dry));
        assert_eq!(details.temperature, Some(30));
        assert_eq!(details.speed, None);
    }

    #[tokio::test]
    async fn test_missing_capabilities() {
        let light = Device::new(DeviceKind::Light, "light-1", "secret");

        let error = light.set_speed(1).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::UnsupportedAction);
        assert_eq!(error.description(), "Unsupported action for Light: set_speed");

        let fan = Device::new(DeviceKind::Fan, "fan-1", "secret");
        assert_eq!(
            fan.set_mode(AcMode::Heat).map_err(|e| e.kind()),
            Err(ErrorKind::UnsupportedAction)
        );
        assert_eq!(
            fan.set_temperature(20).map_err(|e| e.kind()),
            Err(ErrorKind::UnsupportedAction)
        );

        let ac = Device::new(DeviceKind::Ac, "ac-1", "secret");
        assert_eq!(
            ac.set_speed(1).map_err(|e| e.kind()),
            Err(ErrorKind::UnsupportedAction)
        );
    }

    #[tokio::test]
    async fn test_usage_accounting() {
        let light = Device::new(DeviceKind::Light, "light-1", "secret");

        light.turn_on().unwrap();
        wait(1100).await;
        light.turn_off().unwrap();

        let details = light.detailed_info();
        assert_eq!(details.info.power, 0);
        assert_eq!(details.info.state, PowerState::Off);
        // One whole second at 10W.
        assert_eq!(details.cumulative_power, 10);
        assert_eq!(details.runtime.daily, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_timers() {
        let light = Device::new(DeviceKind::Light, "light-1", "secret");

        light.set_timer(2, TimerAction::TurnOn).unwrap();
        wait(1500).await;
        assert_eq!(light.state(), PowerState::Off);

        wait(1000).await;
        assert_eq!(light.state(), PowerState::On);

        // A timer hitting the current state is only logged.
        light.set_timer(1, TimerAction::TurnOn).unwrap();
        light.set_timer(1, TimerAction::TurnOff).unwrap();
        wait(2500).await;
        assert_eq!(light.state(), PowerState::Off);

        light.set_timer(1, TimerAction::TurnOn).unwrap();
        light.cancel_all_timers();
        wait(2000).await;
        assert_eq!(light.state(), PowerState::Off);
    }
}
