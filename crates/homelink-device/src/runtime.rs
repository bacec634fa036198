use chrono::{DateTime, Datelike, Local};

use homelink::info::RuntimeReport;

use crate::error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Running {
    start: DateTime<Local>,
    power: u32,
}

/// Usage and energy accounting of a device.
///
/// The tracker accumulates the time a device stays on, both as a grand
/// total and over the current day, month and year, together with the
/// energy consumed in watt-seconds.
///
/// Calendar counters are reset lazily: a period change is detected on the
/// first stop or update following the boundary, comparing the local date
/// against the date of the previous update.
///
/// The tracker performs no locking, the owning device serializes accesses.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeTracker {
    total: u64,
    daily: u64,
    monthly: u64,
    yearly: u64,
    cumulative_power: u64,
    running: Option<Running>,
    last_update: DateTime<Local>,
}

impl Default for RuntimeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeTracker {
    /// Creates an idle [`RuntimeTracker`].
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::new_at(Local::now())
    }

    /// Creates an idle [`RuntimeTracker`] whose last update happened
    /// at the given instant.
    #[must_use]
    #[inline]
    pub const fn new_at(now: DateTime<Local>) -> Self {
        Self {
            total: 0,
            daily: 0,
            monthly: 0,
            yearly: 0,
            cumulative_power: 0,
            running: None,
            last_update: now,
        }
    }

    /// Starts measuring an interval at the given power, in watts.
    ///
    /// # Errors
    ///
    /// An error is returned if an interval is already being measured.
    /// The running interval is left untouched.
    #[inline]
    pub fn start_timer(&mut self, power: u32) -> Result<()> {
        self.start_timer_at(power, Local::now())
    }

    /// Starts measuring an interval at the given instant.
    ///
    /// # Errors
    ///
    /// An error is returned if an interval is already being measured.
    pub fn start_timer_at(&mut self, power: u32, now: DateTime<Local>) -> Result<()> {
        if self.running.is_some() {
            return Err(Error::new(
                ErrorKind::TimerState,
                "Runtime timer is already running.",
            ));
        }
        self.running = Some(Running { start: now, power });
        Ok(())
    }

    /// Stops measuring the current interval and accumulates it.
    ///
    /// # Errors
    ///
    /// An error is returned if no interval is being measured.
    #[inline]
    pub fn stop_timer(&mut self) -> Result<()> {
        self.stop_timer_at(Local::now())
    }

    /// Stops measuring the current interval at the given instant.
    ///
    /// # Errors
    ///
    /// An error is returned if no interval is being measured.
    pub fn stop_timer_at(&mut self, now: DateTime<Local>) -> Result<()> {
        let Some(Running { start, power }) = self.running.take() else {
            return Err(Error::new(
                ErrorKind::TimerState,
                "Runtime timer is not running.",
            ));
        };

        // A clock moved backwards counts as no elapsed time.
        let elapsed = u64::try_from((now - start).num_seconds()).unwrap_or(0);

        self.update_runtime_at(now);

        self.total += elapsed;
        self.daily += elapsed;
        self.monthly += elapsed;
        self.yearly += elapsed;
        self.cumulative_power += elapsed * u64::from(power);

        Ok(())
    }

    /// Resets the calendar counters whose period has changed since the
    /// last update.
    #[inline]
    pub fn update_runtime(&mut self) {
        self.update_runtime_at(Local::now());
    }

    /// Resets the calendar counters whose period has changed between the
    /// last update and the given instant.
    pub fn update_runtime_at(&mut self, now: DateTime<Local>) {
        let last = self.last_update;

        if now.date_naive() != last.date_naive() {
            self.daily = 0;
        }

        if now.year() != last.year() || now.month() != last.month() {
            self.monthly = 0;
        }

        if now.year() != last.year() {
            self.yearly = 0;
        }

        self.last_update = now;
    }

    /// Returns whether an interval is being measured.
    #[must_use]
    #[inline]
    pub const fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Returns the total runtime, in seconds.
    #[must_use]
    #[inline]
    pub const fn total_runtime(&self) -> u64 {
        self.total
    }

    /// Returns the runtime of the current day, in seconds.
    #[must_use]
    #[inline]
    pub const fn daily_runtime(&self) -> u64 {
        self.daily
    }

    /// Returns the runtime of the current month, in seconds.
    #[must_use]
    #[inline]
    pub const fn monthly_runtime(&self) -> u64 {
        self.monthly
    }

    /// Returns the runtime of the current year, in seconds.
    #[must_use]
    #[inline]
    pub const fn yearly_runtime(&self) -> u64 {
        self.yearly
    }

    /// Returns the consumed energy, in watt-seconds.
    #[must_use]
    #[inline]
    pub const fn cumulative_power(&self) -> u64 {
        self.cumulative_power
    }

    /// Returns the calendar counters as a [`RuntimeReport`].
    #[must_use]
    #[inline]
    pub const fn report(&self) -> RuntimeReport {
        RuntimeReport {
            daily: self.daily,
            monthly: self.monthly,
            yearly: self.yearly,
        }
    }
}
