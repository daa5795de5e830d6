//! Date roll-over detection for minutely, hourly, daily and monthly work.

use time::OffsetDateTime;
use tracing::debug;

use super::DISPATCH_TARGET;

/// Calendar fields compared between loop iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateSample {
    /// Minute of the hour, 0 to 59.
    pub minute: u8,
    /// Hour of the day, 0 to 23.
    pub hour: u8,
    /// Day of the month, 1 to 31.
    pub day: u8,
    /// Month of the year, 1 to 12.
    pub month: u8,
}

/// Source of wall-clock samples.
pub trait Clock: Send {
    /// Samples the current local time.
    fn sample(&self) -> DateSample;
}

/// Clock reading the local time, or UTC when the local offset is unknown.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sample(&self) -> DateSample {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        DateSample {
            minute: now.minute(),
            hour: now.hour(),
            day: now.day(),
            month: u8::from(now.month()),
        }
    }
}

/// One-shot flags raised when a calendar field changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DateFlags {
    pub(crate) minutely: bool,
    pub(crate) hourly: bool,
    pub(crate) daily: bool,
    pub(crate) monthly: bool,
}

/// Compares successive clock samples and raises [`DateFlags`].
///
/// The cached sample starts zeroed, so the first check raises every flag
/// unless suppressed. With `skip_zero` set, the minute, hour and day flags
/// are not raised when the new value is zero; the month flag always is.
pub struct DateTracker {
    clock: Box<dyn Clock>,
    last: DateSample,
    skip_zero: bool,
}

impl DateTracker {
    /// Tracks `clock`.
    #[must_use]
    pub fn new(clock: Box<dyn Clock>, skip_zero: bool) -> Self {
        Self {
            clock,
            last: DateSample::default(),
            skip_zero,
        }
    }

    /// Tracks the system clock.
    #[must_use]
    pub fn system(skip_zero: bool) -> Self {
        Self::new(Box::new(SystemClock), skip_zero)
    }

    pub(crate) fn check(&mut self, flags: &mut DateFlags) {
        let now = self.clock.sample();
        let skip_zero = self.skip_zero;
        let raise = |previous: u8, current: u8| previous != current && !(skip_zero && current == 0);

        if raise(self.last.minute, now.minute) {
            flags.minutely = true;
        }
        if raise(self.last.hour, now.hour) {
            flags.hourly = true;
        }
        if raise(self.last.day, now.day) {
            flags.daily = true;
        }
        if now.month != self.last.month {
            flags.monthly = true;
        }
        if now != self.last {
            debug!(
                target: DISPATCH_TARGET,
                previous = ?self.last,
                current = ?now,
                "date fields changed"
            );
        }
        self.last = now;
    }
}

impl std::fmt::Debug for DateTracker {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("DateTracker")
            .field("last", &self.last)
            .field("skip_zero", &self.skip_zero)
            .finish_non_exhaustive()
    }
}
