//! When cycles run.
//!
//! Everything here is pure: given the schedule settings and the current time,
//! [`TriggerPlan::from_config`] decides whether to run at startup and how to
//! run afterwards. The async loop that follows the plan lives in
//! [`crate::trigger`].
//!
//! Two modes exist, selected by whether a start time is configured:
//!
//! - **Immediate + periodic**: one cycle at startup (unless suppressed), then
//!   every `max(1, round(hours * 60))` minutes.
//! - **Aligned start**: no startup cycle. Under one hour, a uniform periodic
//!   trigger on the grid anchored at today's start time, plus a single catch-up
//!   cycle if the start time already passed today. From one hour up, a chain of
//!   absolute instants starting at the start time; each firing computes the
//!   next one, which works for intervals that do not divide a day.
//!
//! All wall-clock arithmetic happens in the configured time zone.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Longest accepted poll interval (one leap year).
pub const MAX_INTERVAL_HOURS: f64 = 24.0 * 366.0;

/// Schedule settings, fixed for the life of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    /// Poll interval in hours; fractions allowed. Non-positive disables
    /// periodic polling.
    pub interval_hours: f64,
    /// Optional wall-clock start (HH:MM) in `timezone`.
    pub start_time: Option<NaiveTime>,
    pub timezone: Tz,
}

impl ScheduleConfig {
    /// Interval rounded to whole minutes, between one minute and
    /// [`MAX_INTERVAL_HOURS`].
    pub fn interval_minutes(&self) -> i64 {
        ((self.interval_hours.min(MAX_INTERVAL_HOURS) * 60.0).round() as i64).max(1)
    }

    pub fn period(&self) -> Duration {
        Duration::minutes(self.interval_minutes())
    }

    pub fn is_periodic(&self) -> bool {
        self.interval_hours.is_finite() && self.interval_hours > 0.0
    }
}

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// What happens after the startup decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// No further cycles.
    Once,
    /// Uniform trigger: `first`, then every `period` on a monotonic timer.
    /// Missed ticks are skipped.
    Every {
        first: DateTime<Utc>,
        period: Duration,
    },
    /// Absolute instants: `first`, then each next instant computed after the
    /// previous firing with [`next_after`].
    Chain {
        first: DateTime<Utc>,
        period: Duration,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerPlan {
    /// Run one cycle right away (initial check or start-time catch-up).
    pub run_at_startup: bool,
    pub cadence: Cadence,
}

impl TriggerPlan {
    pub fn from_config(config: &ScheduleConfig, skip_initial: bool, now: DateTime<Utc>) -> Self {
        let Some(start) = config.start_time else {
            let period = config.period();
            let cadence = match now.checked_add_signed(period) {
                Some(first) if config.is_periodic() => Cadence::Every { first, period },
                _ => Cadence::Once,
            };
            return Self {
                run_at_startup: !skip_initial,
                cadence,
            };
        };

        if !config.is_periodic() {
            return Self {
                run_at_startup: false,
                cadence: Cadence::Once,
            };
        }

        let period = config.period();
        let start_today = start_on_day_of(now, start, config.timezone);

        if config.interval_hours < 1.0 {
            let first = if now < start_today {
                Some(start_today)
            } else {
                let step = period.num_milliseconds();
                let steps = (now - start_today).num_milliseconds() / step + 1;
                add_millis(start_today, steps, step)
            };
            Self {
                run_at_startup: now >= start_today,
                cadence: first.map_or(Cadence::Once, |first| Cadence::Every { first, period }),
            }
        } else {
            Self {
                run_at_startup: false,
                cadence: first_aligned_instant(start_today, period, now)
                    .map_or(Cadence::Once, |first| Cadence::Chain { first, period }),
            }
        }
    }
}

/// The configured start time on the calendar day of `now` in `tz`.
pub fn start_on_day_of(now: DateTime<Utc>, start: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let day = now.with_timezone(&tz).date_naive();
    resolve_local(tz, day.and_time(start))
}

/// First instant on the grid `start + k * period` (k >= 0) not before `now`.
///
/// If `now` is before `start`, that is `start` itself; otherwise the elapsed
/// time is rounded up to a whole number of periods. `None` if that instant is
/// beyond the representable range.
pub fn first_aligned_instant(
    start: DateTime<Utc>,
    period: Duration,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if now <= start {
        return Some(start);
    }
    let elapsed = (now - start).num_milliseconds();
    let step = period.num_milliseconds().max(1);
    let steps = elapsed.div_euclid(step) + i64::from(elapsed.rem_euclid(step) != 0);
    add_millis(start, steps, step)
}

/// The instant after `previous` in a chain, skipping any already in the past.
///
/// Normally `previous + period`; if a long cycle pushed `now` past that, the
/// chain advances by whole periods so missed instants are not replayed.
pub fn next_after(
    previous: DateTime<Utc>,
    period: Duration,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let next = previous.checked_add_signed(period)?;
    if next > now {
        return Some(next);
    }
    let candidate = first_aligned_instant(next, period, now)?;
    if candidate > now {
        Some(candidate)
    } else {
        candidate.checked_add_signed(period)
    }
}

/// `base + steps * step_ms`, or `None` on overflow.
fn add_millis(base: DateTime<Utc>, steps: i64, step_ms: i64) -> Option<DateTime<Utc>> {
    let offset = Duration::try_milliseconds(steps.checked_mul(step_ms)?)?;
    base.checked_add_signed(offset)
}

fn resolve_local(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => t.with_timezone(&Utc),
        // Start time falls in a DST gap; the clock skips forward past it
        LocalResult::None => match tz.from_local_datetime(&(naive + Duration::hours(1))) {
            LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => t.with_timezone(&Utc),
            LocalResult::None => naive.and_utc(),
        },
    }
}
