//! Drives the dispatcher according to a [`TriggerPlan`].
//!
//! One task, one loop: wait for the next instant (or shutdown), run a cycle,
//! repeat. Cycles never overlap because the loop awaits each one before
//! computing the next wait. Nothing is persisted; a restart plans from
//! scratch.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use crate::dispatcher::Dispatcher;
use crate::schedule::{next_after, Cadence, Clock, SystemClock, TriggerPlan};

pub struct Trigger {
    plan: TriggerPlan,
    timezone: Tz,
    clock: Arc<dyn Clock>,
}

impl Trigger {
    pub fn new(plan: TriggerPlan, timezone: Tz) -> Self {
        Self {
            plan,
            timezone,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn plan(&self) -> &TriggerPlan {
        &self.plan
    }

    /// Follows the plan until `shutdown` turns true or its sender is dropped.
    ///
    /// Shutdown is observed while waiting. A cycle already underway is allowed
    /// to finish; the caller decides how long to wait for that.
    pub async fn run(self, dispatcher: Arc<Dispatcher>, mut shutdown: watch::Receiver<bool>) {
        if self.plan.run_at_startup && !*shutdown.borrow() {
            tracing::info!(at = %self.local(self.clock.now()), "Starting initial feed check");
            dispatcher.run_cycle().await;
        }

        match self.plan.cadence {
            Cadence::Once => {
                tracing::info!("Periodic checks disabled");
            }
            Cadence::Every { first, period } => {
                let period = period.to_std().unwrap_or(StdDuration::from_secs(60));
                let start = Instant::now() + self.until(first);
                tracing::info!(
                    first = %self.local(first),
                    every_minutes = period.as_secs() / 60,
                    "Feed checks scheduled"
                );

                let mut ticker = tokio::time::interval_at(start, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = shutdown.changed() => break,
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                    tracing::info!(at = %self.local(self.clock.now()), "Scheduled feed check triggered");
                    dispatcher.run_cycle().await;
                }
            }
            Cadence::Chain { first, period } => {
                let mut next = first;
                loop {
                    tracing::info!(next = %self.local(next), "Next feed check scheduled");
                    tokio::select! {
                        _ = tokio::time::sleep(self.until(next)) => {}
                        _ = shutdown.changed() => break,
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                    tracing::info!(at = %self.local(self.clock.now()), "Scheduled feed check triggered");
                    dispatcher.run_cycle().await;
                    match next_after(next, period, self.clock.now()) {
                        Some(instant) => next = instant,
                        None => {
                            tracing::warn!("Next feed check is out of range, stopping schedule");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("Trigger stopped");
    }

    fn until(&self, instant: DateTime<Utc>) -> StdDuration {
        (instant - self.clock.now())
            .to_std()
            .unwrap_or(StdDuration::ZERO)
    }

    fn local(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.timezone)
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string()
    }
}
