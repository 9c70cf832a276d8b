//! Confirmation countdown.
//!
//! At most one countdown task exists per timer: `start` aborts the running
//! task before spawning a new one, and dropping the timer aborts it too.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config;

/// Handle to a running countdown task
pub struct CountdownHandle {
    task: JoinHandle<()>,
    generation: u64,
}

impl CountdownHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(self) {
        self.task.abort();
    }
}

pub struct CountdownTimer {
    period: Duration,
    active: Option<CountdownHandle>,
}

impl Default for CountdownTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl CountdownTimer {
    pub fn new() -> Self {
        Self::with_period(Duration::from_millis(config::COUNTDOWN_TICK_MS))
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            active: None,
        }
    }

    /// Emit `seconds` ticks, one per period, tagged with `generation`.
    /// Any countdown already running is cancelled first.
    pub fn start<F>(&mut self, seconds: u32, generation: u64, on_tick: F)
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.cancel();

        let period = self.period;
        log::debug!("Starting {}s countdown (generation {})", seconds, generation);
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            for _ in 0..seconds {
                interval.tick().await;
                on_tick(generation);
            }
        });

        self.active = Some(CountdownHandle { task, generation });
    }

    /// Stop the running countdown; returns whether one was running
    pub fn cancel(&mut self) -> bool {
        match self.active.take() {
            Some(handle) => {
                log::debug!("Cancelling countdown (generation {})", handle.generation());
                handle.cancel();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
impl CountdownTimer {
    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(|h| !h.task.is_finished())
    }

    pub fn active_generation(&self) -> Option<u64> {
        self.active.as_ref().map(CountdownHandle::generation)
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
