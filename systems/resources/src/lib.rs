#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Bounded resource pool with timed regeneration.
//!
//! All state lives behind a single mutex so check-then-subtract is atomic
//! even when the pool is shared across threads. Observers are notified after
//! the lock is released and never influence the pool's state.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard,
    },
    time::Duration,
};

use lane_skirmish_core::SimulationError;
use serde::Deserialize;
use tracing::warn;

static POOL_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_pool_lock_poison_once(operation: &'static str) {
    if POOL_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "resource pool lock poisoned; recovered inner value");
    }
}

/// Tuning parameters for a [`ResourcePool`].
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upper bound of the pool.
    pub max: u32,
    /// Amount available when the pool is created, clamped to `max`.
    pub initial: u32,
    /// Amount added by every regeneration tick.
    pub regen_amount: u32,
    /// Simulated time between regeneration ticks.
    #[serde(with = "lane_skirmish_core::seconds")]
    pub regen_interval: Duration,
}

impl Config {
    /// Creates a configuration that starts full.
    #[must_use]
    pub const fn new(max: u32, regen_amount: u32, regen_interval: Duration) -> Self {
        Self {
            max,
            initial: max,
            regen_amount,
            regen_interval,
        }
    }

    /// Overrides the starting amount.
    #[must_use]
    pub const fn with_initial(mut self, initial: u32) -> Self {
        self.initial = initial;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(10, 1, Duration::from_secs(2))
    }
}

/// Point-in-time reading of a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceLevel {
    /// Amount currently available.
    pub current: u32,
    /// Upper bound of the pool.
    pub max: u32,
}

#[derive(Debug)]
struct PoolState {
    current: u32,
    max: u32,
    regen_accumulator: Duration,
}

type Observer = Box<dyn Fn(ResourceLevel) + Send + Sync>;

/// Bounded counter satisfying `0 <= current <= max` after every operation.
pub struct ResourcePool {
    state: Mutex<PoolState>,
    regen_amount: u32,
    regen_interval: Duration,
    observer: Option<Observer>,
}

impl ResourcePool {
    /// Creates a pool from the provided configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            state: Mutex::new(PoolState {
                current: config.initial.min(config.max),
                max: config.max,
                regen_accumulator: Duration::ZERO,
            }),
            regen_amount: config.regen_amount,
            regen_interval: config.regen_interval,
            observer: None,
        }
    }

    /// Registers a callback invoked with the new level after every change.
    #[must_use]
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(ResourceLevel) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Subtracts `amount` if the pool holds at least that much.
    ///
    /// Returns `false` and leaves the pool untouched otherwise.
    pub fn try_consume(&self, amount: u32) -> bool {
        self.try_debit(amount).is_ok()
    }

    /// Subtracts `amount` if the pool holds at least that much.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InsufficientResources`] without mutating
    /// the pool when `current < amount`.
    pub fn try_debit(&self, amount: u32) -> Result<ResourceLevel, SimulationError> {
        let level = {
            let mut state = self.lock("debit");
            if state.current < amount {
                return Err(SimulationError::InsufficientResources {
                    requested: amount,
                    available: state.current,
                });
            }
            state.current -= amount;
            Self::level_of(&state)
        };
        if amount > 0 {
            self.notify(level);
        }
        Ok(level)
    }

    /// Adds one regeneration step, saturating at the maximum.
    pub fn regenerate_tick(&self) -> ResourceLevel {
        self.add(self.regen_amount)
    }

    /// Accumulates simulated time and applies every regeneration tick it covers.
    ///
    /// Returns the number of ticks applied. A zero interval disables
    /// regeneration.
    pub fn advance(&self, dt: Duration) -> u32 {
        if self.regen_interval.is_zero() {
            return 0;
        }

        let ticks = {
            let mut state = self.lock("advance");
            state.regen_accumulator = state.regen_accumulator.saturating_add(dt);
            let mut ticks = 0;
            while state.regen_accumulator >= self.regen_interval {
                state.regen_accumulator -= self.regen_interval;
                ticks += 1;
            }
            ticks
        };

        for _ in 0..ticks {
            let _ = self.regenerate_tick();
        }
        ticks
    }

    /// Adds `amount`, clamped to the maximum.
    pub fn add(&self, amount: u32) -> ResourceLevel {
        let (level, changed) = {
            let mut state = self.lock("add");
            let before = state.current;
            state.current = state.current.saturating_add(amount).min(state.max);
            (Self::level_of(&state), state.current != before)
        };
        if changed {
            self.notify(level);
        }
        level
    }

    /// Amount currently available.
    #[must_use]
    pub fn current(&self) -> u32 {
        self.lock("current").current
    }

    /// Upper bound of the pool.
    #[must_use]
    pub fn max(&self) -> u32 {
        self.lock("max").max
    }

    /// Current and maximum amounts read under a single lock.
    #[must_use]
    pub fn level(&self) -> ResourceLevel {
        Self::level_of(&self.lock("level"))
    }

    fn level_of(state: &PoolState) -> ResourceLevel {
        ResourceLevel {
            current: state.current,
            max: state.max,
        }
    }

    fn lock(&self, operation: &'static str) -> MutexGuard<'_, PoolState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn_pool_lock_poison_once(operation);
                poisoned.into_inner()
            }
        }
    }

    fn notify(&self, level: ResourceLevel) {
        if let Some(observer) = &self.observer {
            observer(level);
        }
    }
}

impl fmt::Debug for ResourcePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("level", &self.level())
            .field("regen_amount", &self.regen_amount)
            .field("regen_interval", &self.regen_interval)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}
