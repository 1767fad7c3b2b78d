//! Physical time effects
//!
//! The breaker registry and the emergency cache never read the system clock
//! directly; they go through [`PhysicalTimeEffects`] so tests can drive time
//! with [`SimulatedTimeHandler`] instead of sleeping.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock timestamp in milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct PhysicalTime {
    /// Milliseconds since the Unix epoch
    pub ts_ms: u64,
}

impl PhysicalTime {
    /// Create a timestamp
    pub fn from_ms(ts_ms: u64) -> Self {
        Self { ts_ms }
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future
    pub fn saturating_since(&self, earlier: PhysicalTime) -> Duration {
        Duration::from_millis(self.ts_ms.saturating_sub(earlier.ts_ms))
    }
}

/// Source of wall-clock time
pub trait PhysicalTimeEffects: Send + Sync {
    /// Current time
    fn physical_time(&self) -> PhysicalTime;
}

impl<T: PhysicalTimeEffects + ?Sized> PhysicalTimeEffects for Arc<T> {
    fn physical_time(&self) -> PhysicalTime {
        (**self).physical_time()
    }
}

/// Real time handler for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeHandler;

impl RealTimeHandler {
    /// Create a new real time handler
    pub fn new() -> Self {
        Self
    }
}

impl PhysicalTimeEffects for RealTimeHandler {
    fn physical_time(&self) -> PhysicalTime {
        let ts_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64;
        PhysicalTime { ts_ms }
    }
}

/// Simulated time handler for testing
///
/// Clones share the same clock, so a test can hand one clone to the gate and
/// keep another to advance time.
#[derive(Debug, Clone)]
pub struct SimulatedTimeHandler {
    current_time: Arc<Mutex<u64>>,
}

impl SimulatedTimeHandler {
    /// Create a simulated clock starting at the given time
    pub fn new(start_time_ms: u64) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(start_time_ms)),
        }
    }

    /// Advance simulated time
    pub fn advance(&self, duration: Duration) {
        let mut time = self.current_time.lock();
        *time = time.saturating_add(duration.as_millis() as u64);
    }

    /// Advance simulated time by whole seconds
    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    /// Set the absolute simulated time
    pub fn set_time(&self, time_ms: u64) {
        *self.current_time.lock() = time_ms;
    }
}

impl Default for SimulatedTimeHandler {
    fn default() -> Self {
        // Non-zero start so "never happened" timestamps are distinguishable.
        Self::new(1_700_000_000_000)
    }
}

impl PhysicalTimeEffects for SimulatedTimeHandler {
    fn physical_time(&self) -> PhysicalTime {
        PhysicalTime {
            ts_ms: *self.current_time.lock(),
        }
    }
}
