use crate::browser;
use anyhow::Result;
use async_trait::async_trait;
use web_sys::Performance;

/// Monotonic milliseconds. Only differences between readings are meaningful.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Cooperative delay on the host event loop.
#[async_trait(?Send)]
pub trait Sleeper {
    async fn sleep(&self, ms: u32);
}

/// `performance.now()`
pub struct PerformanceClock {
    performance: Performance,
}

impl PerformanceClock {
    pub fn new() -> Result<Self> {
        Ok(PerformanceClock {
            performance: browser::performance()?,
        })
    }
}

impl Clock for PerformanceClock {
    fn now(&self) -> f64 {
        self.performance.now()
    }
}

/// `setTimeout` wrapped in a future.
pub struct TimeoutSleeper;

#[async_trait(?Send)]
impl Sleeper for TimeoutSleeper {
    async fn sleep(&self, ms: u32) {
        if let Err(err) = browser::timeout(ms).await {
            log::warn!("timer unavailable, continuing without delay: {:#}", err);
        }
    }
}
