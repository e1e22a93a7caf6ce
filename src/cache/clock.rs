//! Wall-clock source for expiry checks.

use chrono::Utc;

/// Milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
  fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now_millis(&self) -> i64 {
    Utc::now().timestamp_millis()
  }
}

/// Clock that only moves when told to.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ManualClock {
  now: std::sync::atomic::AtomicI64,
}

#[cfg(test)]
impl ManualClock {
  pub fn new(start: i64) -> Self {
    Self {
      now: std::sync::atomic::AtomicI64::new(start),
    }
  }

  pub fn advance(&self, millis: i64) {
    self
      .now
      .fetch_add(millis, std::sync::atomic::Ordering::SeqCst);
  }
}

#[cfg(test)]
impl Clock for ManualClock {
  fn now_millis(&self) -> i64 {
    self.now.load(std::sync::atomic::Ordering::SeqCst)
  }
}

#[cfg(test)]
impl<C: Clock> Clock for std::sync::Arc<C> {
  fn now_millis(&self) -> i64 {
    (**self).now_millis()
  }
}
