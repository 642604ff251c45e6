use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Token bucket with a burst of one: callers are released at most once per
/// `period`, in the order they acquired the slot.
#[derive(Debug)]
pub struct RateLimiter {
    period: Option<Duration>,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// `0` disables limiting.
    pub fn per_second(requests_per_second: u32) -> Self {
        let period = (requests_per_second > 0).then(|| {
            Duration::from_secs_f64(1.0 / f64::from(requests_per_second))
        });
        Self::with_period(period)
    }

    pub fn with_period(period: Option<Duration>) -> Self {
        Self {
            period: period.filter(|p| !p.is_zero()),
            next_slot: Mutex::new(None),
        }
    }

    pub fn unlimited() -> Self {
        Self::with_period(None)
    }

    pub async fn acquire(&self) {
        let Some(period) = self.period else {
            return;
        };

        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next_slot {
                Some(at) if at > now => at,
                _ => now,
            };
            *next_slot = Some(slot + period);
            slot
        };

        sleep_until(slot).await;
    }
}
