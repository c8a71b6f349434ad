use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Lets an action through at most once per period.
#[derive(Debug)]
pub struct Throttle {
    period: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last: Mutex::new(None),
        }
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Self::new(Duration::from_secs_f64(secs.max(0.0)))
    }

    /// True on the first call and whenever a full period has passed since the
    /// last call that returned true.
    pub fn ready(&self) -> bool {
        self.ready_at(Instant::now())
    }

    fn ready_at(&self, now: Instant) -> bool {
        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        match *last {
            Some(t) if now.saturating_duration_since(t) < self.period => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_once_per_period() {
        let t = Throttle::new(Duration::from_secs(2));
        let t0 = Instant::now();
        assert!(t.ready_at(t0));
        assert!(!t.ready_at(t0 + Duration::from_millis(500)));
        assert!(!t.ready_at(t0 + Duration::from_millis(1999)));
        assert!(t.ready_at(t0 + Duration::from_secs(2)));
        assert!(!t.ready_at(t0 + Duration::from_millis(2100)));
    }

    #[test]
    fn zero_period_always_passes() {
        let t = Throttle::from_secs_f64(0.0);
        assert!(t.ready());
        assert!(t.ready());
    }
}
