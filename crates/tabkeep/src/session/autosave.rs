use std::time::{Duration, Instant};

/// A single repeating timer driven by caller-supplied instants.
#[derive(Debug, Clone)]
pub struct AutoSaveTimer {
    interval: Duration,
    next_due: Option<Instant>,
}

impl AutoSaveTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    /// Arms the timer, replacing any previous schedule.
    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now + self.interval);
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true when the timer fired, and schedules the next period.
    /// Missed periods collapse into one firing.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_per_period() {
        let start = Instant::now();
        let mut timer = AutoSaveTimer::new(Duration::from_secs(2));
        assert!(!timer.poll(start + Duration::from_secs(10)), "stopped timer never fires");

        timer.start(start);
        assert!(!timer.poll(start + Duration::from_secs(1)));
        assert!(timer.poll(start + Duration::from_secs(2)));
        assert!(!timer.poll(start + Duration::from_secs(3)));
        assert!(timer.poll(start + Duration::from_secs(9)));
        assert!(!timer.poll(start + Duration::from_secs(10)));
    }

    #[test]
    fn test_restart_replaces_schedule() {
        let start = Instant::now();
        let mut timer = AutoSaveTimer::new(Duration::from_secs(2));
        timer.start(start);
        timer.start(start + Duration::from_secs(1));
        assert!(!timer.poll(start + Duration::from_secs(2)));
        assert!(timer.poll(start + Duration::from_secs(3)));

        timer.stop();
        assert!(!timer.is_running());
        assert!(!timer.poll(start + Duration::from_secs(100)));
    }
}
