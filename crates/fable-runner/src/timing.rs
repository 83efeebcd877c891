use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant, SystemTime};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    pub started_at: Option<SystemTime>,
    pub duration: Duration,
}

impl Timing {
    pub fn is_recorded(&self) -> bool {
        self.started_at.is_some()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Stopwatch {
    started_at: SystemTime,
    started: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started_at: SystemTime::now(),
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn stop(&self) -> Timing {
        Timing {
            started_at: Some(self.started_at),
            duration: self.elapsed(),
        }
    }
}
