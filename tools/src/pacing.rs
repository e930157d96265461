use std::{
    thread,
    time::{Duration, Instant},
};

/// Runs an action periodically.
///
/// Wake-ups are scheduled against absolute deadlines, so time spent in the action does not accumulate as drift.
#[derive(Clone, Copy, Debug)]
pub struct PeriodRepeat {
    interval: Duration,
}

impl PeriodRepeat {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits one interval, then runs `action` once per interval while `condition` holds after it.
    ///
    /// Stops on the first action error. Returns the number of times the action was run.
    pub fn run<E, A, C>(&self, mut action: A, mut condition: C) -> Result<usize, E>
    where
        A: FnMut() -> Result<(), E>,
        C: FnMut() -> bool,
    {
        let mut next = Instant::now() + self.interval;
        let mut count = 0;
        loop {
            sleep_until(next);
            action()?;
            count += 1;
            if !condition() {
                break Ok(count);
            }
            next += self.interval;
        }
    }
}

fn sleep_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        thread::sleep(deadline - now);
    }
}
