use rand::Rng;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

/// Draws an election timeout uniformly from `[min, max]` at nanosecond resolution.
pub fn random_election_timeout(min: Duration, max: Duration) -> Duration {
    let lo = u64::try_from(min.as_nanos()).unwrap_or(u64::MAX);
    let hi = u64::try_from(max.as_nanos()).unwrap_or(u64::MAX);
    if lo >= hi {
        return min;
    }
    let mut rng = rand::rng();
    Duration::from_nanos(rng.random_range(lo..=hi))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arming {
    Armed { generation: u64, deadline: Instant },
    Disarmed { generation: u64 },
}

/// The node's single election timer.
///
/// Every `reset` or `disarm` bumps the generation. The waiting side only ever
/// sleeps on the latest arming, and a firing is reported together with the
/// generation it belonged to so the owner can discard it if the timer moved on
/// in the meantime.
pub struct ElectionTimer {
    min: Duration,
    max: Duration,
    generation: u64,
    last_timeout: Option<Duration>,
    tx: watch::Sender<Arming>,
}

impl ElectionTimer {
    pub fn new(min: Duration, max: Duration) -> (Self, TimerExpiry) {
        let (tx, rx) = watch::channel(Arming::Disarmed { generation: 0 });
        let timer = Self {
            min,
            max,
            generation: 0,
            last_timeout: None,
            tx,
        };
        (timer, TimerExpiry { rx, fired: None })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_armed(&self) -> bool {
        matches!(*self.tx.borrow(), Arming::Armed { .. })
    }

    /// True when a firing tagged `generation` is still the one we are waiting for.
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation && self.is_armed()
    }

    /// Re-arms with a fresh random duration, superseding any pending firing.
    pub fn reset(&mut self) -> Duration {
        let timeout = self.draw();
        self.generation += 1;
        self.last_timeout = Some(timeout);
        self.tx.send_replace(Arming::Armed {
            generation: self.generation,
            deadline: Instant::now() + timeout,
        });
        timeout
    }

    pub fn disarm(&mut self) {
        self.generation += 1;
        self.tx.send_replace(Arming::Disarmed {
            generation: self.generation,
        });
    }

    fn draw(&self) -> Duration {
        loop {
            let timeout = random_election_timeout(self.min, self.max);
            if self.min >= self.max || Some(timeout) != self.last_timeout {
                return timeout;
            }
        }
    }
}

/// Receiving half of an [`ElectionTimer`], owned by the election loop.
pub struct TimerExpiry {
    rx: watch::Receiver<Arming>,
    fired: Option<u64>,
}

impl TimerExpiry {
    /// Waits for the current arming to elapse and returns its generation.
    ///
    /// Each generation fires at most once. Returns `None` once the timer has
    /// been dropped.
    pub async fn expired(&mut self) -> Option<u64> {
        loop {
            let arming = *self.rx.borrow_and_update();
            match arming {
                Arming::Armed {
                    generation,
                    deadline,
                } if self.fired != Some(generation) => {
                    tokio::select! {
                        _ = sleep_until(deadline) => {
                            self.fired = Some(generation);
                            return Some(generation);
                        }
                        changed = self.rx.changed() => changed.ok()?,
                    }
                }
                _ => self.rx.changed().await.ok()?,
            }
        }
    }
}
