use std::time::Duration;

use log::debug;

use super::error::IssuanceError;

/// Fixed interval between polls; elapsed time is counted in these units.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Suspends the polling thread between ticks.
pub trait Pause: Send + Sync {
    fn pause(&self, interval: Duration);
}

/// Blocks the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

/// Result of one polling loop. `Pending` is what a tick reports to keep going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Pending,
    Terminal(T),
    TimedOut,
}

/// Calls `tick` until it reports something other than `Pending`, pausing one
/// interval after each pending tick and giving up once `timeout_secs` ticks
/// have elapsed. `tick` receives the elapsed seconds so far.
///
/// Errors returned by `tick` end the loop immediately (no retry).
pub fn poll_fixed_interval<T, F>(
    label: &str,
    timeout_secs: u64,
    pause: &dyn Pause,
    mut tick: F,
) -> Result<PollOutcome<T>, IssuanceError>
where
    F: FnMut(u64) -> Result<PollOutcome<T>, IssuanceError>,
{
    let mut elapsed = 0;
    while elapsed < timeout_secs {
        match tick(elapsed)? {
            PollOutcome::Pending => {
                elapsed += 1;
                debug!(
                    "[acme-poll] {} pending, waiting {}s ({}s of {}s used)",
                    label,
                    POLL_INTERVAL.as_secs(),
                    elapsed,
                    timeout_secs
                );
                pause.pause(POLL_INTERVAL);
            }
            done => return Ok(done),
        }
    }
    debug!("[acme-poll] {} gave up after {}s", label, timeout_secs);
    Ok(PollOutcome::TimedOut)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Counts pauses instead of sleeping.
    #[derive(Debug, Default)]
    pub struct CountingPause {
        pauses: Mutex<Vec<Duration>>,
    }

    impl CountingPause {
        pub fn count(&self) -> usize {
            self.pauses.lock().unwrap().len()
        }

        pub fn total(&self) -> Duration {
            self.pauses.lock().unwrap().iter().sum()
        }
    }

    impl Pause for CountingPause {
        fn pause(&self, interval: Duration) {
            self.pauses.lock().unwrap().push(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::CountingPause;
    use super::*;

    #[test]
    fn terminal_on_first_tick_never_pauses() {
        let pause = CountingPause::default();
        let mut calls = 0;
        let outcome = poll_fixed_interval("test", 5, &pause, |_| {
            calls += 1;
            Ok(PollOutcome::Terminal("done"))
        })
        .unwrap();
        assert_eq!(outcome, PollOutcome::Terminal("done"));
        assert_eq!(calls, 1);
        assert_eq!(pause.count(), 0);
    }

    #[test]
    fn retries_until_terminal() {
        let pause = CountingPause::default();
        let mut seen = Vec::new();
        let outcome = poll_fixed_interval("test", 180, &pause, |elapsed| {
            seen.push(elapsed);
            if elapsed >= 2 {
                Ok(PollOutcome::Terminal(elapsed))
            } else {
                Ok(PollOutcome::Pending)
            }
        })
        .unwrap();
        assert_eq!(outcome, PollOutcome::Terminal(2));
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(pause.count(), 2);
        assert_eq!(pause.total(), Duration::from_secs(2));
    }

    #[test]
    fn times_out_after_timeout_ticks() {
        let pause = CountingPause::default();
        let mut calls = 0;
        let outcome: PollOutcome<()> = poll_fixed_interval("test", 3, &pause, |_| {
            calls += 1;
            Ok(PollOutcome::Pending)
        })
        .unwrap();
        assert_eq!(outcome, PollOutcome::TimedOut);
        assert_eq!(calls, 3);
        assert_eq!(pause.count(), 3);
    }

    #[test]
    fn error_stops_immediately() {
        let pause = CountingPause::default();
        let mut calls = 0;
        let result: Result<PollOutcome<()>, _> = poll_fixed_interval("test", 10, &pause, |_| {
            calls += 1;
            Err(IssuanceError::InvalidArgument("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
        assert_eq!(pause.count(), 0);
    }
}
