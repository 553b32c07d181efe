//! Timing harness: warm-up, measure, average
//!
//! A [`Measurement`] walks `Idle -> WarmingUp -> Measuring -> Done`. The
//! warm-up boundary is an index check on the number of completed
//! iterations; the accumulator is reset when measuring begins and never
//! sees a warm-up sample.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Error, Result};

/// Source of monotonic timestamps
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin
    fn now(&mut self) -> Duration;
}

impl<C: Clock + ?Sized> Clock for &mut C {
    fn now(&mut self) -> Duration {
        (**self).now()
    }
}

/// Wall clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Start a clock at the current instant
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&mut self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock replaying scripted readings, for tests
///
/// Once the script runs out the last reading repeats.
#[derive(Debug, Clone, Default)]
pub struct FakeClock {
    readings: VecDeque<Duration>,
    last: Duration,
    calls: usize,
}

impl FakeClock {
    /// Replay `readings` in order
    pub fn new(readings: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            readings: readings.into_iter().collect(),
            last: Duration::ZERO,
            calls: 0,
        }
    }

    /// Script a clock so that the n-th timed iteration lasts `elapsed[n]`
    ///
    /// Each iteration reads the clock twice (start, end).
    pub fn with_iterations(elapsed: &[Duration]) -> Self {
        let mut now = Duration::ZERO;
        let mut readings = Vec::with_capacity(elapsed.len() * 2);
        for &e in elapsed {
            readings.push(now);
            now += e;
            readings.push(now);
        }
        Self::new(readings)
    }

    /// Number of readings taken so far
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Clock for FakeClock {
    fn now(&mut self) -> Duration {
        self.calls += 1;
        if let Some(next) = self.readings.pop_front() {
            self.last = next;
        }
        self.last
    }
}

/// State of one measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing has run yet
    Idle,

    /// Running iterations whose times are discarded
    WarmingUp,

    /// Accumulating iteration times
    Measuring,

    /// All repetitions completed
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::WarmingUp => "warming up",
            Phase::Measuring => "measuring",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Accumulates iteration times for one (workload, configuration) pair
#[derive(Debug, Clone)]
pub struct Measurement {
    repetitions: usize,
    warmup: usize,
    completed: usize,
    accumulator: Duration,
    phase: Phase,
}

impl Measurement {
    /// A measurement of `repetitions` runs, the first `warmup` discarded
    pub fn new(repetitions: usize, warmup: usize) -> Result<Self> {
        if warmup >= repetitions {
            return Err(Error::InvalidArgument(format!(
                "warm-up count {warmup} must be below repetition count {repetitions}"
            )));
        }
        Ok(Self {
            repetitions,
            warmup,
            completed: 0,
            accumulator: Duration::ZERO,
            phase: Phase::Idle,
        })
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Iterations recorded so far, warm-up included
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Iterations that count toward the mean
    pub fn measured(&self) -> usize {
        self.repetitions - self.warmup
    }

    /// Leave `Idle`
    pub fn start(&mut self) {
        if self.phase == Phase::Idle {
            self.enter(if self.warmup > 0 {
                Phase::WarmingUp
            } else {
                Phase::Measuring
            });
        }
    }

    fn enter(&mut self, phase: Phase) {
        if phase == Phase::Measuring {
            self.accumulator = Duration::ZERO;
        }
        self.phase = phase;
    }

    /// Record the elapsed time of the next iteration
    pub fn record(&mut self, elapsed: Duration) -> Result<Phase> {
        self.start();
        if self.phase == Phase::Done {
            return Err(Error::InvalidArgument(
                "measurement already has all repetitions".into(),
            ));
        }

        if self.completed >= self.warmup {
            self.accumulator += elapsed;
        }
        self.completed += 1;

        if self.completed == self.repetitions {
            self.enter(Phase::Done);
        } else if self.completed == self.warmup {
            self.enter(Phase::Measuring);
        }
        Ok(self.phase)
    }

    /// Mean seconds over the measured iterations, once `Done`
    pub fn mean_seconds(&self) -> Option<f64> {
        (self.phase == Phase::Done)
            .then(|| self.accumulator.as_secs_f64() / self.measured() as f64)
    }
}

/// Runs closures under a [`Measurement`] using a [`Clock`]
#[derive(Debug)]
pub struct TimingHarness<C: Clock> {
    clock: C,
}

impl<C: Clock> TimingHarness<C> {
    /// Create a harness reading time from `clock`
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    /// The harness clock
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Run `run` `repetitions` times and return the post-warm-up mean in seconds
    ///
    /// Invocations are strictly sequential. The first failing iteration
    /// aborts the measurement with [`Error::Benchmark`] and no mean.
    pub fn measure<T, F>(
        &mut self,
        label: &str,
        repetitions: usize,
        warmup: usize,
        mut run: F,
    ) -> Result<f64>
    where
        F: FnMut() -> Result<T>,
    {
        let mut measurement = Measurement::new(repetitions, warmup)?;
        measurement.start();

        while measurement.phase() != Phase::Done {
            let start = self.clock.now();
            let output = run().map_err(|e| Error::benchmark(label, e))?;
            let end = self.clock.now();
            std::hint::black_box(output);

            let phase = measurement.record(end.saturating_sub(start))?;
            debug!(
                label,
                iteration = measurement.completed(),
                %phase,
                "iteration finished"
            );
        }

        measurement
            .mean_seconds()
            .ok_or_else(|| {
                Error::benchmark(label, Error::InvalidArgument("measurement incomplete".into()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_phases_follow_state_machine() {
        let mut m = Measurement::new(4, 2).unwrap();
        assert_eq!(m.phase(), Phase::Idle);
        assert_eq!(m.record(ms(1)).unwrap(), Phase::WarmingUp);
        assert_eq!(m.record(ms(1)).unwrap(), Phase::Measuring);
        assert_eq!(m.record(ms(1)).unwrap(), Phase::Measuring);
        assert_eq!(m.record(ms(1)).unwrap(), Phase::Done);
        assert!(m.record(ms(1)).is_err());
    }

    #[test]
    fn test_zero_warmup_measures_everything() {
        let mut m = Measurement::new(2, 0).unwrap();
        m.start();
        assert_eq!(m.phase(), Phase::Measuring);
        m.record(ms(10)).unwrap();
        m.record(ms(30)).unwrap();
        assert!((m.mean_seconds().unwrap() - 0.020).abs() < 1e-12);
    }

    #[test]
    fn test_warmup_must_leave_a_measured_iteration() {
        assert!(Measurement::new(3, 3).is_err());
        assert!(Measurement::new(0, 0).is_err());
    }

    #[test]
    fn test_mean_unavailable_until_done() {
        let mut m = Measurement::new(3, 1).unwrap();
        m.record(ms(5)).unwrap();
        assert_eq!(m.mean_seconds(), None);
    }

    #[test]
    fn test_harness_discards_warmup_samples() {
        // warm-up iterations are deliberately huge
        let clock = FakeClock::with_iterations(&[
            ms(9000),
            ms(8000),
            ms(10),
            ms(20),
            ms(30),
            ms(40),
            ms(50),
        ]);
        let mut harness = TimingHarness::new(clock);

        let mut runs = 0;
        let mean = harness
            .measure("probe", 7, 2, || {
                runs += 1;
                Ok(runs)
            })
            .unwrap();

        assert_eq!(runs, 7);
        assert_eq!(harness.clock().calls(), 14);
        assert!((mean - 0.030).abs() < 1e-12);
    }

    #[test]
    fn test_failing_iteration_aborts_measurement() {
        let mut harness = TimingHarness::new(FakeClock::with_iterations(&[ms(1); 5]));
        let mut runs = 0;
        let err = harness
            .measure("broken", 5, 1, || {
                runs += 1;
                if runs == 3 {
                    Err(Error::Shape("late".into()))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();

        assert_eq!(runs, 3);
        assert!(matches!(err, Error::Benchmark { ref workload, .. } if workload == "broken"));
        assert!(err.is_shape_error());
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let mut clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
