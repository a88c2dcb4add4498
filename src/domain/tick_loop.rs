//! Fixed-rate tick scheduling, independent of how often the host loop runs.

use std::time::Duration;

use thiserror::Error;

/// Upper bound of ticks run for one host iteration after a stall.
pub const MAX_CATCH_UP_TICKS: u32 = 5;

const FPS_WINDOW: Duration = Duration::from_secs(1);

#[derive(Error, Debug, PartialEq)]
pub enum LoopError {
    #[error("tick rate must be positive and finite, got {0}")]
    InvalidRate(f64),
    #[error("tick loop is already running")]
    AlreadyRunning,
    #[error("tick loop is not running")]
    NotRunning,
}

/// Tick interval for a rate in Hz, rounded up to whole milliseconds.
pub fn interval_for(rate_hz: f64) -> Result<Duration, LoopError> {
    if !(rate_hz > 0.0 && rate_hz.is_finite()) {
        return Err(LoopError::InvalidRate(rate_hz));
    }
    Ok(Duration::from_millis((1000.0 / rate_hz).ceil() as u64))
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum LoopState {
    #[default]
    Idle,
    Running {
        interval: Duration,
    },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickLoop {
    state: LoopState,
    full_speed: bool,
    accumulated: Duration,
    window: Duration,
    window_ticks: u32,
    measured_fps: f64,
}

impl TickLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, LoopState::Running { .. })
    }

    pub fn interval(&self) -> Option<Duration> {
        match self.state {
            LoopState::Idle => None,
            LoopState::Running { interval } => Some(interval),
        }
    }

    /// Physics time step in seconds; zero while idle.
    pub fn dt(&self) -> f64 {
        self.interval().map_or(0.0, |interval| interval.as_secs_f64())
    }

    pub fn start(&mut self, rate_hz: f64) -> Result<(), LoopError> {
        if self.is_running() {
            return Err(LoopError::AlreadyRunning);
        }
        self.state = LoopState::Running {
            interval: interval_for(rate_hz)?,
        };
        self.accumulated = Duration::ZERO;
        Ok(())
    }

    /// Changes the interval of a running loop. Time already accumulated is kept.
    pub fn set_rate(&mut self, rate_hz: f64) -> Result<(), LoopError> {
        let LoopState::Running { ref mut interval } = self.state else {
            return Err(LoopError::NotRunning);
        };
        *interval = interval_for(rate_hz)?;
        Ok(())
    }

    /// Back to idle. Nothing is in flight, since ticks run to completion.
    pub fn stop(&mut self) {
        self.state = LoopState::Idle;
        self.accumulated = Duration::ZERO;
    }

    /// In full-speed mode every host iteration runs exactly one tick.
    pub fn set_full_speed(&mut self, full_speed: bool) {
        self.full_speed = full_speed;
    }

    /// Ticks per second measured over the last complete window.
    pub fn measured_fps(&self) -> f64 {
        self.measured_fps
    }

    /// Accounts for `elapsed` wall time and returns how many ticks are due now.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        let LoopState::Running { interval } = self.state else {
            return 0;
        };
        let due = if self.full_speed {
            1
        } else {
            self.accumulated += elapsed;
            let due = (self.accumulated.as_nanos() / interval.as_nanos().max(1)) as u32;
            self.accumulated -= interval * due;
            if due > MAX_CATCH_UP_TICKS {
                self.accumulated = Duration::ZERO;
                MAX_CATCH_UP_TICKS
            } else {
                due
            }
        };
        self.measure(elapsed, due);
        due
    }

    fn measure(&mut self, elapsed: Duration, ticks: u32) {
        self.window += elapsed;
        self.window_ticks += ticks;
        if self.window >= FPS_WINDOW {
            self.measured_fps = f64::from(self.window_ticks) / self.window.as_secs_f64();
            self.window = Duration::ZERO;
            self.window_ticks = 0;
        }
    }
}
