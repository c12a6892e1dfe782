//! Fake progress model for long-running generation calls.
//!
//! The real latency of a generation call is unknown, so the percentage
//! shown to the user is a pure function of elapsed time against an
//! expected duration.  The default curve is three piecewise-linear
//! phases (0-70 over the first 40%, 70-90 over the next 30%, 90-99 over
//! the last 30%) and pins at 99 once the expected duration has passed.
//! Only [`FakeProgress::finish`] reaches 100.
//!
//! [`FakeProgress`] is clock-agnostic: the caller passes `Instant`s in.
//! The tokio-driven ticker lives in the studio crate.  Presentation of a
//! [`ProgressState`] is handled by [`ProgressSkin::render`].

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default expected duration of a generation call.
pub const DEFAULT_EXPECTED: Duration = Duration::from_secs(60);

/// Default recomputation cadence.
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// Highest percentage a running timer may report.
pub const RUNNING_CEILING: f64 = 99.0;

/// Percentage reported once the owner declares the operation finished.
pub const COMPLETE: f64 = 100.0;

// ---------------------------------------------------------------------------
// Phase schedule
// ---------------------------------------------------------------------------

/// End point of one linear phase of the curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseBoundary {
    /// Fraction of the expected duration at which this phase ends.
    pub until: f64,
    /// Percentage reached at the end of this phase.
    pub percent: f64,
}

/// Piecewise-linear mapping from elapsed fraction to percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSchedule {
    phases: Vec<PhaseBoundary>,
}

impl Default for PhaseSchedule {
    fn default() -> Self {
        Self {
            phases: vec![
                PhaseBoundary { until: 0.4, percent: 70.0 },
                PhaseBoundary { until: 0.7, percent: 90.0 },
                PhaseBoundary { until: 1.0, percent: RUNNING_CEILING },
            ],
        }
    }
}

impl PhaseSchedule {
    /// Build a custom schedule.
    ///
    /// Boundaries must be strictly increasing in both fraction and
    /// percentage, the last one must end at fraction `1.0`, and no
    /// boundary may exceed [`RUNNING_CEILING`].
    pub fn new(phases: Vec<PhaseBoundary>) -> Result<Self, CoreError> {
        let Some(last) = phases.last() else {
            return Err(CoreError::Validation(
                "Progress schedule needs at least one phase".to_string(),
            ));
        };
        if let Some(bad) = phases
            .iter()
            .find(|p| !p.until.is_finite() || !p.percent.is_finite())
        {
            return Err(CoreError::Validation(format!(
                "Progress phase values must be finite, got {bad:?}"
            )));
        }
        if (last.until - 1.0).abs() > f64::EPSILON {
            return Err(CoreError::Validation(format!(
                "Last progress phase must end at 1.0, got {}",
                last.until
            )));
        }

        let mut prev = PhaseBoundary { until: 0.0, percent: 0.0 };
        for phase in &phases {
            if phase.until <= prev.until || phase.percent <= prev.percent {
                return Err(CoreError::Validation(format!(
                    "Progress phases must be strictly increasing (got {phase:?} after {prev:?})"
                )));
            }
            if phase.percent > RUNNING_CEILING {
                return Err(CoreError::Validation(format!(
                    "Progress phase percent {} exceeds {RUNNING_CEILING}",
                    phase.percent
                )));
            }
            prev = *phase;
        }

        Ok(Self { phases })
    }

    pub fn phases(&self) -> &[PhaseBoundary] {
        &self.phases
    }

    /// Percentage after `elapsed` out of an `expected` total.
    ///
    /// Pins at the final phase's percentage once `elapsed >= expected`.
    pub fn percent_at(&self, elapsed: Duration, expected: Duration) -> f64 {
        let cap = self.phases.last().map_or(RUNNING_CEILING, |p| p.percent);
        if expected.is_zero() {
            return cap;
        }

        let ratio = elapsed.as_secs_f64() / expected.as_secs_f64();
        let mut prev = PhaseBoundary { until: 0.0, percent: 0.0 };
        for phase in &self.phases {
            if ratio < phase.until {
                let span = (ratio - prev.until) / (phase.until - prev.until);
                let pct = prev.percent + (phase.percent - prev.percent) * span;
                return pct.min(phase.percent);
            }
            prev = *phase;
        }
        cap
    }
}

// ---------------------------------------------------------------------------
// Config and state
// ---------------------------------------------------------------------------

/// Per-instance configuration of a fake progress timer.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressConfig {
    pub expected: Duration,
    pub tick: Duration,
    pub schedule: PhaseSchedule,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            expected: DEFAULT_EXPECTED,
            tick: DEFAULT_TICK,
            schedule: PhaseSchedule::default(),
        }
    }
}

impl ProgressConfig {
    pub fn with_expected(expected: Duration) -> Self {
        Self {
            expected,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    #[default]
    Idle,
    Running,
    Done,
}

/// Snapshot of a timer: `percent` in `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub percent: f64,
    pub phase: ProgressPhase,
}

impl ProgressState {
    pub fn is_running(&self) -> bool {
        self.phase == ProgressPhase::Running
    }
}

/// Result of recomputing a running timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still climbing; schedule another tick.
    Continue,
    /// Reached the ceiling; stop scheduling until finish or reset.
    Pinned,
    /// Not running (idle, done, or already pinned).
    Inactive,
}

// ---------------------------------------------------------------------------
// FakeProgress
// ---------------------------------------------------------------------------

/// A single fake progress timer.
#[derive(Debug, Clone)]
pub struct FakeProgress {
    config: ProgressConfig,
    started_at: Option<Instant>,
    pinned: bool,
    state: ProgressState,
}

impl FakeProgress {
    pub fn new(config: ProgressConfig) -> Self {
        Self {
            config,
            started_at: None,
            pinned: false,
            state: ProgressState::default(),
        }
    }

    pub fn config(&self) -> &ProgressConfig {
        &self.config
    }

    pub fn state(&self) -> ProgressState {
        self.state
    }

    /// Begin a fresh run at 0%.
    pub fn start(&mut self, now: Instant) {
        self.started_at = Some(now);
        self.pinned = false;
        self.state = ProgressState {
            percent: 0.0,
            phase: ProgressPhase::Running,
        };
    }

    /// Recompute the percentage for `now`.
    ///
    /// The reported percentage never decreases within a run, even if the
    /// caller passes an earlier instant.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let Some(started_at) = self.started_at else {
            return TickOutcome::Inactive;
        };
        if !self.state.is_running() || self.pinned {
            return TickOutcome::Inactive;
        }

        let elapsed = now.saturating_duration_since(started_at);
        let pct = self.config.schedule.percent_at(elapsed, self.config.expected);
        self.state.percent = self.state.percent.max(pct).min(RUNNING_CEILING);

        if elapsed >= self.config.expected {
            self.pinned = true;
            TickOutcome::Pinned
        } else {
            TickOutcome::Continue
        }
    }

    /// Jump to 100% and stop.
    pub fn finish(&mut self) {
        self.started_at = None;
        self.pinned = false;
        self.state = ProgressState {
            percent: COMPLETE,
            phase: ProgressPhase::Done,
        };
    }

    /// Back to 0% and idle.
    pub fn reset(&mut self) {
        self.started_at = None;
        self.pinned = false;
        self.state = ProgressState::default();
    }
}

// ---------------------------------------------------------------------------
// Skins
// ---------------------------------------------------------------------------

/// Visual treatment of a progress timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressSkin {
    /// Filling cup shown while copy is generated.
    Boba,
    /// Flowing bar shown while an image is generated.
    TeaFlow,
}

/// Render-ready view of a [`ProgressState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressView {
    pub percent: u8,
    pub counter: String,
    pub label: String,
    pub pearls: u8,
}

impl ProgressSkin {
    /// Render `state`, using `label` for the running caption when given.
    pub fn render(self, state: ProgressState, label: Option<&str>) -> ProgressView {
        let shown = match state.phase {
            ProgressPhase::Running => state.percent.clamp(0.0, RUNNING_CEILING),
            _ => state.percent.clamp(0.0, COMPLETE),
        };
        let percent = shown.round() as u8;
        let counter = match state.phase {
            ProgressPhase::Done => "100/100".to_string(),
            _ => format!("{percent}/99"),
        };

        match self {
            Self::Boba => {
                let label = match (label, state.phase) {
                    (Some(l), _) => l.to_string(),
                    (None, ProgressPhase::Done) => "Done!".to_string(),
                    (None, _) if shown < 30.0 => "Brewing…".to_string(),
                    (None, _) if shown < 70.0 => "Adding pearls…".to_string(),
                    (None, _) if shown < 100.0 => "Sealing…".to_string(),
                    (None, _) => "Done!".to_string(),
                };
                ProgressView {
                    percent,
                    counter,
                    label,
                    pearls: ((shown / 100.0) * 12.0).floor() as u8,
                }
            }
            Self::TeaFlow => {
                let label = match state.phase {
                    ProgressPhase::Idle => "Waiting for a copy style".to_string(),
                    ProgressPhase::Done => "Done".to_string(),
                    ProgressPhase::Running => label.unwrap_or("Generating image…").to_string(),
                };
                let pearls = if state.is_running() {
                    ((shown / 20.0).floor() as u8).clamp(3, 6)
                } else {
                    0
                };
                ProgressView {
                    percent,
                    counter,
                    label,
                    pearls,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
