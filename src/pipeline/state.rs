//! Pipeline state machine.
//!
//! A run moves strictly forward through
//! `Start -> WorkspaceAcquired -> Rendered -> Built -> Published -> Done`.
//! `Aborted` is reachable from every non-terminal state.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Where a pipeline run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Start,
    WorkspaceAcquired,
    Rendered,
    Built,
    Published,
    Done,
    Aborted,
}

impl PipelineState {
    /// The state a successful step leads to, or `None` from a terminal state.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::WorkspaceAcquired),
            Self::WorkspaceAcquired => Some(Self::Rendered),
            Self::Rendered => Some(Self::Built),
            Self::Built => Some(Self::Published),
            Self::Published => Some(Self::Done),
            Self::Done | Self::Aborted => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Whether `self -> to` is a legal transition.
    pub fn can_transition_to(self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Aborted || self.next() == Some(to)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::WorkspaceAcquired => "workspace_acquired",
            Self::Rendered => "rendered",
            Self::Built => "built",
            Self::Published => "published",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one run's state and how long each state lasted.
#[derive(Debug)]
pub struct StateTracker {
    request_id: String,
    current: PipelineState,
    entered_at: Instant,
    history: Vec<(PipelineState, Duration)>,
}

impl StateTracker {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            current: PipelineState::Start,
            entered_at: Instant::now(),
            history: Vec::new(),
        }
    }

    pub fn current(&self) -> PipelineState {
        self.current
    }

    /// States left so far, with time spent in each.
    pub fn history(&self) -> &[(PipelineState, Duration)] {
        &self.history
    }

    /// Moves to `to`, returning how long the previous state lasted.
    ///
    /// Illegal transitions are logged and ignored.
    pub fn transition(&mut self, to: PipelineState) -> Option<Duration> {
        if !self.current.can_transition_to(to) {
            warn!(
                request_id = %self.request_id,
                from = %self.current,
                to = %to,
                "Ignoring illegal pipeline state transition"
            );
            return None;
        }

        let elapsed = self.entered_at.elapsed();
        info!(
            request_id = %self.request_id,
            from = %self.current,
            to = %to,
            elapsed_ms = elapsed.as_millis() as u64,
            "Pipeline state transition"
        );
        self.history.push((self.current, elapsed));
        self.current = to;
        self.entered_at = Instant::now();
        Some(elapsed)
    }

    /// Advances to the next state on the happy path.
    pub fn advance(&mut self) -> Option<Duration> {
        let next = self.current.next()?;
        self.transition(next)
    }

    pub fn abort(&mut self) -> Option<Duration> {
        self.transition(PipelineState::Aborted)
    }
}
