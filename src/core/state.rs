// core/state.rs

// Tracks the mission's high-level phase with a small finite state machine.
// Phases only move forward along the mission sequence; any phase may drop into
// Failed, and Complete and Failed are terminal.

use log::{error, info, warn};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Mission phases
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MissionPhase {
    /// Waiting for `run`
    Idle,
    /// Routing to the search zone entry
    PathToZone,
    /// Sweeping the zone for the target
    Searching,
    /// Re-deriving the canonical frame for delivery
    Reframing,
    /// Routing to the drop tile
    PathToDrop,
    /// Releasing the object
    Delivering,
    /// Object delivered
    Complete,
    /// Mission aborted
    Failed,
}

impl MissionPhase {
    /// Phase that normally follows this one
    pub fn next(self) -> Option<MissionPhase> {
        match self {
            MissionPhase::Idle => Some(MissionPhase::PathToZone),
            MissionPhase::PathToZone => Some(MissionPhase::Searching),
            MissionPhase::Searching => Some(MissionPhase::Reframing),
            MissionPhase::Reframing => Some(MissionPhase::PathToDrop),
            MissionPhase::PathToDrop => Some(MissionPhase::Delivering),
            MissionPhase::Delivering => Some(MissionPhase::Complete),
            MissionPhase::Complete | MissionPhase::Failed => None,
        }
    }

    /// True for Complete and Failed
    pub fn is_terminal(self) -> bool {
        matches!(self, MissionPhase::Complete | MissionPhase::Failed)
    }
}

/// Status snapshot for logging and the binary's final report
#[derive(Clone, Debug, Serialize)]
pub struct MissionStatus {
    /// Current phase
    pub phase: MissionPhase,
    /// Time spent in the current phase
    pub in_phase: Duration,
    /// Reason recorded by `fail`
    pub failure: Option<String>,
}

/// Mission state: current phase, when it was entered, why it failed
pub struct MissionState {
    phase: MissionPhase,
    entered: Instant,
    failure: Option<String>,
}

impl Default for MissionState {
    fn default() -> Self {
        MissionState::new()
    }
}

impl MissionState {
    /// Starts in Idle
    pub fn new() -> Self {
        MissionState {
            phase: MissionPhase::Idle,
            entered: Instant::now(),
            failure: None,
        }
    }

    /// Moves to the next phase in sequence; returns false if `to` is not it
    pub fn advance(&mut self, to: MissionPhase) -> bool {
        if self.phase.next() != Some(to) {
            warn!("Rejected phase transition {:?} -> {:?}", self.phase, to);
            return false;
        }
        info!(
            "Mission phase {:?} -> {:?} after {:.1}s",
            self.phase,
            to,
            self.entered.elapsed().as_secs_f64()
        );
        self.phase = to;
        self.entered = Instant::now();
        true
    }

    /// Drops into Failed from any non-terminal phase
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.phase.is_terminal() {
            return;
        }
        let reason = reason.into();
        error!("Mission failed during {:?}: {}", self.phase, reason);
        self.phase = MissionPhase::Failed;
        self.entered = Instant::now();
        self.failure = Some(reason);
    }

    /// Current phase
    pub fn phase(&self) -> MissionPhase {
        self.phase
    }

    /// Snapshot of the state
    pub fn status(&self) -> MissionStatus {
        MissionStatus {
            phase: self.phase,
            in_phase: self.entered.elapsed(),
            failure: self.failure.clone(),
        }
    }
}
