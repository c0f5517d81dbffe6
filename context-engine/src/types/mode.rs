//! Active persona / capability set.
//!
//! The spec fixes the mode set to four members, unlike the teacher's
//! `swissarmyhammer-modes`, which loads an open-ended library of modes from
//! markdown files. The fixed enum below is the spec-required shape; the
//! per-mode prompt text is still authored the way the teacher's `Mode`
//! loads a system prompt (embedded string or a referenced prompt path).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Assistant,
    Planning,
    Developer,
    Debugger,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Assistant => "assistant",
            Mode::Planning => "planning",
            Mode::Developer => "developer",
            Mode::Debugger => "debugger",
        }
    }

    pub const ALL: [Mode; 4] = [Mode::Assistant, Mode::Planning, Mode::Developer, Mode::Debugger];
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Assistant
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assistant" => Ok(Mode::Assistant),
            "planning" => Ok(Mode::Planning),
            "developer" => Ok(Mode::Developer),
            "debugger" => Ok(Mode::Debugger),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

/// A single recorded mode transition, kept for display and for the
/// `ModeChanged` event payload's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeTransition {
    pub from: Mode,
    pub to: Mode,
    pub cause: TransitionCause,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    Manual,
    Auto,
}

/// Active persona/capability set, persisted alongside snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeState {
    pub mode: Mode,
    pub activated_at: DateTime<Utc>,
    pub recent_transitions: Vec<ModeTransition>,
}

impl ModeState {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            activated_at: Utc::now(),
            recent_transitions: Vec::new(),
        }
    }

    /// Keep only the most recent N transitions to avoid unbounded growth.
    pub fn record_transition(&mut self, transition: ModeTransition, keep: usize) {
        self.mode = transition.to;
        self.activated_at = transition.at;
        self.recent_transitions.push(transition);
        if self.recent_transitions.len() > keep {
            let excess = self.recent_transitions.len() - keep;
            self.recent_transitions.drain(0..excess);
        }
    }
}

impl Default for ModeState {
    fn default() -> Self {
        Self::new(Mode::default())
    }
}
