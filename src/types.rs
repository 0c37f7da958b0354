use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a graph node, stable for the lifetime of a run.
pub type NodeId = usize;

/// State of a single actor as reported by its worker after a phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    /// Node the actor represents.
    pub id: NodeId,

    /// Current state.
    pub state: f64,

    /// State captured right before the last send phase.
    pub prev_state: f64,
}

impl fmt::Display for ActorSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Actor {} ; current state: {:.4} and prev_state: {:.4}",
            self.id, self.state, self.prev_state
        )
    }
}

/// Why a run stopped issuing rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Every actor satisfied the convergence test on a round after the first.
    Stabilized,

    /// The round budget ran out first. The states are still valid output.
    BudgetExhausted,
}

/// Externally observable result of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Final state of every actor, indexed by node id.
    pub states: Vec<f64>,

    /// Number of send/receive rounds actually executed.
    pub rounds: usize,

    /// Termination reason.
    pub status: RunStatus,

    /// Actors still outside the threshold when the run stopped.
    pub unconverged: usize,
}

impl RunReport {
    /// Returns true if the run ended because all actors stabilized.
    pub fn is_stabilized(&self) -> bool {
        self.status == RunStatus::Stabilized
    }
}
