use thiserror::Error;

/// Errors that can occur in the fixpoint engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Engine configuration rejected during validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Adjacency description rejected while building the graph.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// Seed vector does not cover every node exactly once.
    #[error("expected {expected} seed states, got {actual}")]
    SeedMismatch { expected: usize, actual: usize },

    /// Actor phase invoked out of order.
    #[error("invalid actor transition: {0}")]
    InvalidTransition(String),

    /// Out-edge refers to an actor missing from the mailbox registry.
    #[error("no mailbox registered for node {0}")]
    UnknownPeer(usize),

    /// Worker channel closed before the run finished.
    #[error("worker for node {0} stopped unexpectedly")]
    WorkerStopped(usize),

    /// Task execution failed.
    #[error("task execution failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
