//! Fixpoint: an actor-based iterative fixed-point engine. Every node of a directed weighted graph
//! is an independent actor holding a scalar state; in synchronized rounds each actor sends
//! `state * weight` along its out-edges, then blocks until exactly its in-degree worth of messages
//! has arrived and replaces its state with their sum. Rounds repeat until every actor moves by at
//! most a threshold or a round budget runs out.
//!
//! # Features
//! - One persistent Tokio task per actor, coordinated by phase barriers.
//! - Per-actor unbounded mailboxes with an exact-count receive.
//! - Order-independent reduction: results do not depend on message arrival order.
//! - Pluggable convergence predicate and explicit round budget.
//!
//! # Example
//! ```
//! use fixpoint::{EngineConfig, EngineError, GraphModel, RoundCoordinator};
//!
//! # async fn example() -> Result<(), EngineError> {
//! // 0 -> 1 -> 2 -> 0
//! let graph = GraphModel::from_edges(3, &[(0, 1, 1.0), (1, 2, 1.0), (2, 0, 1.0)])?;
//! let coordinator = RoundCoordinator::new(EngineConfig::new(0.0, 1)?)?;
//! let report = coordinator.run(&graph, &[3.0, 5.0, 7.0]).await?;
//! assert_eq!(report.states, vec![7.0, 3.0, 5.0]);
//! # Ok(())
//! # }
//! ```

mod actor;
mod config;
mod convergence;
mod coordinator;
mod error;
mod graph;
mod types;

pub use actor::{Actor, ActorPhase, Mailbox, MailboxRegistry};
pub use config::{EngineConfig, DEFAULT_MAX_ROUNDS, DEFAULT_THRESHOLD};
pub use convergence::{count_unconverged, Convergent, ConvergencePredicate, ThresholdConvergence};
pub use coordinator::RoundCoordinator;
pub use error::EngineError;
pub use graph::{random_seeds, GraphModel};
pub use types::{ActorSnapshot, NodeId, RunReport, RunStatus};
