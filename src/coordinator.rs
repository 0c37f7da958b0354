use crate::{
    actor::{Actor, MailboxRegistry},
    config::EngineConfig,
    convergence::{ConvergencePredicate, ThresholdConvergence},
    error::EngineError,
    graph::GraphModel,
    types::{ActorSnapshot, RunReport, RunStatus},
};
use std::sync::Arc;
use tokio::{
    sync::mpsc::{self, Receiver, Sender, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tracing::{debug, info};

/// Phase command issued by the coordinator to every worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Snapshot the previous state, then deliver weighted state to peers.
    Send,

    /// Block until the expected inbound count arrives and reduce it.
    Receive,
}

type Ack = Result<ActorSnapshot, EngineError>;

/// Persistent task owning one actor for the whole run.
struct Worker {
    /// Actor owned for the whole run.
    actor: Actor,

    /// Shared id -> mailbox resolution.
    registry: Arc<MailboxRegistry>,

    /// Phase commands from the coordinator.
    phases: Receiver<Phase>,

    /// Acknowledgements back to the coordinator.
    acks: UnboundedSender<Ack>,
}

impl Worker {
    /// Executes phases until the coordinator hangs up, then hands back the final state.
    async fn run(mut self) -> ActorSnapshot {
        while let Some(phase) = self.phases.recv().await {
            let outcome = match phase {
                Phase::Send => self
                    .actor
                    .snapshot_prev()
                    .and_then(|()| self.actor.send_phase(&self.registry)),
                Phase::Receive => self.actor.recv_phase().await,
            };
            let failed = outcome.is_err();
            let ack = outcome.map(|()| self.actor.snapshot());
            if self.acks.send(ack).is_err() || failed {
                break;
            }
        }
        self.actor.snapshot()
    }
}

/// Drives synchronized send/receive rounds over a set of actors.
///
/// Every round, all actors snapshot and send concurrently, then all actors
/// receive concurrently. The coordinator stops when the predicate reports
/// no unconverged actor (checked from round 2 on) or when the round budget
/// is spent.
#[derive(Debug, Clone)]
pub struct RoundCoordinator<CP: ConvergencePredicate = ThresholdConvergence> {
    /// Threshold and round budget.
    config: EngineConfig,

    /// Aggregate stabilization test.
    predicate: CP,
}

impl RoundCoordinator<ThresholdConvergence> {
    /// Creates a coordinator using the default threshold predicate.
    ///
    /// # Errors
    /// Returns an error if `config` is invalid.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_predicate(config, ThresholdConvergence)
    }
}

impl<CP: ConvergencePredicate> RoundCoordinator<CP> {
    /// Creates a coordinator with a custom convergence predicate.
    ///
    /// # Arguments
    /// * `config` - Threshold and round budget.
    /// * `predicate` - Stateless aggregate convergence test.
    ///
    /// # Errors
    /// Returns an error if `config` is invalid.
    pub fn with_predicate(config: EngineConfig, predicate: CP) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config, predicate })
    }

    /// Threshold and round budget in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Builds actors for `graph`, seeds them and runs to termination.
    ///
    /// # Arguments
    /// * `graph` - Validated adjacency.
    /// * `seeds` - Initial state per node id.
    ///
    /// # Errors
    /// Returns an error on a seed count mismatch or if a worker fails.
    /// Exhausting the round budget is not an error.
    pub async fn run(&self, graph: &GraphModel, seeds: &[f64]) -> Result<RunReport, EngineError> {
        let (actors, registry) = graph.build_actors(seeds)?;
        info!(
            nodes = graph.len(),
            edges = graph.edge_count(),
            threshold = self.config.threshold,
            max_rounds = self.config.max_rounds,
            "starting run"
        );
        self.run_actors(actors, registry).await
    }

    /// Runs already-wired actors to termination.
    ///
    /// `actors` must carry the ids `0..actors.len()` and `registry` must map
    /// every id to that actor's own mailbox. In-degrees are recounted from
    /// the actors' out-edges, so hand-wired actors need only `add_outgoing`.
    ///
    /// # Errors
    /// Returns an error if ids, mailboxes or out-edge peers do not line up,
    /// or if an actor has already started rounds.
    pub async fn run_actors(
        &self,
        mut actors: Vec<Actor>,
        registry: MailboxRegistry,
    ) -> Result<RunReport, EngineError> {
        let n = actors.len();
        if registry.len() != n {
            return Err(EngineError::InvalidGraph(format!(
                "{} mailboxes registered for {n} actors",
                registry.len()
            )));
        }
        for id in 0..n {
            let owner = registry.resolve(id).map(|mailbox| mailbox.owner());
            if owner != Some(id) {
                return Err(EngineError::InvalidGraph(format!(
                    "mailbox slot {id} belongs to node {owner:?}"
                )));
            }
        }

        let mut in_degrees = vec![0; n];
        let mut seen = vec![false; n];
        for actor in &actors {
            let id = actor.id();
            if id >= n || seen[id] {
                return Err(EngineError::InvalidGraph(format!(
                    "actor ids must be exactly 0..{n}, found {id} out of place"
                )));
            }
            seen[id] = true;
            for &(_, peer) in actor.outgoing() {
                *in_degrees
                    .get_mut(peer)
                    .ok_or(EngineError::UnknownPeer(peer))? += 1;
            }
        }
        for actor in &mut actors {
            actor.set_in_degree(in_degrees[actor.id()])?;
        }
        let mut snapshots = vec![
            ActorSnapshot {
                id: 0,
                state: 0.0,
                prev_state: 0.0,
            };
            n
        ];
        for actor in &actors {
            snapshots[actor.id()] = actor.snapshot();
        }

        let registry = Arc::new(registry);
        let (ack_tx, mut acks) = mpsc::unbounded_channel();
        let mut phases = vec![None; n];
        let mut handles = Vec::with_capacity(n);
        for actor in actors {
            let (tx, rx) = mpsc::channel(1);
            phases[actor.id()] = Some(tx);
            let worker = Worker {
                actor,
                registry: Arc::clone(&registry),
                phases: rx,
                acks: ack_tx.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }
        drop(ack_tx);
        let phases: Vec<Sender<Phase>> = phases.into_iter().flatten().collect();

        let driven = self.drive(&phases, &mut acks, &mut snapshots).await;
        drop(phases);
        let (rounds, status) = match driven {
            Ok(outcome) => outcome,
            Err(err) => {
                abort_all(&handles);
                return Err(err);
            }
        };

        let mut states = vec![0.0; n];
        for handle in handles {
            let snapshot = handle.await?;
            states[snapshot.id] = snapshot.state;
        }
        let unconverged = match status {
            RunStatus::Stabilized => 0,
            RunStatus::BudgetExhausted => {
                self.predicate.unconverged(&snapshots, self.config.threshold)
            }
        };
        info!(?status, rounds, unconverged, "run finished");

        Ok(RunReport {
            states,
            rounds,
            status,
            unconverged,
        })
    }

    /// Issues rounds until stabilization or budget exhaustion.
    async fn drive(
        &self,
        phases: &[Sender<Phase>],
        acks: &mut UnboundedReceiver<Ack>,
        snapshots: &mut [ActorSnapshot],
    ) -> Result<(usize, RunStatus), EngineError> {
        let threshold = self.config.threshold;
        let mut rounds = 0;
        for round in 1..=self.config.max_rounds {
            if round > 1 {
                let unconverged = self.predicate.unconverged(snapshots, threshold);
                debug!(round, unconverged, "convergence check");
                if unconverged == 0 {
                    info!(rounds, "actors have stabilised");
                    return Ok((rounds, RunStatus::Stabilized));
                }
            }

            broadcast(phases, Phase::Send).await?;
            collect(acks, snapshots).await?;
            broadcast(phases, Phase::Receive).await?;
            collect(acks, snapshots).await?;
            rounds = round;
        }
        Ok((rounds, RunStatus::BudgetExhausted))
    }
}

async fn broadcast(phases: &[Sender<Phase>], phase: Phase) -> Result<(), EngineError> {
    for (id, tx) in phases.iter().enumerate() {
        tx.send(phase)
            .await
            .map_err(|_| EngineError::WorkerStopped(id))?;
    }
    Ok(())
}

/// Phase barrier: waits for one acknowledgement per actor.
async fn collect(
    acks: &mut UnboundedReceiver<Ack>,
    snapshots: &mut [ActorSnapshot],
) -> Result<(), EngineError> {
    let mut pending = vec![true; snapshots.len()];
    for _ in 0..snapshots.len() {
        let Some(ack) = acks.recv().await else {
            let id = pending.iter().position(|&p| p).unwrap_or_default();
            return Err(EngineError::WorkerStopped(id));
        };
        let snapshot = ack?;
        pending[snapshot.id] = false;
        snapshots[snapshot.id] = snapshot;
    }
    Ok(())
}

fn abort_all(handles: &[JoinHandle<ActorSnapshot>]) {
    for handle in handles {
        handle.abort();
    }
}
