use crate::{types::ActorSnapshot, EngineError, NodeId};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{trace, warn};

/// Cloneable push handle into one actor's inbox.
///
/// Backed by an unbounded channel, so pushing never blocks and never fails
/// while the owning actor is alive. Each push wakes at most one waiter.
#[derive(Debug, Clone)]
pub struct Mailbox {
    /// Owner of the inbox.
    owner: NodeId,

    /// Sending half of the inbox.
    sender: UnboundedSender<f64>,
}

impl Mailbox {
    /// Node owning this mailbox.
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// Enqueues a value into the owner's inbox. Safe to call from any task.
    pub fn push(&self, value: f64) {
        if self.sender.send(value).is_err() {
            warn!(node = self.owner, value, "dropping message for a discarded actor");
        }
    }
}

/// Arena of mailboxes indexed by node id.
///
/// Out-edges only store peer ids; this registry resolves them to live
/// handles at send time.
#[derive(Debug, Clone, Default)]
pub struct MailboxRegistry {
    mailboxes: Vec<Mailbox>,
}

impl MailboxRegistry {
    /// Builds a registry from mailboxes ordered by node id.
    pub fn new(mailboxes: Vec<Mailbox>) -> Self {
        Self { mailboxes }
    }

    /// Looks up the mailbox of `id`.
    pub fn resolve(&self, id: NodeId) -> Option<&Mailbox> {
        self.mailboxes.get(id)
    }

    /// Number of registered mailboxes.
    pub fn len(&self) -> usize {
        self.mailboxes.len()
    }

    /// Returns true if no mailbox is registered.
    pub fn is_empty(&self) -> bool {
        self.mailboxes.is_empty()
    }
}

/// Where an actor is inside the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorPhase {
    /// Between rounds.
    Idle,

    /// Previous state captured, nothing sent yet.
    Snapshot,

    /// Weighted state delivered to every out-neighbor.
    Sending,

    /// Waiting for the expected inbound messages.
    Receiving,
}

/// One graph node: scalar state, inbox and out-edges.
///
/// Per round an actor moves `Idle -> Snapshot -> Sending -> Receiving -> Idle`.
/// Calls out of that order are rejected with [`EngineError::InvalidTransition`].
#[derive(Debug)]
pub struct Actor {
    /// Unique node identifier.
    id: NodeId,

    /// Current state.
    state: f64,

    /// State at the start of the last send phase.
    prev_state: f64,

    /// Exact number of messages expected per round.
    in_degree: usize,

    /// Out-edges as `(weight, peer)`.
    outgoing: Vec<(f64, NodeId)>,

    /// Receiving half of the inbox.
    inbox: UnboundedReceiver<f64>,

    /// Position inside the current round.
    phase: ActorPhase,

    /// Set once the first round begins; wiring is frozen afterwards.
    started: bool,
}

impl Actor {
    /// Creates an idle actor seeded with `state`.
    ///
    /// # Returns
    /// A tuple of the actor and the mailbox peers use to reach it.
    pub fn new(id: NodeId, state: f64) -> (Self, Mailbox) {
        let (sender, inbox) = mpsc::unbounded_channel();
        (
            Self {
                id,
                state,
                prev_state: state,
                in_degree: 0,
                outgoing: Vec::new(),
                inbox,
                phase: ActorPhase::Idle,
                started: false,
            },
            Mailbox { owner: id, sender },
        )
    }

    /// Node this actor represents.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> f64 {
        self.state
    }

    /// State captured by the last `snapshot_prev`.
    pub fn prev_state(&self) -> f64 {
        self.prev_state
    }

    /// Number of messages `recv_phase` waits for.
    pub fn in_degree(&self) -> usize {
        self.in_degree
    }

    /// Position inside the current round.
    pub fn phase(&self) -> ActorPhase {
        self.phase
    }

    /// Registered out-edges as `(weight, peer)`.
    pub fn outgoing(&self) -> &[(f64, NodeId)] {
        &self.outgoing
    }

    /// Current state as a plain value.
    pub fn snapshot(&self) -> ActorSnapshot {
        ActorSnapshot {
            id: self.id,
            state: self.state,
            prev_state: self.prev_state,
        }
    }

    /// Counts one more incoming edge. Wiring only.
    pub(crate) fn inc_in_degree(&mut self) -> Result<(), EngineError> {
        self.ensure_wiring("inc_in_degree")?;
        self.in_degree += 1;
        Ok(())
    }

    /// Overwrites the expected message count. Wiring only.
    pub(crate) fn set_in_degree(&mut self, in_degree: usize) -> Result<(), EngineError> {
        self.ensure_wiring("set_in_degree")?;
        self.in_degree = in_degree;
        Ok(())
    }

    /// Registers one out-edge towards `peer`.
    ///
    /// # Errors
    /// Returns an error once rounds have started.
    pub fn add_outgoing(&mut self, weight: f64, peer: NodeId) -> Result<(), EngineError> {
        self.ensure_wiring("add_outgoing")?;
        self.outgoing.push((weight, peer));
        Ok(())
    }

    /// Copies `state` into `prev_state` ahead of the send phase.
    pub fn snapshot_prev(&mut self) -> Result<(), EngineError> {
        self.expect_phase(ActorPhase::Idle, "snapshot_prev")?;
        self.started = true;
        self.prev_state = self.state;
        self.phase = ActorPhase::Snapshot;
        Ok(())
    }

    /// Delivers `state * weight` to every out-neighbor. Reads `state` only.
    ///
    /// # Errors
    /// Returns an error if called before `snapshot_prev` or if a peer is
    /// missing from `registry`.
    pub fn send_phase(&mut self, registry: &MailboxRegistry) -> Result<(), EngineError> {
        self.expect_phase(ActorPhase::Snapshot, "send_phase")?;
        let value = self.state;
        for &(weight, peer) in &self.outgoing {
            let mailbox = registry.resolve(peer).ok_or(EngineError::UnknownPeer(peer))?;
            trace!(from = self.id, to = peer, value = value * weight, "deliver");
            mailbox.push(value * weight);
        }
        self.phase = ActorPhase::Sending;
        Ok(())
    }

    /// Waits for exactly `in_degree` values and stores their sum in `state`.
    ///
    /// Returns immediately, leaving `state` untouched, when `in_degree` is 0.
    /// There is no timeout: a miscounted in-degree stalls this call forever.
    ///
    /// # Errors
    /// Returns an error if called out of order or if every push handle for
    /// this inbox has been dropped.
    pub async fn recv_phase(&mut self) -> Result<(), EngineError> {
        self.expect_phase(ActorPhase::Sending, "recv_phase")?;
        self.phase = ActorPhase::Receiving;
        if self.in_degree == 0 {
            self.phase = ActorPhase::Idle;
            return Ok(());
        }

        let mut received = Vec::with_capacity(self.in_degree);
        while received.len() < self.in_degree {
            match self.inbox.recv().await {
                Some(value) => received.push(value),
                None => return Err(EngineError::WorkerStopped(self.id)),
            }
        }

        // Canonical order makes the sum independent of arrival order.
        received.sort_by(f64::total_cmp);
        self.state = received.iter().sum();
        trace!(node = self.id, state = self.state, "received");
        self.phase = ActorPhase::Idle;
        Ok(())
    }

    fn ensure_wiring(&self, op: &str) -> Result<(), EngineError> {
        if self.started {
            return Err(EngineError::InvalidTransition(format!(
                "{op} on actor {} after rounds started",
                self.id
            )));
        }
        Ok(())
    }

    fn expect_phase(&self, expected: ActorPhase, op: &str) -> Result<(), EngineError> {
        if self.phase != expected {
            return Err(EngineError::InvalidTransition(format!(
                "{op} on actor {} in phase {:?}, expected {:?}",
                self.id, self.phase, expected
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Convergent;

    #[tokio::test]
    async fn test_phase_order_enforced() {
        let (mut actor, mailbox) = Actor::new(0, 1.0);
        let registry = MailboxRegistry::new(vec![mailbox]);

        assert!(matches!(
            actor.send_phase(&registry),
            Err(EngineError::InvalidTransition(_))
        ));
        assert!(matches!(
            actor.recv_phase().await,
            Err(EngineError::InvalidTransition(_))
        ));

        actor.snapshot_prev().unwrap();
        assert!(matches!(
            actor.add_outgoing(1.0, 0),
            Err(EngineError::InvalidTransition(_))
        ));
        actor.send_phase(&registry).unwrap();
        actor.recv_phase().await.unwrap();
        assert_eq!(actor.phase(), ActorPhase::Idle);
    }

    #[tokio::test]
    async fn test_self_loop_receives_own_message() {
        let (mut actor, mailbox) = Actor::new(0, 2.0);
        actor.inc_in_degree().unwrap();
        actor.add_outgoing(0.5, 0).unwrap();
        let registry = MailboxRegistry::new(vec![mailbox]);

        actor.snapshot_prev().unwrap();
        actor.send_phase(&registry).unwrap();
        actor.recv_phase().await.unwrap();
        assert_eq!(actor.state(), 1.0);
        assert_eq!(actor.prev_state(), 2.0);
    }

    #[tokio::test]
    async fn test_unknown_peer_rejected() {
        let (mut actor, mailbox) = Actor::new(0, 2.0);
        actor.add_outgoing(1.0, 7).unwrap();
        let registry = MailboxRegistry::new(vec![mailbox]);

        actor.snapshot_prev().unwrap();
        assert!(matches!(
            actor.send_phase(&registry),
            Err(EngineError::UnknownPeer(7))
        ));
    }

    #[tokio::test]
    async fn test_recv_blocks_until_count_reached() {
        let (mut actor, mailbox) = Actor::new(0, 0.0);
        for _ in 0..3 {
            actor.inc_in_degree().unwrap();
        }
        let registry = MailboxRegistry::new(vec![mailbox.clone()]);
        actor.snapshot_prev().unwrap();
        actor.send_phase(&registry).unwrap();

        mailbox.push(1.0);
        mailbox.push(2.0);
        let pending = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            actor.recv_phase(),
        )
        .await;
        assert!(pending.is_err(), "recv_phase returned before all messages arrived");
    }

    #[tokio::test]
    async fn test_actor_convergence_after_one_round() {
        // 3.0 halved to 1.5: the change is exactly 1.5.
        let (mut actor, mailbox) = Actor::new(0, 3.0);
        actor.inc_in_degree().unwrap();
        actor.add_outgoing(0.5, 0).unwrap();
        let registry = MailboxRegistry::new(vec![mailbox]);
        assert!(actor.has_converged(0.0));

        actor.snapshot_prev().unwrap();
        actor.send_phase(&registry).unwrap();
        actor.recv_phase().await.unwrap();

        assert_eq!(actor.state(), 1.5);
        assert!(actor.has_converged(1.5));
        assert!(!actor.has_converged(1.4999));
    }
}
