use crate::{actor::Actor, types::ActorSnapshot};

/// Anything that can tell whether it moved less than a threshold in the last round.
pub trait Convergent {
    /// True iff `|state - prev_state| <= threshold`.
    fn has_converged(&self, threshold: f64) -> bool;
}

impl Convergent for Actor {
    fn has_converged(&self, threshold: f64) -> bool {
        (self.state() - self.prev_state()).abs() <= threshold
    }
}

impl Convergent for ActorSnapshot {
    fn has_converged(&self, threshold: f64) -> bool {
        (self.state - self.prev_state).abs() <= threshold
    }
}

/// Counts the items that have not yet converged under `threshold`.
pub fn count_unconverged<T: Convergent>(items: &[T], threshold: f64) -> usize {
    items.iter().filter(|item| !item.has_converged(threshold)).count()
}

/// Aggregate stabilization test consulted by the round coordinator.
///
/// Implementors hold no per-run state; the coordinator calls them once per
/// round with the latest actor snapshots.
pub trait ConvergencePredicate: Send + Sync + Clone + 'static {
    /// Returns the number of actors that have not converged.
    fn unconverged(&self, actors: &[ActorSnapshot], threshold: f64) -> usize;

    /// Checks whether every actor has converged.
    fn is_stable(&self, actors: &[ActorSnapshot], threshold: f64) -> bool {
        self.unconverged(actors, threshold) == 0
    }
}

/// Default predicate: every actor moved by at most the threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdConvergence;

impl ConvergencePredicate for ThresholdConvergence {
    fn unconverged(&self, actors: &[ActorSnapshot], threshold: f64) -> usize {
        count_unconverged(actors, threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(id: usize, state: f64, prev_state: f64) -> ActorSnapshot {
        ActorSnapshot {
            id,
            state,
            prev_state,
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        assert!(snap(0, 2.5, 1.0).has_converged(1.5));
        assert!(!snap(0, 2.6, 1.0).has_converged(1.5));
        assert!(snap(0, -3.0, -3.0).has_converged(0.0));
    }

    #[test]
    fn test_count_unconverged() {
        let actors = vec![snap(0, 1.0, 1.0), snap(1, 5.0, 1.0), snap(2, 0.0, 4.0)];
        assert_eq!(count_unconverged(&actors, 0.5), 2);
        assert_eq!(ThresholdConvergence.unconverged(&actors, 4.0), 0);
        assert!(ThresholdConvergence.is_stable(&[], 0.0));
    }
}
