use crate::{
    actor::{Actor, MailboxRegistry},
    EngineError, NodeId,
};
use rand::Rng;

/// Immutable directed weighted adjacency over nodes `0..N`.
///
/// Parallel edges are kept as separate entries and contribute independently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphModel {
    /// Out-edges per source node, as `(destination, weight)`.
    adjacency: Vec<Vec<(NodeId, f64)>>,

    /// Number of edges terminating at each node.
    in_degrees: Vec<usize>,
}

impl GraphModel {
    /// Creates a graph from an already-parsed adjacency list.
    ///
    /// # Arguments
    /// * `adjacency` - For each source node, its ordered `(destination, weight)` out-edges.
    ///
    /// # Errors
    /// Returns an error if a destination is out of range or a weight is
    /// negative or not finite.
    pub fn from_adjacency(adjacency: Vec<Vec<(NodeId, f64)>>) -> Result<Self, EngineError> {
        let n = adjacency.len();
        let mut in_degrees = vec![0; n];
        for (source, edges) in adjacency.iter().enumerate() {
            for &(destination, weight) in edges {
                if destination >= n {
                    return Err(EngineError::InvalidGraph(format!(
                        "edge {source} -> {destination} points outside 0..{n}"
                    )));
                }
                if !weight.is_finite() || weight < 0.0 {
                    return Err(EngineError::InvalidGraph(format!(
                        "edge {source} -> {destination} has invalid weight {weight}"
                    )));
                }
                in_degrees[destination] += 1;
            }
        }
        Ok(Self {
            adjacency,
            in_degrees,
        })
    }

    /// Creates a graph with `n` nodes from `(source, destination, weight)` triples.
    pub fn from_edges(n: usize, edges: &[(NodeId, NodeId, f64)]) -> Result<Self, EngineError> {
        let mut adjacency = vec![Vec::new(); n];
        for &(source, destination, weight) in edges {
            let out = adjacency.get_mut(source).ok_or_else(|| {
                EngineError::InvalidGraph(format!("source {source} outside 0..{n}"))
            })?;
            out.push((destination, weight));
        }
        Self::from_adjacency(adjacency)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    /// Returns true if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Total number of edges, parallel edges included.
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    /// Out-edges of `id` as `(destination, weight)`, empty for unknown ids.
    pub fn out_edges(&self, id: NodeId) -> &[(NodeId, f64)] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of edges terminating at `id`.
    pub fn in_degree(&self, id: NodeId) -> usize {
        self.in_degrees.get(id).copied().unwrap_or(0)
    }

    /// In-degree of every node, indexed by id.
    pub fn in_degrees(&self) -> &[usize] {
        &self.in_degrees
    }

    /// One synchronous round computed sequentially: `y[v] = Σ w(u,v) * x[u]`.
    ///
    /// Nodes without incoming edges keep their value, mirroring the actor rule.
    ///
    /// # Errors
    /// Returns an error if `states` does not have one entry per node.
    pub fn propagate(&self, states: &[f64]) -> Result<Vec<f64>, EngineError> {
        self.check_len(states.len())?;
        let mut next = vec![0.0; self.len()];
        for (source, edges) in self.adjacency.iter().enumerate() {
            for &(destination, weight) in edges {
                next[destination] += states[source] * weight;
            }
        }
        for (id, value) in next.iter_mut().enumerate() {
            if self.in_degrees[id] == 0 {
                *value = states[id];
            }
        }
        Ok(next)
    }

    /// Builds one actor per node and wires every out-edge.
    ///
    /// # Arguments
    /// * `seeds` - Initial state per node id.
    ///
    /// # Returns
    /// The actors ordered by id and the registry resolving ids to mailboxes.
    ///
    /// # Errors
    /// Returns an error if `seeds` does not have one entry per node.
    pub fn build_actors(&self, seeds: &[f64]) -> Result<(Vec<Actor>, MailboxRegistry), EngineError> {
        self.check_len(seeds.len())?;
        let (mut actors, mailboxes): (Vec<_>, Vec<_>) = seeds
            .iter()
            .enumerate()
            .map(|(id, &seed)| Actor::new(id, seed))
            .unzip();

        for (source, edges) in self.adjacency.iter().enumerate() {
            for &(destination, weight) in edges {
                actors[destination].inc_in_degree()?;
                actors[source].add_outgoing(weight, destination)?;
            }
        }
        debug_assert!(actors
            .iter()
            .all(|actor| actor.in_degree() == self.in_degrees[actor.id()]));

        Ok((actors, MailboxRegistry::new(mailboxes)))
    }

    fn check_len(&self, actual: usize) -> Result<(), EngineError> {
        if actual != self.len() {
            return Err(EngineError::SeedMismatch {
                expected: self.len(),
                actual,
            });
        }
        Ok(())
    }
}

/// Draws one seed per node, uniformly from the integers `0..10`.
pub fn random_seeds<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<f64> {
    (0..n).map(|_| f64::from(rng.gen_range(0u8..10))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_in_degrees_count_parallel_edges() {
        let graph =
            GraphModel::from_edges(3, &[(0, 1, 0.5), (0, 1, 0.25), (2, 1, 1.0), (1, 0, 1.0)])
                .unwrap();
        assert_eq!(graph.in_degrees(), &[1, 3, 0]);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.out_edges(0), &[(1, 0.5), (1, 0.25)]);
        assert!(graph.out_edges(9).is_empty());
    }

    #[test]
    fn test_invalid_graphs_rejected() {
        assert!(matches!(
            GraphModel::from_adjacency(vec![vec![(1, 1.0)]]),
            Err(EngineError::InvalidGraph(_))
        ));
        assert!(matches!(
            GraphModel::from_adjacency(vec![vec![(0, -1.0)]]),
            Err(EngineError::InvalidGraph(_))
        ));
        assert!(matches!(
            GraphModel::from_adjacency(vec![vec![(0, f64::INFINITY)]]),
            Err(EngineError::InvalidGraph(_))
        ));
        assert!(matches!(
            GraphModel::from_edges(1, &[(3, 0, 1.0)]),
            Err(EngineError::InvalidGraph(_))
        ));
    }

    #[test]
    fn test_build_actors_wires_edges() {
        let graph = GraphModel::from_edges(3, &[(0, 2, 0.5), (1, 2, 0.5)]).unwrap();
        let (actors, registry) = graph.build_actors(&[4.0, 8.0, 0.0]).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(actors[2].in_degree(), 2);
        assert_eq!(actors[0].outgoing(), &[(0.5, 2)]);
        assert!(actors[2].outgoing().is_empty());

        assert!(matches!(
            graph.build_actors(&[1.0]),
            Err(EngineError::SeedMismatch {
                expected: 3,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_random_seeds_are_digits() {
        let mut rng = StdRng::seed_from_u64(7);
        let seeds = random_seeds(100, &mut rng);
        assert_eq!(seeds.len(), 100);
        assert!(seeds
            .iter()
            .all(|&s| (0.0..10.0).contains(&s) && s.fract() == 0.0));
    }
}
