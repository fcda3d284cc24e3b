//! # Simulation Runner
//!
//! Drives a [`NetworkGraph`] through discrete time steps: builds the random
//! peer topology, injects background honest traffic, applies the rewiring and
//! chaff schedules, decays reputations and snapshots them into the
//! [`MetricsCollector`]. Scenario drivers in [`crate::scenarios`] own a runner
//! and interleave attacks with its steps.
//!
//! The runner carries its own rng stream, derived from the configured seed but
//! distinct from the graph's, so traffic choices and in-engine nonce draws do
//! not perturb each other.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::graph::NetworkGraph;
use crate::metrics::MetricsCollector;
use crate::node::NodeRole;
use crate::{NodeId, SimConfig, SimResult};

/// Reputation adversarial nodes start with, slightly above the honest default
/// so an attacker begins as a trusted peer
const EVIL_REPUTATION_CAP: f64 = 0.6;
const EVIL_REPUTATION_BUMP: f64 = 0.01;

/// Owns the network, the metrics and the step loop for one simulation run
pub struct SimulationRunner {
    /// Configuration the run was built from
    pub config: SimConfig,
    /// The simulated network
    pub graph: NetworkGraph,
    /// Append-only run metrics
    pub metrics: MetricsCollector,
    /// Adversarial node ids, in spawn order
    pub evil_ids: Vec<NodeId>,
    /// Honest node ids, in spawn order
    pub honest_ids: Vec<NodeId>,
    rng: ChaCha8Rng,
}

impl SimulationRunner {
    /// Validate the configuration and set up an empty network.
    /// Call [`build_network`](Self::build_network) before stepping.
    pub fn new(config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        let graph = NetworkGraph::new(
            config.seed,
            config.reputation.clone(),
            config.initial_balance,
        );
        let rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(1));
        Ok(Self {
            config,
            graph,
            metrics: MetricsCollector::new(),
            evil_ids: Vec::new(),
            honest_ids: Vec::new(),
            rng,
        })
    }

    /// Spawn all nodes and wire the random peer topology.
    ///
    /// Honest nodes are named `node_<i>`, adversarial ones `evil_<i>`; an
    /// adversary starts with a small reputation head start, capped, so it is
    /// already a trusted peer when it attacks. Each node requests a degree
    /// drawn from the configured bounds and connects to that many randomly
    /// chosen peers; since edges are symmetric, realized degrees may exceed
    /// the requested ones.
    pub fn build_network(&mut self) {
        let num_honest = self.config.num_nodes - self.config.num_evil;
        let initial = self.config.reputation.initial_reputation;
        for i in 0..num_honest {
            let id = self
                .graph
                .spawn(&format!("node_{i}"), NodeRole::Honest, initial);
            self.honest_ids.push(id);
        }
        let evil_reputation = (initial + EVIL_REPUTATION_BUMP).min(EVIL_REPUTATION_CAP);
        for i in 0..self.config.num_evil {
            let role = NodeRole::Adversary {
                quantum_advantage: self.config.quantum_advantage,
            };
            let id = self
                .graph
                .spawn(&format!("evil_{i}"), role, evil_reputation);
            self.evil_ids.push(id);
        }

        let ids: Vec<NodeId> = self.graph.nodes.keys().cloned().collect();
        if ids.len() >= 2 {
            let upper = self.config.peer_degree_max.min(ids.len() - 1);
            let lower = self.config.peer_degree_min.min(upper);
            for id in &ids {
                let degree = self.rng.gen_range(lower..=upper);
                let mut candidates: Vec<&NodeId> =
                    ids.iter().filter(|other| *other != id).collect();
                candidates.shuffle(&mut self.rng);
                for peer in candidates.into_iter().take(degree) {
                    self.graph.add_edge(id, peer);
                }
            }
        }

        let (diameter, path_length) = self.graph.topology_metrics();
        self.metrics.network_diameter = diameter;
        self.metrics.avg_path_length = path_length;
        info!(
            nodes = ids.len(),
            adversaries = self.evil_ids.len(),
            diameter,
            "network built"
        );
    }

    /// Run one simulated step and return the number of messages it produced.
    ///
    /// A step injects `tx_per_step` random honest-path transfers, runs the
    /// chaff and rewiring schedules when due, decays every node's reputation
    /// and records a full reputation snapshot.
    pub fn step(&mut self, t: u64) -> u64 {
        let mut messages: u64 = 0;
        let ids: Vec<NodeId> = self.graph.nodes.keys().cloned().collect();

        if ids.len() >= 2 {
            for _ in 0..self.config.tx_per_step {
                let sender = ids.choose(&mut self.rng).cloned().unwrap_or_default();
                let recipient = loop {
                    let candidate = ids.choose(&mut self.rng).cloned().unwrap_or_default();
                    if candidate != sender {
                        break candidate;
                    }
                };
                let amount = (self.rng.gen_range(1.0..50.0_f64) * 100.0).round() / 100.0;
                if let Some(tx) = self.graph.create_transaction(&sender, &recipient, amount) {
                    self.graph.propagate_transaction(&tx, &sender, None);
                    messages += self.graph.peers(&sender).len() as u64 + 1;
                }
            }
        }

        if self.config.chaff_prob > 0.0
            && self.rng.gen::<f64>() < self.config.chaff_prob * ids.len() as f64
        {
            self.graph.generate_chaff(self.config.chaff_prob);
            messages += 10;
        }

        if self.config.rewiring_interval > 0 && t > 0 && t % self.config.rewiring_interval == 0 {
            debug!(step = t, "rewiring pass");
            self.graph.rewire_peers(self.config.rewiring_prob);
        }

        let params = self.graph.params().clone();
        for node in self.graph.nodes.values_mut() {
            node.step_decay(&params);
        }

        let reputations: indexmap::IndexMap<NodeId, f64> = self
            .graph
            .nodes
            .iter()
            .map(|(id, node)| (id.clone(), node.reputation))
            .collect();
        let values: Vec<f64> = reputations.values().copied().collect();
        let mean = if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        };
        self.metrics.avg_reputation.push(mean);
        self.metrics.reputation_distribution.push(values);
        self.metrics.record_reputation_snapshot(t, reputations);
        self.metrics.record_throughput(messages);
        messages
    }

    /// Run `steps` consecutive steps starting at `from`
    pub fn run(&mut self, from: u64, steps: u64) {
        for t in from..from + steps {
            self.step(t);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties;

    fn small_config() -> SimConfig {
        SimConfig::new()
            .with_nodes(20)
            .with_adversaries(1, 0.5)
            .with_degree_bounds(3, 5)
            .with_traffic(3, 0.0)
            .with_rewiring(0, 0.0)
            .with_seed(11)
    }

    #[test]
    fn build_network_spawns_and_wires_all_nodes() {
        let mut runner = SimulationRunner::new(small_config()).unwrap();
        runner.build_network();
        assert_eq!(runner.graph.nodes.len(), 20);
        assert_eq!(runner.honest_ids.len(), 19);
        assert_eq!(runner.evil_ids, vec!["evil_0".to_string()]);
        assert!(properties::topology_symmetric(&runner.graph));
        for id in runner.graph.nodes.keys() {
            assert!(runner.graph.peers(id).len() >= 3);
        }
        let evil = &runner.graph.nodes["evil_0"];
        assert!(evil.is_adversary());
        assert!((evil.reputation - 0.51).abs() < 1e-12);
    }

    #[test]
    fn steps_inject_traffic_and_snapshot_reputations() {
        let mut runner = SimulationRunner::new(small_config()).unwrap();
        runner.build_network();
        runner.run(0, 10);
        assert_eq!(runner.metrics.tx_throughput.len(), 10);
        assert_eq!(runner.metrics.reputation_history.len(), 10);
        assert_eq!(runner.metrics.avg_reputation.len(), 10);
        assert!(!runner.graph.transactions.is_empty());
        assert!(properties::reputation_in_bounds(
            &runner.graph,
            runner.graph.params()
        ));
        assert!(properties::local_graphs_subset_of_global(&runner.graph));
    }

    #[test]
    fn equal_seeds_reproduce_equal_runs() {
        let run = |seed: u64| {
            let mut runner =
                SimulationRunner::new(small_config().with_seed(seed)).unwrap();
            runner.build_network();
            runner.run(0, 8);
            (
                runner.graph.transactions.keys().cloned().collect::<Vec<_>>(),
                runner.metrics.tx_throughput.clone(),
            )
        };
        assert_eq!(run(3), run(3));
        assert_ne!(run(3).0, run(4).0);
    }

    #[test]
    fn rewiring_schedule_preserves_symmetry() {
        let mut runner = SimulationRunner::new(
            small_config().with_rewiring(2, 1.0),
        )
        .unwrap();
        runner.build_network();
        runner.run(0, 6);
        assert!(properties::topology_symmetric(&runner.graph));
    }

    #[test]
    fn single_node_network_steps_without_traffic() {
        let config = SimConfig::new()
            .with_nodes(1)
            .with_adversaries(0, 0.0)
            .with_degree_bounds(1, 1);
        let mut runner = SimulationRunner::new(config).unwrap();
        runner.build_network();
        assert_eq!(runner.step(0), 0);
        assert!(runner.graph.transactions.is_empty());
    }
}
