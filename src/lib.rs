//! # TrustNet Simulator
//!
//! This library implements a deterministic simulation of a peer-to-peer ledger
//! network in which nodes exchange value transfers, locally detect conflicting
//! double-spends, and continuously adjust a bounded per-node trust score
//! ("reputation") based on observed behavior. It is built to measure how fast a
//! gossip-propagated network detects fraud, both under honest conditions and
//! against an adversary with an asymmetric detection-evasion capability.
//!
//! ## Architecture
//!
//! The simulation is composed of the following components:
//!
//! - **Crypto**: deterministic stand-ins for key pairs, state commitments
//!   ("anchors") and signatures; behavioral contracts only, no real cryptography
//! - **Transaction/Alert**: immutable value records exchanged between nodes
//! - **Node**: per-node ledger view, balance, reputation and conflict detection
//! - **NetworkGraph**: node registry, symmetric peer topology and flood-fill
//!   propagation of transactions and alerts
//! - **Adversary**: naive and split-cluster double-spend strategies keyed off a
//!   tagged node role
//! - **Runner/Metrics**: discrete time steps feeding an append-only collector
//! - **Scenarios**: four fixed experiment recipes composing the above
//!
//! ## Usage
//!
//! ```rust
//! use trustnet_sim::{SimConfig, SimulationRunner};
//!
//! let config = SimConfig::new().with_nodes(20).with_adversaries(0, 0.0);
//! let mut runner = SimulationRunner::new(config).unwrap();
//! runner.build_network();
//! for t in 0..10 {
//!     runner.step(t);
//! }
//! let summary = runner.metrics.summarize();
//! assert_eq!(summary.reputation_snapshots, 10);
//! ```
//!
//! Execution is single-threaded and deterministic: every run is a pure function
//! of the configuration and its seed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod adversary;
pub mod crypto;
pub mod graph;
pub mod metrics;
pub mod node;
pub mod runner;
pub mod scenarios;
pub mod transaction;

pub use crypto::{compute_anchor, tx_content_hash, Keypair, SignatureRegistry};
pub use graph::{GraphProjection, NetworkGraph, ProjectedEdge, ProjectedNode};
pub use metrics::{BatchRecord, ConfidenceStats, MetricsCollector, MetricsSummary};
pub use node::{Node, NodeRole};
pub use runner::SimulationRunner;
pub use scenarios::{
    ClassicDoubleSpend, HonestNetwork, QuantumDoubleSpend, ScenarioOutcome, SybilAttack,
};
pub use transaction::{Alert, Transaction};

/// Node identifier type
pub type NodeId = String;

/// Transaction identifier type (content-derived digest, hex)
pub type TxId = String;

/// Alert identifier type (derived from the two conflicting transaction ids)
pub type AlertId = String;

/// State commitment digest type (hex)
pub type Anchor = String;

/// Public node identity (hex digest of the private secret)
pub type PublicKey = String;

/// Opaque signature bytes
pub type Signature = Vec<u8>;

/// Logical clock value; one tick per issued anchor/transaction
pub type Tick = u64;

/// Reputation accounting parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReputationParams {
    /// Reputation assigned to honest nodes at construction
    pub initial_reputation: f64,
    /// Reward for accepting and forwarding a valid transaction
    pub reward_per_tx_forwarded: f64,
    /// Reward for relaying an alert discovered by another node
    pub reward_per_alert_propagated: f64,
    /// Natural reputation loss applied every simulated step
    pub decay_per_step: f64,
    /// Upper reputation bound; all rewards clamp here
    pub max_reputation: f64,
    /// Lower reputation bound; all penalties and decay floor here
    pub min_reputation: f64,
    /// One-time reputation penalty for the sender of a conflicting pair
    pub penalty_double_spend: f64,
}

impl Default for ReputationParams {
    fn default() -> Self {
        Self {
            initial_reputation: 0.5,
            reward_per_tx_forwarded: 0.001,
            reward_per_alert_propagated: 0.01,
            decay_per_step: 0.0001,
            max_reputation: 0.99,
            min_reputation: 0.01,
            penalty_double_spend: 0.2,
        }
    }
}

/// Simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimConfig {
    /// Total number of nodes (honest + adversarial)
    pub num_nodes: usize,

    /// Number of adversarial nodes
    pub num_evil: usize,

    /// Detection-evasion advantage of adversarial nodes, in [0, 1]
    pub quantum_advantage: f64,

    /// Steps between topology rewiring passes (0 disables rewiring)
    pub rewiring_interval: u64,

    /// Per-node probability of rewiring one edge during a pass
    pub rewiring_prob: f64,

    /// Per-node probability of emitting a chaff transaction (0 disables chaff)
    pub chaff_prob: f64,

    /// Random honest transactions issued per step
    pub tx_per_step: usize,

    /// Minimum peer degree assigned at network construction
    pub peer_degree_min: usize,

    /// Maximum peer degree assigned at network construction
    pub peer_degree_max: usize,

    /// Balance every node starts with
    pub initial_balance: f64,

    /// Seed for the run; equal seeds reproduce equal runs
    pub seed: u64,

    /// Reputation accounting parameters
    pub reputation: ReputationParams,
}

impl SimConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self {
            num_nodes: 500,
            num_evil: 1,
            quantum_advantage: 0.7,
            rewiring_interval: 100,
            rewiring_prob: 0.1,
            chaff_prob: 0.0,
            tx_per_step: 10,
            peer_degree_min: 3,
            peer_degree_max: 10,
            initial_balance: 1000.0,
            seed: 42,
            reputation: ReputationParams::default(),
        }
    }

    /// Set the total node count
    pub fn with_nodes(mut self, count: usize) -> Self {
        self.num_nodes = count;
        self
    }

    /// Set the adversarial node count and their advantage
    pub fn with_adversaries(mut self, count: usize, quantum_advantage: f64) -> Self {
        self.num_evil = count;
        self.quantum_advantage = quantum_advantage;
        self
    }

    /// Set the per-node degree bounds used when wiring the topology
    pub fn with_degree_bounds(mut self, min: usize, max: usize) -> Self {
        self.peer_degree_min = min;
        self.peer_degree_max = max;
        self
    }

    /// Set honest traffic volume and chaff probability
    pub fn with_traffic(mut self, tx_per_step: usize, chaff_prob: f64) -> Self {
        self.tx_per_step = tx_per_step;
        self.chaff_prob = chaff_prob;
        self
    }

    /// Set the rewiring schedule; an interval of 0 disables rewiring
    pub fn with_rewiring(mut self, interval: u64, prob: f64) -> Self {
        self.rewiring_interval = interval;
        self.rewiring_prob = prob;
        self
    }

    /// Set the run seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set custom reputation parameters
    pub fn with_reputation(mut self, params: ReputationParams) -> Self {
        self.reputation = params;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> SimResult<()> {
        if self.num_nodes == 0 {
            return Err(SimError::InvalidConfig("node count must be positive".into()));
        }
        if self.num_evil > self.num_nodes {
            return Err(SimError::InvalidConfig(
                "adversary count cannot exceed node count".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.quantum_advantage) {
            return Err(SimError::InvalidConfig(
                "quantum advantage must lie in [0, 1]".into(),
            ));
        }
        if self.peer_degree_min == 0 || self.peer_degree_min > self.peer_degree_max {
            return Err(SimError::InvalidConfig(
                "degree bounds must satisfy 1 <= min <= max".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.rewiring_prob) || !(0.0..=1.0).contains(&self.chaff_prob) {
            return Err(SimError::InvalidConfig(
                "probabilities must lie in [0, 1]".into(),
            ));
        }
        if self.initial_balance <= 0.0 {
            return Err(SimError::InvalidConfig(
                "initial balance must be positive".into(),
            ));
        }
        let rp = &self.reputation;
        if rp.min_reputation >= rp.max_reputation {
            return Err(SimError::InvalidConfig(
                "reputation bounds must satisfy min < max".into(),
            ));
        }
        if rp.initial_reputation < rp.min_reputation || rp.initial_reputation > rp.max_reputation {
            return Err(SimError::InvalidConfig(
                "initial reputation must lie within the bounds".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors surfaced by the simulation engine.
///
/// In-engine failures (invalid transfer amounts, unverifiable transactions,
/// detected conflicts, disconnected topologies) are encoded in return values
/// and sentinels, never as errors; only invalid construction parameters reach
/// this type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SimError {
    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for simulation operations
pub type SimResult<T> = Result<T, SimError>;

/// Pure predicates over engine state, usable from tests and callers
pub mod properties {
    use super::*;

    /// Every node's reputation lies within the configured bounds
    pub fn reputation_in_bounds(graph: &NetworkGraph, params: &ReputationParams) -> bool {
        graph.nodes.values().all(|n| {
            n.reputation >= params.min_reputation && n.reputation <= params.max_reputation
        })
    }

    /// The peer topology is represented symmetrically
    pub fn topology_symmetric(graph: &NetworkGraph) -> bool {
        graph.nodes.keys().all(|id| {
            graph
                .peers(id)
                .iter()
                .all(|peer| graph.peers(peer).contains(id))
        })
    }

    /// The alert references exactly the given pair of transaction ids
    pub fn alert_names_pair(alert: &Alert, tx1: &str, tx2: &str) -> bool {
        (alert.conflicting_tx_1 == tx1 && alert.conflicting_tx_2 == tx2)
            || (alert.conflicting_tx_1 == tx2 && alert.conflicting_tx_2 == tx1)
    }

    /// Every transaction in a node's local graph is registered globally
    pub fn local_graphs_subset_of_global(graph: &NetworkGraph) -> bool {
        graph.nodes.values().all(|n| {
            n.local_graph
                .keys()
                .all(|tx_id| graph.transactions.contains_key(tx_id))
        })
    }
}
