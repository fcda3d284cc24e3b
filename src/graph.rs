//! # Network Graph and Propagation
//!
//! Owns the node set, the symmetric peer topology, the global transaction and
//! alert stores, the per-run [`SignatureRegistry`] and the seeded randomness
//! source. Propagation is an in-process, iterative depth-first flood with a
//! visited-once guarantee per call, not real transport. Ordering within one
//! flood is whatever the traversal stack dictates; the end state (which nodes
//! know the item) depends only on the topology.
//!
//! The adjacency is index-based (`NodeId -> IndexSet<NodeId>`) and always kept
//! symmetric: both directions are inserted and removed together.

use indexmap::{IndexMap, IndexSet};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::crypto::{compute_anchor, tx_content_hash, Keypair, SignatureRegistry};
use crate::node::{Node, NodeRole};
use crate::transaction::{Alert, Transaction};
use crate::{AlertId, NodeId, ReputationParams, Tick, TxId};

/// The simulated network: nodes, topology, and everything they exchange.
///
/// Transactions and alerts are append-only for the lifetime of the run;
/// confidence and conflict lookups only ever consult entries that existed at
/// query time.
#[derive(Debug, Clone)]
pub struct NetworkGraph {
    /// All nodes by id, in insertion order
    pub nodes: IndexMap<NodeId, Node>,
    /// Every transaction ever registered by a propagation call
    pub transactions: IndexMap<TxId, Transaction>,
    /// Every alert ever raised
    pub alerts: IndexMap<AlertId, Alert>,
    adjacency: IndexMap<NodeId, IndexSet<NodeId>>,
    registry: SignatureRegistry,
    rng: ChaCha8Rng,
    clock: Tick,
    params: ReputationParams,
    initial_balance: f64,
}

impl NetworkGraph {
    /// Create an empty network with its own registry, clock and seeded rng
    pub fn new(seed: u64, params: ReputationParams, initial_balance: f64) -> Self {
        Self {
            nodes: IndexMap::new(),
            transactions: IndexMap::new(),
            alerts: IndexMap::new(),
            adjacency: IndexMap::new(),
            registry: SignatureRegistry::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            clock: 0,
            params,
            initial_balance,
        }
    }

    /// Reputation parameters this network runs under
    pub fn params(&self) -> &ReputationParams {
        &self.params
    }

    /// Balance every node starts with
    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    /// Current logical clock value
    pub fn clock(&self) -> Tick {
        self.clock
    }

    pub(crate) fn tick(&mut self) -> Tick {
        self.clock += 1;
        self.clock
    }

    /// Verify opaque signature bytes against content and a public key, using
    /// this run's signature registry
    pub fn verify_content(&self, content: &str, signature: &crate::Signature, public: &str) -> bool {
        self.registry.verify(content, signature, public)
    }

    pub(crate) fn sign_content(&mut self, content: &str, keypair: &Keypair) -> crate::Signature {
        self.registry.sign(content, keypair)
    }

    /// Create a node with a fresh key pair and register it
    pub fn spawn(&mut self, id: &str, role: NodeRole, initial_reputation: f64) -> NodeId {
        let keypair = Keypair::generate(&mut self.rng);
        let node = Node::new(id, role, initial_reputation, self.initial_balance, keypair);
        self.adjacency.insert(node.id.clone(), IndexSet::new());
        self.nodes.insert(node.id.clone(), node);
        id.to_string()
    }

    /// Connect two nodes. No-op when either endpoint is unknown or the
    /// endpoints coincide; both directions are always inserted.
    pub fn add_edge(&mut self, a: &str, b: &str) {
        if a == b || !self.nodes.contains_key(a) || !self.nodes.contains_key(b) {
            return;
        }
        if let Some(peers) = self.adjacency.get_mut(a) {
            peers.insert(b.to_string());
        }
        if let Some(peers) = self.adjacency.get_mut(b) {
            peers.insert(a.to_string());
        }
    }

    /// Disconnect two nodes, both directions
    pub fn remove_edge(&mut self, a: &str, b: &str) {
        if let Some(peers) = self.adjacency.get_mut(a) {
            peers.shift_remove(b);
        }
        if let Some(peers) = self.adjacency.get_mut(b) {
            peers.shift_remove(a);
        }
    }

    /// Direct peers of a node, in insertion order
    pub fn peers(&self, id: &str) -> Vec<NodeId> {
        self.adjacency
            .get(id)
            .map(|peers| peers.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Issue a transaction from `sender` over the honest creation path.
    ///
    /// Returns `None` without any state change when the amount is non-positive
    /// or exceeds the sender's balance. On success the sender's balance is
    /// deducted immediately: a node is authoritative over its own outgoing
    /// balance even before anyone else accepts the transaction.
    pub fn create_transaction(
        &mut self,
        sender: &str,
        recipient: &str,
        amount: f64,
    ) -> Option<Transaction> {
        let (balance, last_two, parents, keypair) = {
            let node = self.nodes.get(sender)?;
            if amount <= 0.0 || amount > node.balance {
                return None;
            }
            (
                node.balance,
                node.last_issued_ids(2),
                node.last_issued_ids(5),
                node.keypair.clone(),
            )
        };
        let nonce: u32 = self.rng.gen();
        let timestamp = self.tick();
        let anchor = compute_anchor(balance, &last_two, nonce, timestamp);
        let id = tx_content_hash(sender, recipient, amount, nonce, &anchor, &parents, timestamp);
        let mut tx = Transaction {
            id: id.clone(),
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount,
            nonce,
            anchor,
            parents,
            timestamp,
            signature: Vec::new(),
            is_chaff: false,
        };
        tx.signature = self.registry.sign(&tx.signable_content(), &keypair);

        let node = self.nodes.get_mut(sender)?;
        node.balance -= amount;
        node.known_balances.insert(sender.to_string(), node.balance);
        node.my_transactions.push(tx.clone());
        node.local_graph.insert(id, tx.clone());
        Some(tx)
    }

    /// Deliver a transaction to one node. Returns true when the node knows the
    /// transaction afterwards (newly accepted or already known); this is the signal
    /// that a flood may continue past it.
    pub fn receive_transaction(&mut self, at: &str, tx: &Transaction) -> bool {
        let Some(node) = self.nodes.get(at) else {
            return false;
        };
        if node.local_graph.contains_key(&tx.id) {
            return true;
        }

        let Some(sender) = self.nodes.get(&tx.sender) else {
            return false;
        };
        let sender_key = sender.keypair.public.clone();
        if !self
            .registry
            .verify(&tx.signable_content(), &tx.signature, &sender_key)
        {
            return false;
        }

        if let Some(existing_id) = self.nodes.get(at).and_then(|n| n.find_conflict(tx)) {
            let alert = Alert::new(&tx.id, &existing_id, &tx.anchor, at);
            info!(
                node = %at,
                sender = %tx.sender,
                "anchor collision detected, raising alert"
            );
            self.receive_alert(at, alert.clone());
            self.propagate_alert(&alert, at);
            return false;
        }

        let params = self.params.clone();
        let initial_balance = self.initial_balance;
        if let Some(node) = self.nodes.get_mut(at) {
            node.accept_transaction(tx.clone(), initial_balance, &params);
        }
        self.propagate_transaction(tx, at, None);
        true
    }

    /// Deliver an alert to one node. Idempotent on alert id; non-discoverers
    /// take the relay reward and re-seed the flood from here (the discoverer
    /// already triggered propagation at detection time).
    pub fn receive_alert(&mut self, at: &str, alert: Alert) {
        let params = self.params.clone();
        let initial_balance = self.initial_balance;
        let newly_processed = match self.nodes.get_mut(at) {
            Some(node) => node.apply_alert(alert.clone(), initial_balance),
            None => false,
        };
        if !newly_processed {
            return;
        }
        let is_discoverer = alert.discovered_by == at;
        if !is_discoverer {
            if let Some(node) = self.nodes.get_mut(at) {
                node.reward(params.reward_per_alert_propagated, params.max_reputation);
            }
            self.propagate_alert(&alert, at);
        }
    }

    /// Flood a transaction through the network from `origin`.
    ///
    /// When `first_hop_peers` is given, only those nodes receive the
    /// transaction on the first hop; the rest of the network is reached
    /// through them. Each node is visited at most once per call; a rejecting
    /// node does not enqueue its neighbors, though they may still be reached
    /// via other paths already on the stack.
    pub fn propagate_transaction(
        &mut self,
        tx: &Transaction,
        origin: &str,
        first_hop_peers: Option<&[NodeId]>,
    ) {
        self.transactions.insert(tx.id.clone(), tx.clone());
        debug!(tx = %tx.id, %origin, restricted = first_hop_peers.is_some(), "flooding transaction");

        let mut visited: IndexSet<NodeId> = IndexSet::new();
        visited.insert(origin.to_string());
        let initial: Vec<NodeId> = match first_hop_peers {
            Some(peers) => peers.to_vec(),
            None => self.peers(origin),
        };
        let mut stack: Vec<NodeId> = initial
            .into_iter()
            .filter(|peer| !visited.contains(peer))
            .collect();

        while let Some(current) = stack.pop() {
            if visited.contains(&current) {
                continue;
            }
            visited.insert(current.clone());
            if self.receive_transaction(&current, tx) {
                for peer in self.peers(&current) {
                    if !visited.contains(&peer) {
                        stack.push(peer);
                    }
                }
            }
        }
    }

    /// Flood an alert from `origin`, penalizing the sender of each conflicting
    /// transaction once per call (floored at the minimum bound). Every relay
    /// hands a fresh value with an incremented hop count to the next node;
    /// visited-once semantics match transaction flooding, but the flood always
    /// continues past a node regardless of whether it was new to it.
    pub fn propagate_alert(&mut self, alert: &Alert, origin: &str) {
        self.alerts.insert(alert.id.clone(), alert.clone());

        for tx_id in [&alert.conflicting_tx_1, &alert.conflicting_tx_2] {
            let Some(sender) = self.transactions.get(tx_id).map(|tx| tx.sender.clone()) else {
                continue;
            };
            if let Some(node) = self.nodes.get_mut(&sender) {
                node.penalize(
                    self.params.penalty_double_spend,
                    self.params.min_reputation,
                );
                debug!(node = %sender, reputation = node.reputation, "penalized conflicting sender");
            }
        }

        let mut visited: IndexSet<NodeId> = IndexSet::new();
        visited.insert(origin.to_string());
        let mut stack: Vec<NodeId> = self.peers(origin);

        while let Some(current) = stack.pop() {
            if visited.contains(&current) {
                continue;
            }
            visited.insert(current.clone());
            self.receive_alert(&current, alert.with_hop());
            for peer in self.peers(&current) {
                if !visited.contains(&peer) {
                    stack.push(peer);
                }
            }
        }
    }

    /// Periodic topology mutation: for each node, with probability `prob`,
    /// drop one random incident edge and connect to one random node it is not
    /// already connected to. Frustrates structural analysis of the graph;
    /// purely a perturbation policy, not a correctness mechanism.
    pub fn rewire_peers(&mut self, prob: f64) {
        if self.nodes.len() < 3 {
            return;
        }
        let node_ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        let mut rewired = 0usize;
        for id in &node_ids {
            let peers = self.peers(id);
            if peers.is_empty() || self.rng.gen::<f64>() > prob {
                continue;
            }
            let dropped = peers[self.rng.gen_range(0..peers.len())].clone();
            self.remove_edge(id, &dropped);

            let connected = self.adjacency.get(id).cloned().unwrap_or_default();
            let candidates: Vec<&NodeId> = node_ids
                .iter()
                .filter(|other| *other != id && !connected.contains(*other))
                .collect();
            if candidates.is_empty() {
                continue;
            }
            let added = candidates[self.rng.gen_range(0..candidates.len())].clone();
            self.add_edge(id, &added);
            rewired += 1;
        }
        debug!(rewired, "topology rewiring pass complete");
    }

    /// Background noise: each honest node, with probability `prob`, issues one
    /// trivial transaction to a random other node, marked as chaff, and floods
    /// it. Chaff is excluded from attack accounting but otherwise normal.
    pub fn generate_chaff(&mut self, prob: f64) {
        let node_ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        for id in &node_ids {
            if self.nodes.get(id).map_or(true, |n| n.is_adversary()) {
                continue;
            }
            if self.rng.gen::<f64>() > prob {
                continue;
            }
            let targets: Vec<&NodeId> = node_ids.iter().filter(|other| *other != id).collect();
            if targets.is_empty() {
                continue;
            }
            let target = targets[self.rng.gen_range(0..targets.len())].clone();
            if let Some(mut tx) = self.create_transaction(id, &target, 0.01) {
                tx.is_chaff = true;
                if let Some(node) = self.nodes.get_mut(id) {
                    if let Some(stored) = node.local_graph.get_mut(&tx.id) {
                        stored.is_chaff = true;
                    }
                    if let Some(mine) = node.my_transactions.last_mut() {
                        mine.is_chaff = true;
                    }
                }
                self.propagate_transaction(&tx, id, None);
            }
        }
    }

    /// Per-observer confidence in a transaction, in [0, 1].
    ///
    /// 0 when unknown to the observer or flagged conflicting; otherwise 0.5
    /// plus 0.1 x creator-reputation for every locally known transaction that
    /// lists it as a parent, capped at 1. Corroboration from higher-trust
    /// sources raises confidence; this is per-observer, not a consensus value.
    pub fn confidence(&self, observer: &str, tx_id: &str) -> f64 {
        let Some(node) = self.nodes.get(observer) else {
            return 0.0;
        };
        if !node.local_graph.contains_key(tx_id) || node.conflicting_tx_ids.contains(tx_id) {
            return 0.0;
        }
        let mut score = 0.5;
        for other in node.local_graph.values() {
            if other.parents.iter().any(|parent| parent == tx_id) {
                let creator_reputation = self
                    .nodes
                    .get(&other.sender)
                    .map(|n| n.reputation)
                    .unwrap_or(0.5);
                score += 0.1 * creator_reputation;
            }
        }
        score.min(1.0)
    }

    /// Diameter and average shortest-path length of the undirected topology.
    /// Returns the (-1, -1.0) sentinel when the graph is disconnected, and
    /// (0, 0.0) when it is too small for either to be meaningful.
    pub fn topology_metrics(&self) -> (i64, f64) {
        let n = self.nodes.len();
        if n < 2 {
            return (0, 0.0);
        }
        let mut diameter = 0u64;
        let mut total_distance = 0u64;
        for source in self.nodes.keys() {
            let distances = self.bfs_distances(source);
            if distances.len() < n {
                return (-1, -1.0);
            }
            for distance in distances.values() {
                total_distance += *distance;
                diameter = diameter.max(*distance);
            }
        }
        let pairs = (n * (n - 1)) as f64;
        (diameter as i64, total_distance as f64 / pairs)
    }

    fn bfs_distances(&self, source: &str) -> IndexMap<NodeId, u64> {
        let mut distances: IndexMap<NodeId, u64> = IndexMap::new();
        distances.insert(source.to_string(), 0);
        let mut frontier: Vec<NodeId> = vec![source.to_string()];
        while !frontier.is_empty() {
            let mut next: Vec<NodeId> = Vec::new();
            for current in frontier {
                let depth = distances[&current];
                for peer in self.peers(&current) {
                    if !distances.contains_key(&peer) {
                        distances.insert(peer.clone(), depth + 1);
                        next.push(peer);
                    }
                }
            }
            frontier = next;
        }
        distances
    }

    /// Read-only projection of the network for display layers: node list with
    /// reputation and role flag, deduplicated undirected edge list, and store
    /// sizes. Derived data, never a live reference into engine state.
    pub fn projection(&self) -> GraphProjection {
        let nodes = self
            .nodes
            .values()
            .map(|node| ProjectedNode {
                id: node.id.clone(),
                reputation: (node.reputation * 100.0).round() / 100.0,
                is_evil: node.is_adversary(),
            })
            .collect();
        let mut edges = Vec::new();
        for (id, peers) in &self.adjacency {
            for peer in peers {
                if id < peer {
                    edges.push(ProjectedEdge {
                        source: id.clone(),
                        target: peer.clone(),
                    });
                }
            }
        }
        GraphProjection {
            nodes,
            edges,
            transaction_count: self.transactions.len(),
            alert_count: self.alerts.len(),
        }
    }

    pub(crate) fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }
}

/// Node entry in a [`GraphProjection`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectedNode {
    pub id: NodeId,
    pub reputation: f64,
    pub is_evil: bool,
}

/// Undirected edge entry in a [`GraphProjection`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectedEdge {
    pub source: NodeId,
    pub target: NodeId,
}

/// Read-only dashboard projection of the network state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphProjection {
    pub nodes: Vec<ProjectedNode>,
    pub edges: Vec<ProjectedEdge>,
    pub transaction_count: usize,
    pub alert_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties;
    use proptest::prelude::*;

    fn graph() -> NetworkGraph {
        NetworkGraph::new(11, ReputationParams::default(), 1000.0)
    }

    fn honest(g: &mut NetworkGraph, id: &str) {
        g.spawn(id, NodeRole::Honest, 0.5);
    }

    #[test]
    fn edges_are_symmetric_and_checked() {
        let mut g = graph();
        honest(&mut g, "a");
        honest(&mut g, "b");
        g.add_edge("a", "b");
        assert_eq!(g.peers("a"), vec!["b".to_string()]);
        assert_eq!(g.peers("b"), vec!["a".to_string()]);
        assert!(properties::topology_symmetric(&g));

        // unknown endpoint: no-op
        g.add_edge("a", "ghost");
        assert_eq!(g.peers("a").len(), 1);
        // self edge: no-op
        g.add_edge("a", "a");
        assert_eq!(g.peers("a").len(), 1);

        g.remove_edge("a", "b");
        assert!(g.peers("a").is_empty());
        assert!(g.peers("b").is_empty());
    }

    #[test]
    fn create_transaction_enforces_balance() {
        let mut g = graph();
        honest(&mut g, "a");
        honest(&mut g, "b");

        assert!(g.create_transaction("a", "b", 0.0).is_none());
        assert!(g.create_transaction("a", "b", -5.0).is_none());
        assert!(g.create_transaction("a", "b", 1000.5).is_none());
        assert_eq!(g.nodes["a"].balance, 1000.0);

        let tx = g.create_transaction("a", "b", 10.0).expect("valid amount");
        assert_eq!(g.nodes["a"].balance, 990.0);
        assert_eq!(tx.sender, "a");
        assert_eq!(tx.recipient, "b");
        assert_eq!(g.nodes["a"].known_balances["a"], 990.0);
        assert_eq!(g.nodes["a"].my_transactions.len(), 1);
    }

    #[test]
    fn created_transactions_verify_at_creation_time() {
        let mut g = graph();
        honest(&mut g, "a");
        honest(&mut g, "b");
        let tx = g.create_transaction("a", "b", 10.0).unwrap();
        let public = g.nodes["a"].keypair.public.clone();
        assert!(g
            .registry
            .verify(&tx.signable_content(), &tx.signature, &public));
    }

    #[test]
    fn flood_reaches_every_connected_node_and_rewards_once() {
        let params = ReputationParams::default();
        let mut g = graph();
        for id in ["a", "b", "c", "d"] {
            honest(&mut g, id);
        }
        // line topology: a - b - c - d
        g.add_edge("a", "b");
        g.add_edge("b", "c");
        g.add_edge("c", "d");

        let tx = g.create_transaction("a", "b", 5.0).unwrap();
        g.propagate_transaction(&tx, "a", None);

        for id in ["b", "c", "d"] {
            assert!(g.nodes[id].local_graph.contains_key(&tx.id), "{id} missed tx");
            // the forwarding reward applied exactly once despite nested floods
            let expected = 0.5 + params.reward_per_tx_forwarded;
            assert!((g.nodes[id].reputation - expected).abs() < 1e-12);
        }
        assert!(g.transactions.contains_key(&tx.id));
        assert!(properties::local_graphs_subset_of_global(&g));
    }

    #[test]
    fn receive_is_idempotent_without_double_reward() {
        let mut g = graph();
        honest(&mut g, "a");
        honest(&mut g, "b");
        g.add_edge("a", "b");
        let tx = g.create_transaction("a", "b", 5.0).unwrap();

        assert!(g.receive_transaction("b", &tx));
        let after_first = g.nodes["b"].reputation;
        assert!(g.receive_transaction("b", &tx));
        assert_eq!(g.nodes["b"].reputation, after_first);
        assert_eq!(g.nodes["b"].local_graph.len(), 1);
    }

    #[test]
    fn unverifiable_transactions_are_dropped() {
        let mut g = graph();
        honest(&mut g, "a");
        honest(&mut g, "b");
        g.add_edge("a", "b");
        let tx = g.create_transaction("a", "b", 5.0).unwrap();

        // unknown sender
        let mut foreign = tx.clone();
        foreign.sender = "stranger".to_string();
        assert!(!g.receive_transaction("b", &foreign));

        // tampered amount invalidates the recorded signature
        let mut tampered = tx.clone();
        tampered.amount = 999.0;
        tampered.id = "forged".to_string();
        assert!(!g.receive_transaction("b", &tampered));
        assert!(!g.nodes["b"].local_graph.contains_key("forged"));
    }

    #[test]
    fn first_hop_restriction_limits_the_flood() {
        let mut g = graph();
        honest(&mut g, "hub");
        honest(&mut g, "left");
        honest(&mut g, "right");
        // hub is connected to both, but left and right are not connected
        g.add_edge("hub", "left");
        g.add_edge("hub", "right");

        let tx = g.create_transaction("hub", "left", 5.0).unwrap();
        let first_hop = vec!["left".to_string()];
        g.propagate_transaction(&tx, "hub", Some(&first_hop));

        assert!(g.nodes["left"].local_graph.contains_key(&tx.id));
        assert!(!g.nodes["right"].local_graph.contains_key(&tx.id));
    }

    #[test]
    fn chaff_is_flagged_everywhere() {
        let mut g = graph();
        honest(&mut g, "a");
        honest(&mut g, "b");
        g.add_edge("a", "b");
        g.generate_chaff(1.0);

        assert!(!g.transactions.is_empty());
        for tx in g.transactions.values() {
            assert!(tx.is_chaff);
            assert_eq!(tx.amount, 0.01);
        }
        for node in g.nodes.values() {
            for tx in node.local_graph.values() {
                assert!(tx.is_chaff);
            }
        }
    }

    #[test]
    fn rewiring_preserves_symmetry() {
        let mut g = graph();
        let ids: Vec<String> = (0..8).map(|i| format!("n{i}")).collect();
        for id in &ids {
            honest(&mut g, id);
        }
        for window in ids.windows(2) {
            g.add_edge(&window[0], &window[1]);
        }
        for _ in 0..10 {
            g.rewire_peers(0.5);
            assert!(properties::topology_symmetric(&g));
        }
    }

    #[test]
    fn topology_metrics_report_sentinel_when_disconnected() {
        let mut g = graph();
        for id in ["a", "b", "c", "d"] {
            honest(&mut g, id);
        }
        g.add_edge("a", "b");
        g.add_edge("b", "c");
        g.add_edge("c", "d");
        let (diameter, path_length) = g.topology_metrics();
        assert_eq!(diameter, 3);
        assert!((path_length - 20.0 / 12.0).abs() < 1e-12);

        g.remove_edge("c", "d");
        let (diameter, path_length) = g.topology_metrics();
        assert_eq!(diameter, -1);
        assert_eq!(path_length, -1.0);
    }

    #[test]
    fn confidence_reflects_corroboration_and_conflicts() {
        let mut g = graph();
        honest(&mut g, "a");
        honest(&mut g, "b");
        g.add_edge("a", "b");

        let tx1 = g.create_transaction("a", "b", 5.0).unwrap();
        g.propagate_transaction(&tx1, "a", None);
        assert_eq!(g.confidence("b", &tx1.id), 0.5);
        assert_eq!(g.confidence("b", "unknown"), 0.0);

        // a second transaction from a lists tx1 as parent, corroborating it
        let tx2 = g.create_transaction("a", "b", 5.0).unwrap();
        assert!(tx2.parents.contains(&tx1.id));
        g.propagate_transaction(&tx2, "a", None);
        let expected = 0.5 + 0.1 * g.nodes["a"].reputation;
        assert!((g.confidence("b", &tx1.id) - expected).abs() < 1e-12);

        // flagged ids score zero
        g.nodes.get_mut("b").unwrap().conflicting_tx_ids.insert(tx1.id.clone());
        assert_eq!(g.confidence("b", &tx1.id), 0.0);
    }

    proptest! {
        /// For any sequence of requested amounts, creation succeeds exactly
        /// for positive amounts within the current balance, deducts exactly
        /// that amount, and the balance never goes negative.
        #[test]
        fn create_transaction_never_overdraws(
            amounts in proptest::collection::vec(-50.0f64..1500.0, 1..40)
        ) {
            let mut g = graph();
            honest(&mut g, "a");
            honest(&mut g, "b");
            for amount in amounts {
                let before = g.nodes["a"].balance;
                match g.create_transaction("a", "b", amount) {
                    Some(tx) => {
                        prop_assert!(amount > 0.0 && amount <= before);
                        prop_assert_eq!(tx.amount, amount);
                        prop_assert_eq!(g.nodes["a"].balance, before - amount);
                    }
                    None => {
                        prop_assert!(amount <= 0.0 || amount > before);
                        prop_assert_eq!(g.nodes["a"].balance, before);
                    }
                }
                prop_assert!(g.nodes["a"].balance >= 0.0);
            }
        }
    }

    #[test]
    fn projection_is_flat_and_deduplicated() {
        let mut g = graph();
        honest(&mut g, "a");
        honest(&mut g, "b");
        g.spawn("evil_0", NodeRole::Adversary { quantum_advantage: 0.7 }, 0.51);
        g.add_edge("a", "b");
        g.add_edge("b", "evil_0");

        let projection = g.projection();
        assert_eq!(projection.nodes.len(), 3);
        assert_eq!(projection.edges.len(), 2);
        assert_eq!(projection.transaction_count, 0);
        let evil = projection.nodes.iter().find(|n| n.id == "evil_0").unwrap();
        assert!(evil.is_evil);
        // serializes without touching engine state
        let value = serde_json::to_value(&projection).unwrap();
        assert!(value.get("nodes").unwrap().is_array());
        assert!(value.get("edges").unwrap().is_array());
    }
}
