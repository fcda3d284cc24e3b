//! # Adversarial Strategies
//!
//! Attack operations available to nodes tagged [`NodeRole::Adversary`]. The
//! adversary can issue two conflicting, independently valid-looking signed
//! transactions from one state commitment (bypassing the honest balance
//! check), and optionally split the resulting fork across trust clusters to
//! delay cross-cluster discovery. Its reconnaissance helpers model a
//! probabilistic detection/targeting edge (the configured "quantum
//! advantage"), not an actual algorithmic break.
//!
//! All strategies are [`NetworkGraph`] operations guarded on the node role;
//! honest nodes get `(None, None)` / empty results.

use rand::Rng;
use tracing::{debug, info};

use crate::crypto::{compute_anchor, tx_content_hash};
use crate::graph::NetworkGraph;
use crate::node::NodeRole;
use crate::transaction::Transaction;
use crate::{Anchor, NodeId};

impl NetworkGraph {
    /// The detection-evasion advantage of a node, when it is an adversary
    pub fn advantage(&self, id: &str) -> Option<f64> {
        match self.nodes.get(id)?.role {
            NodeRole::Adversary { quantum_advantage } => Some(quantum_advantage),
            NodeRole::Honest => None,
        }
    }

    /// Naive double spend: transaction A through the honest creation path,
    /// transaction B forged directly against the same anchor and parent list
    /// with a different recipient. Neither transaction is propagated here.
    /// Returns `(None, None)` when A cannot be created or the node is honest.
    pub fn double_spend_attack(
        &mut self,
        attacker: &str,
        target1: &str,
        target2: &str,
        amount: f64,
    ) -> (Option<Transaction>, Option<Transaction>) {
        if self.advantage(attacker).is_none() {
            return (None, None);
        }
        let Some(tx1) = self.create_transaction(attacker, target1, amount) else {
            return (None, None);
        };
        let tx2 = self.forge_conflicting(attacker, target2, &tx1);
        info!(
            %attacker,
            %target1,
            %target2,
            amount,
            "double spend pair issued"
        );
        (Some(tx1), Some(tx2))
    }

    /// Split-cluster double spend: floods transaction A only through peers at
    /// or above the reputation threshold and transaction B only through the
    /// rest, routing each half of the fork into a different trust cluster to
    /// desynchronize detection.
    pub fn sophisticated_double_spend(
        &mut self,
        attacker: &str,
        target1: &str,
        target2: &str,
        amount: f64,
        reputation_threshold: f64,
    ) -> (Option<Transaction>, Option<Transaction>) {
        if self.advantage(attacker).is_none() {
            return (None, None);
        }
        let Some(tx1) = self.create_transaction(attacker, target1, amount) else {
            return (None, None);
        };

        let (strong, weak) = self.split_peers_by_reputation(attacker, reputation_threshold);
        debug!(
            %attacker,
            strong = strong.len(),
            weak = weak.len(),
            "splitting fork across trust clusters"
        );

        self.propagate_transaction(&tx1, attacker, Some(&strong));
        let tx2 = self.forge_conflicting(attacker, target2, &tx1);
        self.propagate_transaction(&tx2, attacker, Some(&weak));
        info!(
            %attacker,
            %target1,
            %target2,
            amount,
            "split-cluster double spend launched"
        );
        (Some(tx1), Some(tx2))
    }

    /// Honest nodes whose reputation falls at or below the threshold; these are the attack
    /// targets. With probability equal to the attacker's advantage the cut
    /// widens by 0.2, modeling superior graph analysis.
    pub fn find_weak_peers(&mut self, attacker: &str, threshold: f64) -> Vec<NodeId> {
        let Some(advantage) = self.advantage(attacker) else {
            return Vec::new();
        };
        let effective = if self.rng().gen::<f64>() < advantage {
            threshold + 0.2
        } else {
            threshold
        };
        self.nodes
            .values()
            .filter(|node| !node.is_adversary() && node.reputation <= effective)
            .map(|node| node.id.clone())
            .collect()
    }

    /// Attempt to guess the target's next anchor from its observable state.
    /// Succeeds with probability `advantage x 0.3`; returns `None` otherwise.
    pub fn predict_anchor(&mut self, attacker: &str, target: &str) -> Option<Anchor> {
        let advantage = self.advantage(attacker)?;
        if self.rng().gen::<f64>() > advantage * 0.3 {
            return None;
        }
        let (balance, last_two) = {
            let node = self.nodes.get(target)?;
            (node.balance, node.last_issued_ids(2))
        };
        let guessed_nonce: u32 = self.rng().gen();
        Some(compute_anchor(balance, &last_two, guessed_nonce, self.clock()))
    }

    /// Forge the second half of a fork: same anchor and parents as the
    /// template, a new nonce and timestamp, a different recipient, a valid
    /// signature, and no balance check or deduction.
    fn forge_conflicting(
        &mut self,
        attacker: &str,
        recipient: &str,
        template: &Transaction,
    ) -> Transaction {
        let nonce = template.nonce.wrapping_add(1);
        let timestamp = self.tick();
        let anchor = template.anchor.clone();
        let parents = template.parents.clone();
        let id = tx_content_hash(
            attacker,
            recipient,
            template.amount,
            nonce,
            &anchor,
            &parents,
            timestamp,
        );
        let mut tx = Transaction {
            id: id.clone(),
            sender: attacker.to_string(),
            recipient: recipient.to_string(),
            amount: template.amount,
            nonce,
            anchor,
            parents,
            timestamp,
            signature: Vec::new(),
            is_chaff: false,
        };
        let keypair = match self.nodes.get(attacker) {
            Some(node) => node.keypair.clone(),
            None => return tx,
        };
        tx.signature = self.sign_content(&tx.signable_content(), &keypair);
        if let Some(node) = self.nodes.get_mut(attacker) {
            node.my_transactions.push(tx.clone());
            node.local_graph.insert(id, tx.clone());
        }
        tx
    }

    /// Partition the attacker's peers into strong (reputation at or above the
    /// threshold) and weak halves, with positional fallbacks so neither side
    /// ends up empty while peers exist.
    fn split_peers_by_reputation(
        &self,
        attacker: &str,
        threshold: f64,
    ) -> (Vec<NodeId>, Vec<NodeId>) {
        let peers = self.peers(attacker);
        let reputation_of = |id: &NodeId| {
            self.nodes
                .get(id)
                .map(|node| node.reputation)
                .unwrap_or(0.5)
        };
        let mut strong: Vec<NodeId> = peers
            .iter()
            .filter(|peer| reputation_of(peer) >= threshold)
            .cloned()
            .collect();
        let mut weak: Vec<NodeId> = peers
            .iter()
            .filter(|peer| reputation_of(peer) < threshold)
            .cloned()
            .collect();
        if weak.is_empty() && !peers.is_empty() {
            let mid = peers.len() / 2;
            strong = peers[..mid].to_vec();
            weak = peers[mid..].to_vec();
        }
        if strong.is_empty() {
            strong = peers.clone();
        }
        if weak.is_empty() {
            weak = peers
                .iter()
                .filter(|peer| !strong.contains(peer))
                .cloned()
                .collect();
            if weak.is_empty() {
                weak = peers;
            }
        }
        (strong, weak)
    }
}
