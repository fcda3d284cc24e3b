//! # Node State and Behavior
//!
//! The unit of network state: balance, bounded reputation, the node's local
//! view of the ledger, and the bookkeeping behind conflict detection. A node is
//! honest or adversarial by tagged role, not by subtype; the adversarial
//! strategies themselves live in [`crate::adversary`] and key off
//! [`NodeRole::Adversary`].
//!
//! Operations that need collaborators the node does not own (the signature
//! registry, the seeded rng, the logical clock, other nodes' keys and
//! reputations) are driven through [`crate::graph::NetworkGraph`]; this module
//! holds the purely node-local state transitions.

use indexmap::{IndexMap, IndexSet};

use crate::crypto::Keypair;
use crate::transaction::{Alert, Transaction};
use crate::{AlertId, NodeId, ReputationParams, TxId};

/// Behavioral role of a node, selected by configuration
#[derive(Debug, Clone, PartialEq)]
pub enum NodeRole {
    /// Follows the protocol
    Honest,
    /// Runs double-spend strategies with the given detection-evasion advantage
    Adversary {
        /// Probability multiplier for anchor guessing and weak-target analysis
        quantum_advantage: f64,
    },
}

/// A network participant and its local view of the ledger
#[derive(Debug, Clone)]
pub struct Node {
    /// Node identifier
    pub id: NodeId,
    /// Behavioral role
    pub role: NodeRole,
    /// Trust score, kept within the configured bounds at all times
    pub reputation: f64,
    /// Spendable balance; authoritative for this node's own outgoing transfers
    pub balance: f64,
    /// Identity key pair, generated at construction
    pub keypair: Keypair,
    /// Transactions this node has seen, by id; grows monotonically
    pub local_graph: IndexMap<TxId, Transaction>,
    /// Locally inferred balances of observed counterparties; best-effort
    pub known_balances: IndexMap<NodeId, f64>,
    /// Alerts already processed, by id; the de-duplication set
    pub pending_alerts: IndexMap<AlertId, Alert>,
    /// Transaction ids flagged as part of a detected conflict; permanently
    /// excluded from confidence scoring
    pub conflicting_tx_ids: IndexSet<TxId>,
    /// Self-issued transactions in issue order; source of parent/anchor chaining
    pub my_transactions: Vec<Transaction>,
}

impl Node {
    /// Create a node with a fresh key pair
    pub fn new(
        id: &str,
        role: NodeRole,
        initial_reputation: f64,
        initial_balance: f64,
        keypair: Keypair,
    ) -> Self {
        let mut known_balances = IndexMap::new();
        known_balances.insert(id.to_string(), initial_balance);
        Self {
            id: id.to_string(),
            role,
            reputation: initial_reputation,
            balance: initial_balance,
            keypair,
            local_graph: IndexMap::new(),
            known_balances,
            pending_alerts: IndexMap::new(),
            conflicting_tx_ids: IndexSet::new(),
            my_transactions: Vec::new(),
        }
    }

    /// Whether this node runs adversarial strategies
    pub fn is_adversary(&self) -> bool {
        matches!(self.role, NodeRole::Adversary { .. })
    }

    /// Ids of the most recently issued transactions, oldest first, at most `n`
    pub fn last_issued_ids(&self, n: usize) -> Vec<TxId> {
        let start = self.my_transactions.len().saturating_sub(n);
        self.my_transactions[start..]
            .iter()
            .map(|tx| tx.id.clone())
            .collect()
    }

    /// Raise reputation, clamped to the upper bound
    pub fn reward(&mut self, amount: f64, max_reputation: f64) {
        self.reputation = (self.reputation + amount).min(max_reputation);
    }

    /// Lower reputation, floored at the lower bound
    pub fn penalize(&mut self, amount: f64, min_reputation: f64) {
        self.reputation = (self.reputation - amount).max(min_reputation);
    }

    /// Natural per-step reputation decay; inactive nodes lose weight over time
    pub fn step_decay(&mut self, params: &ReputationParams) {
        self.penalize(params.decay_per_step, params.min_reputation);
    }

    /// Scan locally known same-sender transactions for an anchor collision
    /// with the incoming one. A shared anchor with the same amount is a
    /// replay; a shared anchor with a different recipient is a divergent
    /// double spend. Returns the id of the first colliding transaction.
    pub fn find_conflict(&self, tx: &Transaction) -> Option<TxId> {
        for (existing_id, existing) in &self.local_graph {
            if existing.sender != tx.sender || *existing_id == tx.id {
                continue;
            }
            if existing.anchor == tx.anchor
                && (existing.amount == tx.amount || existing.recipient != tx.recipient)
            {
                return Some(existing_id.clone());
            }
        }
        None
    }

    /// Accept a verified, conflict-free incoming transaction: insert it, clear
    /// any stale conflict flag, adjust inferred counterparty balances, and take
    /// the forwarding reward.
    pub fn accept_transaction(
        &mut self,
        tx: Transaction,
        initial_balance: f64,
        params: &ReputationParams,
    ) {
        self.conflicting_tx_ids.shift_remove(&tx.id);

        let sender_balance = self
            .known_balances
            .get(&tx.sender)
            .copied()
            .unwrap_or(initial_balance);
        self.known_balances
            .insert(tx.sender.clone(), sender_balance - tx.amount);
        let recipient_balance = self
            .known_balances
            .get(&tx.recipient)
            .copied()
            .unwrap_or(initial_balance);
        self.known_balances
            .insert(tx.recipient.clone(), recipient_balance + tx.amount);

        self.local_graph.insert(tx.id.clone(), tx);
        self.reward(params.reward_per_tx_forwarded, params.max_reputation);
    }

    /// Process an alert locally. Returns false when the alert id was already
    /// known (idempotent); otherwise marks both referenced transaction ids as
    /// conflicting and pins inferred balances for their senders.
    pub fn apply_alert(&mut self, alert: Alert, initial_balance: f64) -> bool {
        if self.pending_alerts.contains_key(&alert.id) {
            return false;
        }
        self.conflicting_tx_ids
            .insert(alert.conflicting_tx_1.clone());
        self.conflicting_tx_ids
            .insert(alert.conflicting_tx_2.clone());
        for tx_id in [&alert.conflicting_tx_1, &alert.conflicting_tx_2] {
            if let Some(tx) = self.local_graph.get(tx_id) {
                let sender = tx.sender.clone();
                self.known_balances.entry(sender).or_insert(initial_balance);
            }
        }
        self.pending_alerts.insert(alert.id.clone(), alert);
        true
    }
}
