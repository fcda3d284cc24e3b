//! # Transaction and Alert Records
//!
//! Immutable value objects exchanged between nodes. A [`Transaction`] carries a
//! content-derived id, an anchor committing to the sender's state at creation
//! time, and up to five parent ids chaining it to the sender's recent history.
//! An [`Alert`] is raised when two transactions from one sender collide on an
//! anchor; relaying an alert produces a fresh value with an incremented hop
//! count rather than mutating in place.

use serde::{Deserialize, Serialize};

use crate::{AlertId, Anchor, NodeId, Signature, Tick, TxId};

/// A value transfer between two nodes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// Content-derived fingerprint; unique, used as a mapping key everywhere
    pub id: TxId,
    /// Sender node id
    pub sender: NodeId,
    /// Recipient node id
    pub recipient: NodeId,
    /// Transferred amount; positive, checked against balance on the honest path
    pub amount: f64,
    /// Random nonce decorrelating identical-looking transactions
    pub nonce: u32,
    /// Commitment to the sender's state at creation time; a shared anchor
    /// across two same-sender transactions is the double-spend signal
    pub anchor: Anchor,
    /// Up to five ids of the sender's most recently issued transactions
    pub parents: Vec<TxId>,
    /// Logical creation time
    pub timestamp: Tick,
    /// Opaque signature over the signable content
    pub signature: Signature,
    /// Marks synthetic noise traffic, excluded from attack accounting
    pub is_chaff: bool,
}

impl Transaction {
    /// The content covered by the sender's signature: every field except the
    /// signature itself, with parents capped at five.
    pub fn signable_content(&self) -> String {
        let parents = self
            .parents
            .iter()
            .take(5)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("|");
        format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.sender, self.recipient, self.amount, self.nonce, self.anchor, parents,
            self.timestamp
        )
    }
}

/// Conflict notice naming a pair of same-anchor transactions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alert {
    /// Derived from the two conflicting transaction ids
    pub id: AlertId,
    /// First offending transaction (the one whose arrival exposed the pair)
    pub conflicting_tx_1: TxId,
    /// Second offending transaction (the one already known locally)
    pub conflicting_tx_2: TxId,
    /// The shared anchor that proved the conflict
    pub anchor: Anchor,
    /// Node that first noticed the conflict
    pub discovered_by: NodeId,
    /// Hop counter, incremented at each relay
    pub propagation_count: u32,
}

impl Alert {
    /// Build an alert for a newly detected conflicting pair
    pub fn new(incoming_tx: &str, known_tx: &str, anchor: &str, discovered_by: &str) -> Self {
        Self {
            id: format!("alert_{incoming_tx}_{known_tx}"),
            conflicting_tx_1: incoming_tx.to_string(),
            conflicting_tx_2: known_tx.to_string(),
            anchor: anchor.to_string(),
            discovered_by: discovered_by.to_string(),
            propagation_count: 0,
        }
    }

    /// A relayed copy with the hop counter incremented
    pub fn with_hop(&self) -> Self {
        Self {
            propagation_count: self.propagation_count + 1,
            ..self.clone()
        }
    }

    /// Whether the alert references the given transaction id
    pub fn references(&self, tx_id: &str) -> bool {
        self.conflicting_tx_1 == tx_id || self.conflicting_tx_2 == tx_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            id: "id".into(),
            sender: "a".into(),
            recipient: "b".into(),
            amount: 12.5,
            nonce: 99,
            anchor: "anchor".into(),
            parents: vec!["p1".into(), "p2".into()],
            timestamp: 4,
            signature: vec![1, 2, 3],
            is_chaff: false,
        }
    }

    #[test]
    fn signable_content_excludes_signature_and_chaff_flag() {
        let mut tx = sample_tx();
        let content = tx.signable_content();
        tx.signature = vec![9, 9, 9];
        tx.is_chaff = true;
        assert_eq!(content, tx.signable_content());
        assert_eq!(content, "a|b|12.5|99|anchor|p1|p2|4");
    }

    #[test]
    fn signable_content_caps_parents() {
        let mut tx = sample_tx();
        tx.parents = (0..7).map(|i| format!("p{i}")).collect();
        assert_eq!(tx.signable_content(), "a|b|12.5|99|anchor|p0|p1|p2|p3|p4|4");
    }

    #[test]
    fn alert_relay_creates_fresh_value() {
        let alert = Alert::new("t1", "t2", "anchor", "node_0");
        assert_eq!(alert.id, "alert_t1_t2");
        assert_eq!(alert.propagation_count, 0);

        let relayed = alert.with_hop();
        assert_eq!(relayed.propagation_count, 1);
        assert_eq!(alert.propagation_count, 0);
        assert_eq!(relayed.id, alert.id);
        assert!(relayed.references("t1") && relayed.references("t2"));
        assert!(!relayed.references("t3"));
    }
}
