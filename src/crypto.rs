//! # Identity & Commitment Layer
//!
//! Deterministic stand-ins for the cryptographic primitives the protocol relies
//! on: key pairs, state commitments ("anchors") and an authorship signature
//! scheme. Real cryptographic strength is an explicit non-goal; what matters
//! is the behavioral contract:
//!
//! - a public key is derived one-way from its private secret
//! - two anchors are equal iff all four committed components are equal
//! - a signature verifies iff content, signature and key all match exactly
//!
//! Signing is registry-backed: the [`SignatureRegistry`] is an explicit
//! collaborator owned by the network graph and scoped to one simulation run,
//! never process-global state.

use rand::Rng;
use sha2::{Digest, Sha256, Sha512};
use std::collections::HashMap;

use crate::{Anchor, PublicKey, Signature, Tick, TxId};

/// A node's key pair. The public half is a one-way digest of the private
/// secret, so the secret is not recoverable from the published identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keypair {
    /// Published identity, hex(Sha256(private))
    pub public: PublicKey,
    /// Random 32-byte secret, hex-encoded
    pub private: String,
}

impl Keypair {
    /// Generate a fresh key pair from the given randomness source
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        let mut secret = [0u8; 32];
        rng.fill(&mut secret);
        let private = hex::encode(secret);
        let public = hex::encode(Sha256::digest(private.as_bytes()));
        Self { public, private }
    }
}

/// Compute a state commitment over a node's balance, its last two issued
/// transaction ids, a nonce and a timestamp tick. Field positions are fixed
/// (missing ids encode as empty strings), so two anchors collide iff all four
/// components are equal.
pub fn compute_anchor(balance: f64, last_two: &[TxId], nonce: u32, timestamp: Tick) -> Anchor {
    let first = last_two.first().map(String::as_str).unwrap_or("");
    let second = last_two.get(1).map(String::as_str).unwrap_or("");
    let payload = format!("{balance}|{first}|{second}|{nonce}|{timestamp}");
    hex::encode(Sha512::digest(payload.as_bytes()))
}

/// Content-derived transaction fingerprint; used as the transaction id and as
/// a mapping key everywhere. At most five parent ids participate.
pub fn tx_content_hash(
    sender: &str,
    recipient: &str,
    amount: f64,
    nonce: u32,
    anchor: &str,
    parents: &[TxId],
    timestamp: Tick,
) -> TxId {
    let mut parts: Vec<&str> = Vec::with_capacity(parents.len() + 6);
    let amount_s = amount.to_string();
    let nonce_s = nonce.to_string();
    let timestamp_s = timestamp.to_string();
    parts.push(sender);
    parts.push(recipient);
    parts.push(&amount_s);
    parts.push(&nonce_s);
    parts.push(anchor);
    for parent in parents.iter().take(5) {
        parts.push(parent);
    }
    parts.push(&timestamp_s);
    hex::encode(Sha512::digest(parts.join("|").as_bytes()))
}

fn data_digest(content: &str) -> String {
    hex::encode(Sha512::digest(content.as_bytes()))
}

/// Registry-backed signature scheme scoped to one simulation run.
///
/// A signature is a digest of the private secret and the content digest; the
/// registry remembers which (content, public key) pairs have been signed so
/// verification can reject any altered content, signature or key.
#[derive(Debug, Clone, Default)]
pub struct SignatureRegistry {
    entries: HashMap<(String, PublicKey), Signature>,
}

impl SignatureRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign content with the given key pair and record the signature
    pub fn sign(&mut self, content: &str, keypair: &Keypair) -> Signature {
        let digest = data_digest(content);
        let payload = format!("{}{}", keypair.private, digest);
        let signature = Sha512::digest(payload.as_bytes()).to_vec();
        self.entries
            .insert((digest, keypair.public.clone()), signature.clone());
        signature
    }

    /// Verify a signature against content and a public key.
    ///
    /// Returns true iff this exact content was signed under this exact public
    /// key and the stored signature matches byte for byte.
    pub fn verify(&self, content: &str, signature: &Signature, public: &str) -> bool {
        let digest = data_digest(content);
        match self.entries.get(&(digest, public.to_string())) {
            Some(recorded) => recorded == signature,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(1)
    }

    #[test]
    fn keypair_public_is_derived_one_way() {
        let kp = Keypair::generate(&mut rng());
        assert_eq!(kp.public.len(), 64); // sha256 hex
        assert_eq!(kp.private.len(), 64); // 32 bytes hex
        assert_ne!(kp.public, kp.private);
        assert_eq!(
            kp.public,
            hex::encode(Sha256::digest(kp.private.as_bytes()))
        );
    }

    #[test]
    fn anchor_equal_iff_components_equal() {
        let last = vec!["t1".to_string(), "t2".to_string()];
        let a = compute_anchor(1000.0, &last, 12345, 7);
        assert_eq!(a.len(), 128); // sha512 hex
        assert_eq!(a, compute_anchor(1000.0, &last, 12345, 7));
        assert_ne!(a, compute_anchor(999.0, &last, 12345, 7));
        assert_ne!(a, compute_anchor(1000.0, &last, 12346, 7));
        assert_ne!(a, compute_anchor(1000.0, &last, 12345, 8));
        assert_ne!(a, compute_anchor(1000.0, &[], 12345, 7));
    }

    #[test]
    fn content_hash_caps_parents_at_five() {
        let parents: Vec<TxId> = (0..7).map(|i| format!("p{i}")).collect();
        let first_five = parents[..5].to_vec();
        let h1 = tx_content_hash("a", "b", 10.0, 1, "anchor", &parents, 3);
        let h2 = tx_content_hash("a", "b", 10.0, 1, "anchor", &first_five, 3);
        assert_eq!(h1, h2);
        let h3 = tx_content_hash("a", "b", 10.0, 1, "anchor", &parents[..4], 3);
        assert_ne!(h1, h3);
    }

    #[test]
    fn sign_verify_contract_holds_exactly() {
        let mut registry = SignatureRegistry::new();
        let mut rng = rng();
        let kp = Keypair::generate(&mut rng);
        let other = Keypair::generate(&mut rng);

        let sig = registry.sign("payload", &kp);
        assert!(registry.verify("payload", &sig, &kp.public));

        // any alteration of content, signature or key fails
        assert!(!registry.verify("payload2", &sig, &kp.public));
        let mut tampered = sig.clone();
        tampered[0] ^= 0xff;
        assert!(!registry.verify("payload", &tampered, &kp.public));
        assert!(!registry.verify("payload", &sig, &other.public));
    }

    #[test]
    fn signatures_depend_on_key_and_content() {
        let mut registry = SignatureRegistry::new();
        let kp1 = Keypair::generate(&mut rng());
        let mut rng2 = ChaCha8Rng::seed_from_u64(2);
        let kp2 = Keypair::generate(&mut rng2);

        let s1 = registry.sign("data", &kp1);
        let s2 = registry.sign("data", &kp2);
        let s3 = registry.sign("other", &kp1);
        assert_ne!(s1, s2);
        assert_ne!(s1, s3);
    }
}
