//! Crypto-condition engine.
//!
//! The ledger spends outputs through two condition kinds: a single Ed25519
//! signature leaf (`ed25519-sha-256`) and a t-of-n threshold node over
//! subconditions (`threshold-sha-256`). A condition is identified by a URI
//! derived from a SHA-256 fingerprint of the tree structure; a fulfillment is
//! the same tree carrying enough signatures to satisfy it.
//!
//! Fingerprints are structural only: two trees that describe the same
//! predicate produce the same condition URI no matter how or in which order
//! they were assembled. Signatures never enter the fingerprint.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::{Signature, Signer, SigningKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::keypair::{KeyError, PublicKey};

/// Verification cost of a single Ed25519 leaf, fixed by the condition format.
pub const ED25519_COST: u64 = 131_072;

/// Per-subcondition surcharge of a threshold node.
const THRESHOLD_SUBCOST: u64 = 1024;

pub const ED25519_SHA256: &str = "ed25519-sha-256";
pub const THRESHOLD_SHA256: &str = "threshold-sha-256";

#[derive(Debug, Error)]
pub enum ConditionError {
    #[error("malformed fulfillment encoding")]
    Parse,

    #[error("unknown condition type `{0}`")]
    UnknownType(String),

    #[error("threshold {threshold} out of range for {subconditions} subconditions")]
    ThresholdRange {
        threshold: u32,
        subconditions: usize,
    },

    #[error(transparent)]
    Key(#[from] KeyError),
}

// ── Condition details ────────────────────────────────────────────────────────

/// Structured, signature-free description of a condition as it appears in an
/// output's `condition.details` field on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConditionDetails {
    #[serde(rename = "ed25519-sha-256")]
    Ed25519Sha256 { public_key: String },

    #[serde(rename = "threshold-sha-256")]
    ThresholdSha256 {
        threshold: u32,
        subconditions: Vec<ConditionDetails>,
    },
}

impl ConditionDetails {
    /// All Ed25519 keys reachable from this node, in tree order.
    pub fn public_keys(&self) -> Vec<String> {
        match self {
            ConditionDetails::Ed25519Sha256 { public_key } => vec![public_key.clone()],
            ConditionDetails::ThresholdSha256 { subconditions, .. } => subconditions
                .iter()
                .flat_map(ConditionDetails::public_keys)
                .collect(),
        }
    }
}

// ── Fulfillment ──────────────────────────────────────────────────────────────

/// A condition tree, optionally carrying signatures. Unsigned it describes a
/// condition; signed it fulfills one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fulfillment {
    Ed25519Sha256 {
        public_key: PublicKey,
        signature: Option<Vec<u8>>,
    },
    ThresholdSha256 {
        threshold: u32,
        subfulfillments: Vec<Fulfillment>,
    },
}

impl Fulfillment {
    /// Unsigned single-signature leaf.
    pub fn ed25519(public_key: PublicKey) -> Self {
        Fulfillment::Ed25519Sha256 {
            public_key,
            signature: None,
        }
    }

    /// Unsigned t-of-n threshold node. The threshold must be in `1..=n`.
    pub fn threshold(
        threshold: u32,
        subfulfillments: Vec<Fulfillment>,
    ) -> Result<Self, ConditionError> {
        if threshold == 0 || threshold as usize > subfulfillments.len() {
            return Err(ConditionError::ThresholdRange {
                threshold,
                subconditions: subfulfillments.len(),
            });
        }
        Ok(Fulfillment::ThresholdSha256 {
            threshold,
            subfulfillments,
        })
    }

    /// Build an unsigned tree from its wire description.
    pub fn from_details(details: &ConditionDetails) -> Result<Self, ConditionError> {
        match details {
            ConditionDetails::Ed25519Sha256 { public_key } => {
                Ok(Fulfillment::ed25519(PublicKey::from_b58(public_key)?))
            }
            ConditionDetails::ThresholdSha256 {
                threshold,
                subconditions,
            } => {
                let subs = subconditions
                    .iter()
                    .map(Fulfillment::from_details)
                    .collect::<Result<Vec<_>, _>>()?;
                Fulfillment::threshold(*threshold, subs)
            }
        }
    }

    /// Wire description of this tree, signatures dropped.
    pub fn to_details(&self) -> ConditionDetails {
        match self {
            Fulfillment::Ed25519Sha256 { public_key, .. } => ConditionDetails::Ed25519Sha256 {
                public_key: public_key.to_b58(),
            },
            Fulfillment::ThresholdSha256 {
                threshold,
                subfulfillments,
            } => ConditionDetails::ThresholdSha256 {
                threshold: *threshold,
                subconditions: subfulfillments.iter().map(Fulfillment::to_details).collect(),
            },
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Fulfillment::Ed25519Sha256 { .. } => ED25519_SHA256,
            Fulfillment::ThresholdSha256 { .. } => THRESHOLD_SHA256,
        }
    }

    /// Verification cost: the fixed leaf cost, or for a threshold node the
    /// sum of the `t` most expensive subconditions plus a per-child surcharge.
    pub fn cost(&self) -> u64 {
        match self {
            Fulfillment::Ed25519Sha256 { .. } => ED25519_COST,
            Fulfillment::ThresholdSha256 {
                threshold,
                subfulfillments,
            } => {
                let mut costs: Vec<u64> = subfulfillments.iter().map(Fulfillment::cost).collect();
                costs.sort_unstable_by(|a, b| b.cmp(a));
                let dearest: u64 = costs.iter().take(*threshold as usize).sum();
                dearest + THRESHOLD_SUBCOST * subfulfillments.len() as u64
            }
        }
    }

    /// SHA-256 fingerprint of the tree structure. Subcondition entries of a
    /// threshold node are sorted, so subcondition order never changes the
    /// fingerprint.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        match self {
            Fulfillment::Ed25519Sha256 { public_key, .. } => {
                hasher.update(ED25519_SHA256.as_bytes());
                hasher.update(public_key.as_bytes());
            }
            Fulfillment::ThresholdSha256 {
                threshold,
                subfulfillments,
            } => {
                hasher.update(THRESHOLD_SHA256.as_bytes());
                hasher.update(threshold.to_be_bytes());
                let mut entries: Vec<[u8; 41]> = subfulfillments
                    .iter()
                    .map(|sub| {
                        let mut entry = [0u8; 41];
                        entry[0] = match sub {
                            Fulfillment::Ed25519Sha256 { .. } => 0,
                            Fulfillment::ThresholdSha256 { .. } => 1,
                        };
                        entry[1..9].copy_from_slice(&sub.cost().to_be_bytes());
                        entry[9..41].copy_from_slice(&sub.fingerprint());
                        entry
                    })
                    .collect();
                entries.sort_unstable();
                for entry in &entries {
                    hasher.update(entry);
                }
            }
        }
        hasher.finalize().into()
    }

    /// Canonical condition URI. Equal iff two trees describe the same
    /// predicate.
    pub fn condition_uri(&self) -> String {
        let fingerprint = URL_SAFE_NO_PAD.encode(self.fingerprint());
        let mut uri = format!(
            "ni:///sha-256;{}?fpt={}&cost={}",
            fingerprint,
            self.type_name(),
            self.cost()
        );
        if matches!(self, Fulfillment::ThresholdSha256 { .. }) {
            uri.push_str("&subtypes=ed25519-sha-256");
        }
        uri
    }

    /// Serialize the fulfillment (tree plus signatures) to its URI form.
    pub fn serialize_uri(&self) -> String {
        let bytes = bincode::serialize(self).expect("fulfillment serialization is infallible");
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Parse a fulfillment URI. Inverse of [`serialize_uri`].
    ///
    /// [`serialize_uri`]: Fulfillment::serialize_uri
    pub fn from_uri(uri: &str) -> Result<Self, ConditionError> {
        let bytes = URL_SAFE_NO_PAD.decode(uri).map_err(|_| ConditionError::Parse)?;
        let parsed: Fulfillment =
            bincode::deserialize(&bytes).map_err(|_| ConditionError::Parse)?;
        parsed.check_well_formed()?;
        Ok(parsed)
    }

    fn check_well_formed(&self) -> Result<(), ConditionError> {
        match self {
            Fulfillment::Ed25519Sha256 { signature, .. } => {
                if let Some(sig) = signature {
                    if sig.len() != 64 {
                        return Err(ConditionError::Parse);
                    }
                }
                Ok(())
            }
            Fulfillment::ThresholdSha256 {
                threshold,
                subfulfillments,
            } => {
                if *threshold == 0 || *threshold as usize > subfulfillments.len() {
                    return Err(ConditionError::ThresholdRange {
                        threshold: *threshold,
                        subconditions: subfulfillments.len(),
                    });
                }
                subfulfillments
                    .iter()
                    .try_for_each(Fulfillment::check_well_formed)
            }
        }
    }

    /// Whether enough signatures are attached to satisfy the tree. Says
    /// nothing about whether they verify.
    pub fn is_fulfilled(&self) -> bool {
        match self {
            Fulfillment::Ed25519Sha256 { signature, .. } => signature.is_some(),
            Fulfillment::ThresholdSha256 {
                threshold,
                subfulfillments,
            } => {
                let satisfied = subfulfillments
                    .iter()
                    .filter(|sub| sub.is_fulfilled())
                    .count();
                satisfied >= *threshold as usize
            }
        }
    }

    /// Whether any Ed25519 leaf in the tree carries `key`.
    pub fn has_leaf_for(&self, key: &PublicKey) -> bool {
        match self {
            Fulfillment::Ed25519Sha256 { public_key, .. } => public_key == key,
            Fulfillment::ThresholdSha256 {
                subfulfillments, ..
            } => subfulfillments.iter().any(|sub| sub.has_leaf_for(key)),
        }
    }

    /// Attach a signature at every Ed25519 leaf whose key matches `key`.
    /// Returns the number of leaves signed.
    ///
    /// Ed25519 signing is deterministic, so re-signing an already-signed
    /// leaf rewrites identical bytes and the operation is idempotent.
    pub fn sign(&mut self, message: &[u8], key: &SigningKey) -> usize {
        match self {
            Fulfillment::Ed25519Sha256 {
                public_key,
                signature,
            } => {
                if public_key.as_bytes() == &key.verifying_key().to_bytes() {
                    *signature = Some(key.sign(message).to_bytes().to_vec());
                    1
                } else {
                    0
                }
            }
            Fulfillment::ThresholdSha256 {
                subfulfillments, ..
            } => subfulfillments
                .iter_mut()
                .map(|sub| sub.sign(message, key))
                .sum(),
        }
    }

    /// Check the attached signatures against `message`: every signed leaf
    /// must verify and every threshold node must have at least `t` satisfied
    /// children.
    pub fn validate(&self, message: &[u8]) -> bool {
        match self {
            Fulfillment::Ed25519Sha256 {
                public_key,
                signature,
            } => {
                let Some(sig_bytes) = signature else {
                    return false;
                };
                let Ok(signature) = Signature::from_slice(sig_bytes) else {
                    return false;
                };
                let Ok(verifying) = public_key.verifying_key() else {
                    return false;
                };
                verifying.verify_strict(message, &signature).is_ok()
            }
            Fulfillment::ThresholdSha256 {
                threshold,
                subfulfillments,
            } => {
                let satisfied = subfulfillments
                    .iter()
                    .filter(|sub| sub.validate(message))
                    .count();
                satisfied >= *threshold as usize
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::KeyPair;

    fn leaf(pair: &KeyPair) -> Fulfillment {
        Fulfillment::ed25519(pair.public_key)
    }

    #[test]
    fn condition_uri_ignores_subcondition_order() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let forward = Fulfillment::threshold(1, vec![leaf(&a), leaf(&b)]).unwrap();
        let backward = Fulfillment::threshold(1, vec![leaf(&b), leaf(&a)]).unwrap();
        assert_eq!(forward.condition_uri(), backward.condition_uri());
    }

    #[test]
    fn condition_uri_ignores_signatures() {
        let pair = KeyPair::generate();
        let mut signed = leaf(&pair);
        let unsigned_uri = signed.condition_uri();
        signed.sign(b"message", &pair.signing_key());
        assert_eq!(signed.condition_uri(), unsigned_uri);
    }

    #[test]
    fn leaf_sign_and_validate() {
        let pair = KeyPair::generate();
        let mut fulfillment = leaf(&pair);
        assert!(!fulfillment.validate(b"digest"));
        assert_eq!(fulfillment.sign(b"digest", &pair.signing_key()), 1);
        assert!(fulfillment.validate(b"digest"));
        assert!(!fulfillment.validate(b"other digest"));
    }

    #[test]
    fn signing_is_idempotent() {
        let pair = KeyPair::generate();
        let mut fulfillment = leaf(&pair);
        fulfillment.sign(b"digest", &pair.signing_key());
        let once = fulfillment.serialize_uri();
        fulfillment.sign(b"digest", &pair.signing_key());
        assert_eq!(fulfillment.serialize_uri(), once);
    }

    #[test]
    fn one_of_two_threshold_accepts_either_signer() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();

        let mut signed_by_a = Fulfillment::threshold(1, vec![leaf(&a), leaf(&b)]).unwrap();
        signed_by_a.sign(b"digest", &a.signing_key());
        assert!(signed_by_a.validate(b"digest"));

        let mut signed_by_b = Fulfillment::threshold(1, vec![leaf(&a), leaf(&b)]).unwrap();
        signed_by_b.sign(b"digest", &b.signing_key());
        assert!(signed_by_b.validate(b"digest"));
    }

    #[test]
    fn two_of_three_threshold_needs_two_signers() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let c = KeyPair::generate();

        let mut fulfillment =
            Fulfillment::threshold(2, vec![leaf(&a), leaf(&b), leaf(&c)]).unwrap();
        fulfillment.sign(b"digest", &a.signing_key());
        assert!(!fulfillment.validate(b"digest"));
        fulfillment.sign(b"digest", &b.signing_key());
        assert!(fulfillment.validate(b"digest"));
    }

    #[test]
    fn fulfillment_uri_round_trips() {
        let pair = KeyPair::generate();
        let mut fulfillment = leaf(&pair);
        fulfillment.sign(b"digest", &pair.signing_key());
        let parsed = Fulfillment::from_uri(&fulfillment.serialize_uri()).unwrap();
        assert_eq!(parsed, fulfillment);
        assert!(parsed.validate(b"digest"));
    }

    #[test]
    fn malformed_uri_is_a_parse_error() {
        assert!(matches!(
            Fulfillment::from_uri("!!not base64!!"),
            Err(ConditionError::Parse)
        ));
        assert!(matches!(
            Fulfillment::from_uri("AAAA"),
            Err(ConditionError::Parse)
        ));
    }

    #[test]
    fn threshold_out_of_range_is_rejected() {
        let a = KeyPair::generate();
        assert!(Fulfillment::threshold(0, vec![leaf(&a)]).is_err());
        assert!(Fulfillment::threshold(2, vec![leaf(&a)]).is_err());
    }

    #[test]
    fn details_round_trip() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let tree = Fulfillment::threshold(2, vec![leaf(&a), leaf(&b)]).unwrap();
        let rebuilt = Fulfillment::from_details(&tree.to_details()).unwrap();
        assert_eq!(rebuilt, tree);
        assert_eq!(
            tree.to_details().public_keys(),
            vec![a.public_key_b58(), b.public_key_b58()]
        );
    }

    #[test]
    fn threshold_cost_counts_dearest_subconditions() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let c = KeyPair::generate();
        let tree = Fulfillment::threshold(2, vec![leaf(&a), leaf(&b), leaf(&c)]).unwrap();
        assert_eq!(tree.cost(), 2 * ED25519_COST + 3 * 1024);
    }
}
