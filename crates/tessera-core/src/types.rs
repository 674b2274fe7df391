use serde::{Deserialize, Serialize};

/// A committed block: the consensus app hash, the height, and the ids of the
/// transactions it finalized. Heights are monotone; one block per height.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub app_hash: String,
    pub height: u64,
    pub transactions: Vec<String>,
}

/// One member of a validator set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub public_key: String,
    pub voting_power: u64,
}

/// The validator set effective from `height` onward.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSet {
    pub height: u64,
    pub validators: Vec<Validator>,
}

/// Status of a governance election, keyed by the election transaction id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    pub election_id: String,
    pub height: u64,
    pub is_concluded: bool,
}

/// Transactions shredded ahead of a block commit. Exactly one record is
/// retained; it is how a torn commit is detected on restart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreCommitState {
    pub height: u64,
    pub transactions: Vec<String>,
}

/// Identity of the chain the consensus engine drives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbciChain {
    pub height: u64,
    pub chain_id: String,
    pub is_synced: bool,
}
