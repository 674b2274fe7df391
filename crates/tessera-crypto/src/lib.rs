pub mod condition;
pub mod hash;
pub mod keypair;

pub use condition::{ConditionDetails, ConditionError, Fulfillment};
pub use hash::{sha3_256, sha3_hex};
pub use keypair::{signing_key_from_b58, KeyError, KeyPair, PublicKey};
