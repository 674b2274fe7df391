pub mod canonical;
pub mod error;
pub mod registry;
pub mod transaction;
pub mod types;

pub use canonical::to_canonical_string;
pub use error::TesseraError;
pub use registry::{Operation, OperationRegistry};
pub use transaction::{
    Asset, Condition, Input, Output, OutputLink, Transaction, UnspentOutput,
};
pub use types::{AbciChain, Block, Election, PreCommitState, Validator, ValidatorSet};
