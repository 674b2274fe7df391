//! Operation routing.
//!
//! The ledger recognises a fixed table of operation tags, built once at node
//! construction and read-only afterwards. Unknown tags route to the CREATE
//! handler so newer election types degrade gracefully instead of splitting
//! the network on a hard reject.

use std::collections::HashMap;

use tracing::warn;

pub const CREATE: &str = "CREATE";
pub const TRANSFER: &str = "TRANSFER";
pub const VALIDATOR_ELECTION: &str = "VALIDATOR_ELECTION";
pub const CHAIN_MIGRATION_ELECTION: &str = "CHAIN_MIGRATION_ELECTION";
pub const VOTE: &str = "VOTE";

/// Handler kind behind an operation tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Create,
    Transfer,
    ValidatorElection,
    ChainMigrationElection,
    Vote,
}

impl Operation {
    /// Whether transactions of this kind consume prior outputs. Votes spend
    /// the voting outputs an election issued, so they behave like transfers.
    pub fn spends_inputs(&self) -> bool {
        matches!(self, Operation::Transfer | Operation::Vote)
    }
}

/// Explicit operation table, injected where transactions are parsed and
/// validated.
pub struct OperationRegistry {
    table: HashMap<String, Operation>,
}

impl OperationRegistry {
    /// The table a stock node ships with.
    pub fn with_default_operations() -> Self {
        let mut registry = Self {
            table: HashMap::new(),
        };
        registry.register(CREATE, Operation::Create);
        registry.register(TRANSFER, Operation::Transfer);
        registry.register(VALIDATOR_ELECTION, Operation::ValidatorElection);
        registry.register(CHAIN_MIGRATION_ELECTION, Operation::ChainMigrationElection);
        registry.register(VOTE, Operation::Vote);
        registry
    }

    pub fn register(&mut self, tag: &str, operation: Operation) {
        self.table.insert(tag.to_string(), operation);
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.table.contains_key(tag)
    }

    /// Resolve a tag to its handler. Unknown tags fall back to CREATE.
    pub fn resolve(&self, tag: &str) -> Operation {
        match self.table.get(tag) {
            Some(operation) => *operation,
            None => {
                warn!(operation = tag, "unknown operation tag, routing to the CREATE handler");
                Operation::Create
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_covers_all_known_tags() {
        let registry = OperationRegistry::with_default_operations();
        for tag in [CREATE, TRANSFER, VALIDATOR_ELECTION, CHAIN_MIGRATION_ELECTION, VOTE] {
            assert!(registry.is_registered(tag));
        }
        assert_eq!(registry.resolve(TRANSFER), Operation::Transfer);
        assert_eq!(registry.resolve(VOTE), Operation::Vote);
    }

    #[test]
    fn unknown_tags_route_to_create() {
        let registry = OperationRegistry::with_default_operations();
        assert!(!registry.is_registered("UPGRADE_ELECTION"));
        assert_eq!(registry.resolve("UPGRADE_ELECTION"), Operation::Create);
    }

    #[test]
    fn spend_classification() {
        assert!(Operation::Transfer.spends_inputs());
        assert!(Operation::Vote.spends_inputs());
        assert!(!Operation::Create.spends_inputs());
        assert!(!Operation::ValidatorElection.spends_inputs());
    }
}
