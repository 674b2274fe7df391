//! The validation and commit pipeline.
//!
//! `check_transaction` runs concurrently against a snapshot of committed
//! state; `deliver_transaction` and `commit_block` are serialized by the
//! consensus engine, one height at a time. Structural checks, canonical
//! encoding and fulfillment verification hold no mutable shared state — the
//! only guarded structures are the verification memo and the in-flight block
//! draft.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use serde_json::Value;
use tracing::{info, warn};

use tessera_core::transaction::{input_signing_digest, Asset, Output, OutputLink};
use tessera_core::types::{AbciChain, Block, PreCommitState, ValidatorSet};
use tessera_core::{OperationRegistry, TesseraError, Transaction};

use crate::store::LedgerStore;

/// Matches the bound the verification memo has always run with.
const INPUT_CACHE_CAPACITY: usize = 16_384;

/// Per-input verification is pure in these four fields, so verdicts memoize
/// across mempool re-checks and block delivery of the same transaction.
#[derive(Clone, PartialEq, Eq, Hash)]
struct InputCacheKey {
    fulfillment: String,
    spend: bool,
    message: [u8; 32],
    output_condition: Option<String>,
}

#[derive(Default)]
struct BlockDraft {
    height: u64,
    transactions: Vec<Transaction>,
}

// ── StateEngine ──────────────────────────────────────────────────────────────

/// Decides which transactions may enter a block and applies committed blocks
/// to the store as one atomic unit.
pub struct StateEngine {
    store: Arc<LedgerStore>,
    registry: Arc<OperationRegistry>,
    input_cache: Mutex<LruCache<InputCacheKey, bool>>,
    draft: Mutex<BlockDraft>,
}

impl StateEngine {
    pub fn new(store: Arc<LedgerStore>, registry: Arc<OperationRegistry>) -> Self {
        let capacity = NonZeroUsize::new(INPUT_CACHE_CAPACITY).expect("capacity is non-zero");
        Self {
            store,
            registry,
            input_cache: Mutex::new(LruCache::new(capacity)),
            draft: Mutex::new(BlockDraft::default()),
        }
    }

    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    // ── Consensus-facing surface ─────────────────────────────────────────────

    /// Mempool admission check against the last committed snapshot. Safe for
    /// concurrent callers; a stale read here is re-checked at delivery.
    pub fn check_transaction(&self, value: &Value) -> Result<String, TesseraError> {
        let tx = Transaction::from_value(value, &self.registry)?;
        self.validate_transaction(&tx, &[])?;
        Ok(tx.id.expect("validated transactions carry an id"))
    }

    /// Open the block at `height`, discarding any stale draft.
    pub fn begin_block(&self, height: u64) {
        let mut draft = self.draft.lock().expect("draft lock is never poisoned");
        draft.height = height;
        draft.transactions.clear();
    }

    /// Validate an ordered transaction against committed state plus the
    /// in-flight block, then stage it. Once consensus has ordered a
    /// transaction this either succeeds or the block is rejected — it is
    /// never silently skipped.
    pub fn deliver_transaction(&self, value: &Value) -> Result<String, TesseraError> {
        let tx = Transaction::from_value(value, &self.registry)?;
        let mut draft = self.draft.lock().expect("draft lock is never poisoned");
        self.validate_transaction(&tx, &draft.transactions)?;
        let id = tx.id.clone().expect("validated transactions carry an id");
        draft.transactions.push(tx);
        Ok(id)
    }

    /// Persist the staged block: pre-commit record, assets, metadata, the
    /// four shredded relations, UTXO deltas, and finally the block row.
    ///
    /// A storage failure in here is fatal — the caller must halt the node
    /// rather than keep serving a store a peer could have diverged from.
    pub fn commit_block(&self, app_hash: &str) -> Result<Block, TesseraError> {
        let (height, transactions) = {
            let mut draft = self.draft.lock().expect("draft lock is never poisoned");
            (draft.height, std::mem::take(&mut draft.transactions))
        };

        let tx_ids: Vec<String> = transactions
            .iter()
            .filter_map(|tx| tx.id.clone())
            .collect();
        self.store.store_pre_commit_state(&PreCommitState {
            height,
            transactions: tx_ids.clone(),
        })?;

        let mut assets = Vec::new();
        let mut metadata = Vec::new();
        for tx in &transactions {
            let id = tx.id.clone().expect("delivered transactions carry an id");
            if let Some(Asset::Data(data)) = &tx.asset {
                assets.push((id.clone(), data.clone()));
            }
            if let Some(meta) = &tx.metadata {
                metadata.push((id, meta.clone()));
            }
        }
        self.store.store_assets(&assets)?;
        self.store.store_metadata(&metadata)?;

        if let Err(err) = self.store.store_transactions(&transactions) {
            // Re-delivery of a block that already committed leaves the rows
            // in place; anything else aborts the commit.
            let already_committed = matches!(err, TesseraError::DuplicateKey(_))
                && self.store.get_block(height)?.is_some();
            if !already_committed {
                return Err(err);
            }
            warn!(height, error = %err, "skipping transaction rows of a re-applied block");
        }

        let mut created = Vec::new();
        let mut consumed: Vec<OutputLink> = Vec::new();
        for tx in &transactions {
            created.extend(tx.unspent_outputs(&self.registry));
            consumed.extend(tx.spent_outputs().cloned());
        }
        self.store.store_unspent_outputs(&created)?;
        self.store.delete_unspent_outputs(&consumed)?;

        let block = Block {
            app_hash: app_hash.to_string(),
            height,
            transactions: tx_ids,
        };
        self.store.store_block(&block)?;
        self.store.flush()?;

        info!(height, transactions = block.transactions.len(), "committed block");
        Ok(block)
    }

    /// Undo a torn commit after a restart: when the pre-commit record is
    /// ahead of the latest block, its transactions were shredded but never
    /// finalized.
    pub fn rollback(&self) -> Result<(), TesseraError> {
        let Some(pre_commit) = self.store.get_pre_commit_state()? else {
            return Ok(());
        };
        let committed = self
            .store
            .latest_block()?
            .map(|block| block.height)
            .unwrap_or(0);
        if pre_commit.height <= committed {
            return Ok(());
        }
        warn!(height = pre_commit.height, "rolling back unfinalized block");

        let staged_ids: HashSet<&String> = pre_commit.transactions.iter().collect();
        let staged = self.store.get_transactions(&pre_commit.transactions)?;

        // Reverse the UTXO effects: drop outputs the torn block created and
        // restore the rows it consumed, except links into the torn block
        // itself.
        let mut created = Vec::new();
        let mut restored = Vec::new();
        for tx in &staged {
            created.extend(
                tx.unspent_outputs(&self.registry)
                    .map(|utxo| OutputLink::new(utxo.transaction_id, utxo.output_index)),
            );
            for link in tx.spent_outputs() {
                if staged_ids.contains(&link.transaction_id) {
                    continue;
                }
                if let Some(source) = self.store.get_transaction(&link.transaction_id)? {
                    if let Some(utxo) = source
                        .unspent_outputs(&self.registry)
                        .nth(link.output_index as usize)
                    {
                        restored.push(utxo);
                    }
                }
            }
        }
        self.store.delete_unspent_outputs(&created)?;
        self.store.store_unspent_outputs(&restored)?;

        self.store.delete_transactions(&pre_commit.transactions)?;
        self.store.delete_validator_set(pre_commit.height)?;
        self.store.delete_elections(pre_commit.height)?;
        self.input_cache
            .lock()
            .expect("cache lock is never poisoned")
            .clear();
        Ok(())
    }

    pub fn load_validator_set(
        &self,
        height: Option<u64>,
    ) -> Result<Option<ValidatorSet>, TesseraError> {
        self.store.get_validator_set(height)
    }

    pub fn load_abci_chain(&self) -> Result<Option<AbciChain>, TesseraError> {
        self.store.get_latest_abci_chain()
    }

    /// Record chain identity at genesis or after a migration election.
    pub fn init_chain(&self, chain_id: &str) -> Result<(), TesseraError> {
        let height = self
            .store
            .latest_block()?
            .map(|block| block.height + 1)
            .unwrap_or(0);
        self.store.store_abci_chain(&AbciChain {
            height,
            chain_id: chain_id.to_string(),
            is_synced: true,
        })
    }

    // ── Validation ───────────────────────────────────────────────────────────

    /// Full validation of `tx` against committed state plus the
    /// `current` in-flight batch.
    pub fn validate_transaction(
        &self,
        tx: &Transaction,
        current: &[Transaction],
    ) -> Result<(), TesseraError> {
        tx.validate_structure(&self.registry)?;
        let id = tx.id.as_deref().expect("structurally valid transactions carry an id");

        let duplicate = current
            .iter()
            .any(|pending| pending.id.as_deref() == Some(id));
        if duplicate || self.store.transaction_exists(id)? {
            return Err(TesseraError::DuplicateKey(format!(
                "transaction `{id}` already exists"
            )));
        }

        if self.registry.resolve(&tx.operation).spends_inputs() {
            self.validate_spend(tx, current)
        } else {
            if !self.verify_inputs(tx, None)? {
                return Err(TesseraError::InvalidSignature(
                    "transaction signature is invalid".into(),
                ));
            }
            Ok(())
        }
    }

    /// Semantic checks for spend operations: inputs exist, nothing is spent
    /// twice, one asset, conserved amounts, verifying fulfillments.
    fn validate_spend(
        &self,
        tx: &Transaction,
        current: &[Transaction],
    ) -> Result<(), TesseraError> {
        let id = tx.id.as_deref().unwrap_or_default();

        let mut input_txs = Vec::with_capacity(tx.inputs.len());
        let mut consumed_outputs = Vec::with_capacity(tx.inputs.len());
        for input in &tx.inputs {
            let link = input
                .fulfills
                .as_ref()
                .expect("structural validation requires fulfills on spends");

            let input_tx = match self.store.get_transaction(&link.transaction_id)? {
                Some(found) => found,
                None => current
                    .iter()
                    .find(|pending| pending.id.as_deref() == Some(link.transaction_id.as_str()))
                    .cloned()
                    .ok_or_else(|| TesseraError::InputDoesNotExist(link.transaction_id.clone()))?,
            };

            if self
                .get_spent(&link.transaction_id, link.output_index, current)?
                .is_some()
            {
                return Err(TesseraError::DoubleSpend(format!(
                    "output {link} was already spent"
                )));
            }

            let output = input_tx
                .outputs
                .get(link.output_index as usize)
                .ok_or_else(|| TesseraError::InputDoesNotExist(link.to_string()))?;
            consumed_outputs.push(output.clone());
            input_txs.push(input_tx);
        }

        if !tx.spends_distinct_outputs() {
            return Err(TesseraError::DoubleSpend(format!(
                "transaction `{id}` spends the same output twice"
            )));
        }

        let asset_id = Transaction::get_asset_id(input_txs.iter(), &self.registry)?;
        let declared = match &tx.asset {
            Some(Asset::Link(linked)) => linked.as_str(),
            _ => "",
        };
        if asset_id != declared {
            return Err(TesseraError::AssetIdMismatch(
                "the asset id of the inputs does not match the declared asset id".into(),
            ));
        }

        let input_amount = sum_amounts(consumed_outputs.iter().map(|output| output.amount))?;
        let output_amount = sum_amounts(tx.outputs.iter().map(|output| output.amount))?;
        if input_amount != output_amount {
            return Err(TesseraError::AmountError(format!(
                "inputs carry {input_amount} but outputs carry {output_amount}"
            )));
        }

        if !self.verify_inputs(tx, Some(&consumed_outputs))? {
            return Err(TesseraError::InvalidSignature(
                "transaction signature is invalid".into(),
            ));
        }
        Ok(())
    }

    /// The transaction consuming `(txid, output_index)`, searching committed
    /// state first and then the in-flight batch.
    pub fn get_spent(
        &self,
        txid: &str,
        output_index: u32,
        current: &[Transaction],
    ) -> Result<Option<Transaction>, TesseraError> {
        if let Some(spender) = self.store.get_spent(txid, output_index)? {
            return Ok(Some(spender));
        }
        for pending in current {
            for link in pending.spent_outputs() {
                if link.transaction_id == txid && link.output_index == output_index {
                    return Ok(Some(pending.clone()));
                }
            }
        }
        Ok(None)
    }

    /// Per-input fulfillment verification, memoized.
    fn verify_inputs(
        &self,
        tx: &Transaction,
        consumed: Option<&[Output]>,
    ) -> Result<bool, TesseraError> {
        if let Some(outputs) = consumed {
            if outputs.len() != tx.inputs.len() {
                return Err(TesseraError::Structural(
                    "inputs and consumed outputs must have the same count".into(),
                ));
            }
        }
        let base = tx.signing_serialization()?;
        for (idx, input) in tx.inputs.iter().enumerate() {
            let Some(fulfillment) = &input.fulfillment else {
                return Ok(false);
            };
            let message = input_signing_digest(&base, input.fulfills.as_ref());
            let output_condition =
                consumed.map(|outputs| outputs[idx].condition.uri.clone());
            let key = InputCacheKey {
                fulfillment: fulfillment.serialize_uri(),
                spend: consumed.is_some(),
                message,
                output_condition: output_condition.clone(),
            };

            let cached = {
                let mut cache = self.input_cache.lock().expect("cache lock is never poisoned");
                cache.get(&key).copied()
            };
            let valid = match cached {
                Some(verdict) => verdict,
                None => {
                    let verdict = input.verify(&message, output_condition.as_deref());
                    let mut cache =
                        self.input_cache.lock().expect("cache lock is never poisoned");
                    cache.put(key, verdict);
                    verdict
                }
            };
            if !valid {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn sum_amounts(amounts: impl Iterator<Item = u64>) -> Result<u64, TesseraError> {
    amounts.into_iter().try_fold(0u64, |total, amount| {
        total
            .checked_add(amount)
            .ok_or_else(|| TesseraError::AmountError("amount overflow".into()))
    })
}
