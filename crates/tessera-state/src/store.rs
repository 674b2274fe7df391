//! Persistent ledger store backed by sled (pure-Rust, no C dependencies).
//!
//! Each relation is a named tree; secondary indexes are separate trees whose
//! composite keys make the queries prefix scans instead of full sweeps.
//!
//! Named trees:
//!   transactions     — txid utf8                       → bincode(TransactionRow)
//!   tx_by_op_asset   — "op/asset_id/txid" utf8         → []   (operation+asset index)
//!   tx_by_asset      — "asset_id/txid" utf8            → []   (asset-only index)
//!   inputs           — txid ++ u32 be index            → bincode(InputRow)
//!   spends           — spent txid ++ u32 be ++ spender → spender txid   ("spent" index)
//!   outputs          — txid ++ u32 be index            → bincode(OutputRow)
//!   output_keys      — "pubkey/txid" ++ u32 be         → []   (pubkey fanout)
//!   assets           — txid utf8                       → JSON bytes of `data`
//!   metadata         — txid utf8                       → JSON bytes
//!   blocks           — u64 be height                   → bincode(Block)
//!   block_txs        — txid utf8                       → u64 be height
//!   utxos            — txid ++ u32 be index            → bincode(UnspentOutput)
//!   validators       — u64 be height                   → bincode(ValidatorSet)
//!   elections        — election id utf8                → bincode(Election)
//!   elections_height — u64 be height ++ election id    → []
//!   pre_commit       — b"state"                        → bincode(PreCommitState)
//!   abci_chains      — chain id utf8                   → bincode(AbciChain)
//!   abci_height      — u64 be height ++ chain id       → []

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tessera_core::transaction::{Asset, Condition, Input, Output, OutputLink};
use tessera_core::types::{AbciChain, Block, Election, PreCommitState, ValidatorSet};
use tessera_core::{Transaction, TesseraError, UnspentOutput};
use tessera_crypto::condition::{ConditionDetails, Fulfillment};

const PRE_COMMIT_KEY: &[u8] = b"state";

/// Bounded retries for point reads; sled read errors are rare and transient
/// failures must not bubble up as validation verdicts.
const READ_ATTEMPTS: usize = 3;

// ── Shredded row forms ───────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct TransactionRow {
    operation: String,
    version: String,
    /// `Some` when the asset field is a link (spend operations).
    asset_link: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct InputRow {
    owners_before: Vec<String>,
    fulfills: Option<(String, u32)>,
    fulfillment: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct OutputRow {
    amount: u64,
    condition_uri: String,
    /// JSON bytes of the structured condition form.
    details: Vec<u8>,
    public_keys: Vec<String>,
}

// ── LedgerStore ──────────────────────────────────────────────────────────────

pub struct LedgerStore {
    db: sled::Db,
    transactions: sled::Tree,
    tx_by_op_asset: sled::Tree,
    tx_by_asset: sled::Tree,
    inputs: sled::Tree,
    spends: sled::Tree,
    outputs: sled::Tree,
    output_keys: sled::Tree,
    assets: sled::Tree,
    metadata: sled::Tree,
    blocks: sled::Tree,
    block_txs: sled::Tree,
    utxos: sled::Tree,
    validators: sled::Tree,
    elections: sled::Tree,
    elections_height: sled::Tree,
    pre_commit: sled::Tree,
    abci_chains: sled::Tree,
    abci_height: sled::Tree,
}

impl LedgerStore {
    /// Open or create the ledger database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TesseraError> {
        let db = sled::open(path).map_err(storage)?;
        let open = |name: &str| db.open_tree(name).map_err(storage);
        Ok(Self {
            transactions: open("transactions")?,
            tx_by_op_asset: open("tx_by_op_asset")?,
            tx_by_asset: open("tx_by_asset")?,
            inputs: open("inputs")?,
            spends: open("spends")?,
            outputs: open("outputs")?,
            output_keys: open("output_keys")?,
            assets: open("assets")?,
            metadata: open("metadata")?,
            blocks: open("blocks")?,
            block_txs: open("block_txs")?,
            utxos: open("utxos")?,
            validators: open("validators")?,
            elections: open("elections")?,
            elections_height: open("elections_height")?,
            pre_commit: open("pre_commit")?,
            abci_chains: open("abci_chains")?,
            abci_height: open("abci_height")?,
            db,
        })
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), TesseraError> {
        self.db.flush().map_err(storage)?;
        Ok(())
    }

    // ── Transactions ─────────────────────────────────────────────────────────

    pub fn transaction_exists(&self, id: &str) -> Result<bool, TesseraError> {
        Ok(tree_get(&self.transactions, id.as_bytes())?.is_some())
    }

    /// Shred each transaction into the `transactions`, `inputs`, `outputs`
    /// and `output_keys` relations (plus their indexes). Re-inserting an
    /// existing id fails with `DuplicateKey`.
    pub fn store_transactions(&self, transactions: &[Transaction]) -> Result<(), TesseraError> {
        for tx in transactions {
            let id = tx.id.as_deref().ok_or_else(|| {
                TesseraError::Structural("cannot store an unsigned transaction".into())
            })?;
            if self.transaction_exists(id)? {
                return Err(TesseraError::DuplicateKey(format!(
                    "transaction `{id}` already stored"
                )));
            }

            let asset_link = match &tx.asset {
                Some(Asset::Link(asset_id)) => Some(asset_id.clone()),
                _ => None,
            };
            let row = TransactionRow {
                operation: tx.operation.clone(),
                version: tx.version.clone(),
                asset_link: asset_link.clone(),
            };
            self.transactions
                .insert(id.as_bytes(), encode(&row)?)
                .map_err(storage)?;

            // CREATE-style transactions index under their own id.
            let index_asset = asset_link.as_deref().unwrap_or(id);
            self.tx_by_op_asset
                .insert(
                    format!("{}/{}/{}", tx.operation, index_asset, id).as_bytes(),
                    &[][..],
                )
                .map_err(storage)?;
            self.tx_by_asset
                .insert(format!("{index_asset}/{id}").as_bytes(), &[][..])
                .map_err(storage)?;

            for (idx, input) in tx.inputs.iter().enumerate() {
                let row = InputRow {
                    owners_before: input.owners_before.clone(),
                    fulfills: input
                        .fulfills
                        .as_ref()
                        .map(|link| (link.transaction_id.clone(), link.output_index)),
                    fulfillment: input.fulfillment.as_ref().map(Fulfillment::serialize_uri),
                };
                self.inputs
                    .insert(indexed_key(id, idx as u32), encode(&row)?)
                    .map_err(storage)?;
                if let Some(link) = &input.fulfills {
                    self.spends
                        .insert(
                            spent_key(&link.transaction_id, link.output_index, id),
                            id.as_bytes(),
                        )
                        .map_err(storage)?;
                }
            }

            for (idx, output) in tx.outputs.iter().enumerate() {
                let row = OutputRow {
                    amount: output.amount,
                    condition_uri: output.condition.uri.clone(),
                    details: serde_json::to_vec(&output.condition.details)
                        .map_err(serialization)?,
                    public_keys: output.public_keys.clone(),
                };
                self.outputs
                    .insert(indexed_key(id, idx as u32), encode(&row)?)
                    .map_err(storage)?;
                for public_key in &output.public_keys {
                    self.output_keys
                        .insert(owned_key(public_key, id, idx as u32), &[][..])
                        .map_err(storage)?;
                }
            }
        }
        Ok(())
    }

    /// Reconstruct the full transaction by joining the shredded relations and
    /// re-attaching asset data and metadata.
    pub fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, TesseraError> {
        let Some(bytes) = tree_get(&self.transactions, id.as_bytes())? else {
            return Ok(None);
        };
        let row: TransactionRow = decode(&bytes)?;

        let mut inputs = Vec::new();
        for item in self.inputs.scan_prefix(id.as_bytes()) {
            let (_, bytes) = item.map_err(storage)?;
            let input_row: InputRow = decode(&bytes)?;
            let fulfillment = match input_row.fulfillment {
                Some(uri) => Some(Fulfillment::from_uri(&uri).map_err(|e| {
                    TesseraError::Serialization(format!("stored fulfillment does not parse: {e}"))
                })?),
                None => None,
            };
            inputs.push(Input {
                owners_before: input_row.owners_before,
                fulfills: input_row
                    .fulfills
                    .map(|(txid, idx)| OutputLink::new(txid, idx)),
                fulfillment,
            });
        }

        let mut outputs = Vec::new();
        for item in self.outputs.scan_prefix(id.as_bytes()) {
            let (_, bytes) = item.map_err(storage)?;
            let output_row: OutputRow = decode(&bytes)?;
            let details: ConditionDetails =
                serde_json::from_slice(&output_row.details).map_err(serialization)?;
            outputs.push(Output {
                amount: output_row.amount,
                condition: Condition {
                    details,
                    uri: output_row.condition_uri,
                },
                public_keys: output_row.public_keys,
            });
        }

        let asset = match row.asset_link {
            Some(asset_id) => Some(Asset::Link(asset_id)),
            None => match tree_get(&self.assets, id.as_bytes())? {
                Some(bytes) => Some(Asset::Data(
                    serde_json::from_slice(&bytes).map_err(serialization)?,
                )),
                None => None,
            },
        };
        let metadata = match tree_get(&self.metadata, id.as_bytes())? {
            Some(bytes) => Some(serde_json::from_slice::<Value>(&bytes).map_err(serialization)?),
            None => None,
        };

        Ok(Some(Transaction {
            id: Some(id.to_string()),
            operation: row.operation,
            version: row.version,
            asset,
            metadata,
            inputs,
            outputs,
        }))
    }

    pub fn get_transactions(&self, ids: &[String]) -> Result<Vec<Transaction>, TesseraError> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(tx) = self.get_transaction(id)? {
                found.push(tx);
            }
        }
        Ok(found)
    }

    /// Remove the shredded rows for `ids`. Used only during failed-block
    /// rollback; asset and metadata rows become unreachable and stay behind.
    pub fn delete_transactions(&self, ids: &[String]) -> Result<(), TesseraError> {
        for id in ids {
            let Some(bytes) = tree_get(&self.transactions, id.as_bytes())? else {
                continue;
            };
            let row: TransactionRow = decode(&bytes)?;
            let index_asset = row.asset_link.clone().unwrap_or_else(|| id.clone());
            self.transactions.remove(id.as_bytes()).map_err(storage)?;
            self.tx_by_op_asset
                .remove(format!("{}/{}/{}", row.operation, index_asset, id).as_bytes())
                .map_err(storage)?;
            self.tx_by_asset
                .remove(format!("{index_asset}/{id}").as_bytes())
                .map_err(storage)?;

            let input_rows: Vec<_> = self
                .inputs
                .scan_prefix(id.as_bytes())
                .collect::<Result<Vec<_>, _>>()
                .map_err(storage)?;
            for (key, bytes) in input_rows {
                let input_row: InputRow = decode(&bytes)?;
                if let Some((spent_txid, spent_idx)) = input_row.fulfills {
                    self.spends
                        .remove(spent_key(&spent_txid, spent_idx, id))
                        .map_err(storage)?;
                }
                self.inputs.remove(key).map_err(storage)?;
            }

            let output_rows: Vec<_> = self
                .outputs
                .scan_prefix(id.as_bytes())
                .collect::<Result<Vec<_>, _>>()
                .map_err(storage)?;
            for (key, bytes) in output_rows {
                let output_row: OutputRow = decode(&bytes)?;
                let idx = index_from_key(&key);
                for public_key in &output_row.public_keys {
                    self.output_keys
                        .remove(owned_key(public_key, id, idx))
                        .map_err(storage)?;
                }
                self.outputs.remove(key).map_err(storage)?;
            }
        }
        Ok(())
    }

    // ── Spend lookups ────────────────────────────────────────────────────────

    /// The committed transaction that consumed `(txid, output_index)`, if any.
    pub fn get_spent(
        &self,
        txid: &str,
        output_index: u32,
    ) -> Result<Option<Transaction>, TesseraError> {
        let mut prefix = txid.as_bytes().to_vec();
        prefix.extend_from_slice(&output_index.to_be_bytes());
        match self.spends.scan_prefix(prefix).next() {
            Some(item) => {
                let (_, spender) = item.map_err(storage)?;
                let spender_id = String::from_utf8(spender.to_vec()).map_err(|_| {
                    TesseraError::Serialization("spent index holds a non-utf8 txid".into())
                })?;
                self.get_transaction(&spender_id)
            }
            None => Ok(None),
        }
    }

    /// Batched form of [`get_spent`].
    ///
    /// [`get_spent`]: LedgerStore::get_spent
    pub fn get_spending_transactions(
        &self,
        links: &[OutputLink],
    ) -> Result<Vec<Transaction>, TesseraError> {
        let mut spenders = Vec::new();
        for link in links {
            if let Some(tx) = self.get_spent(&link.transaction_id, link.output_index)? {
                spenders.push(tx);
            }
        }
        Ok(spenders)
    }

    /// Transactions with an output payable to `public_key`.
    pub fn get_owned_ids(&self, public_key: &str) -> Result<Vec<Transaction>, TesseraError> {
        let prefix = format!("{public_key}/");
        let mut ids = Vec::new();
        for item in self.output_keys.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item.map_err(storage)?;
            let txid = txid_from_owned_key(&key, prefix.len())?;
            if ids.last().map(|last: &String| last != &txid).unwrap_or(true) {
                ids.push(txid);
            }
        }
        self.get_transactions(&ids)
    }

    /// Transaction ids touching `asset_id`, optionally restricted to one
    /// operation tag.
    pub fn get_txids_filtered(
        &self,
        asset_id: &str,
        operation: Option<&str>,
    ) -> Result<Vec<String>, TesseraError> {
        let (tree, prefix) = match operation {
            Some(op) => (&self.tx_by_op_asset, format!("{op}/{asset_id}/")),
            None => (&self.tx_by_asset, format!("{asset_id}/")),
        };
        let mut ids = Vec::new();
        for item in tree.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item.map_err(storage)?;
            let key = String::from_utf8(key.to_vec())
                .map_err(|_| TesseraError::Serialization("index key is not utf8".into()))?;
            ids.push(key[prefix.len()..].to_string());
        }
        Ok(ids)
    }

    /// Transactions in `asset_id`'s history with an output payable to
    /// `public_key`.
    pub fn get_asset_tokens_for_public_key(
        &self,
        asset_id: &str,
        public_key: &str,
    ) -> Result<Vec<Transaction>, TesseraError> {
        let mut ids = Vec::new();
        for txid in self.get_txids_filtered(asset_id, None)? {
            let owned = format!("{public_key}/{txid}");
            if self
                .output_keys
                .scan_prefix(owned.as_bytes())
                .next()
                .is_some()
            {
                ids.push(txid);
            }
        }
        self.get_transactions(&ids)
    }

    // ── Assets / metadata ────────────────────────────────────────────────────

    /// One row per CREATE-style transaction, holding the asset `data`.
    pub fn store_assets(&self, assets: &[(String, Value)]) -> Result<(), TesseraError> {
        for (txid, data) in assets {
            self.assets
                .insert(
                    txid.as_bytes(),
                    serde_json::to_vec(data).map_err(serialization)?,
                )
                .map_err(storage)?;
        }
        Ok(())
    }

    pub fn get_asset(&self, txid: &str) -> Result<Option<Value>, TesseraError> {
        match tree_get(&self.assets, txid.as_bytes())? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(serialization)?,
            )),
            None => Ok(None),
        }
    }

    pub fn get_assets(&self, ids: &[String]) -> Result<Vec<Option<Value>>, TesseraError> {
        ids.iter().map(|id| self.get_asset(id)).collect()
    }

    pub fn store_metadata(&self, metadata: &[(String, Value)]) -> Result<(), TesseraError> {
        for (txid, meta) in metadata {
            self.metadata
                .insert(
                    txid.as_bytes(),
                    serde_json::to_vec(meta).map_err(serialization)?,
                )
                .map_err(storage)?;
        }
        Ok(())
    }

    /// Metadata rows in the order the ids were requested.
    pub fn get_metadata(&self, ids: &[String]) -> Result<Vec<Option<Value>>, TesseraError> {
        ids.iter()
            .map(|id| match tree_get(&self.metadata, id.as_bytes())? {
                Some(bytes) => Ok(Some(
                    serde_json::from_slice(&bytes).map_err(serialization)?,
                )),
                None => Ok(None),
            })
            .collect()
    }

    // ── Blocks ───────────────────────────────────────────────────────────────

    pub fn store_block(&self, block: &Block) -> Result<(), TesseraError> {
        self.blocks
            .insert(block.height.to_be_bytes(), encode(block)?)
            .map_err(storage)?;
        for txid in &block.transactions {
            self.block_txs
                .insert(txid.as_bytes(), &block.height.to_be_bytes()[..])
                .map_err(storage)?;
        }
        Ok(())
    }

    /// The block with the greatest height.
    pub fn latest_block(&self) -> Result<Option<Block>, TesseraError> {
        match self.blocks.last().map_err(storage)? {
            Some((_, bytes)) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_block(&self, height: u64) -> Result<Option<Block>, TesseraError> {
        match tree_get(&self.blocks, &height.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_block_with_transaction(
        &self,
        txid: &str,
    ) -> Result<Option<Block>, TesseraError> {
        match tree_get(&self.block_txs, txid.as_bytes())? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    TesseraError::Serialization("block index holds a malformed height".into())
                })?;
                self.get_block(u64::from_be_bytes(arr))
            }
            None => Ok(None),
        }
    }

    // ── UTXO set ─────────────────────────────────────────────────────────────

    /// Insert rows into the live set. Re-inserting an existing
    /// `(transaction_id, output_index)` rewrites the same record and is
    /// harmless.
    pub fn store_unspent_outputs(&self, outputs: &[UnspentOutput]) -> Result<(), TesseraError> {
        for utxo in outputs {
            self.utxos
                .insert(
                    indexed_key(&utxo.transaction_id, utxo.output_index),
                    encode(utxo)?,
                )
                .map_err(storage)?;
        }
        Ok(())
    }

    /// Remove consumed rows, matched by `(transaction_id, output_index)`.
    /// Non-matching deletes are ignored.
    pub fn delete_unspent_outputs(&self, spent: &[OutputLink]) -> Result<(), TesseraError> {
        for link in spent {
            self.utxos
                .remove(indexed_key(&link.transaction_id, link.output_index))
                .map_err(storage)?;
        }
        Ok(())
    }

    pub fn get_unspent_outputs(&self) -> Result<Vec<UnspentOutput>, TesseraError> {
        let mut live = Vec::new();
        for item in self.utxos.iter() {
            let (_, bytes) = item.map_err(storage)?;
            live.push(decode(&bytes)?);
        }
        Ok(live)
    }

    // ── Validator sets ───────────────────────────────────────────────────────

    pub fn store_validator_set(&self, set: &ValidatorSet) -> Result<(), TesseraError> {
        self.validators
            .insert(set.height.to_be_bytes(), encode(set)?)
            .map_err(storage)?;
        Ok(())
    }

    pub fn delete_validator_set(&self, height: u64) -> Result<(), TesseraError> {
        self.validators
            .remove(height.to_be_bytes())
            .map_err(storage)?;
        Ok(())
    }

    /// The most recent validator set with stored height ≤ `height`, or the
    /// overall latest when `height` is `None`.
    pub fn get_validator_set(
        &self,
        height: Option<u64>,
    ) -> Result<Option<ValidatorSet>, TesseraError> {
        let item = match height {
            Some(h) => self.validators.range(..=h.to_be_bytes().to_vec()).next_back(),
            None => self.validators.iter().next_back(),
        };
        match item {
            Some(entry) => {
                let (_, bytes) = entry.map_err(storage)?;
                Ok(Some(decode(&bytes)?))
            }
            None => Ok(None),
        }
    }

    // ── Elections ────────────────────────────────────────────────────────────

    /// Upsert on the election id; the height index follows.
    pub fn store_election(&self, election: &Election) -> Result<(), TesseraError> {
        if let Some(bytes) = tree_get(&self.elections, election.election_id.as_bytes())? {
            let previous: Election = decode(&bytes)?;
            self.elections_height
                .remove(height_key(previous.height, &previous.election_id))
                .map_err(storage)?;
        }
        self.elections
            .insert(election.election_id.as_bytes(), encode(election)?)
            .map_err(storage)?;
        self.elections_height
            .insert(height_key(election.height, &election.election_id), &[][..])
            .map_err(storage)?;
        Ok(())
    }

    pub fn store_elections(&self, elections: &[Election]) -> Result<(), TesseraError> {
        for election in elections {
            self.store_election(election)?;
        }
        Ok(())
    }

    pub fn delete_elections(&self, height: u64) -> Result<(), TesseraError> {
        let keys: Vec<_> = self
            .elections_height
            .scan_prefix(height.to_be_bytes())
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;
        for (key, _) in keys {
            let election_id = &key[8..];
            self.elections.remove(election_id).map_err(storage)?;
            self.elections_height.remove(key).map_err(storage)?;
        }
        Ok(())
    }

    pub fn get_election(&self, election_id: &str) -> Result<Option<Election>, TesseraError> {
        match tree_get(&self.elections, election_id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    // ── Pre-commit state ─────────────────────────────────────────────────────

    /// Upsert; only one pre-commit record is ever retained.
    pub fn store_pre_commit_state(&self, state: &PreCommitState) -> Result<(), TesseraError> {
        self.pre_commit
            .insert(PRE_COMMIT_KEY, encode(state)?)
            .map_err(storage)?;
        Ok(())
    }

    pub fn get_pre_commit_state(&self) -> Result<Option<PreCommitState>, TesseraError> {
        match tree_get(&self.pre_commit, PRE_COMMIT_KEY)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    // ── Chain identity ───────────────────────────────────────────────────────

    /// Upsert on the chain id; the height index follows.
    pub fn store_abci_chain(&self, chain: &AbciChain) -> Result<(), TesseraError> {
        if let Some(bytes) = tree_get(&self.abci_chains, chain.chain_id.as_bytes())? {
            let previous: AbciChain = decode(&bytes)?;
            self.abci_height
                .remove(height_key(previous.height, &previous.chain_id))
                .map_err(storage)?;
        }
        self.abci_chains
            .insert(chain.chain_id.as_bytes(), encode(chain)?)
            .map_err(storage)?;
        self.abci_height
            .insert(height_key(chain.height, &chain.chain_id), &[][..])
            .map_err(storage)?;
        Ok(())
    }

    /// The chain record with the greatest height.
    pub fn get_latest_abci_chain(&self) -> Result<Option<AbciChain>, TesseraError> {
        match self.abci_height.iter().next_back() {
            Some(entry) => {
                let (key, _) = entry.map_err(storage)?;
                self.get_abci_chain_by_key(&key[8..])
            }
            None => Ok(None),
        }
    }

    fn get_abci_chain_by_key(&self, chain_id: &[u8]) -> Result<Option<AbciChain>, TesseraError> {
        match tree_get(&self.abci_chains, chain_id)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    // ── Counters ─────────────────────────────────────────────────────────────

    pub fn count_transactions(&self) -> u64 {
        self.transactions.len() as u64
    }

    pub fn count_unspent_outputs(&self) -> u64 {
        self.utxos.len() as u64
    }
}

// ── Key and codec helpers ────────────────────────────────────────────────────

fn indexed_key(txid: &str, index: u32) -> Vec<u8> {
    let mut key = txid.as_bytes().to_vec();
    key.extend_from_slice(&index.to_be_bytes());
    key
}

fn index_from_key(key: &[u8]) -> u32 {
    let mut arr = [0u8; 4];
    arr.copy_from_slice(&key[key.len() - 4..]);
    u32::from_be_bytes(arr)
}

fn spent_key(txid: &str, index: u32, spender: &str) -> Vec<u8> {
    let mut key = indexed_key(txid, index);
    key.extend_from_slice(spender.as_bytes());
    key
}

// '/' appears in neither base58 keys nor hex transaction ids, so it is a
// safe separator inside composite utf8 keys.
fn owned_key(public_key: &str, txid: &str, index: u32) -> Vec<u8> {
    let mut key = format!("{public_key}/{txid}").into_bytes();
    key.extend_from_slice(&index.to_be_bytes());
    key
}

fn txid_from_owned_key(key: &[u8], prefix_len: usize) -> Result<String, TesseraError> {
    let txid = &key[prefix_len..key.len() - 4];
    String::from_utf8(txid.to_vec())
        .map_err(|_| TesseraError::Serialization("output key index is not utf8".into()))
}

fn height_key(height: u64, suffix: &str) -> Vec<u8> {
    let mut key = height.to_be_bytes().to_vec();
    key.extend_from_slice(suffix.as_bytes());
    key
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, TesseraError> {
    bincode::serialize(value).map_err(serialization)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TesseraError> {
    bincode::deserialize(bytes).map_err(serialization)
}

fn storage(e: sled::Error) -> TesseraError {
    TesseraError::Storage(e.to_string())
}

fn serialization<E: std::fmt::Display>(e: E) -> TesseraError {
    TesseraError::Serialization(e.to_string())
}

fn tree_get(tree: &sled::Tree, key: &[u8]) -> Result<Option<sled::IVec>, TesseraError> {
    let mut last = None;
    for _ in 0..READ_ATTEMPTS {
        match tree.get(key) {
            Ok(value) => return Ok(value),
            Err(e) => last = Some(e),
        }
    }
    Err(TesseraError::Storage(
        last.expect("at least one attempt ran").to_string(),
    ))
}
