//! The transaction model.
//!
//! A transaction either opens an asset's history (CREATE and the election
//! operations routed through it) or moves existing outputs to new owners
//! (TRANSFER, VOTE). Once signed it is immutable: the id is the SHA3-256 of
//! its canonical serialization with the id and every fulfillment nulled, so
//! any later mutation breaks the id.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde_json::{json, Value};

use tessera_crypto::condition::{ConditionDetails, Fulfillment};
use tessera_crypto::hash::{sha3_256, sha3_hex};
use tessera_crypto::keypair::{signing_key_from_b58, PublicKey};

use crate::canonical::to_canonical_string;
use crate::error::TesseraError;
use crate::registry::{OperationRegistry, CREATE, TRANSFER};

/// Wire version every newly built transaction carries.
pub const TX_VERSION: &str = "2.0";

// ── OutputLink ───────────────────────────────────────────────────────────────

/// Pointer from an input to the output it consumes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OutputLink {
    pub transaction_id: String,
    pub output_index: u32,
}

impl OutputLink {
    pub fn new(transaction_id: impl Into<String>, output_index: u32) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            output_index,
        }
    }

    fn to_value(&self) -> Value {
        json!({
            "transaction_id": self.transaction_id,
            "output_index": self.output_index,
        })
    }

    fn from_value(value: &Value) -> Result<Self, TesseraError> {
        let transaction_id = string_field(value, "transaction_id")?;
        let output_index = field(value, "output_index")?
            .as_u64()
            .and_then(|idx| u32::try_from(idx).ok())
            .ok_or_else(|| {
                TesseraError::Structural("fulfills.output_index must be an unsigned integer".into())
            })?;
        Ok(Self {
            transaction_id,
            output_index,
        })
    }
}

impl fmt::Display for OutputLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.transaction_id, self.output_index)
    }
}

// ── Input ────────────────────────────────────────────────────────────────────

/// A spend authorization: who is expected to sign, what is consumed, and the
/// condition tree that will carry (or carries) the signatures.
#[derive(Clone, Debug, PartialEq)]
pub struct Input {
    /// Base58 Ed25519 keys expected to sign this input, in order.
    pub owners_before: Vec<String>,
    /// The output being consumed; `None` for CREATE-style inputs.
    pub fulfills: Option<OutputLink>,
    /// Condition tree. On the wire this is a fulfillment URI once signed and
    /// null before.
    pub fulfillment: Option<Fulfillment>,
}

impl Input {
    /// Input over a fresh condition derived from `owners`: a single Ed25519
    /// leaf for one key, an n-of-n threshold for several.
    pub fn generate(owners: &[String]) -> Result<Self, TesseraError> {
        Ok(Self {
            owners_before: owners.to_vec(),
            fulfills: None,
            fulfillment: Some(condition_from_owners(owners)?),
        })
    }

    fn to_value(&self) -> Value {
        let fulfillment = match &self.fulfillment {
            Some(f) if f.is_fulfilled() => Value::String(f.serialize_uri()),
            _ => Value::Null,
        };
        json!({
            "owners_before": self.owners_before,
            "fulfills": self.fulfills.as_ref().map(OutputLink::to_value).unwrap_or(Value::Null),
            "fulfillment": fulfillment,
        })
    }

    fn from_value(value: &Value) -> Result<Self, TesseraError> {
        let owners_before = string_list(field(value, "owners_before")?)?;
        let fulfills = match field(value, "fulfills")? {
            Value::Null => None,
            link => Some(OutputLink::from_value(link)?),
        };
        let fulfillment = match field(value, "fulfillment")? {
            Value::Null => None,
            Value::String(uri) => Some(
                Fulfillment::from_uri(uri)
                    .map_err(|e| TesseraError::InvalidSignature(e.to_string()))?,
            ),
            _ => {
                return Err(TesseraError::Structural(
                    "input fulfillment must be a URI string or null".into(),
                ))
            }
        };
        Ok(Self {
            owners_before,
            fulfills,
            fulfillment,
        })
    }

    /// Verify this input's fulfillment against a signing digest. For spends,
    /// the parsed condition URI must also equal the consumed output's.
    pub fn verify(&self, message: &[u8; 32], expected_condition_uri: Option<&str>) -> bool {
        let Some(fulfillment) = &self.fulfillment else {
            return false;
        };
        // Round-trip through the URI form, exactly as a peer would see it.
        let Ok(parsed) = Fulfillment::from_uri(&fulfillment.serialize_uri()) else {
            return false;
        };
        if let Some(expected) = expected_condition_uri {
            if expected != parsed.condition_uri() {
                return false;
            }
        }
        parsed.validate(message)
    }
}

// ── Output ───────────────────────────────────────────────────────────────────

/// The condition an output is locked under: its URI plus the structured form.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub details: ConditionDetails,
    pub uri: String,
}

/// Value locked under a condition, payable to `public_keys`.
#[derive(Clone, Debug, PartialEq)]
pub struct Output {
    pub amount: u64,
    pub condition: Condition,
    pub public_keys: Vec<String>,
}

impl Output {
    /// Output payable to `owners`: one key gives an Ed25519 condition,
    /// several give an n-of-n threshold.
    pub fn new(owners: &[String], amount: u64) -> Result<Self, TesseraError> {
        Self::from_condition_tree(condition_from_owners(owners)?, amount)
    }

    /// Output over an explicit condition, e.g. a t-of-n threshold.
    pub fn with_details(details: ConditionDetails, amount: u64) -> Result<Self, TesseraError> {
        let tree = Fulfillment::from_details(&details)
            .map_err(|e| TesseraError::Structural(e.to_string()))?;
        Self::from_condition_tree(tree, amount)
    }

    fn from_condition_tree(tree: Fulfillment, amount: u64) -> Result<Self, TesseraError> {
        if amount == 0 {
            return Err(TesseraError::AmountError(
                "amount must be a positive integer".into(),
            ));
        }
        let details = tree.to_details();
        Ok(Self {
            amount,
            public_keys: details.public_keys(),
            condition: Condition {
                uri: tree.condition_uri(),
                details,
            },
        })
    }

    fn to_value(&self) -> Value {
        json!({
            // decimal string on the wire to preserve the full u64 range
            "amount": self.amount.to_string(),
            "public_keys": self.public_keys,
            "condition": {
                "details": serde_json::to_value(&self.condition.details)
                    .expect("condition details serialization is infallible"),
                "uri": self.condition.uri,
            },
        })
    }

    fn from_value(value: &Value) -> Result<Self, TesseraError> {
        let amount = match field(value, "amount")? {
            Value::String(s) => s
                .parse::<u64>()
                .map_err(|_| TesseraError::AmountError(format!("invalid amount `{s}`")))?,
            Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| TesseraError::AmountError(format!("invalid amount `{n}`")))?,
            other => {
                return Err(TesseraError::AmountError(format!(
                    "amount must be a decimal string, got {other}"
                )))
            }
        };
        if amount == 0 {
            return Err(TesseraError::AmountError(
                "amount must be a positive integer".into(),
            ));
        }

        let condition = field(value, "condition")?;
        let details: ConditionDetails = serde_json::from_value(field(condition, "details")?.clone())
            .map_err(|e| TesseraError::Structural(format!("invalid condition details: {e}")))?;
        let tree = Fulfillment::from_details(&details)
            .map_err(|e| TesseraError::Structural(e.to_string()))?;
        let uri = string_field(condition, "uri")?;
        if uri != tree.condition_uri() {
            return Err(TesseraError::Structural(
                "condition uri does not match its details".into(),
            ));
        }

        let public_keys = string_list(field(value, "public_keys")?)?;
        let mut declared = public_keys.clone();
        let mut derived = details.public_keys();
        declared.sort_unstable();
        derived.sort_unstable();
        if declared != derived {
            return Err(TesseraError::Structural(
                "public_keys do not match the condition".into(),
            ));
        }

        Ok(Self {
            amount,
            condition: Condition { details, uri },
            public_keys,
        })
    }
}

// ── Asset / UnspentOutput ────────────────────────────────────────────────────

/// Asset payload. A CREATE carries immutable data; a TRANSFER points back at
/// the CREATE that opened the asset's history.
#[derive(Clone, Debug, PartialEq)]
pub enum Asset {
    Data(Value),
    Link(String),
}

/// One record of the live UTXO set.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UnspentOutput {
    pub transaction_id: String,
    pub output_index: u32,
    pub amount: u64,
    pub asset_id: String,
    pub condition_uri: String,
}

// ── Transaction ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    /// Content-addressed identifier; `None` until signed.
    pub id: Option<String>,
    pub operation: String,
    pub version: String,
    pub asset: Option<Asset>,
    /// `None` on the wire is null; `Some` must be a JSON object.
    pub metadata: Option<Value>,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
}

impl Transaction {
    /// Build an unsigned CREATE issuing the first outputs of a fresh asset.
    pub fn create(
        signers: &[String],
        recipients: &[(Vec<String>, u64)],
        asset_data: Option<Value>,
        metadata: Option<Value>,
    ) -> Result<Self, TesseraError> {
        if signers.is_empty() {
            return Err(TesseraError::Structural(
                "at least one signer is required".into(),
            ));
        }
        let outputs = outputs_for_recipients(recipients)?;
        Ok(Self {
            id: None,
            operation: CREATE.to_string(),
            version: TX_VERSION.to_string(),
            asset: asset_data.map(Asset::Data),
            metadata,
            inputs: vec![Input::generate(signers)?],
            outputs,
        })
    }

    /// Build an unsigned TRANSFER moving prior outputs to new owners.
    pub fn transfer(
        inputs: Vec<Input>,
        recipients: &[(Vec<String>, u64)],
        asset_id: String,
        metadata: Option<Value>,
    ) -> Result<Self, TesseraError> {
        if inputs.is_empty() {
            return Err(TesseraError::Structural(
                "at least one input is required".into(),
            ));
        }
        let outputs = outputs_for_recipients(recipients)?;
        Ok(Self {
            id: None,
            operation: TRANSFER.to_string(),
            version: TX_VERSION.to_string(),
            asset: Some(Asset::Link(asset_id)),
            metadata,
            inputs,
            outputs,
        })
    }

    /// Convert this transaction's outputs into inputs a follow-up transaction
    /// can spend. `indices` selects outputs; `None` takes all of them.
    pub fn to_inputs(&self, indices: Option<&[usize]>) -> Result<Vec<Input>, TesseraError> {
        let id = self.id.clone().ok_or_else(|| {
            TesseraError::Structural("transaction must be signed before its outputs can be spent".into())
        })?;
        let all: Vec<usize> = (0..self.outputs.len()).collect();
        indices
            .unwrap_or(&all)
            .iter()
            .map(|&idx| {
                let output = self.outputs.get(idx).ok_or_else(|| {
                    TesseraError::Structural(format!("no output at index {idx}"))
                })?;
                let tree = Fulfillment::from_details(&output.condition.details)
                    .map_err(|e| TesseraError::Structural(e.to_string()))?;
                Ok(Input {
                    owners_before: output.public_keys.clone(),
                    fulfills: Some(OutputLink::new(id.clone(), idx as u32)),
                    fulfillment: Some(tree),
                })
            })
            .collect()
    }

    // ── Wire form ────────────────────────────────────────────────────────────

    pub fn to_value(&self) -> Value {
        let asset = match &self.asset {
            None => Value::Null,
            Some(Asset::Data(data)) => json!({ "data": data }),
            Some(Asset::Link(id)) => json!({ "id": id }),
        };
        json!({
            "id": self.id,
            "version": self.version,
            "operation": self.operation,
            "asset": asset,
            "metadata": self.metadata.clone().unwrap_or(Value::Null),
            "inputs": self.inputs.iter().map(Input::to_value).collect::<Vec<_>>(),
            "outputs": self.outputs.iter().map(Output::to_value).collect::<Vec<_>>(),
        })
    }

    /// Parse the wire dict. The registry routes the operation tag; unknown
    /// tags are handled as CREATE (with a logged warning).
    pub fn from_value(
        value: &Value,
        registry: &OperationRegistry,
    ) -> Result<Self, TesseraError> {
        let operation = string_field(value, "operation")?;
        let handler = registry.resolve(&operation);
        let version = string_field(value, "version")?;

        let id = match field(value, "id")? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            _ => {
                return Err(TesseraError::Structural(
                    "id must be a string or null".into(),
                ))
            }
        };

        let asset = match field(value, "asset")? {
            Value::Null => None,
            payload @ Value::Object(_) => {
                if handler.spends_inputs() {
                    Some(Asset::Link(string_field(payload, "id")?))
                } else {
                    Some(Asset::Data(field(payload, "data")?.clone()))
                }
            }
            _ => {
                return Err(TesseraError::Structural(
                    "asset must be an object or null".into(),
                ))
            }
        };

        let metadata = match field(value, "metadata")? {
            Value::Null => None,
            meta @ Value::Object(_) => Some(meta.clone()),
            _ => {
                return Err(TesseraError::Structural(
                    "metadata must be an object or null".into(),
                ))
            }
        };

        let inputs = field(value, "inputs")?
            .as_array()
            .ok_or_else(|| TesseraError::Structural("inputs must be a list".into()))?
            .iter()
            .map(Input::from_value)
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = field(value, "outputs")?
            .as_array()
            .ok_or_else(|| TesseraError::Structural("outputs must be a list".into()))?
            .iter()
            .map(Output::from_value)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id,
            operation,
            version,
            asset,
            metadata,
            inputs,
            outputs,
        })
    }

    // ── Identity ─────────────────────────────────────────────────────────────

    /// Canonical form hashed into the id and signed by every input: the wire
    /// dict with `id` nulled and every fulfillment nulled.
    pub fn signing_serialization(&self) -> Result<String, TesseraError> {
        let mut value = self.to_value();
        value["id"] = Value::Null;
        if let Some(inputs) = value["inputs"].as_array_mut() {
            for input in inputs {
                input["fulfillment"] = Value::Null;
            }
        }
        to_canonical_string(&value)
    }

    pub fn compute_id(&self) -> Result<String, TesseraError> {
        Ok(sha3_hex(&self.signing_serialization()?))
    }

    /// Recompute the id and compare. Any mutation after signing fails here.
    pub fn validate_id(&self) -> Result<(), TesseraError> {
        let Some(id) = &self.id else {
            return Err(TesseraError::InvalidHash("no transaction id found".into()));
        };
        let expected = self.compute_id()?;
        if *id != expected {
            return Err(TesseraError::InvalidHash(format!(
                "transaction id `{id}` is not the hash of its body"
            )));
        }
        Ok(())
    }

    // ── Signing ──────────────────────────────────────────────────────────────

    /// Sign every input with the matching keys from `private_keys` (base58
    /// Ed25519 seeds) and return the signed transaction with its id set.
    ///
    /// The receiver is never modified: all signing happens on a copy, so a
    /// mid-way failure leaves the original in its pre-signing state.
    pub fn sign(&self, private_keys: &[String]) -> Result<Transaction, TesseraError> {
        // public key → signing key, so owners_before entries resolve directly
        let mut key_pairs = HashMap::new();
        for seed in private_keys {
            let signing = signing_key_from_b58(seed)
                .map_err(|e| TesseraError::KeypairMismatch(format!("invalid private key: {e}")))?;
            let public = PublicKey::from_bytes(signing.verifying_key().to_bytes());
            key_pairs.insert(public.to_b58(), signing);
        }

        let base = self.signing_serialization()?;
        let mut signed = self.clone();
        for input in &mut signed.inputs {
            let message = input_signing_digest(&base, input.fulfills.as_ref());
            let fulfillment = input.fulfillment.as_mut().ok_or_else(|| {
                TesseraError::Structural("cannot sign an input without a condition".into())
            })?;
            match fulfillment {
                Fulfillment::Ed25519Sha256 { .. } => {
                    let owner = input.owners_before.first().ok_or_else(|| {
                        TesseraError::Structural("input has no owners_before".into())
                    })?;
                    let key = key_pairs
                        .get(owner)
                        .ok_or_else(|| TesseraError::KeypairMismatch(owner.clone()))?;
                    if fulfillment.sign(&message, key) == 0 {
                        return Err(TesseraError::KeypairMismatch(owner.clone()));
                    }
                }
                Fulfillment::ThresholdSha256 { .. } => {
                    let owners: BTreeSet<&String> = input.owners_before.iter().collect();
                    for owner in owners {
                        let owner_key = PublicKey::from_b58(owner)
                            .map_err(|_| TesseraError::KeypairMismatch(owner.clone()))?;
                        if !fulfillment.has_leaf_for(&owner_key) {
                            return Err(TesseraError::KeypairMismatch(format!(
                                "public key `{owner}` cannot be found in the condition"
                            )));
                        }
                        let key = key_pairs
                            .get(owner)
                            .ok_or_else(|| TesseraError::KeypairMismatch(owner.clone()))?;
                        fulfillment.sign(&message, key);
                    }
                }
            }
        }

        let id = signed.compute_id()?;
        signed.id = Some(id);
        Ok(signed)
    }

    // ── Validation ───────────────────────────────────────────────────────────

    /// Structural validation: operation allowed, asset shape, input linkage,
    /// non-empty inputs/outputs, metadata shape, id integrity.
    pub fn validate_structure(&self, registry: &OperationRegistry) -> Result<(), TesseraError> {
        if !registry.is_registered(&self.operation) {
            return Err(TesseraError::Structural(format!(
                "operation `{}` is not allowed",
                self.operation
            )));
        }
        if self.inputs.is_empty() {
            return Err(TesseraError::Structural("transaction has no inputs".into()));
        }
        if self.outputs.is_empty() {
            return Err(TesseraError::Structural("transaction has no outputs".into()));
        }

        if registry.resolve(&self.operation).spends_inputs() {
            if !matches!(self.asset, Some(Asset::Link(_))) {
                return Err(TesseraError::Structural(
                    "asset must be an object holding an `id` for transfer operations".into(),
                ));
            }
            if self.inputs.iter().any(|input| input.fulfills.is_none()) {
                return Err(TesseraError::Structural(
                    "every transfer input must name the output it consumes".into(),
                ));
            }
        } else {
            if matches!(self.asset, Some(Asset::Link(_))) {
                return Err(TesseraError::Structural(
                    "asset must be null or an object holding `data` for create operations".into(),
                ));
            }
            if self.inputs.iter().any(|input| input.fulfills.is_some()) {
                return Err(TesseraError::Structural(
                    "create operations must not consume prior outputs".into(),
                ));
            }
        }

        if let Some(metadata) = &self.metadata {
            if !metadata.is_object() {
                return Err(TesseraError::Structural(
                    "metadata must be an object or null".into(),
                ));
            }
        }

        self.validate_id()
    }

    /// Verify every input fulfillment against the signing message.
    ///
    /// For spends the consumed outputs must be supplied in input order and
    /// each input's condition URI must equal its output's; for CREATE-style
    /// operations pass `None` and the URI comparison is skipped.
    pub fn inputs_valid(&self, outputs: Option<&[Output]>) -> Result<bool, TesseraError> {
        let base = self.signing_serialization()?;
        match outputs {
            None => Ok(self.inputs.iter().all(|input| {
                let message = input_signing_digest(&base, input.fulfills.as_ref());
                input.verify(&message, None)
            })),
            Some(outputs) => {
                if outputs.len() != self.inputs.len() {
                    return Err(TesseraError::Structural(
                        "inputs and consumed outputs must have the same count".into(),
                    ));
                }
                Ok(self.inputs.iter().zip(outputs).all(|(input, output)| {
                    let message = input_signing_digest(&base, input.fulfills.as_ref());
                    input.verify(&message, Some(&output.condition.uri))
                }))
            }
        }
    }

    // ── Asset identity ───────────────────────────────────────────────────────

    /// Asset id carried by this transaction's outputs: its own id for
    /// CREATE-style operations, the linked asset id for spends.
    pub fn output_asset_id(&self, registry: &OperationRegistry) -> Option<String> {
        if registry.resolve(&self.operation).spends_inputs() {
            match &self.asset {
                Some(Asset::Link(id)) => Some(id.clone()),
                _ => None,
            }
        } else {
            self.id.clone()
        }
    }

    /// The single asset id a set of input transactions share.
    pub fn get_asset_id<'a, I>(
        transactions: I,
        registry: &OperationRegistry,
    ) -> Result<String, TesseraError>
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut asset_ids = BTreeSet::new();
        for tx in transactions {
            let asset_id = tx.output_asset_id(registry).ok_or_else(|| {
                TesseraError::AssetIdMismatch("input transaction carries no asset id".into())
            })?;
            asset_ids.insert(asset_id);
        }
        if asset_ids.len() != 1 {
            return Err(TesseraError::AssetIdMismatch(
                "all input transactions must share one asset id".into(),
            ));
        }
        Ok(asset_ids.into_iter().next().expect("length checked"))
    }

    /// Links consumed by this transaction's inputs.
    pub fn spent_outputs(&self) -> impl Iterator<Item = &OutputLink> + '_ {
        self.inputs.iter().filter_map(|input| input.fulfills.as_ref())
    }

    /// Whether any output is consumed twice within this transaction.
    pub fn spends_distinct_outputs(&self) -> bool {
        let mut seen = HashSet::new();
        self.spent_outputs().all(|link| seen.insert(link))
    }

    /// One UTXO record per output, lazily.
    pub fn unspent_outputs<'a>(
        &'a self,
        registry: &OperationRegistry,
    ) -> impl Iterator<Item = UnspentOutput> + 'a {
        let transaction_id = self.id.clone().unwrap_or_default();
        let asset_id = self.output_asset_id(registry).unwrap_or_default();
        self.outputs.iter().enumerate().map(move |(idx, output)| UnspentOutput {
            transaction_id: transaction_id.clone(),
            output_index: idx as u32,
            amount: output.amount,
            asset_id: asset_id.clone(),
            condition_uri: output.condition.uri.clone(),
        })
    }
}

/// Per-input signing digest: SHA3-256 over the base serialization, extended
/// with the consumed link so each spend input signs a distinct message.
pub fn input_signing_digest(base: &str, fulfills: Option<&OutputLink>) -> [u8; 32] {
    let mut bytes = base.as_bytes().to_vec();
    if let Some(link) = fulfills {
        bytes.extend_from_slice(link.transaction_id.as_bytes());
        bytes.extend_from_slice(link.output_index.to_string().as_bytes());
    }
    sha3_256(&bytes)
}

fn outputs_for_recipients(recipients: &[(Vec<String>, u64)]) -> Result<Vec<Output>, TesseraError> {
    if recipients.is_empty() {
        return Err(TesseraError::Structural(
            "at least one recipient is required".into(),
        ));
    }
    recipients
        .iter()
        .map(|(owners, amount)| Output::new(owners, *amount))
        .collect()
}

fn condition_from_owners(owners: &[String]) -> Result<Fulfillment, TesseraError> {
    let mut leaves = Vec::with_capacity(owners.len());
    for owner in owners {
        let key = PublicKey::from_b58(owner).map_err(|e| {
            TesseraError::Structural(format!("invalid public key `{owner}`: {e}"))
        })?;
        leaves.push(Fulfillment::ed25519(key));
    }
    match leaves.len() {
        0 => Err(TesseraError::Structural(
            "at least one owner key is required".into(),
        )),
        1 => Ok(leaves.pop().expect("length checked")),
        n => Fulfillment::threshold(n as u32, leaves)
            .map_err(|e| TesseraError::Structural(e.to_string())),
    }
}

// ── Wire helpers ─────────────────────────────────────────────────────────────

fn field<'a>(value: &'a Value, key: &str) -> Result<&'a Value, TesseraError> {
    value
        .get(key)
        .ok_or_else(|| TesseraError::Structural(format!("missing field `{key}`")))
}

fn string_field(value: &Value, key: &str) -> Result<String, TesseraError> {
    field(value, key)?
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| TesseraError::Structural(format!("field `{key}` must be a string")))
}

fn string_list(value: &Value) -> Result<Vec<String>, TesseraError> {
    value
        .as_array()
        .ok_or_else(|| TesseraError::Structural("expected a list of strings".into()))?
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_owned)
                .ok_or_else(|| TesseraError::Structural("expected a list of strings".into()))
        })
        .collect()
}
