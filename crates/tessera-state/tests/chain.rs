//! End-to-end scenarios against a real sled-backed store: create/transfer
//! chains, double spends, amount and asset coherence, threshold spends, and
//! the store-level query guarantees.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::json;

use tessera_core::transaction::{Input, Output, OutputLink};
use tessera_core::types::{Block, Validator, ValidatorSet};
use tessera_core::{to_canonical_string, OperationRegistry, TesseraError, Transaction};
use tessera_crypto::condition::{ConditionDetails, Fulfillment};
use tessera_crypto::KeyPair;
use tessera_state::{LedgerStore, StateEngine};

static DIR_SEQ: AtomicU64 = AtomicU64::new(0);

fn temp_engine() -> StateEngine {
    let dir = std::env::temp_dir().join(format!(
        "tessera_chain_{}_{}",
        std::process::id(),
        DIR_SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    let _ = std::fs::remove_dir_all(&dir);
    let store = Arc::new(LedgerStore::open(&dir).unwrap());
    StateEngine::new(store, Arc::new(OperationRegistry::with_default_operations()))
}

fn registry() -> OperationRegistry {
    OperationRegistry::with_default_operations()
}

fn signed_create(signer: &KeyPair, amounts: &[u64]) -> Transaction {
    let recipients: Vec<(Vec<String>, u64)> = amounts
        .iter()
        .map(|&amount| (vec![signer.public_key_b58()], amount))
        .collect();
    Transaction::create(
        &[signer.public_key_b58()],
        &recipients,
        Some(json!({"hello": "world"})),
        None,
    )
    .unwrap()
    .sign(&[signer.seed_b58()])
    .unwrap()
}

fn simple_transfer(
    from: &Transaction,
    signer: &KeyPair,
    to: &KeyPair,
    amount: u64,
) -> Transaction {
    Transaction::transfer(
        from.to_inputs(None).unwrap(),
        &[(vec![to.public_key_b58()], amount)],
        from.id.clone().unwrap(),
        None,
    )
    .unwrap()
    .sign(&[signer.seed_b58()])
    .unwrap()
}

fn commit(engine: &StateEngine, height: u64, transactions: &[&Transaction]) -> Block {
    engine.begin_block(height);
    for tx in transactions {
        engine.deliver_transaction(&tx.to_value()).unwrap();
    }
    engine.commit_block(&format!("apphash{height}")).unwrap()
}

// ── End-to-end scenarios ─────────────────────────────────────────────────────

#[test]
fn create_then_transfer_chain() {
    let engine = temp_engine();
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();

    let create = signed_create(&alice, &[100]);
    let create_id = create.id.clone().unwrap();
    engine.check_transaction(&create.to_value()).unwrap();
    commit(&engine, 1, &[&create]);

    let live = engine.store().get_unspent_outputs().unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].transaction_id, create_id);
    assert_eq!(live[0].asset_id, create_id);

    let transfer = simple_transfer(&create, &alice, &bob, 100);
    engine.check_transaction(&transfer.to_value()).unwrap();
    commit(&engine, 2, &[&transfer]);

    let live = engine.store().get_unspent_outputs().unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].transaction_id, transfer.id.clone().unwrap());
    assert_eq!(live[0].output_index, 0);
    assert_eq!(live[0].amount, 100);
    assert_eq!(live[0].asset_id, create_id);

    // the consumed output is gone and the spent index knows its spender
    let spender = engine
        .store()
        .get_spent(&create_id, 0)
        .unwrap()
        .expect("output 0 was consumed");
    assert_eq!(spender.id, transfer.id);
}

#[test]
fn double_spend_within_one_block_is_rejected() {
    let engine = temp_engine();
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let carol = KeyPair::generate();

    let create = signed_create(&alice, &[100]);
    commit(&engine, 1, &[&create]);

    let to_bob = simple_transfer(&create, &alice, &bob, 100);
    let to_carol = simple_transfer(&create, &alice, &carol, 100);

    engine.begin_block(2);
    engine.deliver_transaction(&to_bob.to_value()).unwrap();
    let rejected = engine.deliver_transaction(&to_carol.to_value());
    assert!(matches!(rejected, Err(TesseraError::DoubleSpend(_))));
    engine.commit_block("apphash2").unwrap();

    // only the first ordered spend made it in
    let spender = engine
        .store()
        .get_spent(&create.id.clone().unwrap(), 0)
        .unwrap()
        .unwrap();
    assert_eq!(spender.id, to_bob.id);
}

#[test]
fn double_spend_against_committed_state_is_rejected() {
    let engine = temp_engine();
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let carol = KeyPair::generate();

    let create = signed_create(&alice, &[100]);
    commit(&engine, 1, &[&create]);
    let to_bob = simple_transfer(&create, &alice, &bob, 100);
    commit(&engine, 2, &[&to_bob]);

    let to_carol = simple_transfer(&create, &alice, &carol, 100);
    assert!(matches!(
        engine.check_transaction(&to_carol.to_value()),
        Err(TesseraError::DoubleSpend(_))
    ));
}

#[test]
fn amount_mismatch_is_rejected() {
    let engine = temp_engine();
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();

    let create = signed_create(&alice, &[100]);
    commit(&engine, 1, &[&create]);

    let inflating = Transaction::transfer(
        create.to_inputs(None).unwrap(),
        &[
            (vec![bob.public_key_b58()], 60),
            (vec![bob.public_key_b58()], 50),
        ],
        create.id.clone().unwrap(),
        None,
    )
    .unwrap()
    .sign(&[alice.seed_b58()])
    .unwrap();

    assert!(matches!(
        engine.check_transaction(&inflating.to_value()),
        Err(TesseraError::AmountError(_))
    ));
}

#[test]
fn inputs_across_two_assets_are_rejected() {
    let engine = temp_engine();
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();

    let first = signed_create(&alice, &[10]);
    let second = signed_create(&alice, &[20]);
    commit(&engine, 1, &[&first, &second]);

    let mut inputs = first.to_inputs(None).unwrap();
    inputs.extend(second.to_inputs(None).unwrap());
    let mixed = Transaction::transfer(
        inputs,
        &[(vec![bob.public_key_b58()], 30)],
        first.id.clone().unwrap(),
        None,
    )
    .unwrap()
    .sign(&[alice.seed_b58()])
    .unwrap();

    assert!(matches!(
        engine.check_transaction(&mixed.to_value()),
        Err(TesseraError::AssetIdMismatch(_))
    ));
}

#[test]
fn two_distinct_outputs_of_one_transaction_may_be_spent_together() {
    let engine = temp_engine();
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();

    let create = signed_create(&alice, &[60, 40]);
    commit(&engine, 1, &[&create]);

    let merge = Transaction::transfer(
        create.to_inputs(None).unwrap(),
        &[(vec![bob.public_key_b58()], 100)],
        create.id.clone().unwrap(),
        None,
    )
    .unwrap()
    .sign(&[alice.seed_b58()])
    .unwrap();
    engine.check_transaction(&merge.to_value()).unwrap();
}

#[test]
fn spending_the_same_output_twice_in_one_transaction_is_rejected() {
    let engine = temp_engine();
    let alice = KeyPair::generate();

    let create = signed_create(&alice, &[50]);
    commit(&engine, 1, &[&create]);

    let mut inputs = create.to_inputs(Some(&[0])).unwrap();
    inputs.extend(create.to_inputs(Some(&[0])).unwrap());
    let doubled = Transaction::transfer(
        inputs,
        &[(vec![alice.public_key_b58()], 100)],
        create.id.clone().unwrap(),
        None,
    )
    .unwrap()
    .sign(&[alice.seed_b58()])
    .unwrap();

    assert!(matches!(
        engine.check_transaction(&doubled.to_value()),
        Err(TesseraError::DoubleSpend(_))
    ));
}

#[test]
fn unknown_input_transaction_is_rejected() {
    let engine = temp_engine();
    let alice = KeyPair::generate();

    let phantom = "0".repeat(64);
    let input = Input {
        owners_before: vec![alice.public_key_b58()],
        fulfills: Some(OutputLink::new(phantom.clone(), 0)),
        fulfillment: Some(Fulfillment::ed25519(alice.public_key)),
    };
    let transfer = Transaction::transfer(
        vec![input],
        &[(vec![alice.public_key_b58()], 1)],
        phantom,
        None,
    )
    .unwrap()
    .sign(&[alice.seed_b58()])
    .unwrap();

    assert!(matches!(
        engine.check_transaction(&transfer.to_value()),
        Err(TesseraError::InputDoesNotExist(_))
    ));
}

#[test]
fn threshold_two_of_three_spend() {
    let engine = temp_engine();
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let carol = KeyPair::generate();
    let dave = KeyPair::generate();

    let details = ConditionDetails::ThresholdSha256 {
        threshold: 2,
        subconditions: vec![
            ConditionDetails::Ed25519Sha256 {
                public_key: alice.public_key_b58(),
            },
            ConditionDetails::Ed25519Sha256 {
                public_key: bob.public_key_b58(),
            },
            ConditionDetails::Ed25519Sha256 {
                public_key: carol.public_key_b58(),
            },
        ],
    };
    let mut create = Transaction::create(
        &[alice.public_key_b58()],
        &[(vec![alice.public_key_b58()], 1)],
        None,
        None,
    )
    .unwrap();
    create.outputs = vec![Output::with_details(details.clone(), 30).unwrap()];
    let create = create.sign(&[alice.seed_b58()]).unwrap();
    commit(&engine, 1, &[&create]);

    let threshold_input = |owners: Vec<String>| Input {
        owners_before: owners,
        fulfills: Some(OutputLink::new(create.id.clone().unwrap(), 0)),
        fulfillment: Some(Fulfillment::from_details(&details).unwrap()),
    };

    // two of three signers satisfy the condition
    let spend = Transaction::transfer(
        vec![threshold_input(vec![
            alice.public_key_b58(),
            bob.public_key_b58(),
        ])],
        &[(vec![dave.public_key_b58()], 30)],
        create.id.clone().unwrap(),
        None,
    )
    .unwrap()
    .sign(&[alice.seed_b58(), bob.seed_b58()])
    .unwrap();
    assert!(spend
        .inputs_valid(Some(&create.outputs))
        .unwrap());
    engine.check_transaction(&spend.to_value()).unwrap();

    // one signer alone falls short of the threshold
    let undersigned = Transaction::transfer(
        vec![threshold_input(vec![alice.public_key_b58()])],
        &[(vec![dave.public_key_b58()], 30)],
        create.id.clone().unwrap(),
        None,
    )
    .unwrap()
    .sign(&[alice.seed_b58()])
    .unwrap();
    assert!(matches!(
        engine.check_transaction(&undersigned.to_value()),
        Err(TesseraError::InvalidSignature(_))
    ));
}

#[test]
fn tampered_metadata_is_caught_after_commit() {
    let engine = temp_engine();
    let alice = KeyPair::generate();

    let create = Transaction::create(
        &[alice.public_key_b58()],
        &[(vec![alice.public_key_b58()], 7)],
        None,
        Some(json!({"memo": "original"})),
    )
    .unwrap()
    .sign(&[alice.seed_b58()])
    .unwrap();
    commit(&engine, 1, &[&create]);

    let mut stored = engine
        .store()
        .get_transaction(&create.id.clone().unwrap())
        .unwrap()
        .unwrap();
    stored.metadata = Some(json!({"memo": "forged"}));
    assert!(matches!(
        stored.validate_id(),
        Err(TesseraError::InvalidHash(_))
    ));
}

#[test]
fn duplicate_transaction_is_rejected() {
    let engine = temp_engine();
    let alice = KeyPair::generate();

    let create = signed_create(&alice, &[10]);
    commit(&engine, 1, &[&create]);
    assert!(matches!(
        engine.check_transaction(&create.to_value()),
        Err(TesseraError::DuplicateKey(_))
    ));
}

// ── Store guarantees ─────────────────────────────────────────────────────────

#[test]
fn stored_transactions_reproduce_their_canonical_form() {
    let engine = temp_engine();
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();

    let create = Transaction::create(
        &[alice.public_key_b58()],
        &[(vec![alice.public_key_b58()], 100)],
        Some(json!({"kind": "ticket", "row": 7})),
        Some(json!({"issued_by": "box office"})),
    )
    .unwrap()
    .sign(&[alice.seed_b58()])
    .unwrap();
    let transfer = simple_transfer(&create, &alice, &bob, 100);
    commit(&engine, 1, &[&create]);
    commit(&engine, 2, &[&transfer]);

    for tx in [&create, &transfer] {
        let stored = engine
            .store()
            .get_transaction(tx.id.as_deref().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(
            to_canonical_string(&stored.to_value()).unwrap(),
            to_canonical_string(&tx.to_value()).unwrap()
        );
        stored.validate_structure(&registry()).unwrap();
    }
}

#[test]
fn latest_block_is_the_greatest_height() {
    let engine = temp_engine();
    let store = engine.store();
    for height in [3u64, 1, 2] {
        store
            .store_block(&Block {
                app_hash: format!("hash{height}"),
                height,
                transactions: vec![],
            })
            .unwrap();
    }
    assert_eq!(store.latest_block().unwrap().unwrap().height, 3);
}

#[test]
fn block_lookup_by_transaction() {
    let engine = temp_engine();
    let alice = KeyPair::generate();
    let create = signed_create(&alice, &[5]);
    let block = commit(&engine, 4, &[&create]);

    let found = engine
        .store()
        .get_block_with_transaction(create.id.as_deref().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(found, block);
    assert!(engine
        .store()
        .get_block_with_transaction(&"f".repeat(64))
        .unwrap()
        .is_none());
}

#[test]
fn validator_set_lookup_respects_the_height_floor() {
    let engine = temp_engine();
    let store = engine.store();
    for height in [2u64, 5] {
        store
            .store_validator_set(&ValidatorSet {
                height,
                validators: vec![Validator {
                    public_key: format!("validator-{height}"),
                    voting_power: 10,
                }],
            })
            .unwrap();
    }
    assert_eq!(store.get_validator_set(Some(4)).unwrap().unwrap().height, 2);
    assert_eq!(store.get_validator_set(Some(5)).unwrap().unwrap().height, 5);
    assert_eq!(store.get_validator_set(None).unwrap().unwrap().height, 5);
    assert!(store.get_validator_set(Some(1)).unwrap().is_none());
}

#[test]
fn metadata_reads_preserve_request_order() {
    let engine = temp_engine();
    let store = engine.store();
    store
        .store_metadata(&[
            ("a".repeat(64), json!({"n": 1})),
            ("b".repeat(64), json!({"n": 2})),
        ])
        .unwrap();

    let ids = vec!["b".repeat(64), "c".repeat(64), "a".repeat(64)];
    let rows = store.get_metadata(&ids).unwrap();
    assert_eq!(rows[0], Some(json!({"n": 2})));
    assert_eq!(rows[1], None);
    assert_eq!(rows[2], Some(json!({"n": 1})));
}

#[test]
fn asset_history_queries() {
    let engine = temp_engine();
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();

    let create = signed_create(&alice, &[100]);
    let create_id = create.id.clone().unwrap();
    let transfer = simple_transfer(&create, &alice, &bob, 100);
    commit(&engine, 1, &[&create]);
    commit(&engine, 2, &[&transfer]);

    let store = engine.store();
    assert_eq!(
        store.get_txids_filtered(&create_id, Some("CREATE")).unwrap(),
        vec![create_id.clone()]
    );
    assert_eq!(
        store.get_txids_filtered(&create_id, Some("TRANSFER")).unwrap(),
        vec![transfer.id.clone().unwrap()]
    );
    assert_eq!(store.get_txids_filtered(&create_id, None).unwrap().len(), 2);

    let bobs = store.get_owned_ids(&bob.public_key_b58()).unwrap();
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0].id, transfer.id);

    let for_bob = store
        .get_asset_tokens_for_public_key(&create_id, &bob.public_key_b58())
        .unwrap();
    assert_eq!(for_bob.len(), 1);
    assert_eq!(for_bob[0].id, transfer.id);
}

#[test]
fn rollback_undoes_an_unfinalized_block() {
    let engine = temp_engine();
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();

    let create = signed_create(&alice, &[100]);
    let create_id = create.id.clone().unwrap();
    commit(&engine, 1, &[&create]);

    // shred a follow-up block without ever writing its block row, as a crash
    // between deliver and commit would leave things
    let transfer = simple_transfer(&create, &alice, &bob, 100);
    let transfer_id = transfer.id.clone().unwrap();
    engine
        .store()
        .store_pre_commit_state(&tessera_core::types::PreCommitState {
            height: 2,
            transactions: vec![transfer_id.clone()],
        })
        .unwrap();
    engine
        .store()
        .store_transactions(std::slice::from_ref(&transfer))
        .unwrap();

    engine.rollback().unwrap();
    assert!(engine.store().get_transaction(&transfer_id).unwrap().is_none());
    assert!(engine.store().get_spent(&create_id, 0).unwrap().is_none());

    // the spend is valid again afterwards
    engine.check_transaction(&transfer.to_value()).unwrap();
}

#[test]
fn chain_identity_round_trip() {
    let engine = temp_engine();
    engine.init_chain("tessera-test-chain").unwrap();
    let chain = engine.load_abci_chain().unwrap().unwrap();
    assert_eq!(chain.chain_id, "tessera-test-chain");
    assert_eq!(chain.height, 0);
    assert!(chain.is_synced);
}
