mod common;

use common::*;
use std::sync::Arc;
use stengine::{
    AssetLockProof, BinaryData, ExecutionContext, IdentityCreateTransition, IdentityPublicKey,
    IdentityTopUpTransition, IdentityUpdateTransition, InMemoryStateRepository, KeyType,
    SecurityLevel, Stage, StateTransition, PROTOCOL_VERSION,
};

const LOCKED_DUFFS: u64 = 1_000_000;
const CREDITS_PER_DUFF: u64 = 1000;

fn new_identity_keys() -> Vec<IdentityPublicKey> {
    vec![
        key(0, KeyType::EcdsaSecp256k1, SecurityLevel::Master, 0x61),
        key(1, KeyType::EcdsaSecp256k1, SecurityLevel::High, 0x62),
    ]
}

fn identity_create(proof: &AssetLockProof) -> StateTransition {
    let mut transition = StateTransition::IdentityCreate(IdentityCreateTransition {
        protocol_version: PROTOCOL_VERSION,
        identity_id: proof.create_identifier(),
        public_keys: new_identity_keys(),
        asset_lock_proof: proof.clone(),
        signature: BinaryData::default(),
    });
    sign_with_asset_lock(&mut transition, proof);
    transition
}

fn identity_top_up(proof: &AssetLockProof) -> StateTransition {
    let mut transition = StateTransition::IdentityTopUp(IdentityTopUpTransition {
        protocol_version: PROTOCOL_VERSION,
        identity_id: owner_id(),
        asset_lock_proof: proof.clone(),
        signature: BinaryData::default(),
    });
    sign_with_asset_lock(&mut transition, proof);
    transition
}

fn identity_update(
    revision: u64,
    public_keys_to_add: Vec<IdentityPublicKey>,
    public_key_ids_to_disable: Vec<u32>,
) -> StateTransition {
    let public_keys_disabled_at = if public_key_ids_to_disable.is_empty() {
        None
    } else {
        Some(NOW)
    };
    let mut transition = StateTransition::IdentityUpdate(IdentityUpdateTransition {
        protocol_version: PROTOCOL_VERSION,
        identity_id: owner_id(),
        revision,
        public_keys_to_add,
        public_key_ids_to_disable,
        public_keys_disabled_at,
        signature_public_key_id: None,
        signature: BinaryData::default(),
    });
    sign(&mut transition, &owner_key(MASTER_KEY_ID));
    transition
}

fn process_bytes(repository: &Arc<InMemoryStateRepository>, transition: &StateTransition) -> stengine::ProcessingOutcome {
    processor(repository)
        .process_bytes(&transition.to_bytes().unwrap(), &mut ExecutionContext::new())
        .unwrap()
}

#[test]
fn test_identity_create_funds_and_indexes_identity() {
    let repository = repository();
    let credits_before = repository.system_credits().unwrap();
    let proof = asset_lock_proof(0x41, LOCKED_DUFFS);

    let outcome = process_bytes(&repository, &identity_create(&proof));
    assert!(outcome.is_valid(), "unexpected errors: {:?}", outcome.error_codes());
    assert!(outcome.applied);

    let identity_id = proof.create_identifier();
    let identity = repository.identity(&identity_id).unwrap().unwrap();
    assert_eq!(identity.balance, LOCKED_DUFFS * CREDITS_PER_DUFF);
    assert_eq!(identity.revision, 0);
    assert_eq!(identity.public_keys, new_identity_keys());

    assert!(repository.is_out_point_used(&proof.out_point).unwrap());
    assert_eq!(
        repository.system_credits().unwrap(),
        credits_before + LOCKED_DUFFS * CREDITS_PER_DUFF
    );
    for key in new_identity_keys() {
        assert_eq!(
            repository.identity_by_public_key_hash(&key.hash()).unwrap(),
            Some(identity_id)
        );
    }
}

#[test]
fn test_identity_create_without_master_key() {
    let repository = repository();
    let proof = asset_lock_proof(0x42, LOCKED_DUFFS);
    let mut transition = identity_create(&proof);
    if let StateTransition::IdentityCreate(create) = &mut transition {
        create.public_keys.remove(0);
    }
    sign_with_asset_lock(&mut transition, &proof);

    let outcome = process_bytes(&repository, &transition);
    assert_eq!(outcome.failed_stage, Some(Stage::Structure));
    assert_eq!(outcome.error_codes(), vec![1046]);
}

#[test]
fn test_asset_lock_below_minimum() {
    let repository = repository();
    let proof = asset_lock_proof(0x43, 999);

    let outcome = process_bytes(&repository, &identity_create(&proof));
    assert_eq!(outcome.error_codes(), vec![1034]);
}

#[test]
fn test_reused_out_point_is_rejected() {
    let repository = repository();
    let proof = asset_lock_proof(0x44, LOCKED_DUFFS);
    assert!(process_bytes(&repository, &identity_create(&proof)).applied);

    let outcome = process_bytes(&repository, &identity_top_up(&proof));
    assert_eq!(outcome.failed_stage, Some(Stage::State));
    assert_eq!(outcome.error_codes(), vec![1033]);
}

#[test]
fn test_top_up_increases_balance() {
    let repository = repository();
    let proof = asset_lock_proof(0x45, 5_000);

    let outcome = process_bytes(&repository, &identity_top_up(&proof));
    assert!(outcome.is_valid(), "unexpected errors: {:?}", outcome.error_codes());

    let identity = repository.identity(&owner_id()).unwrap().unwrap();
    assert_eq!(identity.balance, RICH_BALANCE + 5_000 * CREDITS_PER_DUFF);
    assert!(repository.is_out_point_used(&proof.out_point).unwrap());
}

#[test]
fn test_update_adds_and_disables_keys() {
    let repository = repository();
    let added = key(4, KeyType::EcdsaSecp256k1, SecurityLevel::High, 0x66);

    let outcome = process_bytes(
        &repository,
        &identity_update(1, vec![added.clone()], vec![MEDIUM_KEY_ID]),
    );
    assert!(outcome.is_valid(), "unexpected errors: {:?}", outcome.error_codes());

    let identity = repository.identity(&owner_id()).unwrap().unwrap();
    assert_eq!(identity.revision, 1);
    assert_eq!(identity.get_public_key_by_id(4), Some(&added));
    assert_eq!(
        identity.get_public_key_by_id(MEDIUM_KEY_ID).and_then(|key| key.disabled_at),
        Some(NOW)
    );
    assert_eq!(
        repository.identity_by_public_key_hash(&added.hash()).unwrap(),
        Some(owner_id())
    );
}

#[test]
fn test_update_with_wrong_revision() {
    let repository = repository();

    let outcome = process_bytes(&repository, &identity_update(5, vec![], vec![MEDIUM_KEY_ID]));
    assert_eq!(outcome.failed_stage, Some(Stage::State));
    assert_eq!(outcome.error_codes(), vec![4015]);
}

#[test]
fn test_update_cannot_disable_read_only_key() {
    let repository = repository();
    let mut owner = identity(owner_id(), RICH_BALANCE);
    if let Some(key) = owner.get_public_key_by_id_mut(MEDIUM_KEY_ID) {
        key.read_only = true;
    }
    repository.insert_identity(owner).unwrap();

    let outcome = process_bytes(&repository, &identity_update(1, vec![], vec![MEDIUM_KEY_ID]));
    assert_eq!(outcome.error_codes(), vec![4013]);
}

#[test]
fn test_update_disable_keys_needs_timestamp() {
    let repository = repository();
    let mut transition = identity_update(1, vec![], vec![MEDIUM_KEY_ID]);
    if let StateTransition::IdentityUpdate(update) = &mut transition {
        update.public_keys_disabled_at = None;
    }
    sign(&mut transition, &owner_key(MASTER_KEY_ID));

    let outcome = process_bytes(&repository, &transition);
    assert_eq!(outcome.failed_stage, Some(Stage::Structure));
    assert_eq!(outcome.error_codes(), vec![1047]);
}

#[test]
fn test_empty_update_is_rejected() {
    let repository = repository();

    let outcome = process_bytes(&repository, &identity_update(1, vec![], vec![]));
    assert_eq!(outcome.error_codes(), vec![1048]);
}
