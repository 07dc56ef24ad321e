mod common;

use common::*;
use serde_json::json;
use stengine::hasher;
use stengine::{
    BinaryData, DataContract, DataContractCreateTransition, DataContractUpdateTransition,
    ExecutionContext, Identifier, Stage, StateTransition, PROTOCOL_VERSION,
};

const ENTROPY: [u8; 32] = [0x09; 32];

fn library_contract(version: u32) -> DataContract {
    let id = hasher::derive_data_contract_id(&owner_id(), &ENTROPY);
    serde_json::from_value(json!({
        "protocolVersion": PROTOCOL_VERSION,
        "$id": id.to_hex(),
        "version": version,
        "ownerId": owner_id().to_hex(),
        "documents": {
            "book": {
                "type": "object",
                "properties": {
                    "title": { "type": "string", "maxLength": 200 },
                    "isbn": { "type": "string" }
                },
                "required": ["title"],
                "indices": [
                    { "name": "isbn", "properties": [{ "isbn": "asc" }], "unique": true }
                ]
            }
        }
    }))
    .unwrap()
}

fn contract_create(data_contract: DataContract) -> StateTransition {
    let mut transition = StateTransition::DataContractCreate(DataContractCreateTransition {
        protocol_version: PROTOCOL_VERSION,
        data_contract,
        entropy: BinaryData::new(ENTROPY.to_vec()),
        signature_public_key_id: None,
        signature: BinaryData::default(),
    });
    sign(&mut transition, &owner_key(HIGH_KEY_ID));
    transition
}

fn contract_update(data_contract: DataContract) -> StateTransition {
    let mut transition = StateTransition::DataContractUpdate(DataContractUpdateTransition {
        protocol_version: PROTOCOL_VERSION,
        data_contract,
        signature_public_key_id: None,
        signature: BinaryData::default(),
    });
    sign(&mut transition, &owner_key(HIGH_KEY_ID));
    transition
}

#[test]
fn test_contract_create_is_stored() {
    let repository = repository();
    let processor = processor(&repository);
    let transition = contract_create(library_contract(1));

    let outcome = processor
        .process_bytes(&transition.to_bytes().unwrap(), &mut ExecutionContext::new())
        .unwrap();
    assert!(outcome.is_valid(), "unexpected errors: {:?}", outcome.error_codes());

    let stored = repository
        .data_contract(&library_contract(1).id)
        .unwrap()
        .unwrap();
    assert_eq!(stored, library_contract(1));
    assert_eq!(stored.unique_indices("book").len(), 1);
}

#[test]
fn test_contract_create_twice_is_rejected() {
    let repository = repository();
    let processor = processor(&repository);
    let transition = contract_create(library_contract(1));

    assert!(processor.process(&transition, &mut ExecutionContext::new()).unwrap().applied);

    let outcome = processor.process(&transition, &mut ExecutionContext::new()).unwrap();
    assert_eq!(outcome.failed_stage, Some(Stage::State));
    assert_eq!(outcome.error_codes(), vec![4000]);
}

#[test]
fn test_contract_id_must_derive_from_entropy() {
    let repository = repository();
    let processor = processor(&repository);
    let mut data_contract = library_contract(1);
    data_contract.id = Identifier([0x5a; 32]);

    let outcome = processor
        .process_bytes(
            &contract_create(data_contract).to_bytes().unwrap(),
            &mut ExecutionContext::new(),
        )
        .unwrap();
    assert_eq!(outcome.failed_stage, Some(Stage::Structure));
    assert_eq!(outcome.error_codes(), vec![1011]);
}

#[test]
fn test_contract_update_advances_version_by_one() {
    let repository = repository();
    let processor = processor(&repository);
    processor
        .process(&contract_create(library_contract(1)), &mut ExecutionContext::new())
        .unwrap();

    let skipped = processor
        .process(&contract_update(library_contract(3)), &mut ExecutionContext::new())
        .unwrap();
    assert_eq!(skipped.error_codes(), vec![1050]);

    let next = processor
        .process(&contract_update(library_contract(2)), &mut ExecutionContext::new())
        .unwrap();
    assert!(next.is_valid(), "unexpected errors: {:?}", next.error_codes());
    assert_eq!(
        repository
            .data_contract(&library_contract(1).id)
            .unwrap()
            .map(|data_contract| data_contract.version),
        Some(2)
    );
}

#[test]
fn test_update_of_unknown_contract() {
    let repository = repository();
    let processor = processor(&repository);

    let outcome = processor
        .process(&contract_update(library_contract(2)), &mut ExecutionContext::new())
        .unwrap();
    assert_eq!(outcome.failed_stage, Some(Stage::State));
    assert_eq!(outcome.error_codes(), vec![1018]);
}
