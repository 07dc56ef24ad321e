mod common;

use common::*;
use serde_json::{json, Value};
use std::sync::Arc;
use stengine::data_trigger::{
    DataTrigger, DataTriggerExecutionContext, DataTriggerExecutionResult, DataTriggerRegistry,
};
use stengine::hasher;
use stengine::{
    BinaryData, ConsensusError, DataContract, Document, DocumentBaseTransition,
    DocumentCreateTransition, DocumentReplaceTransition, DocumentTransition,
    DocumentTransitionAction, Error, ExecutionContext, Identifier, InMemoryStateRepository,
    PROTOCOL_VERSION,
};

fn dpns_contract() -> DataContract {
    serde_json::from_value(json!({
        "protocolVersion": PROTOCOL_VERSION,
        "$id": Identifier([0x0d; 32]).to_hex(),
        "version": 1,
        "ownerId": owner_id().to_hex(),
        "documents": {
            "domain": {
                "type": "object",
                "properties": {
                    "label": { "type": "string" },
                    "normalizedLabel": { "type": "string" },
                    "normalizedParentDomainName": { "type": "string" },
                    "preorderSalt": { "type": "string" },
                    "records": { "type": "object" },
                    "subdomainRules": { "type": "object" }
                },
                "required": ["label", "normalizedLabel", "normalizedParentDomainName", "preorderSalt"]
            },
            "preorder": {
                "type": "object",
                "properties": { "saltedDomainHash": { "type": "string" } },
                "required": ["saltedDomainHash"]
            }
        }
    }))
    .unwrap()
}

fn dpns_repository() -> Arc<InMemoryStateRepository> {
    let repository = repository();
    repository.insert_data_contract(dpns_contract()).unwrap();
    repository
}

fn dpns_registry() -> DataTriggerRegistry {
    let mut registry = DataTriggerRegistry::new();
    registry
        .register_dpns_triggers(dpns_contract().id, owner_id())
        .unwrap();
    registry
}

const SALT: [u8; 32] = [0x5a; 32];

fn domain_data(label: &str, parent: &str, owner: &Identifier) -> Value {
    json!({
        "label": label,
        "normalizedLabel": label.to_lowercase(),
        "normalizedParentDomainName": parent,
        "preorderSalt": hex::encode(SALT),
        "records": { "dashUniqueIdentityId": owner.to_hex() },
        "subdomainRules": { "allowSubdomains": false }
    })
}

fn create_domain(seed: u8, data: Value) -> DocumentTransition {
    DocumentTransition::Create(DocumentCreateTransition {
        base: DocumentBaseTransition {
            id: Identifier([seed; 32]),
            document_type: "domain".to_string(),
            data_contract_id: dpns_contract().id,
        },
        entropy: BinaryData::new(vec![seed; 32]),
        created_at: Some(NOW),
        updated_at: Some(NOW),
        data: into_map(data),
    })
}

fn stored_domain(seed: u8, data: Value, owner: Identifier) -> Document {
    Document {
        id: Identifier([seed; 32]),
        document_type: "domain".to_string(),
        data_contract_id: dpns_contract().id,
        owner_id: owner,
        revision: 1,
        created_at: Some(NOW),
        updated_at: Some(NOW),
        data: into_map(data),
    }
}

fn preorder(seed: u8, salt: &[u8], full_domain_name: &str) -> Document {
    Document {
        id: Identifier([seed; 32]),
        document_type: "preorder".to_string(),
        data_contract_id: dpns_contract().id,
        owner_id: owner_id(),
        revision: 1,
        created_at: Some(NOW),
        updated_at: Some(NOW),
        data: into_map(json!({
            "saltedDomainHash": hex::encode(hasher::salted_domain_hash(salt, full_domain_name))
        })),
    }
}

fn condition_messages(errors: &[ConsensusError]) -> Vec<String> {
    errors
        .iter()
        .filter_map(|error| match error {
            ConsensusError::DataTriggerCondition { message, .. } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_top_level_domain_requires_top_level_identity() {
    let repository = dpns_repository();
    repository.insert_document(preorder(0x81, &SALT, "dash")).unwrap();
    let processor = processor_with(&repository, dpns_registry(), None);

    let own = signed_batch(&owner_id(), vec![create_domain(1, domain_data("Dash", "", &owner_id()))]);
    let outcome = processor.validate(&own, &mut ExecutionContext::new()).unwrap();
    assert!(outcome.is_valid(), "unexpected errors: {:?}", outcome.error_codes());

    let foreign = signed_batch(
        &other_owner_id(),
        vec![create_domain(1, domain_data("Dash", "", &other_owner_id()))],
    );
    let outcome = processor.validate(&foreign, &mut ExecutionContext::new()).unwrap();
    assert_eq!(outcome.error_codes(), vec![4001]);
}

#[test]
fn test_subdomain_needs_parent_and_permission() {
    let repository = dpns_repository();
    let processor = processor_with(&repository, dpns_registry(), None);
    let transition = signed_batch(
        &other_owner_id(),
        vec![create_domain(2, domain_data("alice", "dash", &other_owner_id()))],
    );

    let outcome = processor.validate(&transition, &mut ExecutionContext::new()).unwrap();
    assert_eq!(
        condition_messages(outcome.result.errors()),
        vec!["Parent domain is not present".to_string()]
    );

    repository
        .insert_document(stored_domain(1, domain_data("dash", "", &owner_id()), owner_id()))
        .unwrap();
    let outcome = processor.validate(&transition, &mut ExecutionContext::new()).unwrap();
    assert_eq!(
        condition_messages(outcome.result.errors()),
        vec!["The subdomain can be created only by the parent domain owner".to_string()]
    );

    repository.insert_document(preorder(0x82, &SALT, "bob.dash")).unwrap();
    let own_subdomain = signed_batch(
        &owner_id(),
        vec![create_domain(3, domain_data("bob", "dash", &owner_id()))],
    );
    let outcome = processor.validate(&own_subdomain, &mut ExecutionContext::new()).unwrap();
    assert!(outcome.is_valid(), "unexpected errors: {:?}", outcome.error_codes());
}

#[test]
fn test_record_must_point_at_owner() {
    let repository = dpns_repository();
    repository.insert_document(preorder(0x81, &SALT, "dash")).unwrap();
    let processor = processor_with(&repository, dpns_registry(), None);
    let transition = signed_batch(
        &owner_id(),
        vec![create_domain(1, domain_data("dash", "", &other_owner_id()))],
    );

    let outcome = processor.validate(&transition, &mut ExecutionContext::new()).unwrap();
    assert_eq!(outcome.error_codes(), vec![4001]);
}

#[test]
fn test_domain_requires_matching_preorder() {
    let repository = dpns_repository();
    let processor = processor_with(&repository, dpns_registry(), None);
    let transition = signed_batch(&owner_id(), vec![create_domain(1, domain_data("dash", "", &owner_id()))]);

    let outcome = processor.validate(&transition, &mut ExecutionContext::new()).unwrap();
    assert_eq!(outcome.error_codes(), vec![4001]);
    assert_eq!(
        condition_messages(outcome.result.errors()),
        vec!["preorderDocument was not found".to_string()]
    );

    repository.insert_document(preorder(0x81, &[0x01; 32], "dash")).unwrap();
    let outcome = processor.validate(&transition, &mut ExecutionContext::new()).unwrap();
    assert_eq!(
        condition_messages(outcome.result.errors()),
        vec!["preorderDocument was not found".to_string()]
    );

    repository.insert_document(preorder(0x82, &SALT, "dash")).unwrap();
    let outcome = processor.validate(&transition, &mut ExecutionContext::new()).unwrap();
    assert!(outcome.is_valid(), "unexpected errors: {:?}", outcome.error_codes());
}

#[test]
fn test_subdomain_may_not_allow_subdomains() {
    let repository = dpns_repository();
    repository
        .insert_document(stored_domain(1, domain_data("dash", "", &owner_id()), owner_id()))
        .unwrap();
    repository.insert_document(preorder(0x82, &SALT, "bob.dash")).unwrap();
    let processor = processor_with(&repository, dpns_registry(), None);

    let mut data = domain_data("bob", "dash", &owner_id());
    data["subdomainRules"]["allowSubdomains"] = json!(true);
    let transition = signed_batch(&owner_id(), vec![create_domain(3, data)]);

    let outcome = processor.validate(&transition, &mut ExecutionContext::new()).unwrap();
    assert_eq!(outcome.error_codes(), vec![4001]);
    assert_eq!(
        condition_messages(outcome.result.errors()),
        vec!["Allowing subdomains registration is forbidden for this domain".to_string()]
    );
}

#[test]
fn test_domain_rules_are_skipped_on_dry_run() {
    let repository = dpns_repository();
    let processor = processor_with(&repository, dpns_registry(), None);
    let transition = signed_batch(
        &other_owner_id(),
        vec![create_domain(2, domain_data("alice", "dash", &owner_id()))],
    );

    let outcome = processor.validate(&transition, &mut ExecutionContext::dry_run()).unwrap();
    assert!(outcome.is_valid(), "unexpected errors: {:?}", outcome.error_codes());

    let outcome = processor.validate(&transition, &mut ExecutionContext::new()).unwrap();
    assert!(!outcome.is_valid());
}

#[test]
fn test_domain_replace_is_rejected() {
    let repository = dpns_repository();
    let data = domain_data("dash", "", &owner_id());
    repository
        .insert_document(stored_domain(1, data.clone(), owner_id()))
        .unwrap();
    let processor = processor_with(&repository, dpns_registry(), None);

    let replace = DocumentTransition::Replace(DocumentReplaceTransition {
        base: DocumentBaseTransition {
            id: Identifier([1; 32]),
            document_type: "domain".to_string(),
            data_contract_id: dpns_contract().id,
        },
        revision: 2,
        updated_at: Some(NOW),
        data: into_map(data),
    });
    let outcome = processor
        .validate(&signed_batch(&owner_id(), vec![replace]), &mut ExecutionContext::new())
        .unwrap();

    assert_eq!(
        condition_messages(outcome.result.errors()),
        vec!["Action is not allowed".to_string()]
    );
}

#[test]
fn test_failing_trigger_becomes_execution_error() {
    let repository = repository();
    let mut registry = DataTriggerRegistry::new();
    registry
        .register(DataTrigger::new(
            "broken",
            note_contract().id,
            "note",
            DocumentTransitionAction::Create,
            Arc::new(
                |_: &DocumentTransition, _: &mut DataTriggerExecutionContext<'_>, _: Option<&Identifier>| {
                    Err(Error::DataTrigger {
                        reason: "lookup table missing".to_string(),
                    })
                },
            ),
        ))
        .unwrap();
    let processor = processor_with(&repository, registry, None);

    let transition = signed_batch(&owner_id(), vec![create_note(&owner_id(), 1, "hello")]);
    let outcome = processor.validate(&transition, &mut ExecutionContext::new()).unwrap();

    assert_eq!(outcome.error_codes(), vec![4002]);
}

fn condition_trigger(name: &'static str) -> DataTrigger {
    DataTrigger::new(
        name,
        note_contract().id,
        "note",
        DocumentTransitionAction::Create,
        Arc::new(
            move |transition: &DocumentTransition,
                  context: &mut DataTriggerExecutionContext<'_>,
                  _: Option<&Identifier>| {
                let mut result = DataTriggerExecutionResult::new();
                result.add_error(ConsensusError::DataTriggerCondition {
                    data_contract_id: context.data_contract.id,
                    document_id: *transition.id(),
                    message: name.to_string(),
                });
                Ok(result)
            },
        ),
    )
}

#[test]
fn test_triggers_run_in_registration_and_batch_order() {
    let repository = repository();
    let mut registry = DataTriggerRegistry::new();
    registry.register(condition_trigger("first")).unwrap();
    registry.register(condition_trigger("second")).unwrap();
    let processor = processor_with(&repository, registry, None);

    let first = create_note(&owner_id(), 1, "one");
    let second = create_note(&owner_id(), 2, "two");
    let transition = signed_batch(&owner_id(), vec![first.clone(), second.clone()]);
    let outcome = processor.validate(&transition, &mut ExecutionContext::new()).unwrap();

    assert_eq!(
        condition_messages(outcome.result.errors()),
        vec!["first", "second", "first", "second"]
    );
    let document_ids: Vec<Identifier> = outcome
        .result
        .errors()
        .iter()
        .filter_map(|error| match error {
            ConsensusError::DataTriggerCondition { document_id, .. } => Some(*document_id),
            _ => None,
        })
        .collect();
    assert_eq!(
        document_ids,
        vec![*first.id(), *first.id(), *second.id(), *second.id()]
    );
}

#[test]
fn test_duplicate_trigger_name_is_a_configuration_error() {
    let mut registry = DataTriggerRegistry::new();
    registry.register(condition_trigger("only")).unwrap();

    let error = registry.register(condition_trigger("only")).unwrap_err();
    assert!(matches!(error, Error::Configuration { .. }));
    assert_eq!(registry.len(), 1);
}
