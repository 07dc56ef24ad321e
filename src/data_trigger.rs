//! Data triggers
//!
//! Hooks keyed by `(data contract, document type, action)` that run extra
//! validation while a documents batch is validated against state. Triggers run
//! strictly in registration order, and documents strictly in batch order,
//! because a trigger may observe effects of the previous ones through the
//! shared execution context.

use std::fmt;
use std::sync::Arc;
use crate::consensus::ConsensusError;
use crate::context::ExecutionContext;
use crate::data_contract::DataContract;
use crate::document::{DocumentQuery, WhereClause};
use crate::document_transition::{DocumentTransition, DocumentTransitionAction};
use crate::error::Error;
use crate::hasher;
use crate::traits::StateRepository;
use crate::types::Identifier;

/// Longest allowed fully qualified domain name
pub const MAX_DOMAIN_NAME_LENGTH: usize = 253;

pub const DOMAIN_DOCUMENT_TYPE: &str = "domain";
pub const PREORDER_DOCUMENT_TYPE: &str = "preorder";

/// What a trigger sees while it runs
pub struct DataTriggerExecutionContext<'a> {
    pub state_repository: &'a dyn StateRepository,
    pub owner_id: Identifier,
    pub data_contract: &'a DataContract,
    pub execution_context: &'a mut ExecutionContext,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTriggerExecutionResult {
    errors: Vec<ConsensusError>,
}

impl DataTriggerExecutionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: ConsensusError) {
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[ConsensusError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ConsensusError> {
        self.errors
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

pub type DataTriggerFn = dyn Fn(
        &DocumentTransition,
        &mut DataTriggerExecutionContext<'_>,
        Option<&Identifier>,
    ) -> Result<DataTriggerExecutionResult, Error>
    + Send
    + Sync;

#[derive(Clone)]
pub struct DataTrigger {
    pub name: String,
    pub data_contract_id: Identifier,
    pub document_type: String,
    pub action: DocumentTransitionAction,
    pub top_level_identity: Option<Identifier>,
    trigger: Arc<DataTriggerFn>,
}

impl fmt::Debug for DataTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataTrigger")
            .field("name", &self.name)
            .field("data_contract_id", &self.data_contract_id)
            .field("document_type", &self.document_type)
            .field("action", &self.action)
            .field("top_level_identity", &self.top_level_identity)
            .finish()
    }
}

impl DataTrigger {
    pub fn new(
        name: impl Into<String>,
        data_contract_id: Identifier,
        document_type: impl Into<String>,
        action: DocumentTransitionAction,
        trigger: Arc<DataTriggerFn>,
    ) -> Self {
        Self {
            name: name.into(),
            data_contract_id,
            document_type: document_type.into(),
            action,
            top_level_identity: None,
            trigger,
        }
    }

    pub fn with_top_level_identity(mut self, identity_id: Identifier) -> Self {
        self.top_level_identity = Some(identity_id);
        self
    }

    pub fn is_matching(
        &self,
        data_contract_id: &Identifier,
        document_type: &str,
        action: DocumentTransitionAction,
    ) -> bool {
        self.data_contract_id == *data_contract_id
            && self.document_type == document_type
            && self.action == action
    }

    /// Run the trigger
    ///
    /// A failing trigger becomes a `DataTriggerExecution` consensus error.
    /// Repository failures are not the trigger's fault and stay fatal.
    pub fn execute(
        &self,
        transition: &DocumentTransition,
        context: &mut DataTriggerExecutionContext<'_>,
    ) -> Result<DataTriggerExecutionResult, Error> {
        match (self.trigger)(transition, context, self.top_level_identity.as_ref()) {
            Ok(result) => Ok(result),
            Err(Error::Repository(error)) => Err(Error::Repository(error)),
            Err(error) => {
                tracing::warn!(trigger = %self.name, document_id = %transition.id(), %error, "data trigger failed");
                let mut result = DataTriggerExecutionResult::new();
                result.add_error(ConsensusError::DataTriggerExecution {
                    data_contract_id: self.data_contract_id,
                    document_id: *transition.id(),
                    message: error.to_string(),
                });
                Ok(result)
            }
        }
    }
}

/// Ordered collection of data triggers
#[derive(Debug, Clone, Default)]
pub struct DataTriggerRegistry {
    triggers: Vec<DataTrigger>,
}

impl DataTriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a trigger after every trigger registered so far
    ///
    /// A trigger name may be used once per `(contract, type, action)`.
    pub fn register(&mut self, trigger: DataTrigger) -> Result<(), Error> {
        let conflict = self.triggers.iter().any(|existing| {
            existing.name == trigger.name
                && existing.is_matching(&trigger.data_contract_id, &trigger.document_type, trigger.action)
        });
        if conflict {
            return Err(Error::Configuration {
                reason: format!(
                    "Data trigger {} is already registered for {} {} {:?}",
                    trigger.name, trigger.data_contract_id, trigger.document_type, trigger.action
                ),
            });
        }

        self.triggers.push(trigger);
        Ok(())
    }

    /// Triggers for a key, in registration order
    pub fn get_data_triggers(
        &self,
        data_contract_id: &Identifier,
        document_type: &str,
        action: DocumentTransitionAction,
    ) -> Vec<&DataTrigger> {
        self.triggers
            .iter()
            .filter(|trigger| trigger.is_matching(data_contract_id, document_type, action))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Register the name-service triggers for a domain contract
    ///
    /// Domains may only be created, and only `top_level_identity` may create
    /// top-level domains. Preorders are immutable.
    pub fn register_dpns_triggers(
        &mut self,
        data_contract_id: Identifier,
        top_level_identity: Identifier,
    ) -> Result<(), Error> {
        self.register(
            DataTrigger::new(
                "createDomain",
                data_contract_id,
                DOMAIN_DOCUMENT_TYPE,
                DocumentTransitionAction::Create,
                Arc::new(create_domain_data_trigger),
            )
            .with_top_level_identity(top_level_identity),
        )?;

        let immutable = [
            (DOMAIN_DOCUMENT_TYPE, DocumentTransitionAction::Replace),
            (DOMAIN_DOCUMENT_TYPE, DocumentTransitionAction::Delete),
            (PREORDER_DOCUMENT_TYPE, DocumentTransitionAction::Replace),
            (PREORDER_DOCUMENT_TYPE, DocumentTransitionAction::Delete),
        ];
        for (document_type, action) in immutable {
            self.register(DataTrigger::new(
                "reject",
                data_contract_id,
                document_type,
                action,
                Arc::new(reject_data_trigger),
            ))?;
        }

        Ok(())
    }
}

/// Runs the registered triggers over a batch
#[derive(Debug, Clone, Default)]
pub struct DataTriggerEngine {
    registry: Arc<DataTriggerRegistry>,
}

impl DataTriggerEngine {
    pub fn new(registry: Arc<DataTriggerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &DataTriggerRegistry {
        &self.registry
    }

    /// One result per document transition, in batch order
    ///
    /// All triggers of all documents run even when earlier ones fail.
    pub fn execute(
        &self,
        transitions: &[&DocumentTransition],
        context: &mut DataTriggerExecutionContext<'_>,
    ) -> Result<Vec<DataTriggerExecutionResult>, Error> {
        let mut results = Vec::with_capacity(transitions.len());

        for transition in transitions {
            let triggers = self.registry.get_data_triggers(
                transition.data_contract_id(),
                transition.document_type(),
                transition.action(),
            );

            let mut document_result = DataTriggerExecutionResult::new();
            for trigger in triggers {
                let result = trigger.execute(transition, context)?;
                document_result.errors.extend(result.into_errors());
            }
            results.push(document_result);
        }

        Ok(results)
    }
}

fn condition_error(
    context: &DataTriggerExecutionContext<'_>,
    transition: &DocumentTransition,
    message: impl Into<String>,
) -> ConsensusError {
    ConsensusError::DataTriggerCondition {
        data_contract_id: context.data_contract.id,
        document_id: *transition.id(),
        message: message.into(),
    }
}

/// Rejects every transition it is registered for
pub fn reject_data_trigger(
    transition: &DocumentTransition,
    context: &mut DataTriggerExecutionContext<'_>,
    _top_level_identity: Option<&Identifier>,
) -> Result<DataTriggerExecutionResult, Error> {
    let mut result = DataTriggerExecutionResult::new();
    result.add_error(condition_error(context, transition, "Action is not allowed"));
    Ok(result)
}

/// Validates a new domain name document
///
/// The name must be normalized, point its records at the owner and be backed
/// by a preorder of its salted hash. A top-level name needs the top-level
/// identity; a subdomain needs an existing parent that lets the owner register
/// under it. Only the lookups run on dry run.
pub fn create_domain_data_trigger(
    transition: &DocumentTransition,
    context: &mut DataTriggerExecutionContext<'_>,
    top_level_identity: Option<&Identifier>,
) -> Result<DataTriggerExecutionResult, Error> {
    let DocumentTransition::Create(create) = transition else {
        return Err(Error::DataTrigger {
            reason: "domain trigger expects a create transition".to_string(),
        });
    };

    let text_field = |name: &str| -> Result<String, Error> {
        create
            .data
            .get(name)
            .and_then(|value| value.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::DataTrigger {
                reason: format!("domain document is missing {}", name),
            })
    };

    let label = text_field("label")?;
    let normalized_label = text_field("normalizedLabel")?;
    let normalized_parent_domain_name = text_field("normalizedParentDomainName")?;
    let preorder_salt = hex::decode(text_field("preorderSalt")?).map_err(|e| Error::DataTrigger {
        reason: format!("domain document has an invalid preorderSalt: {}", e),
    })?;
    let allows_subdomains = create
        .data
        .get("subdomainRules")
        .and_then(|rules| rules.get("allowSubdomains"))
        .and_then(|value| value.as_bool())
        .unwrap_or(false);

    let dry_run = context.execution_context.is_dry_run();
    let mut result = DataTriggerExecutionResult::new();

    let full_domain_name = if normalized_parent_domain_name.is_empty() {
        normalized_label.clone()
    } else {
        format!("{}.{}", normalized_label, normalized_parent_domain_name)
    };

    if !dry_run {
        if full_domain_name.len() > MAX_DOMAIN_NAME_LENGTH {
            result.add_error(condition_error(
                context,
                transition,
                format!("Full domain name length can not be more than {} characters long", MAX_DOMAIN_NAME_LENGTH),
            ));
        }

        if normalized_label != label.to_lowercase() {
            result.add_error(condition_error(context, transition, "Normalized label doesn't match label"));
        }

        if normalized_parent_domain_name != normalized_parent_domain_name.to_lowercase() {
            result.add_error(condition_error(
                context,
                transition,
                "Parent domain name is not normalized",
            ));
        }

        let owner_hex = context.owner_id.to_hex();
        if let Some(records) = create.data.get("records") {
            for record in ["dashUniqueIdentityId", "dashAliasIdentityId"] {
                if let Some(identity) = records.get(record).and_then(|value| value.as_str()) {
                    if identity != owner_hex {
                        result.add_error(condition_error(
                            context,
                            transition,
                            format!("ownerId {} doesn't match {} {}", owner_hex, record, identity),
                        ));
                    }
                }
            }
        }

        if normalized_parent_domain_name.is_empty() && top_level_identity != Some(&context.owner_id) {
            result.add_error(condition_error(
                context,
                transition,
                "Can't create top level domain for this identity",
            ));
        }
    }

    if !normalized_parent_domain_name.is_empty() {
        let (parent_label, grand_parent_domain_name) = match normalized_parent_domain_name.split_once('.') {
            Some((label, rest)) => (label.to_string(), rest.to_string()),
            None => (normalized_parent_domain_name.clone(), String::new()),
        };

        let query = DocumentQuery::new()
            .with_where(WhereClause::equal("normalizedParentDomainName", grand_parent_domain_name.into()))
            .with_where(WhereClause::equal("normalizedLabel", parent_label.into()));
        let parents = context.state_repository.fetch_documents(
            &context.data_contract.id,
            DOMAIN_DOCUMENT_TYPE,
            &query,
            &mut *context.execution_context,
        )?;

        if !dry_run {
            let Some(parent) = parents.first() else {
                result.add_error(condition_error(context, transition, "Parent domain is not present"));
                return Ok(result);
            };

            if allows_subdomains {
                result.add_error(condition_error(
                    context,
                    transition,
                    "Allowing subdomains registration is forbidden for this domain",
                ));
                return Ok(result);
            }

            let parent_allows_subdomains = parent
                .get("subdomainRules.allowSubdomains")
                .and_then(|value| value.as_bool())
                .unwrap_or(false);
            if !parent_allows_subdomains && parent.owner_id != context.owner_id {
                result.add_error(condition_error(
                    context,
                    transition,
                    "The subdomain can be created only by the parent domain owner",
                ));
                return Ok(result);
            }
        }
    }

    let salted_domain_hash = hasher::salted_domain_hash(&preorder_salt, &full_domain_name);
    let query = DocumentQuery::new().with_where(WhereClause::equal(
        "saltedDomainHash",
        hex::encode(salted_domain_hash).into(),
    ));
    let preorders = context.state_repository.fetch_documents(
        &context.data_contract.id,
        PREORDER_DOCUMENT_TYPE,
        &query,
        &mut *context.execution_context,
    )?;

    if !dry_run && preorders.is_empty() {
        result.add_error(condition_error(context, transition, "preorderDocument was not found"));
    }

    Ok(result)
}
