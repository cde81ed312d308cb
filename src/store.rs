//! Credential storage seam used by the holder.

use std::{fmt::Debug, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value as Json;
use tokio::sync::RwLock;
use tracing::debug;

use crate::core::{
    credential::Credential,
    hash::{Sha256FieldHasher, ValueHasher},
    query::{AllowedIssuers, Comparison, DisclosureQuery, Operator, SubjectQuery},
};

/// Selection criteria for [CredentialStore::find_by_predicate].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialPredicate {
    pub schema_type: Option<String>,
    pub context: Option<String>,
    pub allowed_issuers: AllowedIssuers,
    pub credential_subject_id: Option<String>,
    pub credential_id: Option<String>,
    pub subject: SubjectQuery,
}

impl CredentialPredicate {
    pub fn from_query(query: &DisclosureQuery) -> Self {
        Self {
            schema_type: Some(query.schema_type.clone()),
            context: query.context.clone(),
            allowed_issuers: query.allowed_issuers.clone(),
            credential_subject_id: None,
            credential_id: None,
            subject: query.credential_subject.clone(),
        }
    }

    pub fn with_subject_id(mut self, subject_id: impl Into<String>) -> Self {
        self.credential_subject_id = Some(subject_id.into());
        self
    }

    pub fn with_credential_id(mut self, credential_id: impl Into<String>) -> Self {
        self.credential_id = Some(credential_id.into());
        self
    }

    /// Evaluate the predicate against one credential.
    ///
    /// String claims match a query value either verbatim or through `hasher`, since
    /// verifiers may send sensitive string values hashed.
    pub fn matches(&self, credential: &Credential, hasher: &dyn ValueHasher) -> bool {
        if let Some(id) = &self.credential_id {
            if &credential.id != id {
                return false;
            }
        }
        if let Some(schema_type) = &self.schema_type {
            if !credential.has_type(schema_type) {
                return false;
            }
        }
        if let Some(context) = &self.context {
            if !credential.has_context(context) {
                return false;
            }
        }
        if !self.allowed_issuers.permits(&credential.issuer) {
            return false;
        }
        if let Some(subject_id) = &self.credential_subject_id {
            if credential.subject_id() != Some(subject_id.as_str()) {
                return false;
            }
        }

        self.subject.fields().all(|(field, comparisons)| {
            let Some(claim) = credential.claim(field) else {
                return false;
            };
            comparisons.iter().all(|c| compare(claim, c, hasher))
        })
    }
}

fn compare(claim: &Json, comparison: &Comparison, hasher: &dyn ValueHasher) -> bool {
    let value = &comparison.value;
    match comparison.operator {
        Operator::Eq => values_equal(claim, value, hasher),
        Operator::Ne => !values_equal(claim, value, hasher),
        Operator::Lt => matches!((claim.as_f64(), value.as_f64()), (Some(a), Some(b)) if a < b),
        Operator::Gt => matches!((claim.as_f64(), value.as_f64()), (Some(a), Some(b)) if a > b),
        Operator::In => value
            .as_array()
            .is_some_and(|values| values.iter().any(|v| values_equal(claim, v, hasher))),
        Operator::Nin => value
            .as_array()
            .is_some_and(|values| !values.iter().any(|v| values_equal(claim, v, hasher))),
    }
}

fn values_equal(claim: &Json, value: &Json, hasher: &dyn ValueHasher) -> bool {
    match (claim, value) {
        (Json::Number(a), Json::Number(b)) => a.as_f64() == b.as_f64(),
        (Json::String(a), Json::String(b)) => a == b || &hasher.hash_str(a) == b,
        (a, b) => a == b,
    }
}

/// Storage interface for a holder's credentials.
#[async_trait]
pub trait CredentialStore: Debug + Send + Sync {
    /// Return every credential satisfying `predicate`, in store order.
    async fn find_by_predicate(&self, predicate: &CredentialPredicate) -> Result<Vec<Credential>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Credential>>;
}

/// A local in-memory credential store.
#[derive(Debug, Clone)]
pub struct MemoryCredentialStore {
    credentials: Arc<RwLock<Vec<Credential>>>,
    hasher: Arc<dyn ValueHasher>,
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::with_hasher(Arc::new(Sha256FieldHasher))
    }
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hasher(hasher: Arc<dyn ValueHasher>) -> Self {
        Self {
            credentials: Arc::default(),
            hasher,
        }
    }

    /// Add a credential, replacing any stored credential with the same id.
    pub async fn insert(&self, credential: Credential) {
        let mut credentials = self.credentials.write().await;
        match credentials.iter_mut().find(|c| c.id == credential.id) {
            Some(existing) => *existing = credential,
            None => credentials.push(credential),
        }
    }

    pub async fn len(&self) -> usize {
        self.credentials.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.credentials.read().await.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_predicate(&self, predicate: &CredentialPredicate) -> Result<Vec<Credential>> {
        let found: Vec<Credential> = self
            .credentials
            .read()
            .await
            .iter()
            .filter(|c| predicate.matches(c, self.hasher.as_ref()))
            .cloned()
            .collect();
        debug!(count = found.len(), ?predicate, "credential predicate evaluated");
        Ok(found)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Credential>> {
        Ok(self
            .credentials
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }
}
