use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::{
    core::{
        credential::Credential, identifier::Identifier, message::Challenge, query::ProofRequest,
        token::TokenError,
    },
    proof::ProofSystem,
    registry::{HolderThreadState, Registry},
    store::CredentialStore,
};

pub mod matcher;
mod response;

#[derive(Debug, thiserror::Error)]
pub enum HolderError {
    #[error("scope must contain at least one proof request")]
    MissingScope,

    #[error("invalid challenge: {0}")]
    InvalidChallenge(&'static str),

    #[error("credential `{0}` not found")]
    CredentialNotFound(String),

    #[error("proof generation failed")]
    Proof(#[source] anyhow::Error),

    #[error("response token could not be decoded")]
    Token(#[from] TokenError),

    #[error("credential store failure")]
    Store(#[source] anyhow::Error),

    #[error("thread registry failure")]
    Registry(#[source] anyhow::Error),
}

/// The holder role: selects credentials for a challenge and answers it.
#[derive(Debug, Clone)]
pub struct Holder {
    identifier: String,
    proof_system: Arc<dyn ProofSystem>,
    credentials: Arc<dyn CredentialStore>,
    registry: Registry,
}

impl Holder {
    /// Build a new holder.
    pub fn builder() -> HolderBuilder {
        HolderBuilder::default()
    }

    /// The holder's DID, the subject of its credentials.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Record that `challenge` was received, discarding any earlier answer on its thread.
    pub async fn receive_challenge(&self, challenge: &Challenge) -> Result<(), HolderError> {
        let Some(thread_id) = challenge.thread_id() else {
            return Err(HolderError::InvalidChallenge("missing thread id"));
        };
        self.registry
            .holder()
            .clear(thread_id)
            .await
            .map_err(HolderError::Registry)?;
        info!(thread_id, from = %challenge.from, "challenge received");
        Ok(())
    }

    /// This holder's credentials able to answer every request in `scope`.
    pub async fn find_matching_credentials(
        &self,
        scope: &[ProofRequest],
    ) -> Result<Vec<Credential>, HolderError> {
        matcher::find_matching_credentials(self.credentials.as_ref(), &self.identifier, scope).await
    }

    pub async fn thread_state(
        &self,
        thread_id: &str,
    ) -> Result<Option<HolderThreadState>, HolderError> {
        self.registry
            .holder()
            .get(thread_id)
            .await
            .map_err(HolderError::Registry)
    }
}

/// Builder struct for [Holder].
#[derive(Debug, Clone, Default)]
pub struct HolderBuilder {
    identifier: Option<String>,
    proof_system: Option<Arc<dyn ProofSystem>>,
    credentials: Option<Arc<dyn CredentialStore>>,
    registry: Option<Registry>,
}

impl HolderBuilder {
    /// Build the holder.
    pub fn build(self) -> Result<Holder> {
        let Self {
            identifier,
            proof_system,
            credentials,
            registry,
        } = self;

        let Some(identifier) = identifier else {
            bail!("identifier is required, see `with_identifier`")
        };
        Identifier::from_did(&identifier)
            .with_context(|| format!("invalid holder identifier `{identifier}`"))?;

        let Some(proof_system) = proof_system else {
            bail!("proof system is required, see `with_proof_system`")
        };

        let Some(credentials) = credentials else {
            bail!("credential store is required, see `with_credential_store`")
        };

        let Some(registry) = registry else {
            bail!("registry is required, see `with_registry`")
        };

        Ok(Holder {
            identifier,
            proof_system,
            credentials,
            registry,
        })
    }

    pub fn with_identifier(mut self, did: impl Into<String>) -> Self {
        self.identifier = Some(did.into());
        self
    }

    /// Set the [ProofSystem] that produces response tokens.
    pub fn with_proof_system(mut self, proof_system: Arc<dyn ProofSystem>) -> Self {
        self.proof_system = Some(proof_system);
        self
    }

    pub fn with_credential_store(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the [Registry] holding holder thread state.
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }
}
