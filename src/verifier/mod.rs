use std::{collections::BTreeSet, sync::Arc};

use anyhow::{bail, Context, Result};
use challenge::ChallengeType;
use request_builder::RequestBuilder;
use verification::{Pipeline, VerificationResult};

use crate::{
    config::Config,
    core::{
        hash::{Sha256FieldHasher, ValueHasher},
        identifier::Identifier,
        message::Challenge,
    },
    proof::ProofSystem,
    registry::{Registry, VerifierThreadState},
};

pub mod challenge;
pub mod request_builder;
pub mod verification;

#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    #[error("unsupported challenge type `{0}`")]
    UnsupportedChallengeType(String),

    #[error("thread registry failure")]
    Registry(#[source] anyhow::Error),
}

/// The verifier role: issues challenges and verifies the responses to them.
#[derive(Debug, Clone)]
pub struct Verifier {
    identifier: String,
    proof_system: Arc<dyn ProofSystem>,
    registry: Registry,
    config: Config,
    hasher: Arc<dyn ValueHasher>,
}

impl Verifier {
    /// Build a new verifier.
    pub fn builder() -> VerifierBuilder {
        VerifierBuilder::default()
    }

    /// The verifier's DID, sent as `from` in every challenge.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Begin building a challenge of the given type.
    pub fn build_authorization_request(&self, challenge_type: ChallengeType) -> RequestBuilder<'_> {
        RequestBuilder::new(self, challenge_type)
    }

    /// Issue a challenge by name, using the configured callback URL and message.
    ///
    /// Accepts namespaced names like `kyc:userIsAdult` as well as the bare `userIsAdult`.
    pub async fn issue_challenge(&self, challenge_type: &str) -> Result<Challenge, VerifierError> {
        let challenge_type = challenge_type.parse()?;
        self.build_authorization_request(challenge_type)
            .build()
            .await
    }

    /// Verify a response token against the challenge registered for its thread.
    ///
    /// Never fails: every problem is reported through the returned checklist and
    /// error list. On success the thread's state gains the response and checklist.
    pub async fn verify_response(&self, token: &str) -> VerificationResult {
        Pipeline {
            proof_system: self.proof_system.as_ref(),
            registry: &self.registry,
        }
        .run(token)
        .await
    }

    pub async fn thread_state(
        &self,
        thread_id: &str,
    ) -> Result<Option<VerifierThreadState>, VerifierError> {
        self.registry
            .verifier()
            .get(thread_id)
            .await
            .map_err(VerifierError::Registry)
    }

    /// Distinct identifiers of every holder with a verified response, in sorted order.
    pub async fn user_identifiers(&self) -> Result<Vec<String>, VerifierError> {
        let users: BTreeSet<String> = self
            .verified_threads()
            .await?
            .into_iter()
            .filter_map(|state| state.response.map(|r| r.from))
            .collect();
        Ok(users.into_iter().collect())
    }

    /// Verified threads whose response came from `identifier`.
    pub async fn user_threads(
        &self,
        identifier: &str,
    ) -> Result<Vec<VerifierThreadState>, VerifierError> {
        Ok(self
            .verified_threads()
            .await?
            .into_iter()
            .filter(|state| {
                state
                    .response
                    .as_ref()
                    .is_some_and(|r| r.from == identifier)
            })
            .collect())
    }

    async fn verified_threads(&self) -> Result<Vec<VerifierThreadState>, VerifierError> {
        let states = self
            .registry
            .verifier()
            .values()
            .await
            .map_err(VerifierError::Registry)?;
        Ok(states
            .into_iter()
            .filter(|state| state.response.is_some())
            .collect())
    }
}

/// Builder struct for [Verifier].
#[derive(Debug, Clone, Default)]
pub struct VerifierBuilder {
    identifier: Option<String>,
    proof_system: Option<Arc<dyn ProofSystem>>,
    registry: Option<Registry>,
    config: Config,
    hasher: Option<Arc<dyn ValueHasher>>,
}

impl VerifierBuilder {
    /// Build the verifier.
    pub async fn build(self) -> Result<Verifier> {
        let Self {
            identifier,
            proof_system,
            registry,
            config,
            hasher,
        } = self;

        let Some(identifier) = identifier else {
            bail!("identifier is required, see `with_identifier`")
        };
        Identifier::from_did(&identifier)
            .with_context(|| format!("invalid verifier identifier `{identifier}`"))?;

        let Some(proof_system) = proof_system else {
            bail!("proof system is required, see `with_proof_system`")
        };

        let Some(registry) = registry else {
            bail!("registry is required, see `with_registry`")
        };

        Ok(Verifier {
            identifier,
            proof_system,
            registry,
            config,
            hasher: hasher.unwrap_or_else(|| Arc::new(Sha256FieldHasher)),
        })
    }

    /// Set the DID the [Verifier] identifies itself with.
    pub fn with_identifier(mut self, did: impl Into<String>) -> Self {
        self.identifier = Some(did.into());
        self
    }

    /// Set the [ProofSystem] used to unpack and verify response tokens.
    pub fn with_proof_system(mut self, proof_system: Arc<dyn ProofSystem>) -> Self {
        self.proof_system = Some(proof_system);
        self
    }

    /// Set the [Registry] holding verifier thread state.
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the callback URL and message defaults. Defaults to [Config::default].
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the hasher for sensitive query values. Defaults to [Sha256FieldHasher].
    pub fn with_hasher(mut self, hasher: Arc<dyn ValueHasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::{
        core::{
            credential::Credential,
            message::{media_type, message_type, AuthorizationResponse},
        },
        proof::Unpacked,
    };

    pub const VERIFIER_DID: &str =
        "did:polygonid:polygon:mumbai:2qMFtSnvRGKFDVY5MawZENXv6eAQnGgKTNwid1wJoG";

    /// Unpacks a token of the form `<media type>|<json message>`.
    #[derive(Debug, Default)]
    pub struct PipeProofSystem {
        pub reject: Mutex<Option<String>>,
    }

    #[async_trait]
    impl ProofSystem for PipeProofSystem {
        async fn generate_response(
            &self,
            _holder: &str,
            _challenge: &Challenge,
            _credential: &Credential,
        ) -> Result<String> {
            bail!("not supported")
        }

        async fn verify_response(
            &self,
            _response: &AuthorizationResponse,
            _challenge: &Challenge,
        ) -> Result<()> {
            match self.reject.lock().unwrap().clone() {
                Some(reason) => bail!(reason),
                None => Ok(()),
            }
        }

        async fn unpack(&self, token: &str) -> Result<Unpacked> {
            let (media_type, message) = token.split_once('|').context("malformed envelope")?;
            Ok(Unpacked {
                media_type: media_type.to_owned(),
                message: serde_json::from_str(message)?,
            })
        }
    }

    pub async fn verifier(registry: Registry) -> Verifier {
        Verifier::builder()
            .with_identifier(VERIFIER_DID)
            .with_proof_system(Arc::new(PipeProofSystem::default()))
            .with_registry(registry)
            .build()
            .await
            .unwrap()
    }

    fn response_token(thread_id: &str, from: &str) -> String {
        let message = json!({
            "id": "r1",
            "thid": thread_id,
            "typ": media_type::ZKP_MESSAGE,
            "type": message_type::AUTHORIZATION_RESPONSE,
            "from": from,
            "to": VERIFIER_DID,
            "body": { "scope": [] }
        });
        format!("{}|{message}", media_type::ZKP_MESSAGE)
    }

    #[tokio::test]
    async fn builder_requires_parts() {
        let err = Verifier::builder().build().await.unwrap_err();
        assert!(err.to_string().contains("with_identifier"));

        let err = Verifier::builder()
            .with_identifier("did:polygonid:polygon:mumbai:notbase58!")
            .with_proof_system(Arc::new(PipeProofSystem::default()))
            .with_registry(Registry::in_memory())
            .build()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid verifier identifier"));

        let err = Verifier::builder()
            .with_identifier(VERIFIER_DID)
            .with_proof_system(Arc::new(PipeProofSystem::default()))
            .build()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("with_registry"));
    }

    #[tokio::test]
    async fn unsupported_challenge_type_has_no_side_effect() {
        let registry = Registry::in_memory();
        let verifier = verifier(registry.clone()).await;
        assert!(matches!(
            verifier.issue_challenge("kyc:userIsTall").await,
            Err(VerifierError::UnsupportedChallengeType(_))
        ));
        assert!(registry.verifier().values().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pipeline_stops_at_first_failure() {
        let verifier = verifier(Registry::in_memory()).await;

        let result = verifier.verify_response("no envelope here").await;
        assert_eq!(result.checklist.token_syntax_valid, Some(false));
        assert_eq!(result.checklist.media_type_valid, None);
        assert_eq!(result.errors.len(), 1);

        let result = verifier
            .verify_response(&format!("{}|{{}}", media_type::PLAIN_MESSAGE))
            .await;
        assert_eq!(result.checklist.token_syntax_valid, Some(true));
        assert_eq!(result.checklist.media_type_valid, Some(false));
        assert_eq!(result.checklist.matching_request_exists, None);
        assert_eq!(result.checklist.cryptographically_verified, None);

        let result = verifier
            .verify_response(&response_token("unknown", "did:example:holder"))
            .await;
        assert_eq!(result.checklist.matching_request_exists, Some(false));
        assert_eq!(result.checklist.cryptographically_verified, None);
        assert!(result.errors[0].contains("not found"));
    }

    #[tokio::test]
    async fn verified_response_is_merged_into_thread() {
        let registry = Registry::in_memory();
        let verifier = verifier(registry).await;
        let challenge = verifier.issue_challenge("discloseBirthday").await.unwrap();

        let result = verifier
            .verify_response(&response_token(&challenge.id, "did:example:holder"))
            .await;
        assert!(result.is_verified(), "{:?}", result.errors);

        let state = verifier.thread_state(&challenge.id).await.unwrap().unwrap();
        assert_eq!(state.challenge, challenge);
        assert_eq!(state.checklist, Some(result.checklist));
        assert_eq!(state.response.unwrap().from, "did:example:holder");

        assert_eq!(
            verifier.user_identifiers().await.unwrap(),
            ["did:example:holder"]
        );
        assert_eq!(
            verifier.user_threads("did:example:holder").await.unwrap().len(),
            1
        );
        assert!(verifier.user_threads("did:example:other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delegated_failure_is_captured() {
        let registry = Registry::in_memory();
        let proof_system = Arc::new(PipeProofSystem::default());
        *proof_system.reject.lock().unwrap() = Some("issuer state revoked".to_owned());
        let verifier = Verifier::builder()
            .with_identifier(VERIFIER_DID)
            .with_proof_system(proof_system)
            .with_registry(registry)
            .build()
            .await
            .unwrap();
        let challenge = verifier.issue_challenge("kyc:userIsAdult").await.unwrap();

        let result = verifier
            .verify_response(&response_token(&challenge.id, "did:example:holder"))
            .await;
        assert_eq!(result.checklist.matching_request_exists, Some(true));
        assert_eq!(result.checklist.cryptographically_verified, Some(false));
        assert!(result.errors[0].contains("issuer state revoked"));

        // a failed attempt leaves the stored challenge untouched
        let state = verifier.thread_state(&challenge.id).await.unwrap().unwrap();
        assert!(state.response.is_none());
        assert!(state.checklist.is_none());
        assert!(verifier.user_identifiers().await.unwrap().is_empty());
    }
}
