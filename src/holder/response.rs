use tracing::{debug, info};

use crate::{
    core::{message::Challenge, token::Token},
    registry::HolderThreadState,
};

use super::{Holder, HolderError};

impl Holder {
    /// Answer `challenge` with proofs over the credential `credential_id`.
    ///
    /// The token is decoded locally for display and stored with the selected
    /// credential under the challenge's thread, replacing any earlier answer.
    /// Returns the raw token.
    pub async fn generate_response(
        &self,
        challenge: &Challenge,
        credential_id: &str,
    ) -> Result<String, HolderError> {
        let Some(thread_id) = challenge.thread_id() else {
            return Err(HolderError::InvalidChallenge("missing thread id"));
        };
        if challenge.scope().is_empty() {
            return Err(HolderError::InvalidChallenge("empty scope"));
        }

        let credential = self
            .credentials
            .find_by_id(credential_id)
            .await
            .map_err(HolderError::Store)?
            .ok_or_else(|| HolderError::CredentialNotFound(credential_id.to_owned()))?;

        let response_token = self
            .proof_system
            .generate_response(&self.identifier, challenge, &credential)
            .await
            .map_err(HolderError::Proof)?;

        let decoded_token = Token::parse(&response_token)?.decode()?;
        debug!(
            thread_id,
            circuit_id = %decoded_token.header.circuit_id,
            proofs = decoded_token.scope.len(),
            "response token decoded"
        );

        self.registry
            .holder()
            .set(
                thread_id,
                HolderThreadState {
                    selected_credential: credential,
                    response_token: response_token.clone(),
                    decoded_token,
                },
            )
            .await
            .map_err(HolderError::Registry)?;

        info!(thread_id, credential_id, "response generated");
        Ok(response_token)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        holder::tests::{challenge, credential, holder, EchoProofSystem, HOLDER_DID},
        registry::Registry,
        verifier::challenge::ChallengeType,
    };

    #[tokio::test]
    async fn records_decoded_response() {
        let (holder, store) = holder(EchoProofSystem::default(), Registry::in_memory()).await;
        store
            .insert(credential(
                "urn:aum",
                "AssetsUnderManagement",
                json!({ "currencyCode": 702, "valuation": 250000 }),
            ))
            .await;

        let challenge = challenge(ChallengeType::FinAumOverThreshold);
        let token = holder.generate_response(&challenge, "urn:aum").await.unwrap();

        let state = holder.thread_state(&challenge.id).await.unwrap().unwrap();
        assert_eq!(state.response_token, token);
        assert_eq!(state.selected_credential.id, "urn:aum");
        assert_eq!(
            state.decoded_token.signals.get("subjectId"),
            Some("2qMFtSnvRGKFDVY5MawZENXv6eAQnGgKTNwid1wJoG")
        );
        assert_eq!(
            state
                .decoded_token
                .scope
                .iter()
                .map(|s| s.id)
                .collect::<Vec<_>>(),
            [301, 302]
        );
        assert_eq!(state.decoded_token.scope[1].signals.get("requestId"), Some("302"));
        assert_eq!(state.decoded_token.payload["from"], HOLDER_DID);
    }

    #[tokio::test]
    async fn regeneration_replaces_state() {
        let (holder, store) = holder(EchoProofSystem::default(), Registry::in_memory()).await;
        store
            .insert(credential("urn:one", "KYCAgeCredential", json!({ "birthday": 19900101 })))
            .await;
        store
            .insert(credential("urn:two", "KYCAgeCredential", json!({ "birthday": 19850101 })))
            .await;

        let challenge = challenge(ChallengeType::KycDiscloseBirthday);
        holder.generate_response(&challenge, "urn:one").await.unwrap();
        holder.generate_response(&challenge, "urn:two").await.unwrap();

        let state = holder.thread_state(&challenge.id).await.unwrap().unwrap();
        assert_eq!(state.selected_credential.id, "urn:two");
    }

    #[tokio::test]
    async fn rejects_invalid_challenge() {
        let (holder, _) = holder(EchoProofSystem::default(), Registry::in_memory()).await;

        let mut no_thread = challenge(ChallengeType::KycUserIsAdult);
        no_thread.thid = None;
        assert!(matches!(
            holder.generate_response(&no_thread, "urn:any").await,
            Err(HolderError::InvalidChallenge("missing thread id"))
        ));

        let mut no_scope = challenge(ChallengeType::KycUserIsAdult);
        no_scope.body.scope.clear();
        assert!(matches!(
            holder.generate_response(&no_scope, "urn:any").await,
            Err(HolderError::InvalidChallenge("empty scope"))
        ));
    }

    #[tokio::test]
    async fn missing_credential_and_proof_failure() {
        let registry = Registry::in_memory();
        let (holder, store) = holder(EchoProofSystem { fail: true }, registry).await;
        let challenge = challenge(ChallengeType::KycDiscloseBirthday);

        assert!(matches!(
            holder.generate_response(&challenge, "urn:missing").await,
            Err(HolderError::CredentialNotFound(id)) if id == "urn:missing"
        ));

        store
            .insert(credential("urn:age", "KYCAgeCredential", json!({ "birthday": 19900101 })))
            .await;
        let err = holder
            .generate_response(&challenge, "urn:age")
            .await
            .unwrap_err();
        assert!(matches!(err, HolderError::Proof(_)));
        assert!(holder.thread_state(&challenge.id).await.unwrap().is_none());
    }
}
