use chrono::{NaiveDate, Utc};
use serde_json::Value as Json;
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::{
    core::{
        hash::ValueHasher,
        message::{AuthorizationRequestBody, Challenge},
        query::ProofRequest,
    },
    registry::VerifierThreadState,
};

use super::{challenge::ChallengeType, Verifier, VerifierError};

/// Subject fields whose string values never leave the verifier in the clear.
const HASHED_FIELDS: [&str; 1] = ["passportNumber"];

#[derive(Debug, Clone)]
#[must_use]
pub struct RequestBuilder<'a> {
    challenge_type: ChallengeType,
    callback_url: Url,
    message: String,
    today: Option<NaiveDate>,
    verifier: &'a Verifier,
}

impl<'a> RequestBuilder<'a> {
    pub(crate) fn new(verifier: &'a Verifier, challenge_type: ChallengeType) -> Self {
        Self {
            challenge_type,
            callback_url: verifier.config.callback_url.clone(),
            message: verifier.config.message.clone(),
            today: None,
            verifier,
        }
    }

    /// Override the configured callback URL.
    pub fn with_callback_url(mut self, callback_url: Url) -> Self {
        self.callback_url = callback_url;
        self
    }

    /// Override the configured message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Evaluate date-relative queries as of `today` instead of the current UTC date.
    pub fn with_date(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Build the challenge and register it under a fresh thread id.
    pub async fn build(self) -> Result<Challenge, VerifierError> {
        let thread_id = Uuid::new_v4().to_string();
        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());

        let scope = self
            .challenge_type
            .proof_requests(today)
            .iter()
            .map(|request| hash_sensitive_values(request, self.verifier.hasher.as_ref()))
            .collect();

        let challenge = Challenge::new(
            thread_id.clone(),
            self.verifier.identifier.clone(),
            AuthorizationRequestBody {
                callback_url: self.callback_url,
                message: self.message,
                reason: self.challenge_type.reason().to_owned(),
                scope,
            },
        );

        self.verifier
            .registry
            .verifier()
            .set(
                &thread_id,
                VerifierThreadState::new(self.challenge_type, challenge.clone()),
            )
            .await
            .map_err(VerifierError::Registry)?;

        info!(
            %thread_id,
            challenge_type = %self.challenge_type,
            "challenge issued"
        );

        Ok(challenge)
    }
}

fn hash_sensitive_values(request: &ProofRequest, hasher: &dyn ValueHasher) -> ProofRequest {
    let subject = HASHED_FIELDS
        .iter()
        .fold(request.query.credential_subject.clone(), |subject, field| {
            subject.map_field_values(field, |value| match value {
                Json::String(s) => Json::String(hasher.hash_str(s)),
                other => other.clone(),
            })
        });
    request.with_query(request.query.clone().with_credential_subject(subject))
}
