use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    core::message::{media_type, AuthorizationResponse},
    proof::ProofSystem,
    registry::{Registry, VerifierThreadState},
};

/// Per-stage results of one verification attempt.
///
/// `None` means the stage never ran, which is distinct from `Some(false)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Checklist {
    pub token_syntax_valid: Option<bool>,
    pub media_type_valid: Option<bool>,
    pub matching_request_exists: Option<bool>,
    pub cryptographically_verified: Option<bool>,
}

impl Checklist {
    /// Every stage ran and passed.
    pub fn all_passed(&self) -> bool {
        [
            self.token_syntax_valid,
            self.media_type_valid,
            self.matching_request_exists,
            self.cryptographically_verified,
        ]
        .iter()
        .all(|stage| *stage == Some(true))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub checklist: Checklist,
    pub errors: Vec<String>,
}

impl VerificationResult {
    pub fn is_verified(&self) -> bool {
        self.errors.is_empty() && self.checklist.all_passed()
    }
}

/// Runs the ordered checks over a received token.
///
/// Each stage marks itself failed before it starts so that an error part way
/// through leaves the stage at `Some(false)` and every later stage unset.
pub(super) struct Pipeline<'a> {
    pub proof_system: &'a dyn ProofSystem,
    pub registry: &'a Registry,
}

impl Pipeline<'_> {
    pub async fn run(&self, token: &str) -> VerificationResult {
        let mut checklist = Checklist::default();
        let errors = match self.stages(token, &mut checklist).await {
            Ok(()) => Vec::new(),
            Err(e) => {
                warn!(?checklist, "response verification failed: {e:#}");
                vec![format!("{e:#}")]
            }
        };
        VerificationResult { checklist, errors }
    }

    async fn stages(&self, token: &str, checklist: &mut Checklist) -> Result<()> {
        checklist.token_syntax_valid = Some(false);
        let unpacked = self
            .proof_system
            .unpack(token)
            .await
            .context("token could not be unpacked")?;
        checklist.token_syntax_valid = Some(true);
        debug!(media_type = %unpacked.media_type, "token unpacked");

        let media_type_valid = unpacked.media_type == media_type::ZKP_MESSAGE;
        checklist.media_type_valid = Some(media_type_valid);
        if !media_type_valid {
            bail!(
                "unexpected media type `{}`, expected `{}`",
                unpacked.media_type,
                media_type::ZKP_MESSAGE
            )
        }

        checklist.matching_request_exists = Some(false);
        let Some(thread_id) = unpacked.thread_id() else {
            bail!("response has no thread id, matching request not found")
        };
        let Some(state) = self
            .registry
            .verifier()
            .get(thread_id)
            .await
            .context("failed to read verifier thread state")?
        else {
            bail!("request for thread {thread_id} not found")
        };
        checklist.matching_request_exists = Some(true);
        debug!(thread_id, challenge_type = %state.challenge_type, "matching request found");

        checklist.cryptographically_verified = Some(false);
        let response: AuthorizationResponse = serde_json::from_value(unpacked.message.clone())
            .context("token payload is not an authorization response")?;
        self.proof_system
            .verify_response(&response, &state.challenge)
            .await
            .context("proof verification failed")?;
        checklist.cryptographically_verified = Some(true);

        let from = response.from.clone();
        let recorded = checklist.clone();
        let updated = self
            .registry
            .verifier()
            .update(
                thread_id,
                Box::new(move |entry: &mut VerifierThreadState| {
                    entry.response = Some(response);
                    entry.checklist = Some(recorded);
                }),
            )
            .await
            .context("failed to record verification result")?;
        if !updated {
            warn!(thread_id, "thread cleared during verification, result not recorded");
        }

        info!(thread_id, %from, "response verified");
        Ok(())
    }
}
