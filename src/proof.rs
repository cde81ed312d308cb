//! The external proof system seam.
//!
//! Proof generation, envelope unpacking and cryptographic verification (proof
//! validity, issuer state, revocation, expiry, query conformance) all live behind
//! [ProofSystem]. The protocol core never re-implements any of them.

use std::fmt::Debug;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value as Json;

use crate::core::{
    credential::Credential,
    message::{AuthorizationResponse, Challenge},
};

/// An envelope opened by [ProofSystem::unpack].
#[derive(Debug, Clone, PartialEq)]
pub struct Unpacked {
    pub media_type: String,
    pub message: Json,
}

impl Unpacked {
    /// The message's thread id, if it carries one.
    pub fn thread_id(&self) -> Option<&str> {
        self.message.get("thid").and_then(Json::as_str)
    }
}

#[async_trait]
pub trait ProofSystem: Debug + Send + Sync {
    /// Produce a signed response token answering every request in `challenge`'s
    /// scope with proofs over `credential`.
    async fn generate_response(
        &self,
        holder: &str,
        challenge: &Challenge,
        credential: &Credential,
    ) -> Result<String>;

    /// Verify `response` against the challenge it claims to answer.
    ///
    /// Returns an error describing the first failed check.
    async fn verify_response(
        &self,
        response: &AuthorizationResponse,
        challenge: &Challenge,
    ) -> Result<()>;

    /// Open a token envelope without verifying it.
    async fn unpack(&self, token: &str) -> Result<Unpacked>;
}
