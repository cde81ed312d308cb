//! Protocol messages exchanged between verifier and holder.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use url::Url;

use super::query::ProofRequest;

/// Envelope media types.
pub mod media_type {
    /// Unsigned JSON message.
    pub const PLAIN_MESSAGE: &str = "application/iden3comm-plain-json";
    /// Message wrapped in a zero-knowledge proof token.
    pub const ZKP_MESSAGE: &str = "application/iden3-zkp-json";
}

/// Protocol message types.
pub mod message_type {
    pub const AUTHORIZATION_REQUEST: &str =
        "https://iden3-communication.io/authorization/1.0/request";
    pub const AUTHORIZATION_RESPONSE: &str =
        "https://iden3-communication.io/authorization/1.0/response";
}

/// A verifier's authorization request, the first message of a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thid: Option<String>,
    pub typ: String,
    pub from: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub body: AuthorizationRequestBody,
}

/// The request a holder is challenged to answer.
pub type Challenge = AuthorizationRequest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequestBody {
    pub callback_url: Url,
    pub message: String,
    pub reason: String,
    #[serde(default)]
    pub scope: Vec<ProofRequest>,
}

impl AuthorizationRequest {
    /// Start a new thread. The first message of a thread shares its id with the thread.
    pub fn new(thread_id: String, from: impl Into<String>, body: AuthorizationRequestBody) -> Self {
        Self {
            id: thread_id.clone(),
            thid: Some(thread_id),
            typ: media_type::PLAIN_MESSAGE.to_owned(),
            from: from.into(),
            message_type: message_type::AUTHORIZATION_REQUEST.to_owned(),
            body,
        }
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thid.as_deref()
    }

    pub fn scope(&self) -> &[ProofRequest] {
        &self.body.scope
    }
}

/// A holder's answer to an [AuthorizationRequest].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thid: Option<String>,
    pub typ: String,
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(rename = "type")]
    pub message_type: String,
    pub body: AuthorizationResponseBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationResponseBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub scope: Vec<ZeroKnowledgeProofResponse>,
}

/// The proof answering one [ProofRequest].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZeroKnowledgeProofResponse {
    pub id: u32,
    #[serde(rename = "circuitId")]
    pub circuit_id: String,
    pub proof: Json,
    pub pub_signals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vp: Option<Json>,
}
