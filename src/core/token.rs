//! Local, non-authoritative parsing of compact zero-knowledge tokens.
//!
//! A token is `base64url(header) . base64url(payload) . base64url(proof)`. Nothing
//! here checks the proof; it only makes the token's contents readable.

use base64::prelude::*;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value as Json;

use super::{
    message::AuthorizationResponse,
    signals::{self, SignalError, SignalFields},
};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token must have 3 segments, found {0}")]
    SegmentCount(usize),

    #[error("token {segment} is not valid base64url: {source}")]
    Base64 {
        segment: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("token {segment} is not valid JSON: {source}")]
    Json {
        segment: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Signals(#[from] SignalError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(rename = "circuitId")]
    pub circuit_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub crit: Vec<String>,
    pub typ: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZkProof {
    pub proof: Json,
    pub pub_signals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub header: TokenHeader,
    pub payload: Json,
    pub zk_proof: ZkProof,
}

/// Decoded signals for one per-request proof in a response's scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeSignals {
    pub id: u32,
    pub circuit_id: String,
    pub signals: SignalFields,
}

/// A token broken into readable parts, kept alongside the raw token for audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedToken {
    pub header: TokenHeader,
    pub payload: Json,
    pub zk_proof: ZkProof,
    pub signals: SignalFields,
    pub scope: Vec<ScopeSignals>,
}

impl Token {
    pub fn parse(token: &str) -> Result<Self, TokenError> {
        let segments: Vec<&str> = token.trim().split('.').collect();
        let [header, payload, proof] = segments.as_slice() else {
            return Err(TokenError::SegmentCount(segments.len()));
        };

        Ok(Self {
            header: decode_segment("header", header)?,
            payload: decode_segment("payload", payload)?,
            zk_proof: decode_segment("proof", proof)?,
        })
    }

    /// Serialize back into compact form.
    pub fn compact(&self) -> Result<String, TokenError> {
        Ok(format!(
            "{}.{}.{}",
            encode_segment("header", &self.header)?,
            encode_segment("payload", &self.payload)?,
            encode_segment("proof", &self.zk_proof)?,
        ))
    }

    /// The payload as an authorization response, if it is one.
    pub fn response(&self) -> Result<AuthorizationResponse, TokenError> {
        serde_json::from_value(self.payload.clone()).map_err(|source| TokenError::Json {
            segment: "payload",
            source,
        })
    }

    /// Decode the envelope proof's signals and those of every proof in the payload's scope.
    pub fn decode(self) -> Result<DecodedToken, TokenError> {
        let signals = signals::decode(&self.header.circuit_id, &self.zk_proof.pub_signals)?;

        // Payloads that are not authorization responses carry no per-request proofs.
        let scope = match self.response() {
            Ok(response) => response
                .body
                .scope
                .iter()
                .map(|proof| {
                    Ok(ScopeSignals {
                        id: proof.id,
                        circuit_id: proof.circuit_id.clone(),
                        signals: signals::decode(&proof.circuit_id, &proof.pub_signals)?,
                    })
                })
                .collect::<Result<Vec<_>, SignalError>>()?,
            Err(_) => Vec::new(),
        };

        Ok(DecodedToken {
            header: self.header,
            payload: self.payload,
            zk_proof: self.zk_proof,
            signals,
            scope,
        })
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &'static str, s: &str) -> Result<T, TokenError> {
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|source| TokenError::Base64 { segment, source })?;
    serde_json::from_slice(&bytes).map_err(|source| TokenError::Json { segment, source })
}

fn encode_segment<T: Serialize>(segment: &'static str, t: &T) -> Result<String, TokenError> {
    let bytes = serde_json::to_vec(t).map_err(|source| TokenError::Json { segment, source })?;
    Ok(BASE64_URL_SAFE_NO_PAD.encode(bytes))
}
