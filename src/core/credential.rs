use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// A W3C verifiable credential as held in a credential store.
///
/// Only the fields the protocol core reads are typed; everything else is kept
/// in `extra` so the record round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: String,
    #[serde(rename = "@context", default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub issuer: String,
    pub credential_subject: Map<String, Json>,
    pub credential_schema: CredentialSchema,
    pub issuance_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Json>,
    #[serde(flatten)]
    pub extra: Map<String, Json>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialSchema {
    pub id: String,
    #[serde(rename = "type")]
    pub schema_type: String,
}

impl Credential {
    /// The `credentialSubject.id` of the credential, if present.
    pub fn subject_id(&self) -> Option<&str> {
        self.credential_subject.get("id").and_then(Json::as_str)
    }

    pub fn has_type(&self, schema_type: &str) -> bool {
        self.types.iter().any(|t| t == schema_type)
    }

    pub fn has_context(&self, context: &str) -> bool {
        self.context.iter().any(|c| c == context)
    }

    pub fn claim(&self, field: &str) -> Option<&Json> {
        self.credential_subject.get(field)
    }
}
