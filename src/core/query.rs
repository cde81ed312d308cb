//! Disclosure queries: what a verifier asks a holder to prove about a credential.
//!
//! On the wire a query's `credentialSubject` is an untyped object of the form
//! `{ "<field>": { "$<op>": <value> } }`. Here it is parsed into a typed
//! [SubjectQuery] and unknown operators are rejected rather than passed through.

use std::{collections::BTreeMap, fmt};

use anyhow::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// Wildcard entry in `allowedIssuers`.
pub const ANY_ISSUER: &str = "*";

/// Query parsing error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("unknown query operator `{0}`")]
    UnknownOperator(String),

    #[error("invalid operand for `{operator}` on field `{field}`: {reason}")]
    InvalidOperand {
        field: String,
        operator: Operator,
        reason: &'static str,
    },

    #[error("`credentialSubject` must be an object, found {0}")]
    NotAnObject(String),
}

/// Comparison operators understood by the query circuits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    In,
    Nin,
}

impl Operator {
    pub const ALL: [Operator; 6] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Gt,
        Operator::In,
        Operator::Nin,
    ];

    /// The `$`-prefixed key used in JSON queries.
    pub fn key(self) -> &'static str {
        match self {
            Operator::Eq => "$eq",
            Operator::Ne => "$ne",
            Operator::Lt => "$lt",
            Operator::Gt => "$gt",
            Operator::In => "$in",
            Operator::Nin => "$nin",
        }
    }

    /// Numeric code emitted by the query circuits' `operator` output.
    pub fn circuit_code(self) -> u64 {
        match self {
            Operator::Eq => 1,
            Operator::Lt => 2,
            Operator::Gt => 3,
            Operator::In => 4,
            Operator::Nin => 5,
            Operator::Ne => 6,
        }
    }

    /// Set membership operators compare against a list of values.
    pub fn is_multi_valued(self) -> bool {
        matches!(self, Operator::In | Operator::Nin)
    }

    fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "≠",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::In => "IN",
            Operator::Nin => "NOT IN",
        }
    }

    fn from_key(key: &str) -> Result<Self, QueryError> {
        Self::ALL
            .into_iter()
            .find(|op| op.key() == key)
            .ok_or_else(|| QueryError::UnknownOperator(key.to_owned()))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A single `operator value` constraint on a subject field.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub operator: Operator,
    pub value: Json,
}

impl Comparison {
    pub fn new(operator: Operator, value: impl Into<Json>) -> Self {
        Self {
            operator,
            value: value.into(),
        }
    }

    fn validate(&self, field: &str) -> Result<(), QueryError> {
        let invalid = |reason| QueryError::InvalidOperand {
            field: field.to_owned(),
            operator: self.operator,
            reason,
        };
        match self.operator {
            Operator::In | Operator::Nin if !self.value.is_array() => {
                Err(invalid("expected an array of values"))
            }
            Operator::Lt | Operator::Gt if !self.value.is_number() => {
                Err(invalid("expected a number"))
            }
            Operator::Eq | Operator::Ne if self.value.is_array() || self.value.is_object() => {
                Err(invalid("expected a single value"))
            }
            _ => Ok(()),
        }
    }
}

/// Typed `credentialSubject` predicate map.
///
/// A field with no comparisons requests selective disclosure of that field's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Json", into = "Json")]
pub struct SubjectQuery(BTreeMap<String, Vec<Comparison>>);

impl SubjectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain `field` with the given comparisons.
    pub fn with_field(mut self, field: impl Into<String>, comparisons: Vec<Comparison>) -> Self {
        self.0.insert(field.into(), comparisons);
        self
    }

    /// Request disclosure of `field` without constraining it.
    pub fn disclose(self, field: impl Into<String>) -> Self {
        self.with_field(field, Vec::new())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[Comparison])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn get(&self, field: &str) -> Option<&[Comparison]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a copy with every comparison value of `field` rewritten by `f`.
    pub fn map_field_values(&self, field: &str, f: impl Fn(&Json) -> Json) -> Self {
        let mut out = self.clone();
        if let Some(comparisons) = out.0.get_mut(field) {
            for c in comparisons.iter_mut() {
                c.value = f(&c.value);
            }
        }
        out
    }
}

impl TryFrom<Json> for SubjectQuery {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        let Json::Object(fields) = value else {
            return Err(QueryError::NotAnObject(value.to_string()).into());
        };

        let mut out = BTreeMap::new();
        for (field, ops) in fields {
            let Json::Object(ops) = ops else {
                return Err(QueryError::NotAnObject(ops.to_string()).into());
            };
            let mut comparisons = Vec::with_capacity(ops.len());
            for (key, value) in ops {
                let comparison = Comparison::new(Operator::from_key(&key)?, value);
                comparison.validate(&field)?;
                comparisons.push(comparison);
            }
            out.insert(field, comparisons);
        }

        Ok(Self(out))
    }
}

impl From<SubjectQuery> for Json {
    fn from(value: SubjectQuery) -> Self {
        value
            .0
            .into_iter()
            .map(|(field, comparisons)| {
                let ops: Map<String, Json> = comparisons
                    .into_iter()
                    .map(|c| (c.operator.key().to_owned(), c.value))
                    .collect();
                (field, Json::Object(ops))
            })
            .collect::<Map<String, Json>>()
            .into()
    }
}

impl fmt::Display for SubjectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, comparisons) in &self.0 {
            if comparisons.is_empty() {
                if !first {
                    f.write_str(" AND ")?;
                }
                write!(f, "{field} (selective disclosure)")?;
                first = false;
                continue;
            }
            for c in comparisons {
                if !first {
                    f.write_str(" AND ")?;
                }
                write!(f, "{field} {} {}", c.operator.symbol(), c.value)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Issuers whose credentials are acceptable for a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum AllowedIssuers {
    Any,
    Only(Vec<String>),
}

impl AllowedIssuers {
    pub fn permits(&self, issuer: &str) -> bool {
        match self {
            AllowedIssuers::Any => true,
            AllowedIssuers::Only(issuers) => issuers.iter().any(|i| i == issuer),
        }
    }
}

impl Default for AllowedIssuers {
    fn default() -> Self {
        Self::Any
    }
}

impl From<Vec<String>> for AllowedIssuers {
    fn from(issuers: Vec<String>) -> Self {
        if issuers.iter().any(|i| i == ANY_ISSUER) {
            AllowedIssuers::Any
        } else {
            AllowedIssuers::Only(issuers)
        }
    }
}

impl From<AllowedIssuers> for Vec<String> {
    fn from(value: AllowedIssuers) -> Self {
        match value {
            AllowedIssuers::Any => vec![ANY_ISSUER.to_owned()],
            AllowedIssuers::Only(issuers) => issuers,
        }
    }
}

/// A predicate over one credential schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisclosureQuery {
    #[serde(default)]
    pub allowed_issuers: AllowedIssuers,
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default)]
    pub credential_subject: SubjectQuery,
}

impl DisclosureQuery {
    pub fn new(schema_type: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            allowed_issuers: AllowedIssuers::Any,
            schema_type: schema_type.into(),
            context: Some(context.into()),
            credential_subject: SubjectQuery::new(),
        }
    }

    pub fn with_allowed_issuers(mut self, allowed_issuers: AllowedIssuers) -> Self {
        self.allowed_issuers = allowed_issuers;
        self
    }

    pub fn with_credential_subject(mut self, credential_subject: SubjectQuery) -> Self {
        self.credential_subject = credential_subject;
        self
    }
}

/// One entry of a challenge's `scope`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRequest {
    pub id: u32,
    pub circuit_id: String,
    #[serde(default)]
    pub optional: bool,
    pub query: DisclosureQuery,
}

impl ProofRequest {
    pub fn new(id: u32, circuit_id: impl Into<String>, query: DisclosureQuery) -> Self {
        Self {
            id,
            circuit_id: circuit_id.into(),
            optional: false,
            query,
        }
    }

    pub fn with_query(&self, query: DisclosureQuery) -> Self {
        Self {
            query,
            ..self.clone()
        }
    }
}
