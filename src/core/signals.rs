//! Decoding of circuit public signals into named fields.
//!
//! A proof's public signals are a flat array of decimal field elements whose
//! meaning depends on the circuit. Known circuits are decoded positionally into
//! named, human-readable fields; anything else is indexed by position.

use std::fmt;

use chrono::DateTime;
use num_bigint::BigUint;
use serde::{ser::SerializeMap, Serialize, Serializer};

use super::identifier::{DecodeError, Identifier};

/// Authentication circuit wrapping every response token.
pub const AUTH_V2: &str = "authV2";

/// Signature-based atomic query circuit.
pub const ATOMIC_QUERY_SIG_V2: &str = "credentialAtomicQuerySigV2";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    #[error("circuit {circuit_id} is missing signal `{name}` at position {index}")]
    Missing {
        circuit_id: String,
        name: &'static str,
        index: usize,
    },

    #[error("signal `{name}` is not a decimal integer: {value}")]
    NotANumber { name: &'static str, value: String },

    #[error("signal `{name}` is not a valid identifier: {source}")]
    Identifier {
        name: &'static str,
        #[source]
        source: DecodeError,
    },
}

/// Decoded signals, in circuit output order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalFields(Vec<(String, String)>);

impl SignalFields {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }
}

impl Serialize for SignalFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Operator codes emitted by the query circuits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitOperator(pub u64);

impl CircuitOperator {
    pub fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            0 => "noop",
            1 => "eq",
            2 => "lt",
            3 => "gt",
            4 => "in",
            5 => "nin",
            6 => "ne",
            _ => return None,
        })
    }

    /// `in` and `nin` carry a list of values rather than one.
    pub fn is_multi_valued(self) -> bool {
        matches!(self.0, 4 | 5)
    }
}

impl fmt::Display for CircuitOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.name().unwrap_or("undefined"))
    }
}

/// Decode `signals` according to the output layout of `circuit_id`.
pub fn decode(circuit_id: &str, signals: &[String]) -> Result<SignalFields, SignalError> {
    match circuit_id {
        AUTH_V2 => decode_auth_v2(signals),
        ATOMIC_QUERY_SIG_V2 => decode_atomic_query(circuit_id, signals),
        _ => Ok(decode_positional(signals)),
    }
}

fn decode_positional(signals: &[String]) -> SignalFields {
    let mut fields = SignalFields::default();
    for (i, s) in signals.iter().enumerate() {
        fields.push(i.to_string(), s.clone());
    }
    fields
}

fn decode_auth_v2(signals: &[String]) -> Result<SignalFields, SignalError> {
    let mut reader = Reader::new(AUTH_V2, signals);
    let mut fields = SignalFields::default();

    fields.push("subjectId", reader.identifier("subjectId")?);
    fields.push("challengeHash", reader.hex("challengeHash")?);
    fields.push("rootHash", reader.hex("rootHash")?);

    Ok(fields)
}

fn decode_atomic_query(circuit_id: &str, signals: &[String]) -> Result<SignalFields, SignalError> {
    let mut reader = Reader::new(circuit_id, signals);
    let mut fields = SignalFields::default();

    fields.push("merklized", reader.raw("merklized")?);
    fields.push("subjectId", reader.identifier("subjectId")?);
    fields.push("issuerAuthState", reader.hex("issuerAuthState")?);
    fields.push("requestId", reader.raw("requestId")?);
    fields.push("issuerId", reader.identifier("issuerId")?);
    fields.push("isRevocationChecked", reader.raw("isRevocationChecked")?);
    fields.push("issuerClaimNonRevState", reader.hex("issuerClaimNonRevState")?);
    fields.push("timestamp", reader.timestamp("timestamp")?);
    fields.push("claimSchema", reader.hex("claimSchema")?);
    fields.push("claimPathNotExists", reader.raw("claimPathNotExists")?);
    fields.push("claimPathKey", reader.hex("claimPathKey")?);
    fields.push("slotIndex", reader.raw("slotIndex")?);

    let operator = CircuitOperator(reader.number("operator")?);
    fields.push("operator", operator.to_string());

    if operator.is_multi_valued() {
        fields.push("values", reader.rest().join(", "));
    } else {
        fields.push("value", reader.raw("value")?);
    }

    Ok(fields)
}

struct Reader<'a> {
    circuit_id: &'a str,
    signals: &'a [String],
    index: usize,
}

impl<'a> Reader<'a> {
    fn new(circuit_id: &'a str, signals: &'a [String]) -> Self {
        Self {
            circuit_id,
            signals,
            index: 0,
        }
    }

    fn raw(&mut self, name: &'static str) -> Result<&'a str, SignalError> {
        let Some(value) = self.signals.get(self.index) else {
            return Err(SignalError::Missing {
                circuit_id: self.circuit_id.to_owned(),
                name,
                index: self.index,
            });
        };
        self.index += 1;
        Ok(value)
    }

    fn rest(&mut self) -> &'a [String] {
        let rest = self.signals.get(self.index..).unwrap_or_default();
        self.index = self.signals.len();
        rest
    }

    fn big(&mut self, name: &'static str) -> Result<BigUint, SignalError> {
        let value = self.raw(name)?;
        BigUint::parse_bytes(value.as_bytes(), 10).ok_or_else(|| SignalError::NotANumber {
            name,
            value: value.to_owned(),
        })
    }

    fn number(&mut self, name: &'static str) -> Result<u64, SignalError> {
        let value = self.raw(name)?;
        value.parse().map_err(|_| SignalError::NotANumber {
            name,
            value: value.to_owned(),
        })
    }

    fn hex(&mut self, name: &'static str) -> Result<String, SignalError> {
        Ok(format!("0x{}", self.big(name)?.to_str_radix(16)))
    }

    fn identifier(&mut self, name: &'static str) -> Result<String, SignalError> {
        let value = self.big(name)?;
        Identifier::from_numeric(&value)
            .map(|id| id.to_string())
            .map_err(|source| SignalError::Identifier { name, source })
    }

    /// Unix seconds rendered as an RFC 7231 date.
    fn timestamp(&mut self, name: &'static str) -> Result<String, SignalError> {
        let value = self.raw(name)?;
        let secs: i64 = value.parse().map_err(|_| SignalError::NotANumber {
            name,
            value: value.to_owned(),
        })?;
        let Some(at) = DateTime::from_timestamp(secs, 0) else {
            return Err(SignalError::NotANumber {
                name,
                value: value.to_owned(),
            });
        };
        Ok(at.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
    }
}
