//! Self-describing, checksummed participant identifiers.
//!
//! An identifier is 31 bytes laid out as `type (2) || genesis (27) || checksum (2)`.
//! The string form is the base-58 (Bitcoin alphabet) encoding of all 31 bytes,
//! and the numeric form is the little-endian integer value of the same bytes.

use std::{fmt, str::FromStr};

use multibase::Base;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Length of the type tag prefix.
pub const TYPE_LENGTH: usize = 2;

/// Length of the genesis state segment.
pub const GENESIS_LENGTH: usize = 27;

/// Length of the trailing checksum.
pub const CHECKSUM_LENGTH: usize = 2;

/// Total encoded length of an identifier.
pub const ID_LENGTH: usize = TYPE_LENGTH + GENESIS_LENGTH + CHECKSUM_LENGTH;

/// Default identifier type.
pub const TYPE_DEFAULT: [u8; TYPE_LENGTH] = [0x00, 0x00];

/// Read-only identifier type.
pub const TYPE_READONLY: [u8; TYPE_LENGTH] = [0x00, 0x01];

/// Identifier decoding error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("identifier must be {ID_LENGTH} bytes long, found {0}")]
    WrongLength(usize),

    #[error("identifier bytes are all zero")]
    AllZero,

    #[error("identifier checksum mismatch")]
    BadChecksum,

    #[error("identifier is not valid base-58: {0}")]
    InvalidBase58(String),

    #[error("identifier is not a decimal integer: {0}")]
    NotANumber(String),

    #[error("identifier integer does not fit in {ID_LENGTH} bytes")]
    TooLarge,

    #[error("not a DID with an identifier segment: {0}")]
    InvalidDid(String),
}

/// A decoded identifier. Immutable once constructed.
///
/// Equality and hashing are over the raw bytes, which is the same relation as
/// comparing the numeric values.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identifier([u8; ID_LENGTH]);

impl Identifier {
    /// Build an identifier from its type tag and genesis bytes, computing the checksum.
    pub fn encode(type_tag: [u8; TYPE_LENGTH], genesis: [u8; GENESIS_LENGTH]) -> Self {
        let checksum = checksum(&type_tag, &genesis);

        let mut bytes = [0u8; ID_LENGTH];
        bytes[..TYPE_LENGTH].copy_from_slice(&type_tag);
        bytes[TYPE_LENGTH..TYPE_LENGTH + GENESIS_LENGTH].copy_from_slice(&genesis);
        bytes[TYPE_LENGTH + GENESIS_LENGTH..].copy_from_slice(&checksum);

        Self(bytes)
    }

    /// Decode and validate raw identifier bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let bytes: [u8; ID_LENGTH] = bytes
            .try_into()
            .map_err(|_| DecodeError::WrongLength(bytes.len()))?;

        if bytes.iter().all(|b| *b == 0) {
            return Err(DecodeError::AllZero);
        }

        let id = Self(bytes);
        let stored = id.checksum();
        if stored == [0, 0] || stored != checksum(&id.type_tag(), &id.genesis()) {
            return Err(DecodeError::BadChecksum);
        }

        Ok(id)
    }

    /// Decode the base-58 string form.
    pub fn parse(s: &str) -> Result<Self, DecodeError> {
        let bytes = Base::Base58Btc
            .decode(s)
            .map_err(|e| DecodeError::InvalidBase58(e.to_string()))?;
        Self::decode(&bytes)
    }

    /// Decode the little-endian numeric form.
    pub fn from_numeric(value: &BigUint) -> Result<Self, DecodeError> {
        let mut bytes = value.to_bytes_le();
        if bytes.len() > ID_LENGTH {
            return Err(DecodeError::TooLarge);
        }
        bytes.resize(ID_LENGTH, 0);
        Self::decode(&bytes)
    }

    /// Decode the numeric form given as a decimal string, as found in circuit outputs.
    pub fn from_decimal(s: &str) -> Result<Self, DecodeError> {
        let value = BigUint::parse_bytes(s.trim().as_bytes(), 10)
            .ok_or_else(|| DecodeError::NotANumber(s.to_owned()))?;
        Self::from_numeric(&value)
    }

    /// Extract the identifier from the last segment of a DID such as
    /// `did:polygonid:polygon:mumbai:2qMFtSnvRGKFDVY5MawZENXv6eAQnGgKTNwid1wJoG`.
    pub fn from_did(did: &str) -> Result<Self, DecodeError> {
        let Some(("did", rest)) = did.split_once(':') else {
            return Err(DecodeError::InvalidDid(did.to_owned()));
        };
        let Some((_, id)) = rest.rsplit_once(':') else {
            return Err(DecodeError::InvalidDid(did.to_owned()));
        };
        Self::parse(id)
    }

    pub fn as_bytes(&self) -> &[u8; ID_LENGTH] {
        &self.0
    }

    pub fn type_tag(&self) -> [u8; TYPE_LENGTH] {
        let mut out = [0u8; TYPE_LENGTH];
        out.copy_from_slice(&self.0[..TYPE_LENGTH]);
        out
    }

    pub fn genesis(&self) -> [u8; GENESIS_LENGTH] {
        let mut out = [0u8; GENESIS_LENGTH];
        out.copy_from_slice(&self.0[TYPE_LENGTH..TYPE_LENGTH + GENESIS_LENGTH]);
        out
    }

    pub fn checksum(&self) -> [u8; CHECKSUM_LENGTH] {
        let mut out = [0u8; CHECKSUM_LENGTH];
        out.copy_from_slice(&self.0[TYPE_LENGTH + GENESIS_LENGTH..]);
        out
    }

    /// The little-endian integer value of the identifier bytes.
    pub fn to_numeric(&self) -> BigUint {
        BigUint::from_bytes_le(&self.0)
    }
}

/// Sum of all type and genesis bytes truncated to 16 bits, emitted low byte first.
///
/// Other identifier producers depend on this exact byte order.
fn checksum(type_tag: &[u8; TYPE_LENGTH], genesis: &[u8; GENESIS_LENGTH]) -> [u8; CHECKSUM_LENGTH] {
    let sum = type_tag
        .iter()
        .chain(genesis.iter())
        .fold(0u16, |acc, b| acc.wrapping_add(u16::from(*b)));
    let [hi, lo] = sum.to_be_bytes();
    [lo, hi]
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Base::Base58Btc.encode(self.0))
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Identifier").field(&self.to_string()).finish()
    }
}

impl FromStr for Identifier {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = DecodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.to_string()
    }
}

impl Serialize for Identifier {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
