//! The catalogue of challenges a verifier can issue.

use std::{fmt, str::FromStr};

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::{
    query::{Comparison, DisclosureQuery, Operator, ProofRequest, SubjectQuery},
    signals::ATOMIC_QUERY_SIG_V2,
};

use super::VerifierError;

const CCG_TRACEABILITY_CONTEXT_URL: &str =
    "https://w3c-ccg.github.io/traceability-vocab/contexts/traceability-v1.jsonld";
const FIN_ASSETS_CONTEXT_URL: &str = "https://raw.githubusercontent.com/nedgar/polygon-id-js-sdk-demo/main/schemas/json-ld/AssetsUnderManagement-v1.json-ld";
const KYC_CONTEXT_URL: &str =
    "https://raw.githubusercontent.com/iden3/claim-schema-vocab/main/schemas/json-ld/kyc-v3.json-ld";
const PASSPORT_CONTEXT_URL: &str = "https://raw.githubusercontent.com/nedgar/polygon-id-js-sdk-demo/main/schemas/json-ld/Passport-v1.json-ld";

/// ISO 3166-1 numeric codes of AF, IR, KP, SS and SY.
pub const SANCTIONED_COUNTRIES: [u16; 5] = [4, 364, 408, 728, 760];

/// ISO 4217 numeric code of SGD.
const SGD: u16 = 702;
const AUM_THRESHOLD: u64 = 200_000;
const EXPECTED_PASSPORT_NUMBER: &str = "L898902C3";
const ADULT_AGE_YEARS: i32 = 21;

/// Stable ids of the proof requests in the catalogue.
pub mod proof_request_id {
    pub const KYC_USER_IS_ADULT: u32 = 101;
    pub const KYC_COUNTRY_NOT_SANCTIONED: u32 = 102;
    pub const KYC_DISCLOSE_BIRTHDAY: u32 = 103;
    pub const PASSPORT_NUMBER_MATCHES: u32 = 201;
    pub const PASSPORT_COUNTRY_NOT_SANCTIONED: u32 = 202;
    pub const FIN_AUM_CURRENCY_MATCHES: u32 = 301;
    pub const FIN_AUM_AMOUNT_OVER_THRESHOLD: u32 = 302;
    pub const FIN_DISCLOSE_BANK_ACCOUNT: u32 = 303;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChallengeType {
    FinAumOverThreshold,
    FinDiscloseBankAccount,
    IdPassportMatches,
    KycCountryNotSanctioned,
    KycDiscloseBirthday,
    KycUserIsAdult,
}

impl ChallengeType {
    pub const ALL: [ChallengeType; 6] = [
        ChallengeType::FinAumOverThreshold,
        ChallengeType::FinDiscloseBankAccount,
        ChallengeType::IdPassportMatches,
        ChallengeType::KycCountryNotSanctioned,
        ChallengeType::KycDiscloseBirthday,
        ChallengeType::KycUserIsAdult,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChallengeType::FinAumOverThreshold => "fin:aumOverThreshold",
            ChallengeType::FinDiscloseBankAccount => "fin:discloseBankAccount",
            ChallengeType::IdPassportMatches => "id:passportMatches",
            ChallengeType::KycCountryNotSanctioned => "kyc:countryNotSanctioned",
            ChallengeType::KycDiscloseBirthday => "kyc:discloseBirthday",
            ChallengeType::KycUserIsAdult => "kyc:userIsAdult",
        }
    }

    /// Why the verifier is asking, shown to the holder.
    pub fn reason(self) -> &'static str {
        match self {
            ChallengeType::FinAumOverThreshold => {
                "Verify total assets under management is over threshold."
            }
            ChallengeType::FinDiscloseBankAccount => "Verify bank account.",
            ChallengeType::IdPassportMatches => {
                "Verify passport number matches and issuing country is not sanctioned."
            }
            ChallengeType::KycCountryNotSanctioned => {
                "Verify country of residence is not sanctioned."
            }
            ChallengeType::KycDiscloseBirthday => "Disclose birthday (selective disclosure).",
            ChallengeType::KycUserIsAdult => "Verify user is at least 21 years old.",
        }
    }

    /// The proof requests making up this challenge, with values in the clear.
    ///
    /// `today` anchors date-relative comparisons.
    pub fn proof_requests(self, today: NaiveDate) -> Vec<ProofRequest> {
        use proof_request_id::*;

        match self {
            ChallengeType::FinAumOverThreshold => vec![
                atomic_query(
                    FIN_AUM_CURRENCY_MATCHES,
                    "AssetsUnderManagement",
                    FIN_ASSETS_CONTEXT_URL,
                    SubjectQuery::new()
                        .with_field("currencyCode", vec![Comparison::new(Operator::Eq, SGD)]),
                ),
                atomic_query(
                    FIN_AUM_AMOUNT_OVER_THRESHOLD,
                    "AssetsUnderManagement",
                    FIN_ASSETS_CONTEXT_URL,
                    SubjectQuery::new().with_field(
                        "valuation",
                        vec![Comparison::new(Operator::Gt, AUM_THRESHOLD)],
                    ),
                ),
            ],
            ChallengeType::FinDiscloseBankAccount => vec![atomic_query(
                FIN_DISCLOSE_BANK_ACCOUNT,
                "BankAccount",
                CCG_TRACEABILITY_CONTEXT_URL,
                SubjectQuery::new().disclose("iban"),
            )],
            ChallengeType::IdPassportMatches => vec![
                atomic_query(
                    PASSPORT_NUMBER_MATCHES,
                    "PassportCredential",
                    PASSPORT_CONTEXT_URL,
                    SubjectQuery::new().with_field(
                        "passportNumber",
                        vec![Comparison::new(Operator::Eq, EXPECTED_PASSPORT_NUMBER)],
                    ),
                ),
                atomic_query(
                    PASSPORT_COUNTRY_NOT_SANCTIONED,
                    "PassportCredential",
                    PASSPORT_CONTEXT_URL,
                    not_sanctioned(),
                ),
            ],
            ChallengeType::KycCountryNotSanctioned => vec![atomic_query(
                KYC_COUNTRY_NOT_SANCTIONED,
                "KYCCountryOfResidenceCredential",
                KYC_CONTEXT_URL,
                not_sanctioned(),
            )],
            ChallengeType::KycDiscloseBirthday => vec![atomic_query(
                KYC_DISCLOSE_BIRTHDAY,
                "KYCAgeCredential",
                KYC_CONTEXT_URL,
                SubjectQuery::new().disclose("birthday"),
            )],
            ChallengeType::KycUserIsAdult => vec![atomic_query(
                KYC_USER_IS_ADULT,
                "KYCAgeCredential",
                KYC_CONTEXT_URL,
                SubjectQuery::new().with_field(
                    "birthday",
                    vec![Comparison::new(
                        Operator::Lt,
                        adult_birthday_threshold(today),
                    )],
                ),
            )],
        }
    }

    /// Ids of the proof requests a response must answer.
    pub fn required_proof_ids(self, today: NaiveDate) -> Vec<u32> {
        self.proof_requests(today)
            .into_iter()
            .filter(|r| !r.optional)
            .map(|r| r.id)
            .collect()
    }
}

fn atomic_query(id: u32, schema_type: &str, context: &str, subject: SubjectQuery) -> ProofRequest {
    ProofRequest::new(
        id,
        ATOMIC_QUERY_SIG_V2,
        DisclosureQuery::new(schema_type, context).with_credential_subject(subject),
    )
}

fn not_sanctioned() -> SubjectQuery {
    SubjectQuery::new().with_field(
        "countryCode",
        vec![Comparison::new(Operator::Nin, json!(SANCTIONED_COUNTRIES))],
    )
}

/// Birthdays encoded as `YYYYMMDD` strictly below this value are at least 21 years
/// before `today`.
///
/// The date is `today` moved back 21 years plus one day, with the day rolling over
/// into the next month when it runs past the end (so 29 February maps to 1 March).
pub fn adult_birthday_threshold(today: NaiveDate) -> u32 {
    let year = today.year() - ADULT_AGE_YEARS;
    let threshold = NaiveDate::from_ymd_opt(year, today.month(), 1)
        .and_then(|first| first.checked_add_days(Days::new(u64::from(today.day()))))
        .unwrap_or(today);
    // Years are four digits for any date this can be called with.
    threshold.year().unsigned_abs() * 10_000 + threshold.month() * 100 + threshold.day()
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChallengeType {
    type Err = VerifierError;

    /// Accepts the namespaced name (`kyc:userIsAdult`) or its short form (`userIsAdult`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ct| {
                let name = ct.as_str();
                name == s || name.split_once(':').is_some_and(|(_, short)| short == s)
            })
            .ok_or_else(|| VerifierError::UnsupportedChallengeType(s.to_owned()))
    }
}

impl TryFrom<String> for ChallengeType {
    type Error = VerifierError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ChallengeType> for String {
    fn from(ct: ChallengeType) -> Self {
        ct.as_str().to_owned()
    }
}
