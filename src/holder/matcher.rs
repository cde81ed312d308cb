use tracing::debug;

use crate::{
    core::{credential::Credential, query::ProofRequest},
    store::{CredentialPredicate, CredentialStore},
};

use super::HolderError;

/// Credentials of `subject` able to answer every request in `scope`.
///
/// The first request selects the candidates. Each later request keeps a candidate
/// only if the same credential also satisfies it. Results keep store order.
pub async fn find_matching_credentials(
    store: &dyn CredentialStore,
    subject: &str,
    scope: &[ProofRequest],
) -> Result<Vec<Credential>, HolderError> {
    let Some((first, rest)) = scope.split_first() else {
        return Err(HolderError::MissingScope);
    };

    let mut candidates = store
        .find_by_predicate(&CredentialPredicate::from_query(&first.query).with_subject_id(subject))
        .await
        .map_err(HolderError::Store)?;
    debug!(
        request_id = first.id,
        count = candidates.len(),
        "candidates selected"
    );

    for request in rest {
        let mut kept = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let predicate = CredentialPredicate::from_query(&request.query)
                .with_subject_id(subject)
                .with_credential_id(candidate.id.as_str());
            let satisfied = !store
                .find_by_predicate(&predicate)
                .await
                .map_err(HolderError::Store)?
                .is_empty();
            if satisfied {
                kept.push(candidate);
            }
        }
        debug!(request_id = request.id, count = kept.len(), "candidates filtered");
        candidates = kept;
    }

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::{json, Value as Json};

    use super::*;
    use crate::{
        core::{
            hash::{Sha256FieldHasher, ValueHasher},
            query::{Comparison, Operator, SubjectQuery},
        },
        holder::tests::{credential, HOLDER_DID},
        store::MemoryCredentialStore,
        verifier::challenge::ChallengeType,
    };

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    async fn store(credentials: Vec<(&str, &str, Json)>) -> MemoryCredentialStore {
        let store = MemoryCredentialStore::new();
        for (id, schema_type, subject) in credentials {
            store.insert(credential(id, schema_type, subject)).await;
        }
        store
    }

    #[tokio::test]
    async fn empty_scope_is_rejected() {
        let store = MemoryCredentialStore::new();
        assert!(matches!(
            find_matching_credentials(&store, HOLDER_DID, &[]).await,
            Err(HolderError::MissingScope)
        ));
    }

    #[tokio::test]
    async fn selects_by_subject_and_predicate() {
        let store = store(vec![
            ("urn:adult", "KYCAgeCredential", json!({ "birthday": 19900101 })),
            ("urn:minor", "KYCAgeCredential", json!({ "birthday": 20100101 })),
            ("urn:country", "KYCCountryOfResidenceCredential", json!({ "countryCode": 804 })),
        ])
        .await;
        // same claim, different subject
        let mut other = credential("urn:other", "KYCAgeCredential", json!({ "birthday": 19800101 }));
        other
            .credential_subject
            .insert("id".to_owned(), json!("did:example:someone-else"));
        store.insert(other).await;

        let scope = ChallengeType::KycUserIsAdult.proof_requests(today());
        let found = find_matching_credentials(&store, HOLDER_DID, &scope)
            .await
            .unwrap();
        assert_eq!(
            found.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            ["urn:adult"]
        );
    }

    #[tokio::test]
    async fn later_entries_filter_candidates() {
        let store = store(vec![
            (
                "urn:good",
                "PassportCredential",
                json!({ "passportNumber": "L898902C3", "countryCode": 804 }),
            ),
            (
                "urn:sanctioned",
                "PassportCredential",
                json!({ "passportNumber": "L898902C3", "countryCode": 364 }),
            ),
        ])
        .await;

        let scope: Vec<ProofRequest> = ChallengeType::IdPassportMatches
            .proof_requests(today())
            .into_iter()
            .map(|r| {
                // the verifier sends the passport number hashed
                let subject = r.query.credential_subject.map_field_values("passportNumber", |v| {
                    json!(Sha256FieldHasher.hash_str(v.as_str().unwrap()))
                });
                r.with_query(r.query.clone().with_credential_subject(subject))
            })
            .collect();

        let first_only = find_matching_credentials(&store, HOLDER_DID, &scope[..1])
            .await
            .unwrap();
        assert_eq!(first_only.len(), 2);

        let both = find_matching_credentials(&store, HOLDER_DID, &scope)
            .await
            .unwrap();
        assert_eq!(
            both.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            ["urn:good"]
        );
    }

    #[tokio::test]
    async fn more_scope_never_matches_more() {
        let store = store(vec![
            ("urn:a", "AssetsUnderManagement", json!({ "currencyCode": 702, "valuation": 250000 })),
            ("urn:b", "AssetsUnderManagement", json!({ "currencyCode": 702, "valuation": 1000 })),
            ("urn:c", "AssetsUnderManagement", json!({ "currencyCode": 840, "valuation": 900000 })),
        ])
        .await;

        let mut scope = ChallengeType::FinAumOverThreshold.proof_requests(today());
        let extra = scope[1].with_query(scope[1].query.clone().with_credential_subject(
            SubjectQuery::new()
                .with_field("valuation", vec![Comparison::new(Operator::Lt, 300000)]),
        ));
        scope.push(extra);

        let mut previous = usize::MAX;
        for len in 1..=scope.len() {
            let found = find_matching_credentials(&store, HOLDER_DID, &scope[..len])
                .await
                .unwrap()
                .len();
            assert!(found <= previous, "{len} entries matched {found} > {previous}");
            previous = found;
        }
        assert_eq!(previous, 1);
    }
}
