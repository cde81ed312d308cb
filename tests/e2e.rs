use chrono::Utc;
use serde_json::json;
use zkauth::{
    core::{
        message::{media_type, message_type},
        query::Operator,
    },
    verifier::{
        challenge::{adult_birthday_threshold, ChallengeType},
        VerifierError,
    },
};


use fake_proof::{holder_verifier, kyc_age_credential, token, Mode, HOLDER_DID};

#[tokio::test]
async fn user_is_adult_end_to_end() {
    let (holder, verifier, _, credentials) = holder_verifier().await;
    credentials
        .insert(kyc_age_credential("urn:uuid:adult", 19900101))
        .await;
    credentials
        .insert(kyc_age_credential("urn:uuid:minor", 20150101))
        .await;

    let challenge = verifier.issue_challenge("userIsAdult").await.unwrap();
    assert_eq!(challenge.scope().len(), 1);

    let birthday = challenge.scope()[0]
        .query
        .credential_subject
        .get("birthday")
        .unwrap();
    assert_eq!(birthday[0].operator, Operator::Lt);
    assert_eq!(
        birthday[0].value,
        json!(adult_birthday_threshold(Utc::now().date_naive()))
    );

    holder.receive_challenge(&challenge).await.unwrap();
    let candidates = holder
        .find_matching_credentials(challenge.scope())
        .await
        .unwrap();
    assert_eq!(
        candidates.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
        ["urn:uuid:adult"]
    );

    let response = holder
        .generate_response(&challenge, &candidates[0].id)
        .await
        .unwrap();
    let holder_state = holder.thread_state(&challenge.id).await.unwrap().unwrap();
    assert_eq!(holder_state.response_token, response);
    assert_eq!(holder_state.decoded_token.scope[0].id, 101);
    assert_eq!(
        holder_state.decoded_token.scope[0].signals.get("operator"),
        Some("2 (lt)")
    );

    let result = verifier.verify_response(&response).await;
    assert!(result.is_verified(), "{:?}", result.errors);

    let state = verifier.thread_state(&challenge.id).await.unwrap().unwrap();
    assert_eq!(state.challenge_type, ChallengeType::KycUserIsAdult);
    assert_eq!(state.challenge, challenge);
    assert_eq!(state.response.as_ref().unwrap().from, HOLDER_DID);
    assert_eq!(state.checklist, Some(result.checklist));

    assert_eq!(verifier.user_identifiers().await.unwrap(), [HOLDER_DID]);
    assert_eq!(verifier.user_threads(HOLDER_DID).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_thread() {
    let (_, verifier, _, _) = holder_verifier().await;

    let token = token(
        media_type::ZKP_MESSAGE,
        json!({
            "id": "7d3a6c8e-1a8f-4f0b-9b4e-2f1c5d9e8a70",
            "thid": "7d3a6c8e-1a8f-4f0b-9b4e-2f1c5d9e8a70",
            "typ": media_type::ZKP_MESSAGE,
            "type": message_type::AUTHORIZATION_RESPONSE,
            "from": HOLDER_DID,
            "body": { "scope": [] }
        }),
    )
    .unwrap();

    let result = verifier.verify_response(&token).await;
    assert_eq!(result.checklist.token_syntax_valid, Some(true));
    assert_eq!(result.checklist.media_type_valid, Some(true));
    assert_eq!(result.checklist.matching_request_exists, Some(false));
    assert_eq!(result.checklist.cryptographically_verified, None);
    assert!(result.errors[0].contains("not found"), "{:?}", result.errors);
}

#[tokio::test]
async fn invalid_token_syntax() {
    let (_, verifier, proof_system, _) = holder_verifier().await;

    let result = verifier.verify_response("not-a-token").await;
    assert_eq!(result.checklist.token_syntax_valid, Some(false));
    assert_eq!(result.checklist.media_type_valid, None);
    assert_eq!(result.checklist.matching_request_exists, None);
    assert_eq!(result.checklist.cryptographically_verified, None);
    assert_eq!(result.errors.len(), 1);

    proof_system.set_mode(Mode::FailUnpack);
    let result = verifier
        .verify_response(&token(media_type::ZKP_MESSAGE, json!({})).unwrap())
        .await;
    assert_eq!(result.checklist.token_syntax_valid, Some(false));
    assert!(result.errors[0].contains("envelope rejected"));
}

#[tokio::test]
async fn wrong_media_type() {
    let (_, verifier, _, _) = holder_verifier().await;
    let challenge = verifier.issue_challenge("kyc:discloseBirthday").await.unwrap();

    let token = token(
        media_type::PLAIN_MESSAGE,
        json!({
            "id": "r1",
            "thid": challenge.id,
            "typ": media_type::PLAIN_MESSAGE,
            "type": message_type::AUTHORIZATION_RESPONSE,
            "from": HOLDER_DID,
            "body": { "scope": [] }
        }),
    )
    .unwrap();

    let result = verifier.verify_response(&token).await;
    assert_eq!(result.checklist.token_syntax_valid, Some(true));
    assert_eq!(result.checklist.media_type_valid, Some(false));
    assert_eq!(result.checklist.matching_request_exists, None);
    assert_eq!(result.checklist.cryptographically_verified, None);

    // nothing is recorded against the thread
    let state = verifier.thread_state(&challenge.id).await.unwrap().unwrap();
    assert!(state.checklist.is_none());
}

#[tokio::test]
async fn failed_proof_verification() {
    let (holder, verifier, proof_system, credentials) = holder_verifier().await;
    credentials
        .insert(kyc_age_credential("urn:uuid:adult", 19900101))
        .await;

    let challenge = verifier.issue_challenge("kyc:discloseBirthday").await.unwrap();
    let response = holder
        .generate_response(&challenge, "urn:uuid:adult")
        .await
        .unwrap();

    proof_system.set_mode(Mode::FailVerify("credential is revoked".to_owned()));
    let result = verifier.verify_response(&response).await;
    assert_eq!(result.checklist.matching_request_exists, Some(true));
    assert_eq!(result.checklist.cryptographically_verified, Some(false));
    assert!(result.errors[0].contains("credential is revoked"));
    assert!(verifier.user_identifiers().await.unwrap().is_empty());

    // a later successful attempt on the same thread is recorded
    proof_system.set_mode(Mode::Succeed);
    assert!(verifier.verify_response(&response).await.is_verified());
    assert_eq!(verifier.user_threads(HOLDER_DID).await.unwrap().len(), 1);
}

#[tokio::test]
async fn response_to_another_thread_is_rejected() {
    let (holder, verifier, _, credentials) = holder_verifier().await;
    credentials
        .insert(kyc_age_credential("urn:uuid:adult", 19900101))
        .await;

    // a challenge issued elsewhere, never registered with this verifier
    let mut foreign = verifier.issue_challenge("kyc:discloseBirthday").await.unwrap();
    foreign.id = "0b6f1d2c-6f4e-4a52-8f3e-6b1a9d7c2e11".to_owned();
    foreign.thid = Some(foreign.id.clone());

    let response = holder
        .generate_response(&foreign, "urn:uuid:adult")
        .await
        .unwrap();
    let result = verifier.verify_response(&response).await;
    assert_eq!(result.checklist.matching_request_exists, Some(false));
}

#[tokio::test]
async fn unsupported_challenge_type() {
    let (_, verifier, _, _) = holder_verifier().await;
    assert!(matches!(
        verifier.issue_challenge("kyc:userIsTall").await,
        Err(VerifierError::UnsupportedChallengeType(name)) if name == "kyc:userIsTall"
    ));
}
