//! This library provides the protocol core of a zero-knowledge authorization exchange
//! between a verifier and a holder of verifiable credentials, in the style of the
//! [iden3comm] authorization flow.
//!
//! [iden3comm]: <https://iden3-communication.io/authorization/overview/>
//!
//! # Usage
//!
//! Both roles share a [`Registry`] of per-thread state and delegate all cryptography to
//! a [`ProofSystem`]:
//!
//! ```ignore
//! use zkauth::{holder::Holder, registry::Registry, store::MemoryCredentialStore, verifier::Verifier};
//!
//! let registry = Registry::in_memory();
//!
//! let verifier = Verifier::builder()
//!     .with_identifier(verifier_did)
//!     .with_proof_system(proof_system.clone())
//!     .with_registry(registry.clone())
//!     .build()
//!     .await?;
//!
//! let holder = Holder::builder()
//!     .with_identifier(holder_did)
//!     .with_proof_system(proof_system)
//!     .with_credential_store(credentials)
//!     .with_registry(registry)
//!     .build()?;
//!
//! // Verifier issues a challenge, the holder picks a credential and answers it.
//! let challenge = verifier.issue_challenge("kyc:userIsAdult").await?;
//! holder.receive_challenge(&challenge).await?;
//! let candidates = holder.find_matching_credentials(challenge.scope()).await?;
//! let token = holder.generate_response(&challenge, &candidates[0].id).await?;
//!
//! // Verifier checks the response. Failures are reported, never returned as errors.
//! let result = verifier.verify_response(&token).await;
//! assert!(result.is_verified(), "{:?}", result.errors);
//! ```
//!
//! Behavior can be customized by implementing the [`ProofSystem`], [`CredentialStore`]
//! and [`ThreadStore`] traits.
//!
//! [`Registry`]: crate::registry::Registry
//! [`ProofSystem`]: crate::proof::ProofSystem
//! [`CredentialStore`]: crate::store::CredentialStore
//! [`ThreadStore`]: crate::registry::ThreadStore

pub mod config;
pub mod core;
pub mod holder;
pub mod proof;
pub mod registry;
pub mod store;
pub mod verifier;
