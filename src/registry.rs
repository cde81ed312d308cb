use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
    core::{
        credential::Credential,
        message::{AuthorizationResponse, Challenge},
        token::DecodedToken,
    },
    verifier::{challenge::ChallengeType, verification::Checklist},
};

/// What the holder remembers about a thread after answering it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderThreadState {
    pub selected_credential: Credential,
    pub response_token: String,
    pub decoded_token: DecodedToken,
}

/// What the verifier remembers about a thread it started.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifierThreadState {
    pub challenge_type: ChallengeType,
    pub challenge: Challenge,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<AuthorizationResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checklist: Option<Checklist>,
}

impl VerifierThreadState {
    pub fn new(challenge_type: ChallengeType, challenge: Challenge) -> Self {
        Self {
            challenge_type,
            challenge,
            response: None,
            checklist: None,
        }
    }
}

/// In-place modification applied by [ThreadStore::update].
pub type Update<S> = Box<dyn FnOnce(&mut S) + Send>;

/// Storage interface for per-thread protocol state, keyed by thread id.
#[async_trait]
pub trait ThreadStore<S>: Debug + Send + Sync {
    async fn get(&self, thread_id: &str) -> Result<Option<S>>;

    /// Store `state`, fully replacing any previous state for the thread.
    async fn set(&self, thread_id: &str, state: S) -> Result<()>;

    async fn clear(&self, thread_id: &str) -> Result<()>;

    /// Modify the stored state in place. Returns `false` if the thread is unknown.
    async fn update(&self, thread_id: &str, f: Update<S>) -> Result<bool>;

    /// Snapshot of every stored state, in thread id order.
    async fn values(&self) -> Result<Vec<S>>;
}

/// A local in-memory thread store. Entries live until cleared.
///
/// # Warning
/// This store is process-local, it will not work for a distributed deployment.
#[derive(Debug)]
pub struct MemoryStore<S> {
    store: Arc<Mutex<BTreeMap<String, S>>>,
}

impl<S> Default for MemoryStore<S> {
    fn default() -> Self {
        Self {
            store: Arc::default(),
        }
    }
}

impl<S> Clone for MemoryStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

#[async_trait]
impl<S> ThreadStore<S> for MemoryStore<S>
where
    S: Clone + Debug + Send + Sync + 'static,
{
    async fn get(&self, thread_id: &str) -> Result<Option<S>> {
        Ok(self.store.lock().await.get(thread_id).cloned())
    }

    async fn set(&self, thread_id: &str, state: S) -> Result<()> {
        self.store.lock().await.insert(thread_id.to_owned(), state);
        Ok(())
    }

    async fn clear(&self, thread_id: &str) -> Result<()> {
        self.store.lock().await.remove(thread_id);
        Ok(())
    }

    async fn update(&self, thread_id: &str, f: Update<S>) -> Result<bool> {
        let mut store = self.store.lock().await;
        let Some(state) = store.get_mut(thread_id) else {
            return Ok(false);
        };
        f(state);
        Ok(true)
    }

    async fn values(&self) -> Result<Vec<S>> {
        Ok(self.store.lock().await.values().cloned().collect())
    }
}

/// Handle to the holder-side and verifier-side thread stores.
///
/// Constructed once and shared by cloning; clones see the same state.
#[derive(Debug, Clone)]
pub struct Registry {
    holder: Arc<dyn ThreadStore<HolderThreadState>>,
    verifier: Arc<dyn ThreadStore<VerifierThreadState>>,
}

impl Registry {
    pub fn new(
        holder: Arc<dyn ThreadStore<HolderThreadState>>,
        verifier: Arc<dyn ThreadStore<VerifierThreadState>>,
    ) -> Self {
        Self { holder, verifier }
    }

    /// A registry backed by two [MemoryStore]s.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::default()),
            Arc::new(MemoryStore::default()),
        )
    }

    pub fn holder(&self) -> &dyn ThreadStore<HolderThreadState> {
        self.holder.as_ref()
    }

    pub fn verifier(&self) -> &dyn ThreadStore<VerifierThreadState> {
        self.verifier.as_ref()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::in_memory()
    }
}
