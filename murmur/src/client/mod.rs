//! Graph maintenance operations.
//!
//! [`Client`] owns the store, the settings and the upload signer. Every mutation is a
//! private [`UnitOfWork`] run through [`transact`] under the write deadline; reads use a
//! throwaway [`Session`] under the read or feed deadline.
//!
//! # Example
//! ```ignore
//! let client = Client::new(MemoryStore::new("app"), Settings::default())?;
//! let alice = client.register_user(new_alice).await?;
//! let bob = client.register_user(new_bob).await?;
//! client.follow(&alice.id, &bob.id).await?;
//! ```

mod comments;
mod follows;
mod maintenance;
mod posts;
mod replies;
mod saved;
mod users;

use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use log::warn;

use crate::{
    config::Settings,
    errors::SocialError,
    id::{UserId, monotonic_now},
    store::{RedisStore, Session, Store, UnitOfWork, transact},
    types::{AuthorSummary, User, UserDetails},
    uploads::{StaticUploadSigner, UploadSigner},
};

/// Outcome of an idempotent graph edge operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphChange {
    Applied,
    /// The edge was already in the requested state; nothing was written.
    Unchanged,
}

pub struct Client<S: Store> {
    store: S,
    settings: Settings,
    uploads: Arc<dyn UploadSigner>,
}

impl<S: Store> Client<S> {
    /// Builds a client over `store`, signing uploads against `settings.uploads.base_url`.
    pub fn new(store: S, settings: Settings) -> Result<Self, SocialError> {
        let uploads = Arc::new(StaticUploadSigner::from_settings(&settings.uploads)?);
        Ok(Self {
            store,
            settings,
            uploads,
        })
    }

    /// Replaces the upload signer.
    pub fn with_uploads(mut self, uploads: Arc<dyn UploadSigner>) -> Self {
        self.uploads = uploads;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn ping(&self) -> Result<(), SocialError> {
        within("ping", self.settings.timeouts.read(), async { Ok(self.store.ping().await?) }).await
    }

    async fn write<W: UnitOfWork>(&self, operation: &'static str, work: W) -> Result<W::Output, SocialError> {
        within(operation, self.settings.timeouts.write(), transact(&self.store, &work)).await
    }

    fn session(&self) -> Session<'_, S> {
        Session::new(&self.store)
    }
}

impl Client<RedisStore> {
    /// Connects to the Redis server named by `settings.store.redis_url`.
    pub async fn connect(settings: Settings) -> Result<Self, SocialError> {
        let url = settings.store.redis_url()?;
        let store = RedisStore::connect(&url, &settings.store).await?;
        Self::new(store, settings)
    }
}

/// Runs `operation` under `limit`. On expiry nothing has been committed by the attempt
/// that was cut off.
async fn within<T, F>(operation: &'static str, limit: Duration, future: F) -> Result<T, SocialError>
where
    F: Future<Output = Result<T, SocialError>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{operation} exceeded its {limit:?} deadline");
            Err(SocialError::Timeout { operation })
        }
    }
}

/// The user's details document, or a fresh all-zero one if it was never written.
async fn details_or_empty<S: Store>(tx: &mut Session<'_, S>, user: &UserId) -> Result<UserDetails, SocialError> {
    Ok(tx
        .load::<UserDetails>(user)
        .await?
        .unwrap_or_else(|| UserDetails::empty(user.clone(), monotonic_now())))
}

/// Author summaries for `ids`. Users that no longer exist are left out.
async fn authors<'a, S, I>(tx: &mut Session<'_, S>, ids: I) -> Result<HashMap<UserId, AuthorSummary>, SocialError>
where
    S: Store,
    I: IntoIterator<Item = &'a UserId>,
{
    let mut found = HashMap::new();
    for id in ids {
        if found.contains_key(id) {
            continue;
        }
        if let Some(user) = tx.load::<User>(id).await? {
            found.insert(id.clone(), AuthorSummary::from(&user));
        }
    }
    Ok(found)
}
