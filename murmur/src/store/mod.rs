//! Storage collaborators and the optimistic unit-of-work driver.
//!
//! A [`Store`] exposes versioned reads and one atomic `commit`. Mutations are written as
//! [`UnitOfWork`] values: [`transact`] runs one against a fresh [`Session`], which
//! records the version of every key it reads and buffers every write. The commit only
//! lands when none of those versions moved; otherwise the unit is run again from scratch.

mod memory;
mod redis_store;
mod session;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use session::Session;

use log::{debug, warn};

use crate::{errors::SocialError, runtime::CommitPlan};

pub use crate::errors::StoreError;

/// A value read from the store together with the version of its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

/// One member of a sorted relation index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub member: String,
    pub score: i64,
}

/// Highest score first, ties broken by member descending (sorted-set reverse order).
pub(crate) fn sort_newest_first(entries: &mut [IndexEntry]) {
    entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| b.member.cmp(&a.member)));
}

/// Storage backend for documents, sorted relation indexes and unique claims.
///
/// Every read reports the version of the key it touched. Keys that were never written
/// have version 0.
#[allow(async_fn_in_trait)]
pub trait Store {
    /// Prefix every key of this store starts with.
    fn prefix(&self) -> &str;

    /// How many times a conflicting unit of work is run before giving up.
    fn max_commit_attempts(&self) -> u32;

    async fn get(&self, key: &str) -> Result<Versioned<Option<String>>, StoreError>;

    /// Members of `index`, highest score first. Ties are broken by member, descending.
    async fn range_desc(
        &self,
        index: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Versioned<Vec<IndexEntry>>, StoreError>;

    async fn score(&self, index: &str, member: &str) -> Result<Versioned<Option<i64>>, StoreError>;

    async fn cardinality(&self, index: &str) -> Result<Versioned<u64>, StoreError>;

    /// Applies `plan` atomically, or fails with [`StoreError::Conflict`] when a guarded
    /// key changed, or [`StoreError::UniqueViolation`] when a claim is held elsewhere.
    async fn commit(&self, plan: &CommitPlan) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// A transactional body. `run` may be invoked several times; it must derive everything
/// from what it reads through the session.
#[allow(async_fn_in_trait)]
pub trait UnitOfWork {
    type Output;

    async fn run<S: Store>(&self, tx: &mut Session<'_, S>) -> Result<Self::Output, SocialError>;
}

/// Runs `work` until it commits, fails, or exhausts the store's attempt budget.
pub async fn transact<S, W>(store: &S, work: &W) -> Result<W::Output, SocialError>
where
    S: Store,
    W: UnitOfWork,
{
    let attempts = store.max_commit_attempts().max(1);

    for attempt in 1..=attempts {
        let mut session = Session::new(store);
        let output = work.run(&mut session).await?;
        let plan = session.into_plan();

        if plan.is_read_only() {
            return Ok(output);
        }

        match store.commit(&plan).await {
            Ok(()) => {
                debug!(
                    "committed {} writes guarded by {} reads (attempt {attempt})",
                    plan.writes.len(),
                    plan.guards.len()
                );
                return Ok(output);
            }
            Err(StoreError::Conflict { key, expected, actual }) => {
                debug!("conflict on {key} (read v{expected}, found v{actual}); attempt {attempt}/{attempts}");
            }
            Err(err) => return Err(err.into()),
        }
    }

    warn!("transaction aborted after {attempts} conflicting attempts");
    Err(SocialError::TransactionAborted { attempts })
}
