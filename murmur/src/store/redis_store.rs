use log::debug;
use redis::aio::ConnectionManager;

use crate::{
    config::{DEFAULT_MAX_COMMIT_ATTEMPTS, StoreSettings},
    errors::StoreError,
    keys::{KeyContext, version_key},
    runtime::{CommitExecutor, CommitPlan, RedisExecutor},
    store::{IndexEntry, Store, Versioned},
};

/// [`Store`] backed by Redis.
///
/// Documents are JSON strings, relation indexes are sorted sets scored by creation time
/// in microseconds, unique claims are plain string keys holding the owner id, and every
/// key has a `{key}:__v` version counter. Reads fetch value and version in one
/// MULTI/EXEC; commits run `lua/commit.lua`.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
    max_commit_attempts: u32,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
        }
    }

    pub fn with_max_commit_attempts(mut self, attempts: u32) -> Self {
        self.max_commit_attempts = attempts;
        self
    }

    pub async fn connect(url: &str, settings: &StoreSettings) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn, settings.prefix.clone()).with_max_commit_attempts(settings.max_commit_attempts))
    }

    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }

    /// Deletes every key under this store's prefix with SCAN + DEL. Returns the number
    /// of keys removed.
    pub async fn cleanup(&self) -> Result<u64, StoreError> {
        const SCAN_COUNT: usize = 1000;
        let pattern = KeyContext::new(&self.prefix).pattern();
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut total_deleted: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let deleted: u64 = redis::cmd("DEL").arg(&keys).query_async(&mut conn).await?;
                total_deleted += deleted;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!("removed {total_deleted} keys matching {pattern}");
        Ok(total_deleted)
    }
}

impl Store for RedisStore {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn max_commit_attempts(&self) -> u32 {
        self.max_commit_attempts
    }

    async fn get(&self, key: &str) -> Result<Versioned<Option<String>>, StoreError> {
        let mut conn = self.conn.clone();
        let (value, version): (Option<String>, Option<u64>) = redis::pipe()
            .atomic()
            .get(key)
            .get(version_key(key))
            .query_async(&mut conn)
            .await?;
        Ok(Versioned {
            value,
            version: version.unwrap_or(0),
        })
    }

    async fn range_desc(
        &self,
        index: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Versioned<Vec<IndexEntry>>, StoreError> {
        let start = offset as isize;
        let stop = match limit {
            // stop = start - 1 is -1 for start 0, which ZREVRANGE reads as "to the end".
            Some(0) => {
                let mut conn = self.conn.clone();
                let version: Option<u64> = redis::cmd("GET").arg(version_key(index)).query_async(&mut conn).await?;
                return Ok(Versioned {
                    value: Vec::new(),
                    version: version.unwrap_or(0),
                });
            }
            Some(limit) => start + limit as isize - 1,
            None => -1,
        };

        let mut conn = self.conn.clone();
        let (members, version): (Vec<(String, f64)>, Option<u64>) = redis::pipe()
            .atomic()
            .zrevrange_withscores(index, start, stop)
            .get(version_key(index))
            .query_async(&mut conn)
            .await?;

        Ok(Versioned {
            value: members
                .into_iter()
                .map(|(member, score)| IndexEntry {
                    member,
                    score: score as i64,
                })
                .collect(),
            version: version.unwrap_or(0),
        })
    }

    async fn score(&self, index: &str, member: &str) -> Result<Versioned<Option<i64>>, StoreError> {
        let mut conn = self.conn.clone();
        let (score, version): (Option<f64>, Option<u64>) = redis::pipe()
            .atomic()
            .zscore(index, member)
            .get(version_key(index))
            .query_async(&mut conn)
            .await?;
        Ok(Versioned {
            value: score.map(|score| score as i64),
            version: version.unwrap_or(0),
        })
    }

    async fn cardinality(&self, index: &str) -> Result<Versioned<u64>, StoreError> {
        let mut conn = self.conn.clone();
        let (count, version): (u64, Option<u64>) = redis::pipe()
            .atomic()
            .zcard(index)
            .get(version_key(index))
            .query_async(&mut conn)
            .await?;
        Ok(Versioned {
            value: count,
            version: version.unwrap_or(0),
        })
    }

    async fn commit(&self, plan: &CommitPlan) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let mut executor = RedisExecutor::new(&mut conn);
        let outcome = executor.execute(plan).await?;
        debug!("commit script returned {outcome}");
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
