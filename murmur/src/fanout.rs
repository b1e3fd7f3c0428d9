//! Capped newest-first caches embedded in parent documents.
//!
//! A cache is a prefix of a primary relation index plus an authoritative count. Writes go
//! through [`push_capped`] / [`pull_capped`] and, after a pull, [`refill_candidate`] tops
//! the cache back up from the relation. Reads go through [`paginate`], which serves what
//! the cache covers and fetches the rest from the relation.

use std::{collections::HashSet, ops::Range};

use crate::{
    errors::SocialError,
    id::{PostId, UserId},
    keys::Relation,
    store::{Session, Store},
    types::{Comment, PostSummary},
};

/// An entry of an embedded cache, keyed by the member id it mirrors in the relation.
pub trait Cached {
    fn cache_key(&self) -> &str;
}

impl Cached for PostSummary {
    fn cache_key(&self) -> &str {
        self.id.as_str()
    }
}

impl Cached for Comment {
    fn cache_key(&self) -> &str {
        self.id.as_str()
    }
}

impl Cached for UserId {
    fn cache_key(&self) -> &str {
        self.as_str()
    }
}

impl Cached for PostId {
    fn cache_key(&self) -> &str {
        self.as_str()
    }
}

/// Prepends `item`, evicts the oldest entries beyond `cap`, and counts the new member.
pub fn push_capped<T>(seq: &mut Vec<T>, count: &mut u64, item: T, cap: usize) {
    seq.insert(0, item);
    seq.truncate(cap);
    *count += 1;
}

/// Drops the entry keyed `key` if cached and uncounts the member. The caller must have
/// checked that the member exists in the relation. Returns whether the cache changed.
pub fn pull_capped<T: Cached>(seq: &mut Vec<T>, count: &mut u64, key: &str) -> bool {
    let before = seq.len();
    seq.retain(|item| item.cache_key() != key);
    *count = count.saturating_sub(1);
    seq.len() != before
}

/// Member that should be appended to `seq` after a pull: the newest member of
/// `relation` not already cached, when the relation holds more than the cache and the
/// cache is below `cap`.
pub async fn refill_candidate<S, T>(
    tx: &mut Session<'_, S>,
    relation: Relation<'_>,
    seq: &[T],
    count: u64,
    cap: usize,
) -> Result<Option<String>, SocialError>
where
    S: Store,
    T: Cached,
{
    if count <= seq.len() as u64 || seq.len() >= cap {
        return Ok(None);
    }

    let exclude: Vec<&str> = seq.iter().map(Cached::cache_key).collect();
    Ok(tx.newest_outside(relation, &exclude).await?.map(|entry| entry.member))
}

/// How one page splits between the embedded cache and the relation overflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWindow {
    pub embedded: Range<usize>,
    /// Position of the first overflow member among relation members not in the cache.
    pub overflow_offset: usize,
    pub overflow_limit: usize,
    pub has_next_page: bool,
}

pub fn page_window(embedded_len: usize, true_count: u64, skip: usize, limit: usize) -> PageWindow {
    let has_next_page = (skip.saturating_add(limit) as u64) < true_count;
    if limit == 0 || skip as u64 >= true_count {
        return PageWindow {
            embedded: 0..0,
            overflow_offset: 0,
            overflow_limit: 0,
            has_next_page,
        };
    }

    let start = skip.min(embedded_len);
    let end = skip.saturating_add(limit).min(embedded_len);
    let overflow_limit = if true_count <= embedded_len as u64 {
        0
    } else {
        limit - (end - start)
    };

    PageWindow {
        embedded: start..end,
        overflow_offset: skip.max(embedded_len) - embedded_len,
        overflow_limit,
        has_next_page,
    }
}

/// One page of a cached relation: the cached entries it covers, then overflow member
/// ids (newest first) for the caller to resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct Paged<T> {
    pub cached: Vec<T>,
    pub overflow: Vec<String>,
    pub has_next_page: bool,
}

pub async fn paginate<S, T>(
    tx: &mut Session<'_, S>,
    relation: Relation<'_>,
    embedded: &[T],
    true_count: u64,
    skip: usize,
    limit: usize,
) -> Result<Paged<T>, SocialError>
where
    S: Store,
    T: Cached + Clone,
{
    let window = page_window(embedded.len(), true_count, skip, limit);
    let cached = embedded[window.embedded.clone()].to_vec();

    if window.overflow_limit == 0 {
        return Ok(Paged {
            cached,
            overflow: Vec::new(),
            has_next_page: window.has_next_page,
        });
    }

    let exclude: HashSet<&str> = embedded.iter().map(Cached::cache_key).collect();
    let fetch = exclude.len() + window.overflow_offset + window.overflow_limit;
    let overflow = tx
        .relation_desc(relation, 0, Some(fetch))
        .await?
        .into_iter()
        .filter(|entry| !exclude.contains(entry.member.as_str()))
        .skip(window.overflow_offset)
        .take(window.overflow_limit)
        .map(|entry| entry.member)
        .collect();

    Ok(Paged {
        cached,
        overflow,
        has_next_page: window.has_next_page,
    })
}
