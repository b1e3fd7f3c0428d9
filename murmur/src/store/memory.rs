use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::{
    config::DEFAULT_MAX_COMMIT_ATTEMPTS,
    document::Document,
    errors::StoreError,
    keys::KeyContext,
    runtime::{CommitPlan, WriteCommand},
    store::{IndexEntry, Store, Versioned, sort_newest_first},
};

/// In-process [`Store`] with the same commit semantics as [`RedisStore`](crate::RedisStore).
///
/// Every call yields to the runtime first, so concurrent units of work joined on one
/// task interleave their reads and commits the way they would against a server.
pub struct MemoryStore {
    prefix: String,
    max_commit_attempts: u32,
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    values: HashMap<String, String>,
    indexes: HashMap<String, HashMap<String, i64>>,
    versions: HashMap<String, u64>,
}

impl MemoryState {
    fn version(&self, key: &str) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }
}

impl MemoryStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub fn with_max_commit_attempts(mut self, attempts: u32) -> Self {
        self.max_commit_attempts = attempts;
        self
    }

    /// Every stored document of kind `D`, in no particular order.
    pub async fn documents<D: Document>(&self) -> Result<Vec<D>, StoreError> {
        let collection_prefix = KeyContext::new(&self.prefix).document(D::COLLECTION, "");
        let state = self.state.lock().await;

        let mut documents = Vec::new();
        for (key, json) in &state.values {
            let Some(id) = key.strip_prefix(&collection_prefix) else {
                continue;
            };
            // Relation and unique keys share the collection prefix but carry more segments.
            if id.is_empty() || id.contains(':') {
                continue;
            }
            documents.push(serde_json::from_str(json)?);
        }
        Ok(documents)
    }
}

impl Store for MemoryStore {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn max_commit_attempts(&self) -> u32 {
        self.max_commit_attempts
    }

    async fn get(&self, key: &str) -> Result<Versioned<Option<String>>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.state.lock().await;
        Ok(Versioned {
            value: state.values.get(key).cloned(),
            version: state.version(key),
        })
    }

    async fn range_desc(
        &self,
        index: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Versioned<Vec<IndexEntry>>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.state.lock().await;

        let mut entries: Vec<IndexEntry> = state
            .indexes
            .get(index)
            .map(|members| {
                members
                    .iter()
                    .map(|(member, score)| IndexEntry {
                        member: member.clone(),
                        score: *score,
                    })
                    .collect()
            })
            .unwrap_or_default();
        sort_newest_first(&mut entries);

        Ok(Versioned {
            value: entries
                .into_iter()
                .skip(offset)
                .take(limit.unwrap_or(usize::MAX))
                .collect(),
            version: state.version(index),
        })
    }

    async fn score(&self, index: &str, member: &str) -> Result<Versioned<Option<i64>>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.state.lock().await;
        Ok(Versioned {
            value: state
                .indexes
                .get(index)
                .and_then(|members| members.get(member))
                .copied(),
            version: state.version(index),
        })
    }

    async fn cardinality(&self, index: &str) -> Result<Versioned<u64>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.state.lock().await;
        Ok(Versioned {
            value: state.indexes.get(index).map_or(0, |members| members.len() as u64),
            version: state.version(index),
        })
    }

    async fn commit(&self, plan: &CommitPlan) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().await;

        for guard in &plan.guards {
            let actual = state.version(&guard.key);
            if actual != guard.version {
                return Err(StoreError::Conflict {
                    key: guard.key.clone(),
                    expected: guard.version,
                    actual,
                });
            }
        }

        for write in &plan.writes {
            if let WriteCommand::ClaimUnique {
                key,
                owner,
                field,
                value,
            } = write
            {
                if let Some(existing) = state.values.get(key) {
                    if existing != owner {
                        return Err(StoreError::UniqueViolation {
                            fields: vec![field.clone()],
                            values: vec![value.clone()],
                            existing_entity_id: existing.clone(),
                        });
                    }
                }
            }
        }

        let mut touched: Vec<&str> = Vec::with_capacity(plan.writes.len());
        for write in &plan.writes {
            match write {
                WriteCommand::Put { key, payload_json } => {
                    state.values.insert(key.clone(), payload_json.clone());
                }
                WriteCommand::Delete { key } => {
                    state.values.remove(key);
                }
                WriteCommand::IndexAdd { index, member, score } => {
                    state
                        .indexes
                        .entry(index.clone())
                        .or_default()
                        .insert(member.clone(), *score);
                }
                WriteCommand::IndexRemove { index, member } => {
                    if let Some(members) = state.indexes.get_mut(index) {
                        members.remove(member);
                        if members.is_empty() {
                            state.indexes.remove(index);
                        }
                    }
                }
                WriteCommand::IndexDrop { index } => {
                    state.indexes.remove(index);
                }
                WriteCommand::ClaimUnique { key, owner, .. } => {
                    state.values.insert(key.clone(), owner.clone());
                }
            }
            touched.push(write.target());
        }

        touched.sort_unstable();
        touched.dedup();
        for key in touched {
            *state.versions.entry(key.to_string()).or_insert(0) += 1;
        }

        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
