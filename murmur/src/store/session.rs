use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{
    document::Document,
    errors::{SocialError, StoreError},
    keys::{KeyContext, Relation},
    runtime::{CommitPlan, VersionGuard, WriteCommand},
    store::{IndexEntry, Store, sort_newest_first},
};

/// Read-your-writes view over a [`Store`] for one attempt of a unit of work.
///
/// Reads go to the store unless this session already wrote the key, and the first
/// version seen for every key becomes a commit guard. Writes stay buffered until
/// [`Session::into_plan`].
pub struct Session<'s, S: Store> {
    store: &'s S,
    guards: BTreeMap<String, u64>,
    documents: BTreeMap<String, Option<String>>,
    indexes: BTreeMap<String, IndexOverlay>,
    claims: BTreeMap<String, PendingClaim>,
}

#[derive(Debug, Default)]
struct IndexOverlay {
    dropped: bool,
    added: HashMap<String, i64>,
    removed: HashSet<String>,
}

#[derive(Debug)]
struct PendingClaim {
    owner: String,
    field: String,
    value: String,
}

impl<'s, S: Store> Session<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            guards: BTreeMap::new(),
            documents: BTreeMap::new(),
            indexes: BTreeMap::new(),
            claims: BTreeMap::new(),
        }
    }

    pub fn keys(&self) -> KeyContext<'s> {
        KeyContext::new(self.store.prefix())
    }

    fn guard(&mut self, key: &str, version: u64) {
        if !self.guards.contains_key(key) {
            self.guards.insert(key.to_string(), version);
        }
    }

    pub async fn load<D: Document>(&mut self, id: &D::Id) -> Result<Option<D>, SocialError> {
        let key = self.keys().document(D::COLLECTION, id.as_ref());
        let raw = match self.documents.get(&key) {
            Some(pending) => pending.clone(),
            None => {
                let read = self.store.get(&key).await?;
                self.guard(&key, read.version);
                read.value
            }
        };

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json).map_err(StoreError::from)?)),
            None => Ok(None),
        }
    }

    /// Like [`Session::load`], failing with `NotFound` when the document is missing.
    pub async fn require<D: Document>(&mut self, id: &D::Id) -> Result<D, SocialError> {
        self.load::<D>(id)
            .await?
            .ok_or_else(|| SocialError::not_found(D::KIND, id))
    }

    pub fn put<D: Document>(&mut self, document: &D) -> Result<(), SocialError> {
        let key = self.keys().document(D::COLLECTION, document.id().as_ref());
        let json = serde_json::to_string(document).map_err(StoreError::from)?;
        self.documents.insert(key, Some(json));
        Ok(())
    }

    pub fn remove<D: Document>(&mut self, id: &D::Id) {
        let key = self.keys().document(D::COLLECTION, id.as_ref());
        self.documents.insert(key, None);
    }

    /// Newest-first slice of `relation`, including this session's pending edges.
    pub async fn relation_desc(
        &mut self,
        relation: Relation<'_>,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<IndexEntry>, SocialError> {
        let key = relation.key(&self.keys());

        let Some((dropped, removed)) = self
            .indexes
            .get(&key)
            .map(|overlay| (overlay.dropped, overlay.removed.len()))
        else {
            let read = self.store.range_desc(&key, offset, limit).await?;
            self.guard(&key, read.version);
            return Ok(read.value);
        };

        let mut entries = if dropped {
            Vec::new()
        } else {
            // Pending removals can hide at most `removed` members of the window.
            let fetch = limit.map(|limit| offset + limit + removed);
            let read = self.store.range_desc(&key, 0, fetch).await?;
            self.guard(&key, read.version);
            read.value
        };

        if let Some(overlay) = self.indexes.get(&key) {
            entries.retain(|entry| !overlay.removed.contains(&entry.member) && !overlay.added.contains_key(&entry.member));
            entries.extend(overlay.added.iter().map(|(member, score)| IndexEntry {
                member: member.clone(),
                score: *score,
            }));
        }
        sort_newest_first(&mut entries);

        Ok(entries
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    pub async fn relation_contains(&mut self, relation: Relation<'_>, member: &str) -> Result<bool, SocialError> {
        let key = relation.key(&self.keys());
        if let Some(overlay) = self.indexes.get(&key) {
            if overlay.added.contains_key(member) {
                return Ok(true);
            }
            if overlay.dropped || overlay.removed.contains(member) {
                return Ok(false);
            }
        }

        let read = self.store.score(&key, member).await?;
        self.guard(&key, read.version);
        Ok(read.value.is_some())
    }

    pub async fn relation_len(&mut self, relation: Relation<'_>) -> Result<u64, SocialError> {
        let key = relation.key(&self.keys());
        if self.indexes.contains_key(&key) {
            let entries = self.relation_desc(relation, 0, None).await?;
            return Ok(entries.len() as u64);
        }

        let read = self.store.cardinality(&key).await?;
        self.guard(&key, read.version);
        Ok(read.value)
    }

    /// Newest member of `relation` that is not in `exclude`.
    pub async fn newest_outside(
        &mut self,
        relation: Relation<'_>,
        exclude: &[&str],
    ) -> Result<Option<IndexEntry>, SocialError> {
        let window = self.relation_desc(relation, 0, Some(exclude.len() + 1)).await?;
        Ok(window
            .into_iter()
            .find(|entry| !exclude.contains(&entry.member.as_str())))
    }

    pub fn relate(&mut self, relation: Relation<'_>, member: impl Into<String>, score: i64) {
        let key = relation.key(&self.keys());
        let member = member.into();
        let overlay = self.indexes.entry(key).or_default();
        overlay.removed.remove(&member);
        overlay.added.insert(member, score);
    }

    pub fn unrelate(&mut self, relation: Relation<'_>, member: &str) {
        let key = relation.key(&self.keys());
        let overlay = self.indexes.entry(key).or_default();
        overlay.added.remove(member);
        overlay.removed.insert(member.to_string());
    }

    /// Deletes the whole relation index.
    pub fn drop_relation(&mut self, relation: Relation<'_>) {
        let key = relation.key(&self.keys());
        let overlay = self.indexes.entry(key).or_default();
        overlay.dropped = true;
        overlay.added.clear();
        overlay.removed.clear();
    }

    /// Id of the entity holding the unique `value` of `collection.field`, if any.
    pub async fn unique_owner(
        &mut self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<String>, SocialError> {
        let key = self.keys().unique(collection, field, value);
        if let Some(claim) = self.claims.get(&key) {
            return Ok(Some(claim.owner.clone()));
        }

        let read = self.store.get(&key).await?;
        self.guard(&key, read.version);
        Ok(read.value)
    }

    pub async fn claim_unique(
        &mut self,
        collection: &str,
        field: &str,
        value: &str,
        owner: &str,
    ) -> Result<(), SocialError> {
        if let Some(existing) = self.unique_owner(collection, field, value).await? {
            if existing != owner {
                return Err(SocialError::DuplicateKey {
                    fields: vec![field.to_string()],
                    values: vec![value.to_string()],
                });
            }
        }

        let key = self.keys().unique(collection, field, value);
        self.claims.insert(
            key,
            PendingClaim {
                owner: owner.to_string(),
                field: field.to_string(),
                value: value.to_string(),
            },
        );
        Ok(())
    }

    pub fn into_plan(self) -> CommitPlan {
        let mut writes = Vec::new();

        for (key, claim) in self.claims {
            writes.push(WriteCommand::ClaimUnique {
                key,
                owner: claim.owner,
                field: claim.field,
                value: claim.value,
            });
        }

        for (key, document) in self.documents {
            writes.push(match document {
                Some(payload_json) => WriteCommand::Put { key, payload_json },
                None => WriteCommand::Delete { key },
            });
        }

        for (index, overlay) in self.indexes {
            if overlay.dropped {
                writes.push(WriteCommand::IndexDrop { index: index.clone() });
            }
            for member in overlay.removed {
                writes.push(WriteCommand::IndexRemove {
                    index: index.clone(),
                    member,
                });
            }
            for (member, score) in overlay.added {
                writes.push(WriteCommand::IndexAdd {
                    index: index.clone(),
                    member,
                    score,
                });
            }
        }

        CommitPlan {
            guards: self
                .guards
                .into_iter()
                .map(|(key, version)| VersionGuard { key, version })
                .collect(),
            writes,
        }
    }
}
