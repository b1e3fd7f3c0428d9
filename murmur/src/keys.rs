use chrono::{DateTime, Utc};

use crate::id::{CommentId, PostId, UserId};

/// Common key-construction helpers used across murmur.
#[derive(Debug, Clone, Copy)]
pub struct KeyContext<'a> {
    pub prefix: &'a str,
}

impl<'a> KeyContext<'a> {
    pub fn new(prefix: &'a str) -> Self {
        Self { prefix }
    }

    pub fn document(&self, collection: &str, id: &str) -> String {
        format!("{}:{}:{}", self.prefix, collection, id)
    }

    /// Sorted relation index owned by `owner`.
    /// Format: prefix:collection:relation:owner
    pub fn relation(&self, collection: &str, relation: &str, owner: &str) -> String {
        format!("{}:{}:{}:{}", self.prefix, collection, relation, owner)
    }

    /// Claim key for a unique field value. Values are stored as given; callers normalize.
    pub fn unique(&self, collection: &str, field: &str, value: &str) -> String {
        format!("{}:{}:unique:{}:{}", self.prefix, collection, field, value)
    }

    /// Glob matching every key this context owns.
    pub fn pattern(&self) -> String {
        format!("{}:*", self.prefix)
    }
}

/// Version counter paired with every document, index and claim key.
pub fn version_key(key: &str) -> String {
    format!("{key}:__v")
}

/// Relation index score of an entity created at `at`.
pub fn index_score(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

/// The primary relations of the social graph. Each is a sorted index of member ids
/// scored by creation time, so newest-first order is a reverse range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation<'a> {
    PostsByUser(&'a UserId),
    CommentsByPost(&'a PostId),
    RepliesByComment(&'a CommentId),
    RepliesByPost(&'a PostId),
    /// Users following the owner.
    Followers(&'a UserId),
    /// Users the owner follows.
    Following(&'a UserId),
    SavedPosts(&'a UserId),
}

impl Relation<'_> {
    pub fn key(&self, ctx: &KeyContext<'_>) -> String {
        match self {
            Relation::PostsByUser(user) => ctx.relation("posts", "by_user", user.as_str()),
            Relation::CommentsByPost(post) => ctx.relation("comments", "by_post", post.as_str()),
            Relation::RepliesByComment(comment) => ctx.relation("replies", "by_comment", comment.as_str()),
            Relation::RepliesByPost(post) => ctx.relation("replies", "by_post", post.as_str()),
            Relation::Followers(user) => ctx.relation("user_details", "followers", user.as_str()),
            Relation::Following(user) => ctx.relation("user_details", "following", user.as_str()),
            Relation::SavedPosts(user) => ctx.relation("user_details", "saved_posts", user.as_str()),
        }
    }
}
