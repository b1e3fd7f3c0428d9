//! murmur: the social graph and feed consistency engine.
//!
//! Users, posts, comments, replies, follows and saved posts live in a document store.
//! Every mutation runs as one optimistic multi-document transaction that keeps the
//! denormalized counters and the capped fan-out caches (recent posts, followers,
//! following, saved posts, first page of comments) in step with the primary data.

extern crate self as murmur;

pub mod client;
pub mod config;
pub mod document;
pub mod errors;
pub mod fanout;
pub mod id;
pub mod keys;
pub mod runtime;
pub mod store;
pub mod types;
pub mod uploads;
pub mod validators;

pub use client::{Client, GraphChange};
pub use config::Settings;
pub use document::Document;
pub use errors::*;
pub use id::{CommentId, PostId, ReplyId, UserId};
pub use murmur_macros::Document;
pub use store::{MemoryStore, RedisStore, Store};
pub use types::*;

// Re-export redis so callers don't need to depend on a specific version
pub use redis;
pub use redis::aio::ConnectionManager;
