use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Document,
    id::{CommentId, PostId, ReplyId, UserId},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
#[document(collection = "users", kind = "user")]
pub struct User {
    #[document(id)]
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub name: String,
    pub password_hash: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub phone_no: String,
    #[serde(default)]
    pub account_verified: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub posts_count: u64,
    /// Newest-first cache of the user's most recent posts.
    #[serde(default)]
    pub posts: Vec<PostSummary>,
}

/// Per-user follow and saved-post caches, created on first use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
#[document(collection = "user_details", kind = "user details")]
pub struct UserDetails {
    #[document(id)]
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub followers: Vec<UserId>,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub following: Vec<UserId>,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub saved_posts: Vec<PostId>,
    #[serde(default)]
    pub saved_posts_count: u64,
}

impl UserDetails {
    pub fn empty(user_id: UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            created_at,
            followers: Vec::new(),
            followers_count: 0,
            following: Vec::new(),
            following_count: 0,
            saved_posts: Vec::new(),
            saved_posts_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
#[document(collection = "posts", kind = "post")]
pub struct Post {
    #[document(id)]
    pub id: PostId,
    pub user_id: UserId,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub location: Option<String>,
    pub images: Vec<String>,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub comments_count: u64,
    #[serde(default)]
    pub replies_count: u64,
    pub created_at: DateTime<Utc>,
    /// First page of comments, newest first.
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Post {
    pub fn summary(&self) -> PostSummary {
        PostSummary {
            id: self.id.clone(),
            images: self.images.clone(),
            likes_count: self.likes_count,
            comments_count: self.comments_count,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
#[document(collection = "comments", kind = "comment")]
pub struct Comment {
    #[document(id)]
    pub id: CommentId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub message: String,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub replies_count: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
#[document(collection = "replies", kind = "reply")]
pub struct Reply {
    #[document(id)]
    pub id: ReplyId,
    pub post_id: PostId,
    pub reply_to_id: CommentId,
    pub user_id: UserId,
    pub message: String,
    #[serde(default)]
    pub likes_count: u64,
    pub created_at: DateTime<Utc>,
}

/// The slice of a post kept in its owner's recent-posts cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: PostId,
    pub images: Vec<String>,
    pub likes_count: u64,
    pub comments_count: u64,
    pub created_at: DateTime<Utc>,
}

/// Author fields joined onto posts, comments and replies at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub username: String,
    pub image: Option<String>,
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            image: user.image.clone(),
        }
    }
}

/// Entry of a follower or following page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub name: String,
    pub image: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            name: user.name.clone(),
            image: user.image.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_next_page: bool,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_next_page: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub author: AuthorSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: AuthorSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyView {
    #[serde(flatten)]
    pub reply: Reply,
    pub author: AuthorSummary,
}

/// Registration input. The password arrives already hashed.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub name: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPost {
    pub caption: String,
    pub location: Option<String>,
    /// Number of images the client will upload.
    pub image_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub post_id: PostId,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReply {
    pub post_id: PostId,
    pub reply_to_id: CommentId,
    pub message: String,
}

/// A freshly created post and the presigned URLs its images must be uploaded to.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedPost {
    pub post: PostView,
    pub upload_urls: Vec<String>,
}

/// Dependent documents removed by a cascading delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub comments_removed: usize,
    pub replies_removed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterCorrection {
    pub counter: &'static str,
    pub before: u64,
    pub after: u64,
}

/// Outcome of rebuilding one user's counters and caches from the primary relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub user_id: UserId,
    pub corrections: Vec<CounterCorrection>,
    /// Saved-post edges dropped because the post no longer exists.
    pub dangling_saved_posts: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.corrections.is_empty() && self.dangling_saved_posts == 0
    }
}
