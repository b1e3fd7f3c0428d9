use std::time::Duration;

use log::info;

use crate::{
    client::{Client, users::find_by_unique, within},
    errors::{SocialError, ValidationError},
    fanout::{paginate, pull_capped, push_capped, refill_candidate},
    id::{CommentId, PostId, ReplyId, UserId, monotonic_now},
    keys::{Relation, index_score},
    store::{Session, Store, UnitOfWork},
    types::{AuthorSummary, CascadeReport, Comment, CreatedPost, NewPost, Page, Post, PostSummary, PostView, Reply, User},
    uploads::{image_key, strip_query},
};

struct CreatePost {
    /// Everything but `created_at`, which each attempt sets.
    post: Post,
    cap: usize,
}

impl UnitOfWork for CreatePost {
    type Output = PostView;

    async fn run<S: Store>(&self, tx: &mut Session<'_, S>) -> Result<PostView, SocialError> {
        let mut owner = tx.require::<User>(&self.post.user_id).await?;

        // Stamped after the owner read on every attempt.
        let post = Post {
            created_at: monotonic_now(),
            ..self.post.clone()
        };
        tx.put(&post)?;
        tx.relate(
            Relation::PostsByUser(&owner.id),
            post.id.as_str(),
            index_score(post.created_at),
        );
        push_capped(&mut owner.posts, &mut owner.posts_count, post.summary(), self.cap);
        tx.put(&owner)?;

        Ok(PostView {
            post,
            author: AuthorSummary::from(&owner),
        })
    }
}

struct DeletePost<'a> {
    actor: &'a UserId,
    post_id: &'a PostId,
    cap: usize,
}

impl UnitOfWork for DeletePost<'_> {
    type Output = CascadeReport;

    async fn run<S: Store>(&self, tx: &mut Session<'_, S>) -> Result<CascadeReport, SocialError> {
        let post = tx.require::<Post>(self.post_id).await?;
        if &post.user_id != self.actor {
            return Err(SocialError::Forbidden {
                action: "delete another user's post",
            });
        }
        let mut owner = tx.require::<User>(&post.user_id).await?;

        let replies = tx.relation_desc(Relation::RepliesByPost(&post.id), 0, None).await?;
        for entry in &replies {
            tx.remove::<Reply>(&ReplyId::from(entry.member.as_str()));
        }
        tx.drop_relation(Relation::RepliesByPost(&post.id));

        let comments = tx.relation_desc(Relation::CommentsByPost(&post.id), 0, None).await?;
        for entry in &comments {
            let comment_id = CommentId::from(entry.member.as_str());
            tx.remove::<Comment>(&comment_id);
            tx.drop_relation(Relation::RepliesByComment(&comment_id));
        }
        tx.drop_relation(Relation::CommentsByPost(&post.id));

        tx.remove::<Post>(&post.id);
        tx.unrelate(Relation::PostsByUser(&owner.id), post.id.as_str());

        pull_capped(&mut owner.posts, &mut owner.posts_count, post.id.as_str());
        let candidate = refill_candidate(
            tx,
            Relation::PostsByUser(&owner.id),
            &owner.posts,
            owner.posts_count,
            self.cap,
        )
        .await?;
        if let Some(member) = candidate {
            if let Some(refill) = tx.load::<Post>(&PostId::from(member)).await? {
                owner.posts.push(refill.summary());
            }
        }
        tx.put(&owner)?;

        Ok(CascadeReport {
            comments_removed: comments.len(),
            replies_removed: replies.len(),
        })
    }
}

impl<S: Store> Client<S> {
    /// Creates a post for `actor` and returns one presigned upload URL per image. The
    /// stored image references are those URLs without their query string.
    pub async fn create_post(&self, actor: &UserId, input: NewPost) -> Result<CreatedPost, SocialError> {
        if input.image_count == 0 {
            return Err(ValidationError::single("image_count", "min", "a post needs at least one image").into());
        }

        let post_id = PostId::generate();
        let expires = Duration::from_secs(self.settings.uploads.expires_secs);
        let mut upload_urls = Vec::with_capacity(input.image_count);
        let mut images = Vec::with_capacity(input.image_count);
        for index in 0..input.image_count {
            let url = self.uploads.presign_put(&image_key(post_id.as_str(), index), expires)?;
            images.push(strip_query(&url)?);
            upload_urls.push(url);
        }

        let post = Post {
            id: post_id,
            user_id: actor.clone(),
            caption: input.caption.trim().to_string(),
            location: input.location.filter(|location| !location.trim().is_empty()),
            images,
            likes_count: 0,
            comments_count: 0,
            replies_count: 0,
            created_at: monotonic_now(),
            comments: Vec::new(),
        };

        let view = self
            .write(
                "create_post",
                CreatePost {
                    post,
                    cap: self.settings.limits.posts_cache,
                },
            )
            .await?;
        info!("{actor} created post {}", view.post.id);

        Ok(CreatedPost {
            post: view,
            upload_urls,
        })
    }

    /// Deletes a post owned by `actor` together with all of its comments and replies.
    pub async fn delete_post(&self, actor: &UserId, post_id: &PostId) -> Result<CascadeReport, SocialError> {
        let report = self
            .write(
                "delete_post",
                DeletePost {
                    actor,
                    post_id,
                    cap: self.settings.limits.posts_cache,
                },
            )
            .await?;
        info!(
            "{actor} deleted post {post_id} ({} comments, {} replies)",
            report.comments_removed, report.replies_removed
        );
        Ok(report)
    }

    pub async fn post(&self, id: &PostId) -> Result<PostView, SocialError> {
        within("post", self.settings.timeouts.read(), async {
            let mut tx = self.session();
            let post = tx.require::<Post>(id).await?;
            let author = tx.require::<User>(&post.user_id).await?;
            Ok(PostView {
                author: AuthorSummary::from(&author),
                post,
            })
        })
        .await
    }

    /// The actor's cached recent posts.
    pub async fn home_posts(&self, actor: &UserId) -> Result<Vec<PostSummary>, SocialError> {
        within("home_posts", self.settings.timeouts.feed(), async {
            let mut tx = self.session();
            Ok(tx.require::<User>(actor).await?.posts)
        })
        .await
    }

    /// Posts of `username`, newest first.
    pub async fn profile_posts(&self, username: &str, skip: usize, limit: usize) -> Result<Page<PostSummary>, SocialError> {
        within("profile_posts", self.settings.timeouts.read(), async {
            let mut tx = self.session();
            let user = find_by_unique(&mut tx, "username", username).await?;
            let paged = paginate(
                &mut tx,
                Relation::PostsByUser(&user.id),
                &user.posts,
                user.posts_count,
                skip,
                limit,
            )
            .await?;

            let mut items = paged.cached;
            for member in paged.overflow {
                if let Some(post) = tx.load::<Post>(&PostId::from(member)).await? {
                    items.push(post.summary());
                }
            }
            Ok(Page {
                items,
                has_next_page: paged.has_next_page,
            })
        })
        .await
    }

    /// Other recent posts by the author of `exclude`, for a "more from" strip.
    pub async fn similar_posts(&self, username: &str, exclude: &PostId) -> Result<Vec<PostSummary>, SocialError> {
        within("similar_posts", self.settings.timeouts.read(), async {
            let mut tx = self.session();
            let user = find_by_unique(&mut tx, "username", username).await?;
            Ok(user
                .posts
                .into_iter()
                .filter(|summary| &summary.id != exclude)
                .take(self.settings.limits.similar_posts)
                .collect())
        })
        .await
    }
}
