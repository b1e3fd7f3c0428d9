use log::info;

use crate::{
    client::{Client, GraphChange, details_or_empty, within},
    errors::SocialError,
    fanout::{paginate, pull_capped, push_capped, refill_candidate},
    id::{PostId, UserId, monotonic_now},
    keys::{Relation, index_score},
    store::{Session, Store, UnitOfWork},
    types::{Page, Post, PostSummary, User, UserDetails},
};

struct SavePost<'a> {
    actor: &'a UserId,
    post_id: &'a PostId,
    cap: usize,
}

impl UnitOfWork for SavePost<'_> {
    type Output = GraphChange;

    async fn run<S: Store>(&self, tx: &mut Session<'_, S>) -> Result<GraphChange, SocialError> {
        tx.require::<User>(self.actor).await?;
        tx.require::<Post>(self.post_id).await?;

        let relation = Relation::SavedPosts(self.actor);
        if tx.relation_contains(relation, self.post_id.as_str()).await? {
            return Ok(GraphChange::Unchanged);
        }

        let mut details = details_or_empty(tx, self.actor).await?;
        push_capped(
            &mut details.saved_posts,
            &mut details.saved_posts_count,
            self.post_id.clone(),
            self.cap,
        );
        tx.relate(relation, self.post_id.as_str(), index_score(monotonic_now()));
        tx.put(&details)?;
        Ok(GraphChange::Applied)
    }
}

struct UnsavePost<'a> {
    actor: &'a UserId,
    post_id: &'a PostId,
    cap: usize,
}

impl UnitOfWork for UnsavePost<'_> {
    type Output = GraphChange;

    async fn run<S: Store>(&self, tx: &mut Session<'_, S>) -> Result<GraphChange, SocialError> {
        tx.require::<User>(self.actor).await?;

        let relation = Relation::SavedPosts(self.actor);
        if !tx.relation_contains(relation, self.post_id.as_str()).await? {
            return Ok(GraphChange::Unchanged);
        }

        let mut details = details_or_empty(tx, self.actor).await?;
        tx.unrelate(relation, self.post_id.as_str());
        pull_capped(&mut details.saved_posts, &mut details.saved_posts_count, self.post_id.as_str());
        if let Some(member) =
            refill_candidate(tx, relation, &details.saved_posts, details.saved_posts_count, self.cap).await?
        {
            details.saved_posts.push(PostId::from(member));
        }
        tx.put(&details)?;
        Ok(GraphChange::Applied)
    }
}

impl<S: Store> Client<S> {
    /// Bookmarks a post for `actor`. Saving an already saved post is a no-op.
    pub async fn save_post(&self, actor: &UserId, post_id: &PostId) -> Result<GraphChange, SocialError> {
        let change = self
            .write(
                "save_post",
                SavePost {
                    actor,
                    post_id,
                    cap: self.settings.limits.saved_posts_cache,
                },
            )
            .await?;
        if change == GraphChange::Applied {
            info!("{actor} saved post {post_id}");
        }
        Ok(change)
    }

    /// Removes a bookmark. The post itself may already be deleted.
    pub async fn unsave_post(&self, actor: &UserId, post_id: &PostId) -> Result<GraphChange, SocialError> {
        let change = self
            .write(
                "unsave_post",
                UnsavePost {
                    actor,
                    post_id,
                    cap: self.settings.limits.saved_posts_cache,
                },
            )
            .await?;
        if change == GraphChange::Applied {
            info!("{actor} unsaved post {post_id}");
        }
        Ok(change)
    }

    /// Posts saved by `actor`, most recently saved first. Posts deleted since they were
    /// saved are left out.
    pub async fn saved_posts(&self, actor: &UserId, skip: usize, limit: usize) -> Result<Page<PostSummary>, SocialError> {
        within("saved_posts", self.settings.timeouts.read(), async {
            let mut tx = self.session();
            tx.require::<User>(actor).await?;
            let Some(details) = tx.load::<UserDetails>(actor).await? else {
                return Ok(Page::empty());
            };
            let paged = paginate(
                &mut tx,
                Relation::SavedPosts(actor),
                &details.saved_posts,
                details.saved_posts_count,
                skip,
                limit,
            )
            .await?;

            let ids = paged
                .cached
                .into_iter()
                .chain(paged.overflow.into_iter().map(PostId::from));
            let mut items = Vec::new();
            for id in ids {
                if let Some(post) = tx.load::<Post>(&id).await? {
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
}
