use log::{info, warn};

use crate::{
    client::{Client, details_or_empty},
    config::Limits,
    errors::SocialError,
    id::{PostId, UserId},
    keys::Relation,
    store::{IndexEntry, Session, Store, UnitOfWork},
    types::{CounterCorrection, Post, PostSummary, ReconcileReport, User, UserDetails},
};

struct ReconcileUser<'a> {
    user_id: &'a UserId,
    limits: &'a Limits,
}

impl UnitOfWork for ReconcileUser<'_> {
    type Output = ReconcileReport;

    async fn run<S: Store>(&self, tx: &mut Session<'_, S>) -> Result<ReconcileReport, SocialError> {
        let original_user = tx.require::<User>(self.user_id).await?;
        let original_details = tx.load::<UserDetails>(self.user_id).await?;
        let mut user = original_user.clone();
        let mut details = details_or_empty(tx, self.user_id).await?;
        let mut corrections = Vec::new();

        let posts = live_posts(tx, Relation::PostsByUser(self.user_id), self.limits.posts_cache).await?;
        record(&mut corrections, "posts_count", user.posts_count, posts.entries.len() as u64);
        user.posts_count = posts.entries.len() as u64;
        user.posts = posts.summaries;

        let followers = tx.relation_desc(Relation::Followers(self.user_id), 0, None).await?;
        let followers_count = followers.len() as u64;
        record(&mut corrections, "followers_count", user.followers_count, followers_count);
        record(&mut corrections, "details.followers_count", details.followers_count, followers_count);
        user.followers_count = followers_count;
        details.followers_count = followers_count;
        details.followers = newest_ids(&followers, self.limits.follow_cache);

        let following = tx.relation_desc(Relation::Following(self.user_id), 0, None).await?;
        let following_count = following.len() as u64;
        record(&mut corrections, "following_count", user.following_count, following_count);
        record(&mut corrections, "details.following_count", details.following_count, following_count);
        user.following_count = following_count;
        details.following_count = following_count;
        details.following = newest_ids(&following, self.limits.follow_cache);

        let saved = live_posts(tx, Relation::SavedPosts(self.user_id), 0).await?;
        record(&mut corrections, "saved_posts_count", details.saved_posts_count, saved.entries.len() as u64);
        details.saved_posts_count = saved.entries.len() as u64;
        details.saved_posts = newest_ids(&saved.entries, self.limits.saved_posts_cache);

        if user != original_user {
            tx.put(&user)?;
        }
        if original_details.as_ref() != Some(&details) {
            tx.put(&details)?;
        }

        Ok(ReconcileReport {
            user_id: self.user_id.clone(),
            corrections,
            dangling_saved_posts: saved.dangling,
        })
    }
}

struct LivePosts {
    entries: Vec<IndexEntry>,
    summaries: Vec<PostSummary>,
    dangling: usize,
}

/// Entries of a post relation whose post still exists, with summaries of the newest
/// `summaries` of them. Edges to deleted posts are removed from the relation.
async fn live_posts<S: Store>(
    tx: &mut Session<'_, S>,
    relation: Relation<'_>,
    summaries: usize,
) -> Result<LivePosts, SocialError> {
    let mut live = LivePosts {
        entries: Vec::new(),
        summaries: Vec::new(),
        dangling: 0,
    };

    for entry in tx.relation_desc(relation, 0, None).await? {
        match tx.load::<Post>(&PostId::from(entry.member.as_str())).await? {
            Some(post) => {
                if live.summaries.len() < summaries {
                    live.summaries.push(post.summary());
                }
                live.entries.push(entry);
            }
            None => {
                tx.unrelate(relation, &entry.member);
                live.dangling += 1;
            }
        }
    }

    Ok(live)
}

fn newest_ids<T: From<String>>(entries: &[IndexEntry], cap: usize) -> Vec<T> {
    entries
        .iter()
        .take(cap)
        .map(|entry| T::from(entry.member.clone()))
        .collect()
}

fn record(corrections: &mut Vec<CounterCorrection>, counter: &'static str, before: u64, after: u64) {
    if before != after {
        corrections.push(CounterCorrection { counter, before, after });
    }
}

impl<S: Store> Client<S> {
    /// Recomputes a user's counters from the primary relations and rebuilds the user's
    /// post, follow and saved-post caches. Saved-post edges to deleted posts are dropped.
    pub async fn reconcile_user(&self, user_id: &UserId) -> Result<ReconcileReport, SocialError> {
        let report = self
            .write(
                "reconcile_user",
                ReconcileUser {
                    user_id,
                    limits: &self.settings.limits,
                },
            )
            .await?;

        if report.is_clean() {
            info!("user {user_id} is consistent");
        } else {
            for correction in &report.corrections {
                warn!(
                    "user {user_id}: {} was {}, corrected to {}",
                    correction.counter, correction.before, correction.after
                );
            }
        }
        Ok(report)
    }
}
