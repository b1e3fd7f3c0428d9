use log::info;

use crate::{
    client::{Client, GraphChange, details_or_empty, within},
    errors::SocialError,
    fanout::{paginate, pull_capped, push_capped, refill_candidate},
    id::{UserId, monotonic_now},
    keys::{Relation, index_score},
    store::{Session, Store, UnitOfWork},
    types::{Page, User, UserDetails, UserSummary},
};

struct Follow<'a> {
    actor: &'a UserId,
    target: &'a UserId,
    cap: usize,
}

impl UnitOfWork for Follow<'_> {
    type Output = GraphChange;

    async fn run<S: Store>(&self, tx: &mut Session<'_, S>) -> Result<GraphChange, SocialError> {
        let mut actor = tx.require::<User>(self.actor).await?;
        let mut target = tx.require::<User>(self.target).await?;

        if tx
            .relation_contains(Relation::Followers(self.target), self.actor.as_str())
            .await?
        {
            return Ok(GraphChange::Unchanged);
        }

        let score = index_score(monotonic_now());
        let mut actor_details = details_or_empty(tx, self.actor).await?;
        let mut target_details = details_or_empty(tx, self.target).await?;

        target.followers_count += 1;
        actor.following_count += 1;
        push_capped(
            &mut target_details.followers,
            &mut target_details.followers_count,
            self.actor.clone(),
            self.cap,
        );
        push_capped(
            &mut actor_details.following,
            &mut actor_details.following_count,
            self.target.clone(),
            self.cap,
        );
        tx.relate(Relation::Followers(self.target), self.actor.as_str(), score);
        tx.relate(Relation::Following(self.actor), self.target.as_str(), score);

        tx.put(&actor)?;
        tx.put(&target)?;
        tx.put(&actor_details)?;
        tx.put(&target_details)?;
        Ok(GraphChange::Applied)
    }
}

struct Unfollow<'a> {
    actor: &'a UserId,
    target: &'a UserId,
    cap: usize,
}

impl UnitOfWork for Unfollow<'_> {
    type Output = GraphChange;

    async fn run<S: Store>(&self, tx: &mut Session<'_, S>) -> Result<GraphChange, SocialError> {
        let mut actor = tx.require::<User>(self.actor).await?;
        let mut target = tx.require::<User>(self.target).await?;

        if !tx
            .relation_contains(Relation::Followers(self.target), self.actor.as_str())
            .await?
        {
            return Ok(GraphChange::Unchanged);
        }

        let mut actor_details = details_or_empty(tx, self.actor).await?;
        let mut target_details = details_or_empty(tx, self.target).await?;

        target.followers_count = target.followers_count.saturating_sub(1);
        actor.following_count = actor.following_count.saturating_sub(1);
        tx.unrelate(Relation::Followers(self.target), self.actor.as_str());
        tx.unrelate(Relation::Following(self.actor), self.target.as_str());

        pull_capped(
            &mut target_details.followers,
            &mut target_details.followers_count,
            self.actor.as_str(),
        );
        refill(
            tx,
            Relation::Followers(self.target),
            &mut target_details.followers,
            target_details.followers_count,
            self.cap,
        )
        .await?;

        pull_capped(
            &mut actor_details.following,
            &mut actor_details.following_count,
            self.target.as_str(),
        );
        refill(
            tx,
            Relation::Following(self.actor),
            &mut actor_details.following,
            actor_details.following_count,
            self.cap,
        )
        .await?;

        tx.put(&actor)?;
        tx.put(&target)?;
        tx.put(&actor_details)?;
        tx.put(&target_details)?;
        Ok(GraphChange::Applied)
    }
}

async fn refill<S: Store>(
    tx: &mut Session<'_, S>,
    relation: Relation<'_>,
    seq: &mut Vec<UserId>,
    count: u64,
    cap: usize,
) -> Result<(), SocialError> {
    if let Some(member) = refill_candidate(tx, relation, seq, count, cap).await? {
        seq.push(UserId::from(member));
    }
    Ok(())
}

impl<S: Store> Client<S> {
    /// Makes `actor` follow `target`. Following someone already followed is a no-op.
    pub async fn follow(&self, actor: &UserId, target: &UserId) -> Result<GraphChange, SocialError> {
        if actor == target {
            return Err(SocialError::SelfReferenceNotAllowed);
        }

        let change = self
            .write(
                "follow",
                Follow {
                    actor,
                    target,
                    cap: self.settings.limits.follow_cache,
                },
            )
            .await?;
        if change == GraphChange::Applied {
            info!("{actor} now follows {target}");
        }
        Ok(change)
    }

    /// Inverse of [`Client::follow`]. Unfollowing someone not followed is a no-op.
    pub async fn unfollow(&self, actor: &UserId, target: &UserId) -> Result<GraphChange, SocialError> {
        if actor == target {
            return Err(SocialError::SelfReferenceNotAllowed);
        }

        let change = self
            .write(
                "unfollow",
                Unfollow {
                    actor,
                    target,
                    cap: self.settings.limits.follow_cache,
                },
            )
            .await?;
        if change == GraphChange::Applied {
            info!("{actor} unfollowed {target}");
        }
        Ok(change)
    }

    pub async fn is_following(&self, actor: &UserId, target: &UserId) -> Result<bool, SocialError> {
        within("is_following", self.settings.timeouts.read(), async {
            let mut tx = self.session();
            tx.relation_contains(Relation::Followers(target), actor.as_str()).await
        })
        .await
    }

    /// Users following `user`, newest first.
    pub async fn followers(&self, user: &UserId, skip: usize, limit: usize) -> Result<Page<UserSummary>, SocialError> {
        within("followers", self.settings.timeouts.read(), async {
            let mut tx = self.session();
            tx.require::<User>(user).await?;
            let Some(details) = tx.load::<UserDetails>(user).await? else {
                return Ok(Page::empty());
            };
            let paged = paginate(
                &mut tx,
                Relation::Followers(user),
                &details.followers,
                details.followers_count,
                skip,
                limit,
            )
            .await?;
            let ids = paged.cached.into_iter().chain(paged.overflow.into_iter().map(UserId::from));
            user_page(&mut tx, ids, paged.has_next_page).await
        })
        .await
    }

    /// Users `user` follows, newest first.
    pub async fn following(&self, user: &UserId, skip: usize, limit: usize) -> Result<Page<UserSummary>, SocialError> {
        within("following", self.settings.timeouts.read(), async {
            let mut tx = self.session();
            tx.require::<User>(user).await?;
            let Some(details) = tx.load::<UserDetails>(user).await? else {
                return Ok(Page::empty());
            };
            let paged = paginate(
                &mut tx,
                Relation::Following(user),
                &details.following,
                details.following_count,
                skip,
                limit,
            )
            .await?;
            let ids = paged.cached.into_iter().chain(paged.overflow.into_iter().map(UserId::from));
            user_page(&mut tx, ids, paged.has_next_page).await
        })
        .await
    }
}

async fn user_page<S, I>(tx: &mut Session<'_, S>, ids: I, has_next_page: bool) -> Result<Page<UserSummary>, SocialError>
where
    S: Store,
    I: IntoIterator<Item = UserId>,
{
    let mut items = Vec::new();
    for id in ids {
        if let Some(user) = tx.load::<User>(&id).await? {
            items.push(UserSummary::from(&user));
        }
    }
    Ok(Page { items, has_next_page })
}
