use log::info;

use crate::{
    client::{Client, within},
    document::Document,
    errors::SocialError,
    id::{UserId, monotonic_now},
    store::{Session, Store, UnitOfWork},
    types::{NewUser, User},
    validators::normalize_new_user,
};

struct RegisterUser {
    user: User,
}

impl UnitOfWork for RegisterUser {
    type Output = User;

    async fn run<S: Store>(&self, tx: &mut Session<'_, S>) -> Result<User, SocialError> {
        let owner = self.user.id.as_str();
        tx.claim_unique(User::COLLECTION, "email", &self.user.email, owner).await?;
        tx.claim_unique(User::COLLECTION, "username", &self.user.username, owner)
            .await?;
        tx.put(&self.user)?;
        Ok(self.user.clone())
    }
}

impl<S: Store> Client<S> {
    /// Creates a user with zero counters and an empty post cache. Email and username
    /// must be unused.
    pub async fn register_user(&self, input: NewUser) -> Result<User, SocialError> {
        let input = normalize_new_user(input)?;
        let user = User {
            id: UserId::generate(),
            email: input.email,
            username: input.username,
            name: input.name,
            password_hash: input.password_hash,
            bio: String::new(),
            image: None,
            gender: String::new(),
            website: String::new(),
            phone_no: String::new(),
            account_verified: false,
            created_at: monotonic_now(),
            followers_count: 0,
            following_count: 0,
            posts_count: 0,
            posts: Vec::new(),
        };

        let user = self.write("register_user", RegisterUser { user }).await?;
        info!("registered user {} ({})", user.id, user.username);
        Ok(user)
    }

    pub async fn user(&self, id: &UserId) -> Result<User, SocialError> {
        within("user", self.settings.timeouts.read(), async {
            let mut tx = self.session();
            tx.require::<User>(id).await
        })
        .await
    }

    pub async fn user_by_username(&self, username: &str) -> Result<User, SocialError> {
        within("user_by_username", self.settings.timeouts.read(), async {
            let mut tx = self.session();
            find_by_unique(&mut tx, "username", username).await
        })
        .await
    }

    pub async fn user_by_email(&self, email: &str) -> Result<User, SocialError> {
        let email = email.trim().to_lowercase();
        within("user_by_email", self.settings.timeouts.read(), async {
            let mut tx = self.session();
            find_by_unique(&mut tx, "email", &email).await
        })
        .await
    }
}

/// Resolves a user through one of its unique claims.
pub(crate) async fn find_by_unique<S: Store>(
    tx: &mut Session<'_, S>,
    field: &str,
    value: &str,
) -> Result<User, SocialError> {
    let owner = tx
        .unique_owner(User::COLLECTION, field, value)
        .await?
        .ok_or_else(|| SocialError::not_found(User::KIND, value))?;
    tx.require::<User>(&UserId::from(owner)).await
}
