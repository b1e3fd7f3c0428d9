use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use comfy_table::Cell;
use murmur::{Client, ReconcileReport, Settings, Store, User, UserId};
use serde::Serialize;

use crate::output::{OutputManager, TableDisplay};

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    /// Path to a TOML settings file; defaults apply when omitted
    #[arg(long, short = 'c', env = "MURMUR_CONFIG")]
    pub config: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<Settings> {
        match &self.config {
            Some(path) => Settings::load(path).with_context(|| format!("loading {}", path.display())),
            None => Ok(Settings::default()),
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct CleanupArgs {
    /// Delete without asking for confirmation
    #[arg(long)]
    pub yes: bool,
}

impl TableDisplay for Settings {
    fn to_table(&self, output: &OutputManager) -> comfy_table::Table {
        let mut table = output.create_table(&["Setting", "Value"]);
        let rows: [(&str, String); 13] = [
            ("store.redis_url", self.store.redis_url.clone()),
            ("store.prefix", self.store.prefix.clone()),
            ("store.max_commit_attempts", self.store.max_commit_attempts.to_string()),
            ("limits.posts_cache", self.limits.posts_cache.to_string()),
            ("limits.comments_cache", self.limits.comments_cache.to_string()),
            ("limits.follow_cache", self.limits.follow_cache.to_string()),
            ("limits.saved_posts_cache", self.limits.saved_posts_cache.to_string()),
            ("limits.similar_posts", self.limits.similar_posts.to_string()),
            ("timeouts.write_ms", self.timeouts.write_ms.to_string()),
            ("timeouts.read_ms", self.timeouts.read_ms.to_string()),
            ("timeouts.feed_ms", self.timeouts.feed_ms.to_string()),
            ("uploads.base_url", self.uploads.base_url.clone()),
            ("uploads.expires_secs", self.uploads.expires_secs.to_string()),
        ];
        for (key, value) in rows {
            table.add_row(vec![Cell::new(key), Cell::new(value)]);
        }
        table
    }
}

/// User profile as shown by `murmur user`.
#[derive(Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    user: User,
}

impl TableDisplay for UserProfile {
    fn to_table(&self, output: &OutputManager) -> comfy_table::Table {
        let user = &self.user;
        let mut table = output.create_table(&["Field", "Value"]);
        table.add_row(vec![Cell::new("id"), Cell::new(user.id.as_str())]);
        table.add_row(vec![Cell::new("username"), Cell::new(&user.username)]);
        table.add_row(vec![Cell::new("name"), Cell::new(&user.name)]);
        table.add_row(vec![Cell::new("email"), Cell::new(&user.email)]);
        table.add_row(vec![Cell::new("posts"), Cell::new(user.posts_count)]);
        table.add_row(vec![Cell::new("followers"), Cell::new(user.followers_count)]);
        table.add_row(vec![Cell::new("following"), Cell::new(user.following_count)]);
        table.add_row(vec![Cell::new("created"), Cell::new(user.created_at.to_rfc3339())]);
        table
    }
}

#[derive(Serialize)]
pub struct Reconciled(ReconcileReport);

impl TableDisplay for Reconciled {
    fn to_table(&self, output: &OutputManager) -> comfy_table::Table {
        let mut table = output.create_table(&["Counter", "Stored", "Recomputed"]);
        for correction in &self.0.corrections {
            table.add_row(vec![
                Cell::new(correction.counter),
                Cell::new(correction.before),
                Cell::new(correction.after),
            ]);
        }
        table
    }
}

pub async fn handle_config(args: ConfigArgs, output: &OutputManager) -> Result<()> {
    let settings = args.load()?;
    output.display(&settings)
}

pub async fn handle_ping(args: ConfigArgs, output: &OutputManager) -> Result<()> {
    let client = connect(&args, output).await?;
    client.ping().await?;
    output.success("Redis is reachable");
    output.key_value("prefix", &client.settings().store.prefix);
    output.key_value("max commit attempts", &client.store().max_commit_attempts().to_string());
    Ok(())
}

pub async fn handle_user(args: ConfigArgs, username: String, output: &OutputManager) -> Result<()> {
    let client = connect(&args, output).await?;
    let user = client.user_by_username(&username).await?;
    output.heading(&format!("@{}", user.username));
    output.display(&UserProfile { user })
}

pub async fn handle_reconcile(args: ConfigArgs, user_id: String, output: &OutputManager) -> Result<()> {
    let client = connect(&args, output).await?;
    output.info(&format!("reconciling {user_id}"));
    let report = client.reconcile_user(&UserId::from(user_id)).await?;

    if report.is_clean() {
        output.success(&format!("{} is consistent", report.user_id));
        return Ok(());
    }

    if report.dangling_saved_posts > 0 {
        output.warning(&format!(
            "removed {} saved post(s) that no longer exist",
            report.dangling_saved_posts
        ));
    }
    if !report.corrections.is_empty() {
        output.heading("Corrected counters");
    }
    output.display(&Reconciled(report))
}

pub async fn handle_cleanup(args: ConfigArgs, cleanup: CleanupArgs, output: &OutputManager) -> Result<()> {
    let settings = args.load()?;
    if !cleanup.yes {
        bail!(
            "refusing to delete every key under '{}:' without --yes",
            settings.store.prefix
        );
    }

    let client = Client::connect(settings).await?;
    let removed = client.store().cleanup().await?;
    output.success(&format!("removed {removed} key(s) under '{}:'", client.settings().store.prefix));
    Ok(())
}

async fn connect(args: &ConfigArgs, output: &OutputManager) -> Result<Client<murmur::RedisStore>> {
    let settings = args.load()?;
    output.verbose(&format!("connecting with prefix '{}'", settings.store.prefix));
    Ok(Client::connect(settings).await?)
}
