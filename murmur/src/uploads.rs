use std::time::Duration;

use chrono::Utc;
use url::Url;

use crate::{config::UploadSettings, errors::SocialError};

/// Object-storage collaborator that hands out upload URLs for post images.
pub trait UploadSigner: Send + Sync {
    /// Returns a URL the client can PUT the object at `key` to, valid for `expires`.
    fn presign_put(&self, key: &str, expires: Duration) -> Result<String, SocialError>;
}

/// Signer for buckets that accept unsigned uploads (local development, tests).
/// Produces `{base_url}/{key}?expires={unix seconds}`.
#[derive(Debug, Clone)]
pub struct StaticUploadSigner {
    base_url: Url,
}

impl StaticUploadSigner {
    pub fn new(base_url: &str) -> Result<Self, SocialError> {
        let mut base_url = Url::parse(base_url).map_err(|err| SocialError::Upload {
            message: format!("invalid upload base url `{base_url}`: {err}"),
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { base_url })
    }

    pub fn from_settings(settings: &UploadSettings) -> Result<Self, SocialError> {
        Self::new(&settings.base_url)
    }
}

impl UploadSigner for StaticUploadSigner {
    fn presign_put(&self, key: &str, expires: Duration) -> Result<String, SocialError> {
        let mut url = self.base_url.join(key).map_err(|err| SocialError::Upload {
            message: format!("invalid object key `{key}`: {err}"),
        })?;
        let deadline = Utc::now().timestamp() + expires.as_secs() as i64;
        url.query_pairs_mut().append_pair("expires", &deadline.to_string());
        Ok(url.into())
    }
}

/// The stored image reference: the upload URL without its signature query.
pub fn strip_query(upload_url: &str) -> Result<String, SocialError> {
    let mut url = Url::parse(upload_url).map_err(|err| SocialError::Upload {
        message: format!("signer returned an invalid url `{upload_url}`: {err}"),
    })?;
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.into())
}

/// Object key of the `index`-th image of a post.
pub fn image_key(post_id: &str, index: usize) -> String {
    format!("{post_id}/{index}")
}
