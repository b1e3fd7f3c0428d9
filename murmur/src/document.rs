use serde::{Serialize, de::DeserializeOwned};

/// A value stored as one document in a named collection.
///
/// Implemented with `#[derive(Document)]`, which reads the collection from
/// `#[document(collection = "...")]` and the key from the `#[document(id)]` field.
pub trait Document: Serialize + DeserializeOwned {
    type Id: AsRef<str> + Clone + From<String>;

    /// Collection name, also the second segment of every key of this document kind.
    const COLLECTION: &'static str;
    /// Human-readable entity kind used in error messages.
    const KIND: &'static str;

    fn id(&self) -> &Self::Id;
}
