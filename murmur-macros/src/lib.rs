use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod document;

use document::ParsedDocument;

/// Binds a struct to its storage collection.
///
/// ```text
/// #[derive(Document)]
/// #[document(collection = "posts", kind = "post")]
/// pub struct Post {
///     #[document(id)]
///     pub id: PostId,
///     ...
/// }
/// ```
///
/// `kind` defaults to the collection name and is only used in error messages.
#[proc_macro_derive(Document, attributes(document))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match ParsedDocument::from_input(&input) {
        Ok(parsed) => parsed.emit().into(),
        Err(err) => err.to_compile_error().into(),
    }
}
