use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Error, Fields, Generics, Ident, LitStr, Result, Type};

pub(crate) struct ParsedDocument {
    name: Ident,
    generics: Generics,
    collection: LitStr,
    kind: LitStr,
    id_field: Ident,
    id_type: Type,
}

impl ParsedDocument {
    pub(crate) fn from_input(input: &DeriveInput) -> Result<Self> {
        let mut collection: Option<LitStr> = None;
        let mut kind: Option<LitStr> = None;

        for attr in &input.attrs {
            if attr.path().is_ident("document") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("collection") {
                        collection = Some(meta.value()?.parse()?);
                        Ok(())
                    } else if meta.path.is_ident("kind") {
                        kind = Some(meta.value()?.parse()?);
                        Ok(())
                    } else {
                        Err(meta.error("unsupported document attribute; expected `collection` or `kind`"))
                    }
                })?;
            }
        }

        let collection = collection.ok_or_else(|| {
            Error::new(
                input.ident.span(),
                "Document requires #[document(collection = \"...\")] on the struct",
            )
        })?;
        if collection.value().is_empty() || collection.value().contains(':') {
            return Err(Error::new(
                collection.span(),
                "collection name must be non-empty and must not contain ':'",
            ));
        }
        let kind = kind.unwrap_or_else(|| collection.clone());

        let named = match &input.data {
            Data::Struct(data) => match &data.fields {
                Fields::Named(named) => named,
                _ => return Err(Error::new(input.ident.span(), "Document requires named fields")),
            },
            _ => return Err(Error::new(input.ident.span(), "Document can only be derived for structs")),
        };

        let mut id: Option<(Ident, Type)> = None;
        for field in &named.named {
            if !has_id_marker(&field.attrs)? {
                continue;
            }
            let Some(ident) = field.ident.clone() else {
                continue;
            };
            if id.is_some() {
                return Err(Error::new(ident.span(), "Document allows exactly one #[document(id)] field"));
            }
            id = Some((ident, field.ty.clone()));
        }

        let (id_field, id_type) = id.ok_or_else(|| {
            Error::new(input.ident.span(), "Document requires one field marked #[document(id)]")
        })?;

        Ok(Self {
            name: input.ident.clone(),
            generics: input.generics.clone(),
            collection,
            kind,
            id_field,
            id_type,
        })
    }

    pub(crate) fn emit(&self) -> TokenStream2 {
        let Self {
            name,
            generics,
            collection,
            kind,
            id_field,
            id_type,
        } = self;
        let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

        quote! {
            impl #impl_generics ::murmur::document::Document for #name #ty_generics #where_clause {
                type Id = #id_type;

                const COLLECTION: &'static str = #collection;
                const KIND: &'static str = #kind;

                fn id(&self) -> &Self::Id {
                    &self.#id_field
                }
            }
        }
    }
}

fn has_id_marker(attrs: &[Attribute]) -> Result<bool> {
    let mut found = false;
    for attr in attrs {
        if !attr.path().is_ident("document") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                found = true;
                Ok(())
            } else {
                Err(meta.error("unsupported field attribute; expected `id`"))
            }
        })?;
    }
    Ok(found)
}
