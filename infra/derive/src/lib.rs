#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the vanish crates: error enums with context
//! support, the runtime bootstrap attribute and the wire model policy.
//!
//! The examples below are `ignore`d because a proc-macro crate cannot use its
//! own macros in doctests.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemFn, ItemStruct, parse_macro_input};

/// Attribute macro to bootstrap the tuned Tokio runtime.
///
/// Turns an `async fn main` returning a `Result` into a plain `fn main` that
/// builds the runtime from a named profile and blocks on the body.
///
/// # Arguments
///
/// * `high_performance` - multi-threaded, sized for the server.
/// * `memory_efficient` - small worker count and stacks.
/// * `default` - worker threads detected from available parallelism.
///
/// # Examples
///
/// ```rust,ignore
/// #[vanish_runtime::main(high_performance)]
/// async fn main() -> anyhow::Result<()> {
/// # Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn main(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    macros::runtime::expand_main(args.into(), input).into()
}

/// Attribute macro applying the wire model policy to a struct.
///
/// * Adds `Debug`, `Serialize` and `Deserialize` when they are not derived yet.
/// * Applies `rename_all = "camelCase"` unless overridden.
/// * Applies `deny_unknown_fields` unless disabled.
///
/// # Example
///
/// ```rust,ignore
/// use vanish_derive::api_model;
///
/// #[api_model(deny_unknown_fields = false)]
/// pub struct NewForm {
///     pub expire: Option<String>,
///     pub notify: Option<String>,
/// }
/// ```
#[proc_macro_attribute]
pub fn api_model(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemStruct);
    macros::api::expand_api_model(attr.into(), input).into()
}

/// Attribute macro for crate error enums.
///
/// # Generated items
///
/// * `#[derive(Debug, thiserror::Error)]` when missing.
/// * A `Result<T>` alias for the enum.
/// * `<Name>Ext` with `.context(...)` for `Result<T, Name>` and for
///   `Result<T, Source>` of every variant that wraps a foreign error.
/// * `From<Source>` for those variants, enabling `?`.
/// * `From<&'static str>` and `From<String>` when an `Internal` variant exists.
/// * `Name::context_note()` returning the attached context, if any.
///
/// # Requirements
///
/// Variants need named fields. A variant holding a `source` (or a field
/// marked `#[source]`/`#[from]`) must also hold
/// `context: Option<Cow<'static, str>>`.
///
/// # Example
///
/// ```rust,ignore
/// use std::borrow::Cow;
/// use vanish_derive::vanish_error;
///
/// #[vanish_error]
/// pub enum IndexError {
///     #[error("Index backend failure{}: {source}", format_context(.context))]
///     Backend { source: redb::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal index error{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn open() -> Result<()> {
///     redb::Database::create("index.redb").map_err(redb::Error::from).context("Opening index")?;
///     Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn vanish_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}
