use proc_macro2::TokenStream;
use quote::quote;
use syn::{Error, Ident, ItemFn, ReturnType, Type};

const PROFILES: &str = "high_performance, memory_efficient, default";

/// Expands `#[vanish_runtime::main]`.
#[must_use]
pub fn expand_main(args: TokenStream, input: ItemFn) -> TokenStream {
    expand(args, input).unwrap_or_else(Error::into_compile_error)
}

fn expand(args: TokenStream, input: ItemFn) -> syn::Result<TokenStream> {
    if input.sig.asyncness.is_none() {
        return Err(Error::new_spanned(
            &input.sig.ident,
            "#[vanish_runtime::main] expects an async fn",
        ));
    }
    if !returns_result(&input.sig.output) {
        return Err(Error::new_spanned(
            &input.sig.output,
            "#[vanish_runtime::main] expects a Result return type",
        ));
    }

    let profile = profile_call(args)?;
    let ItemFn { attrs, vis, sig, block } = input;
    let name = &sig.ident;
    let output = &sig.output;

    Ok(quote! {
        #(#attrs)*
        #vis fn #name() #output {
            let config = #profile;
            let runtime = ::vanish_runtime::build_runtime_with_config(&config)?;
            runtime.block_on(async #block)
        }
    })
}

fn profile_call(args: TokenStream) -> syn::Result<TokenStream> {
    if args.is_empty() {
        return Ok(quote! { ::vanish_runtime::RuntimeConfig::default() });
    }

    let profile: Ident = syn::parse2(args)?;
    match profile.to_string().as_str() {
        "high_performance" => Ok(quote! { ::vanish_runtime::RuntimeConfig::high_performance() }),
        "memory_efficient" => Ok(quote! { ::vanish_runtime::RuntimeConfig::memory_efficient() }),
        "default" => Ok(quote! { ::vanish_runtime::RuntimeConfig::default() }),
        _ => Err(Error::new_spanned(profile, format!("unknown runtime profile, use one of: {PROFILES}"))),
    }
}

fn returns_result(output: &ReturnType) -> bool {
    let ReturnType::Type(_, ty) = output else { return false };
    let Type::Path(path) = ty.as_ref() else { return false };
    path.path.segments.last().is_some_and(|seg| seg.ident == "Result")
}
