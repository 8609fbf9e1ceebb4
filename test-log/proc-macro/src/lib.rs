use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemFn, Path};

/// Replacement for `#[test]` that initializes the tracing subscriber before
/// the test body runs.
///
/// An alternative test attribute can be passed as argument, e.g.
/// `#[meridian_test_log::test(tokio::test)]`.
#[proc_macro_attribute]
pub fn test(args: TokenStream, input: TokenStream) -> TokenStream {
    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = parse_macro_input!(input as ItemFn);

    let test_attr = if args.is_empty() {
        quote!(#[::core::prelude::v1::test])
    } else {
        let inner = parse_macro_input!(args as Path);
        quote!(#[#inner])
    };

    let output = quote! {
        #test_attr
        #(#attrs)*
        #vis #sig {
            ::meridian_test_log::initialize();
            #block
        }
    };
    output.into()
}
