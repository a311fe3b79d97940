#![recursion_limit = "128"]

mod trace;

use proc_macro2::TokenStream;
use syn::DeriveInput;

fn result_to_tokens(result: syn::Result<TokenStream>) -> TokenStream {
    result.unwrap_or_else(|e| e.to_compile_error())
}

pub fn derive_trace(input: DeriveInput) -> TokenStream {
    result_to_tokens(trace::impl_trace(input))
}
