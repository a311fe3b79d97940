#![recursion_limit = "128"]

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Implements `formula_graph::gc::Trace` by visiting every field, except the
/// ones marked `#[notrace]`.
///
/// ```ignore
/// #[derive(Trace)]
/// enum Formula {
///     Lookup {
///         hub: FormulaId,
///         #[notrace]
///         path: Vec<String>,
///     },
/// }
/// ```
#[proc_macro_derive(Trace, attributes(notrace))]
pub fn derive_trace(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    formula_derive_impl::derive_trace(input).into()
}
