use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Field, Fields, Result};

fn is_notrace(field: &Field) -> bool {
    field.attrs.iter().any(|attr| attr.path.is_ident("notrace"))
}

/// Returns a destructuring pattern for `fields` together with one
/// `trace()` call per traced binding.
fn bind_fields(fields: &Fields) -> (TokenStream, Vec<TokenStream>) {
    match fields {
        Fields::Named(named) => {
            let mut names = Vec::new();
            let mut calls = Vec::new();
            for field in named.named.iter().filter(|f| !is_notrace(f)) {
                let name = field
                    .ident
                    .as_ref()
                    .expect("Field should have a name in non-tuple struct");
                calls.push(quote!(::formula_graph::gc::Trace::trace(#name, tracer_fn);));
                names.push(name);
            }
            (quote!({ #(#names,)* .. }), calls)
        }
        Fields::Unnamed(unnamed) => {
            let mut pats = Vec::new();
            let mut calls = Vec::new();
            for (i, field) in unnamed.unnamed.iter().enumerate() {
                if is_notrace(field) {
                    pats.push(quote!(_));
                } else {
                    let binding = format_ident!("__field{}", i);
                    calls.push(quote!(::formula_graph::gc::Trace::trace(#binding, tracer_fn);));
                    pats.push(quote!(#binding));
                }
            }
            (quote!(( #(#pats),* )), calls)
        }
        Fields::Unit => (quote!(), Vec::new()),
    }
}

pub(crate) fn impl_trace(input: DeriveInput) -> Result<TokenStream> {
    let ty = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let trace_code = match &input.data {
        Data::Struct(s) => {
            let (pat, calls) = bind_fields(&s.fields);
            quote! {
                let Self #pat = self;
                #(#calls)*
            }
        }
        Data::Enum(e) => {
            let arms = e.variants.iter().map(|variant| {
                let ident = &variant.ident;
                let (pat, calls) = bind_fields(&variant.fields);
                quote!(Self::#ident #pat => { #(#calls)* })
            });
            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                ty,
                "#[derive(Trace)] can't tell which union field is live",
            ))
        }
    };

    Ok(quote! {
        impl #impl_generics ::formula_graph::gc::Trace for #ty #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn trace(&self, tracer_fn: &mut ::formula_graph::gc::TracerFn) {
                #trace_code
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(src: &str) -> String {
        let input: DeriveInput = syn::parse_str(src).unwrap();
        impl_trace(input).unwrap().to_string()
    }

    #[test]
    fn notrace_fields_are_skipped() {
        let out = expand("struct Lookup { hub: FormulaId, #[notrace] path: Vec<String> }");
        assert!(out.contains("trace (hub , tracer_fn)"));
        assert!(!out.contains("trace (path"));
    }

    #[test]
    fn enum_variants_get_one_arm_each() {
        let out = expand(
            "enum F { Worker, Handle { agent: Id }, Slots(#[notrace] String, Vec<Id>) }",
        );
        assert!(out.contains("Self :: Worker =>"));
        assert!(out.contains("Self :: Handle { agent , .. } =>"));
        assert!(out.contains("Self :: Slots (_ , __field1) =>"));
    }

    #[test]
    fn unions_are_rejected() {
        let input: DeriveInput = syn::parse_str("union U { a: u32, b: f32 }").unwrap();
        assert!(impl_trace(input).is_err());
    }
}
