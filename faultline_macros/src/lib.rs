//! Procedural macros shared by faultline metric and aggregate types.
//!
//! Every type flowing through the aggregation pipeline needs the same pile of
//! derives (serde round-tripping plus comparison, debug, and clone). These
//! attributes stamp that pile on so the call sites stay readable.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

extern crate proc_macro;

/// Marks a type as a metric sample: adds the derives required by the
/// `Metric` trait bounds and implements the trait. The `Metric` trait must
/// be in scope at the use site. Works on structs and enums alike.
#[proc_macro_attribute]
pub fn metric(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(item as DeriveInput);
    let ident = &ast.ident;
    let expanded = quote! {
        #[derive(
            serde::Serialize,
            serde::Deserialize,
            std::cmp::PartialOrd,
            std::cmp::PartialEq,
            std::fmt::Debug,
            std::clone::Clone
        )]
        #ast

        impl Metric for #ident {}
    };

    TokenStream::from(expanded)
}

/// Adds the derives required by the `Aggregate` trait bounds. The trait
/// itself is implemented by hand since `consume`/`merge` carry the logic.
#[proc_macro_attribute]
pub fn aggregate(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(item as DeriveInput);
    let expanded = quote! {
        #[derive(
            serde::Serialize,
            serde::Deserialize,
            std::cmp::PartialOrd,
            std::cmp::PartialEq,
            std::fmt::Debug,
            std::clone::Clone
        )]
        #ast
    };

    TokenStream::from(expanded)
}
