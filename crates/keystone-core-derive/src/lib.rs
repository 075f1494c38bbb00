//! # keystone-core-derive
//!
//! Attribute macros for the keystone dependency injection container.
//!
//! - `#[injectable]`: implement `Injectable` for a struct from its
//!   `#[inject("Key")]` fields

use proc_macro::TokenStream;

mod injectable;

/// Implement `keystone_core::container::Injectable` for a struct.
///
/// Fields marked `#[inject("Key")]` are resolved from the container under
/// `Key`; an `Option<Arc<T>>` field becomes an optional dependency. Every
/// other field is filled with `Default::default()`.
///
/// `#[injectable(name = "Service")]` overrides the registered service name.
#[proc_macro_attribute]
pub fn injectable(args: TokenStream, input: TokenStream) -> TokenStream {
    injectable::injectable_impl(args, input)
}
