//! Injectable attribute macro implementation
//!
//! Turns `#[inject("Key")]` field annotations into a `Shape` whose assembler
//! pulls each injected field out of the `Wiring` and defaults the rest.

use proc_macro::TokenStream;
use proc_macro2::Ident;
use quote::quote;
use syn::{
    parse::Result, parse_macro_input, Attribute, Error, Fields, Item, ItemStruct, LitStr, Type,
};

/// Main implementation function for the injectable macro
pub fn injectable_impl(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut service_name: Option<LitStr> = None;
    let args_parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("name") {
            service_name = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported #[injectable] argument, expected `name = \"...\"`"))
        }
    });
    parse_macro_input!(args with args_parser);

    let input_item = parse_macro_input!(input as Item);

    match process_injectable_item(input_item, service_name) {
        Ok(result) => result.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn process_injectable_item(
    item: Item,
    service_name: Option<LitStr>,
) -> Result<proc_macro2::TokenStream> {
    match item {
        Item::Struct(mut item_struct) => process_injectable_struct(&mut item_struct, service_name),
        _ => Err(Error::new_spanned(
            item,
            "#[injectable] can only be applied to structs",
        )),
    }
}

fn process_injectable_struct(
    item_struct: &mut ItemStruct,
    service_name: Option<LitStr>,
) -> Result<proc_macro2::TokenStream> {
    let fields = extract_fields(item_struct)?;
    let injectable_impl = generate_injectable_impl(item_struct, &fields, service_name.as_ref());

    // The helper attribute is not a real attribute; it must not reach rustc
    if let Fields::Named(named) = &mut item_struct.fields {
        for field in named.named.iter_mut() {
            field.attrs.retain(|attr| !attr.path().is_ident("inject"));
        }
    }

    Ok(quote! {
        #item_struct

        #injectable_impl
    })
}

/// How one struct field gets its value
#[derive(Debug, Clone)]
struct FieldInfo {
    name: Ident,
    injection: Option<Injection>,
}

#[derive(Debug, Clone)]
struct Injection {
    key: LitStr,
    optional: bool,
}

fn extract_fields(item_struct: &ItemStruct) -> Result<Vec<FieldInfo>> {
    let named = match &item_struct.fields {
        Fields::Named(named) => named,
        Fields::Unit => return Ok(Vec::new()),
        Fields::Unnamed(_) => {
            return Err(Error::new_spanned(
                item_struct,
                "#[injectable] requires structs with named fields",
            ))
        }
    };

    let mut fields = Vec::with_capacity(named.named.len());
    for field in &named.named {
        let Some(name) = field.ident.clone() else {
            continue;
        };

        let injection = match find_inject_attr(&field.attrs)? {
            Some(key) => {
                if key.value().is_empty() {
                    return Err(Error::new_spanned(&key, "injection key must not be empty"));
                }
                Some(Injection {
                    key,
                    optional: is_option(&field.ty),
                })
            }
            None => None,
        };

        fields.push(FieldInfo { name, injection });
    }

    Ok(fields)
}

/// Parse `#[inject("Key")]`, rejecting duplicates and a missing key
fn find_inject_attr(attrs: &[Attribute]) -> Result<Option<LitStr>> {
    let mut found: Option<LitStr> = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("inject")) {
        if found.is_some() {
            return Err(Error::new_spanned(attr, "duplicate #[inject] attribute"));
        }
        let key = attr.parse_args::<LitStr>().map_err(|_| {
            Error::new_spanned(attr, "expected a service key: #[inject(\"ServiceName\")]")
        })?;
        found = Some(key);
    }
    Ok(found)
}

fn is_option(ty: &Type) -> bool {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Option"),
        _ => false,
    }
}

fn generate_injectable_impl(
    item_struct: &ItemStruct,
    fields: &[FieldInfo],
    service_name: Option<&LitStr>,
) -> proc_macro2::TokenStream {
    let struct_name = &item_struct.ident;
    let (impl_generics, ty_generics, where_clause) = item_struct.generics.split_for_impl();

    let field_initializers = fields.iter().map(|field| {
        let name = &field.name;
        match &field.injection {
            Some(_) => {
                let field_str = name.to_string();
                quote! { #name: wiring.get(#field_str)? }
            }
            None => quote! { #name: ::core::default::Default::default() },
        }
    });

    let injection_points = fields.iter().filter_map(|field| {
        let injection = field.injection.as_ref()?;
        let field_str = field.name.to_string();
        let key = &injection.key;
        Some(if injection.optional {
            quote! { .inject_optional(#field_str, #key) }
        } else {
            quote! { .inject(#field_str, #key) }
        })
    });

    let wiring_arg = if fields.iter().any(|field| field.injection.is_some()) {
        quote! { wiring }
    } else {
        quote! { _wiring }
    };

    let construct = if matches!(item_struct.fields, Fields::Unit) {
        quote! { Self }
    } else {
        quote! { Self { #(#field_initializers),* } }
    };

    let service_name_fn = service_name.map(|name| {
        quote! {
            fn service_name() -> ::std::string::String {
                ::std::string::String::from(#name)
            }
        }
    });

    quote! {
        impl #impl_generics ::keystone_core::container::Injectable for #struct_name #ty_generics #where_clause {
            fn shape() -> ::keystone_core::container::Shape<Self> {
                ::keystone_core::container::Shape::new(
                    |#wiring_arg: &::keystone_core::container::Wiring| {
                        ::core::result::Result::Ok(#construct)
                    },
                )
                #(#injection_points)*
            }

            #service_name_fn
        }
    }
}
