use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Expr, Fields, LitStr, Path, Type};

// ============================================================================
// Attribute parsing
// ============================================================================

enum FieldDefault {
    None,
    Default,
    Expr(Expr),
}

struct ParamField {
    ident: syn::Ident,
    ty: Type,
    wire_name: String,
    renamed: bool,
    default: FieldDefault,
}

fn parse_crate_path(input: &DeriveInput) -> syn::Result<Path> {
    let mut krate: Path = syn::parse_quote!(::libob_core);
    for attr in &input.attrs {
        if !attr.path().is_ident("action_params") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("crate") {
                let lit: LitStr = meta.value()?.parse()?;
                krate = lit.parse()?;
                Ok(())
            } else {
                Err(meta.error("unknown action_params attribute, expected `crate`"))
            }
        })?;
    }
    Ok(krate)
}

fn parse_field(field: &syn::Field) -> syn::Result<ParamField> {
    let ident = field
        .ident
        .clone()
        .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
    let mut wire_name = ident.to_string();
    let mut renamed = false;
    let mut default = FieldDefault::None;

    for attr in &field.attrs {
        if !attr.path().is_ident("param") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                if lit.value().is_empty() {
                    return Err(syn::Error::new(lit.span(), "wire name cannot be empty"));
                }
                wire_name = lit.value();
                renamed = true;
                Ok(())
            } else if meta.path.is_ident("default") {
                default = if meta.input.peek(syn::Token![=]) {
                    FieldDefault::Expr(meta.value()?.parse()?)
                } else {
                    FieldDefault::Default
                };
                Ok(())
            } else {
                Err(meta.error("unknown param attribute, expected `rename` or `default`"))
            }
        })?;
    }

    Ok(ParamField {
        ident,
        ty: field.ty.clone(),
        wire_name,
        renamed,
        default,
    })
}

// ============================================================================
// Derive
// ============================================================================

pub fn derive_action_params(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "ActionParams cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named
                .named
                .iter()
                .map(parse_field)
                .collect::<syn::Result<Vec<_>>>()?,
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => {
                return Err(syn::Error::new(
                    input.ident.span(),
                    "ActionParams requires named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                input.ident.span(),
                "ActionParams can only be derived for structs",
            ));
        }
    };

    let krate = parse_crate_path(input)?;

    let specs = fields.iter().map(|f| param_spec(&krate, f));
    let descriptors = fields.iter().map(|f| field_descriptor(&krate, f));
    let registers: Vec<_> = fields
        .iter()
        .map(|f| {
            let ty = &f.ty;
            quote! { <#ty as #krate::Coerce>::register(scope); }
        })
        .collect();
    let reads = fields.iter().map(|f| read_field(&krate, f));
    let idents: Vec<_> = fields.iter().map(|f| &f.ident).collect();
    let writes = fields.iter().map(|f| {
        let ident = &f.ident;
        let wire = &f.wire_name;
        quote! {
            map.insert(
                ::std::string::String::from(#wire),
                #krate::Coerce::to_value(&self.#ident)?,
            );
        }
    });

    Ok(quote! {
        impl #name {
            #[doc(hidden)]
            const __LIBOB_RECORD: &'static str = ::std::concat!(
                ::std::module_path!(),
                "::",
                ::std::stringify!(#name)
            );

            #[doc(hidden)]
            #[allow(unused_variables, unused_mut, unreachable_patterns)]
            fn __libob_from_map(
                __params: &#krate::Map,
                __nested: bool,
            ) -> ::std::result::Result<Self, ::std::vec::Vec<#krate::CoerceError>> {
                let mut __errors = ::std::vec::Vec::new();
                #(#reads)*
                match (#(#idents,)*) {
                    (#(::std::option::Option::Some(#idents),)*) => {
                        ::std::result::Result::Ok(Self { #(#idents,)* })
                    }
                    _ => ::std::result::Result::Err(__errors),
                }
            }
        }

        impl #krate::ActionParams for #name {
            fn parameters() -> ::std::vec::Vec<#krate::ParameterSpec> {
                ::std::vec![#(#specs),*]
            }

            #[allow(unused_variables)]
            fn register_types(scope: &mut #krate::TypeScope) {
                #(#registers)*
            }

            fn from_params(
                params: &#krate::Map,
            ) -> ::std::result::Result<Self, ::std::vec::Vec<#krate::CoerceError>> {
                Self::__libob_from_map(params, false)
            }
        }

        impl #krate::Coerce for #name {
            fn descriptor() -> #krate::TypeDescriptor {
                #krate::TypeDescriptor::Ref(Self::__LIBOB_RECORD)
            }

            #[allow(unused_variables)]
            fn register(scope: &mut #krate::TypeScope) {
                let fields = ::std::vec![#(#descriptors),*];
                if scope.insert_record(Self::__LIBOB_RECORD, fields) {
                    #(#registers)*
                }
            }

            fn coerce(value: &#krate::Value) -> ::std::result::Result<Self, #krate::CoerceError> {
                let #krate::Value::Map(map) = value else {
                    return ::std::result::Result::Err(#krate::CoerceError::mismatch(
                        ::std::stringify!(#name),
                        value,
                    ));
                };
                Self::__libob_from_map(map, true).map_err(|errors| {
                    errors.into_iter().next().unwrap_or_else(|| {
                        #krate::CoerceError::invalid(::std::stringify!(#name))
                    })
                })
            }

            #[allow(unused_mut)]
            fn to_value(&self) -> ::std::option::Option<#krate::Value> {
                let mut map = #krate::Map::new();
                #(#writes)*
                ::std::option::Option::Some(#krate::Value::Map(map))
            }
        }
    })
}

// ============================================================================
// Per-field code
// ============================================================================

fn default_expr(field: &ParamField) -> Option<TokenStream> {
    match &field.default {
        FieldDefault::None => None,
        FieldDefault::Default => Some(quote! { ::std::default::Default::default() }),
        FieldDefault::Expr(expr) => Some(quote! { #expr }),
    }
}

fn param_spec(krate: &Path, field: &ParamField) -> TokenStream {
    let name = field.ident.to_string();
    let ty = &field.ty;
    let wire = &field.wire_name;

    let rename = field.renamed.then(|| quote! { .renamed(#wire) });
    let default = default_expr(field).map(|expr| {
        quote! {
            .with_default({
                let default: #ty = #expr;
                match #krate::Coerce::to_value(&default) {
                    ::std::option::Option::Some(value) => #krate::ParamDefault::Value(value),
                    ::std::option::Option::None => #krate::ParamDefault::Opaque,
                }
            })
        }
    });

    quote! {
        #krate::ParameterSpec::new(#name, <#ty as #krate::Coerce>::descriptor())
            #rename
            #default
    }
}

fn field_descriptor(krate: &Path, field: &ParamField) -> TokenStream {
    let ty = &field.ty;
    let wire = &field.wire_name;
    let required = matches!(field.default, FieldDefault::None);
    quote! {
        #krate::FieldDescriptor {
            wire_name: #wire,
            ty: <#ty as #krate::Coerce>::descriptor(),
            required: #required,
        }
    }
}

fn read_field(krate: &Path, field: &ParamField) -> TokenStream {
    let ident = &field.ident;
    let ty = &field.ty;
    let wire = &field.wire_name;

    let absent = match default_expr(field) {
        Some(expr) => quote! { ::std::option::Option::Some(#expr) },
        None => quote! {{
            __errors.push(if __nested {
                #krate::CoerceError::missing_field(
                    #wire,
                    <#ty as #krate::Coerce>::descriptor().type_name(),
                )
            } else {
                #krate::CoerceError::missing(#wire)
            });
            ::std::option::Option::None
        }},
    };

    quote! {
        let #ident: ::std::option::Option<#ty> = match __params.get(#wire) {
            ::std::option::Option::Some(value) => {
                match <#ty as #krate::Coerce>::coerce(value) {
                    ::std::result::Result::Ok(value) => ::std::option::Option::Some(value),
                    ::std::result::Result::Err(err) => {
                        __errors.push(err.at_field(#wire));
                        ::std::option::Option::None
                    }
                }
            }
            ::std::option::Option::None => #absent,
        };
    }
}
