// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Derive macros that turn the message/block descriptor model into concrete,
//! per-type wire encoders and decoders.
//!
//! Two derives cover the descriptor hierarchy from the message template:
//!
//! - `#[derive(SlBlock)]` — a block's ordered field list becomes a
//!   [`WireCodec`](../slproto/message/wire/trait.WireCodec.html) impl: each
//!   field is written/read in declaration order.
//! - `#[derive(SlMessage)]` — a message's ordered block list becomes
//!   `length`/`to_bytes`/`from_bytes`/`to_bytes_multiple`. Block multiplicity
//!   is read off the field's Rust type rather than an attribute:
//!     - `BlockType`            -> `Single`
//!     - `[BlockType; N]`       -> `Multiple(N)`
//!     - `Var1<BlockType>`      -> `Variable` with a 1-byte count prefix
//!     - `Var2<BlockType>`      -> `Variable` with a 2-byte count prefix
//!
//! A message may declare at most one `Variable` block; that is the block
//! `to_bytes_multiple` fragments across MTU boundaries.

extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, GenericArgument, Ident, PathArguments, Type};

/// `#[derive(SlBlock)]`: generates a [`WireCodec`] impl that writes/reads
/// every named field in declaration order.
///
/// # Panics
///
/// Emits a compile error (not a panic) if the input is not a struct with
/// named fields.
#[proc_macro_derive(SlBlock)]
pub fn derive_sl_block(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let fields = match named_fields(&input) {
        Ok(f) => f,
        Err(e) => return e.to_compile_error().into(),
    };

    let field_names: Vec<_> = fields
        .iter()
        .map(|f| f.ident.clone().expect("named field"))
        .collect();

    let expanded = quote! {
        impl ::slproto::message::wire::WireCodec for #name {
            fn wire_len(&self) -> usize {
                0usize #( + ::slproto::message::wire::WireCodec::wire_len(&self.#field_names) )*
            }

            fn write_wire(&self, out: &mut ::std::vec::Vec<u8>) {
                #( ::slproto::message::wire::WireCodec::write_wire(&self.#field_names, out); )*
            }

            fn read_wire(
                cur: &mut ::slproto::primitive::Cursor<'_>,
            ) -> ::std::result::Result<Self, ::slproto::error::Error> {
                #( let #field_names = ::slproto::message::wire::WireCodec::read_wire(cur)?; )*
                Ok(Self { #( #field_names ),* })
            }
        }
    };
    expanded.into()
}

/// `#[derive(SlMessage)]`: generates `length`, `to_bytes`, `from_bytes`,
/// `validate` and `to_bytes_multiple` for a message whose fields are blocks.
///
/// Requires the struct to also derive `Clone` (used by the MTU-splitting
/// path, which clones the message once per outgoing fragment).
#[proc_macro_derive(SlMessage)]
pub fn derive_sl_message(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let name_str = name.to_string();

    let fields = match named_fields(&input) {
        Ok(f) => f,
        Err(e) => return e.to_compile_error().into(),
    };

    let mut kinds = Vec::new();
    for field in fields {
        let ident = field.ident.clone().expect("named field");
        let kind = classify_field(&field.ty);
        kinds.push((ident, field.ty.clone(), kind));
    }

    let variable_count = kinds
        .iter()
        .filter(|(_, _, k)| matches!(k, FieldKind::Variable { .. }))
        .count();
    if variable_count > 1 {
        return syn::Error::new_spanned(
            &input,
            "SlMessage supports at most one Variable-multiplicity block per message",
        )
        .to_compile_error()
        .into();
    }

    let mut len_terms = Vec::new();
    let mut write_stmts = Vec::new();
    let mut read_stmts = Vec::new();
    let field_names: Vec<_> = kinds.iter().map(|(n, ..)| n.clone()).collect();

    for (name_ident, ty, kind) in &kinds {
        match kind {
            FieldKind::Single => {
                len_terms.push(quote! {
                    ::slproto::message::wire::WireCodec::wire_len(&self.#name_ident)
                });
                write_stmts.push(quote! {
                    ::slproto::message::wire::WireCodec::write_wire(&self.#name_ident, &mut out);
                });
                read_stmts.push(quote! {
                    let #name_ident = <#ty as ::slproto::message::wire::WireCodec>::read_wire(&mut cur)?;
                });
            }
            FieldKind::Multiple { elem_ty, len_expr } => {
                len_terms.push(quote! {
                    self.#name_ident.iter().map(|item| ::slproto::message::wire::WireCodec::wire_len(item)).sum::<usize>()
                });
                write_stmts.push(quote! {
                    for item in self.#name_ident.iter() {
                        ::slproto::message::wire::WireCodec::write_wire(item, &mut out);
                    }
                });
                let name_lit = name_ident.to_string();
                read_stmts.push(quote! {
                    let #name_ident: #ty = {
                        let mut tmp: ::std::vec::Vec<#elem_ty> = ::std::vec::Vec::new();
                        for _ in 0..(#len_expr) {
                            tmp.push(<#elem_ty as ::slproto::message::wire::WireCodec>::read_wire(&mut cur)?);
                        }
                        match ::std::convert::TryInto::try_into(tmp) {
                            Ok(arr) => arr,
                            Err(_) => return ::std::result::Result::Err(::slproto::error::Error::Malformed(
                                ::std::format!("{}: truncated Multiple block {}", #name_str, #name_lit),
                            )),
                        }
                    };
                });
            }
            FieldKind::Variable {
                elem_ty,
                wrapper_ty,
                wrapper_ident,
                prefix_bytes,
            } => {
                let prefix_lit = *prefix_bytes as usize;
                len_terms.push(quote! {
                    (#prefix_lit + self.#name_ident.0.iter().map(|item| ::slproto::message::wire::WireCodec::wire_len(item)).sum::<usize>())
                });
                let write_prefix = if *prefix_bytes == 1 {
                    quote! { out.push(self.#name_ident.0.len().min(u8::MAX as usize) as u8); }
                } else {
                    quote! { out.extend_from_slice(&(self.#name_ident.0.len().min(u16::MAX as usize) as u16).to_le_bytes()); }
                };
                write_stmts.push(quote! {
                    #write_prefix
                    for item in self.#name_ident.0.iter() {
                        ::slproto::message::wire::WireCodec::write_wire(item, &mut out);
                    }
                });
                let read_prefix = if *prefix_bytes == 1 {
                    quote! { cur.read_u8()? as usize }
                } else {
                    quote! { cur.read_u16_le()? as usize }
                };
                read_stmts.push(quote! {
                    let #name_ident: #wrapper_ty = {
                        let count = #read_prefix;
                        let mut tmp: ::std::vec::Vec<#elem_ty> = ::std::vec::Vec::with_capacity(count);
                        for _ in 0..count {
                            tmp.push(<#elem_ty as ::slproto::message::wire::WireCodec>::read_wire(&mut cur)?);
                        }
                        #wrapper_ident(tmp)
                    };
                });
            }
        }
    }

    let length_expr = quote! { 0usize #( + #len_terms )* };

    let to_bytes_multiple = match kinds.iter().find(|(_, _, k)| matches!(k, FieldKind::Variable { .. })) {
        None => quote! {
            fn to_bytes_multiple(&self) -> ::std::vec::Vec<::std::vec::Vec<u8>> {
                ::std::vec![::slproto::message::wire::SlMessage::to_bytes(self)]
            }
        },
        Some((var_name, _, FieldKind::Variable { wrapper_ident, prefix_bytes, .. })) => {
            let prefix_lit = *prefix_bytes as usize;
            quote! {
                fn to_bytes_multiple(&self) -> ::std::vec::Vec<::std::vec::Vec<u8>> {
                    let elems = &self.#var_name.0;
                    if elems.is_empty() {
                        return ::std::vec![::slproto::message::wire::SlMessage::to_bytes(self)];
                    }
                    let elems_len: usize = elems.iter().map(|e| ::slproto::message::wire::WireCodec::wire_len(e)).sum();
                    let fixed_len = ::slproto::message::wire::SlMessage::length(self) - #prefix_lit - elems_len;
                    let mut fragments = ::std::vec::Vec::new();
                    let mut start = 0usize;
                    while start < elems.len() {
                        let mut end = start + 1;
                        let mut running = fixed_len + #prefix_lit
                            + ::slproto::message::wire::WireCodec::wire_len(&elems[start]);
                        while end < elems.len() {
                            let next_len = ::slproto::message::wire::WireCodec::wire_len(&elems[end]);
                            if running + next_len > ::slproto::message::wire::BODY_BUDGET {
                                break;
                            }
                            running += next_len;
                            end += 1;
                        }
                        let mut clone = ::std::clone::Clone::clone(self);
                        clone.#var_name = #wrapper_ident(elems[start..end].to_vec());
                        fragments.push(::slproto::message::wire::SlMessage::to_bytes(&clone));
                        start = end;
                    }
                    fragments
                }
            }
        }
        _ => unreachable!(),
    };

    let validate_body = match kinds.iter().find(|(_, _, k)| matches!(k, FieldKind::Variable { .. })) {
        None => quote! { ::std::result::Result::Ok(()) },
        Some((var_name, _, FieldKind::Variable { prefix_bytes, .. })) => {
            let cap: u32 = if *prefix_bytes == 1 { 255 } else { 65535 };
            quote! {
                if self.#var_name.0.len() > #cap as usize {
                    return ::std::result::Result::Err(::slproto::error::Error::CapacityExceeded(
                        ::std::format!("{}: {} elements exceeds {} cap", #name_str, self.#var_name.0.len(), #cap),
                    ));
                }
                ::std::result::Result::Ok(())
            }
        }
        _ => unreachable!(),
    };

    let expanded = quote! {
        impl ::slproto::message::wire::SlMessage for #name {
            fn length(&self) -> usize {
                #length_expr
            }

            fn to_bytes(&self) -> ::std::vec::Vec<u8> {
                let mut out = ::std::vec::Vec::with_capacity(::slproto::message::wire::SlMessage::length(self));
                #( #write_stmts )*
                out
            }

            fn validate(&self) -> ::std::result::Result<(), ::slproto::error::Error> {
                #validate_body
            }

            #to_bytes_multiple

            fn from_bytes(bytes: &[u8]) -> ::std::result::Result<Self, ::slproto::error::Error> {
                let mut cur = ::slproto::primitive::Cursor::new(bytes);
                #( #read_stmts )*
                ::std::result::Result::Ok(Self { #( #field_names ),* })
            }
        }
    };
    expanded.into()
}

enum FieldKind {
    Single,
    Multiple {
        elem_ty: Type,
        len_expr: TokenStream2,
    },
    Variable {
        elem_ty: Type,
        wrapper_ty: Type,
        /// Bare constructor name (`Var1`/`Var2`, no generic arguments).
        /// `#wrapper_ty(tmp)` would splice e.g. `Var1<PacketsBlock>(tmp)`,
        /// which parses as a chained comparison rather than a call; the
        /// element type is always inferable from context instead.
        wrapper_ident: Ident,
        prefix_bytes: u8,
    },
}

fn classify_field(ty: &Type) -> FieldKind {
    if let Type::Array(arr) = ty {
        let elem_ty = (*arr.elem).clone();
        let len_expr = {
            let len = &arr.len;
            quote! { #len }
        };
        return FieldKind::Multiple { elem_ty, len_expr };
    }

    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            let ident = segment.ident.to_string();
            let prefix_bytes = match ident.as_str() {
                "Var1" => Some(1u8),
                "Var2" => Some(2u8),
                _ => None,
            };
            if let Some(prefix_bytes) = prefix_bytes {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(elem_ty)) = args.args.first() {
                        return FieldKind::Variable {
                            elem_ty: elem_ty.clone(),
                            wrapper_ty: ty.clone(),
                            wrapper_ident: segment.ident.clone(),
                            prefix_bytes,
                        };
                    }
                }
            }
        }
    }

    FieldKind::Single
}

fn named_fields(input: &DeriveInput) -> syn::Result<syn::punctuated::Punctuated<syn::Field, syn::Token![,]>> {
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(f) => Ok(f.named.clone()),
            _ => Err(syn::Error::new_spanned(input, "only named-field structs are supported")),
        },
        _ => Err(syn::Error::new_spanned(input, "only structs are supported")),
    }
}
