//! `#[derive(Schema)]` implementation.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Parsed `#[setting(...)]` options for one struct field.
#[derive(Default)]
struct FieldAttrs {
	private: bool,
	flatten: bool,
	rename: Option<LitStr>,
}

fn parse_field_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
	let mut attrs = FieldAttrs::default();

	for attr in field.attrs.iter().filter(|a| a.path().is_ident("setting")) {
		attr.parse_nested_meta(|meta| {
			if meta.path.is_ident("private") {
				attrs.private = true;
				Ok(())
			} else if meta.path.is_ident("flatten") {
				attrs.flatten = true;
				Ok(())
			} else if meta.path.is_ident("rename") {
				let label: LitStr = meta.value()?.parse()?;
				if !is_valid_label(&label.value()) {
					return Err(syn::Error::new_spanned(
						&label,
						"setting labels must be non-empty and contain only alphanumerics, `_` or `-`",
					));
				}
				attrs.rename = Some(label);
				Ok(())
			} else {
				Err(meta.error("unknown setting attribute (expected private, flatten or rename)"))
			}
		})?;
	}

	if attrs.flatten && (attrs.private || attrs.rename.is_some()) {
		return Err(syn::Error::new_spanned(
			field,
			"a flattened field cannot also be private or renamed",
		));
	}

	Ok(attrs)
}

/// Whether `label` is read back unchanged as one fragment of a settings path.
fn is_valid_label(label: &str) -> bool {
	!label.is_empty() && label.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '-'))
}

/// Entry point for the `#[derive(Schema)]` macro.
pub fn derive_schema(input: TokenStream) -> TokenStream {
	let input = parse_macro_input!(input as DeriveInput);
	expand(&input)
		.unwrap_or_else(syn::Error::into_compile_error)
		.into()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
	let Data::Struct(data) = &input.data else {
		return Err(syn::Error::new_spanned(
			input,
			"Schema can only be derived for structs",
		));
	};
	let named = match &data.fields {
		Fields::Named(named) => Some(named),
		Fields::Unit => None,
		Fields::Unnamed(_) => {
			return Err(syn::Error::new_spanned(
				&data.fields,
				"Schema can only be derived for structs with named fields",
			));
		}
	};
	let declared: Vec<&syn::Field> = named
		.map(|named| named.named.iter().collect())
		.unwrap_or_default();

	let mut pushes = Vec::with_capacity(declared.len());
	let mut inits = Vec::with_capacity(declared.len());

	for field in declared.iter().copied() {
		let Some(ident) = field.ident.as_ref() else {
			continue;
		};
		let attrs = parse_field_attrs(field)?;

		if attrs.flatten {
			pushes.push(quote! {
				fields.extend(::sunset_settings::Schema::fields(&self.#ident));
			});
			inits.push(quote! {
				#ident: ::sunset_settings::Schema::fresh(&self.#ident)
			});
			continue;
		}

		let label = attrs
			.rename
			.map(|lit| lit.value())
			.unwrap_or_else(|| ident.unraw().to_string());
		let entry = if attrs.private {
			quote! {
				::sunset_settings::FieldEntry::new(#label, ::sunset_settings::SchemaField::as_field(&self.#ident)).private()
			}
		} else {
			quote! {
				::sunset_settings::FieldEntry::new(#label, ::sunset_settings::SchemaField::as_field(&self.#ident))
			}
		};
		pushes.push(quote! { fields.push(#entry); });
		inits.push(quote! {
			#ident: ::sunset_settings::SchemaField::fresh(&self.#ident)
		});
	}

	let name = &input.ident;
	let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
	let capacity = declared.len();
	let fresh = if named.is_some() {
		quote! { Self { #(#inits,)* } }
	} else {
		quote! { Self }
	};

	Ok(quote! {
		impl #impl_generics ::sunset_settings::Schema for #name #ty_generics #where_clause {
			fn fields(&self) -> ::std::vec::Vec<::sunset_settings::FieldEntry<'_>> {
				#[allow(unused_mut)]
				let mut fields = ::std::vec::Vec::with_capacity(#capacity);
				#(#pushes)*
				fields
			}

			fn fresh(&self) -> Self {
				#fresh
			}
		}
	})
}

#[cfg(test)]
mod tests {
	use rstest::rstest;
	use syn::parse_quote;

	use super::*;

	fn renamed(label: &str) -> DeriveInput {
		let label = LitStr::new(label, proc_macro2::Span::call_site());
		parse_quote! {
			struct Prefs {
				#[setting(rename = #label)]
				size: Key<u32>,
			}
		}
	}

	#[rstest]
	#[case("type")]
	#[case("font_size")]
	#[case("tab-width")]
	#[case("größe")]
	#[case("_hidden")]
	fn test_rename_accepts_path_safe_labels(#[case] label: &str) {
		assert!(expand(&renamed(label)).is_ok());
	}

	#[rstest]
	#[case("")]
	#[case("font size")]
	#[case("font.size")]
	#[case("a=b")]
	#[case("[x]")]
	fn test_rename_rejects_labels_that_do_not_read_back(#[case] label: &str) {
		let error = expand(&renamed(label)).unwrap_err();
		assert!(error.to_string().contains("setting labels"));
	}

	#[test]
	fn test_flatten_cannot_be_renamed() {
		let input: DeriveInput = parse_quote! {
			struct Prefs {
				#[setting(flatten, rename = "x")]
				common: Common,
			}
		};
		assert!(expand(&input).is_err());
	}

	#[test]
	fn test_tuple_structs_are_rejected() {
		let input: DeriveInput = parse_quote! {
			struct Prefs(Key<u32>);
		};
		assert!(expand(&input).is_err());
	}
}
