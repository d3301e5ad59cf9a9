//! Procedural macros for sunset-settings.
//!
//! Provides `#[derive(Schema)]`, which lists the settings fields of a struct
//! in declaration order and knows how to instantiate a fresh copy of its shape.

use proc_macro::TokenStream;

/// Schema derive implementation.
mod schema;

/// Derives `sunset_settings::Schema` for a struct of settings fields.
///
/// Every field must be a `Key<T>`, a `Bunch<S>`, a `List<E>`, or (with
/// `#[setting(flatten)]`) another type implementing `Schema`.
///
/// ```ignore
/// #[derive(Schema)]
/// struct Appearance {
///     font_size: Key<i64>,
///     main_font: Bunch<Font>,
///     #[setting(private)]
///     cache_dir: Key<String>,
///     #[setting(flatten)]
///     common: Common,
/// }
/// ```
///
/// # Attributes
///
/// - `private` - the field is never written to a settings file, and its
///   updates are not reported to the containing bunch
/// - `flatten` - splice the fields of another schema into this one
/// - `rename = "label"` - use `label` in settings files instead of the field name
#[proc_macro_derive(Schema, attributes(setting))]
pub fn derive_schema(input: TokenStream) -> TokenStream {
	schema::derive_schema(input)
}
