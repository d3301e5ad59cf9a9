//! Layered, typed settings.
//!
//! A settings structure is declared once as a [`Schema`]: plain struct fields of
//! type [`Key`], [`Bunch`] and [`List`]. Instantiating it as a [`Settings`] gives
//! the root layer of a tree; child layers created with [`Settings::add_layer`]
//! carry the same fields, and every field inherits from the matching field of the
//! parent layer until it is set locally.
//!
//! ```
//! use sunset_settings::{Key, List, Schema, Settings};
//!
//! #[derive(Schema)]
//! struct Editor {
//! 	font_size: Key<u32>,
//! 	theme: Key<String>,
//! 	rulers: List<Key<u32>>,
//! }
//!
//! let root = Settings::new(Editor {
//! 	font_size: Key::new(12),
//! 	theme: Key::new("light".to_string()),
//! 	rulers: List::new(Key::new(80)),
//! });
//! let laptop = root.add_layer("Laptop");
//!
//! root.theme.set("dark".to_string());
//! laptop.font_size.set(10);
//! assert_eq!(laptop.theme.get(), "dark");
//! assert_eq!(root.font_size.get(), 12);
//!
//! let text = root.to_text();
//! assert_eq!(text, "[main]\ntheme = dark\n\n[laptop]\nfont_size = 10\n");
//! ```
//!
//! # Notifications
//!
//! Listeners run synchronously on the mutating thread, in registration order:
//!
//! - value-change listeners of a [`Key`] receive the new resolved value, and fire
//!   only when the resolved value changes, also for inheriting keys in child
//!   layers;
//! - update listeners receive the [`Node`] where the change originated and fire on
//!   that node first, then on every container above it up to and including the
//!   ancestor layers;
//! - loaded listeners fire after a settings file was applied.
//!
//! While a file is loaded, update and value-change notifications are held back.
//! Once every line is applied, loaded listeners fire across the loaded layers in
//! pre-order, then value-change listeners of the keys whose value differs from
//! before the load, then each changed layer fires its own update listeners once
//! with itself as origin.
//!
//! # Threads
//!
//! All settings trees share one reentrant lock. Every operation runs under it,
//! so listeners may freely read and modify settings from within a callback, and
//! other threads wait until the outermost operation returns.

extern crate self as sunset_settings;

mod bunch;
mod codec;
mod error;
mod key;
mod list;
mod lock;
mod node;
mod schema;
mod serializer;
mod settings;

pub use bunch::Bunch;
pub use codec::{LoadReport, MAX_LIST_INDEX, Rejected, Rejection, SaveOptions};
pub use error::{Error, Result};
pub use key::Key;
pub use list::{Iter, List, ListOrder};
#[doc(hidden)]
pub use node::NodeCore;
pub use node::{Node, NodeKind};
pub use schema::{AnyBunch, AnyKey, AnyList, Field, FieldEntry, Schema, SchemaField};
pub use serializer::{NativeSerializer, Serializable, Serializer, Value};
pub use settings::{Settings, normalize};
/// Derives [`Schema`] for a struct of settings fields.
pub use sunset_macros::Schema;
