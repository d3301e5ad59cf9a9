//! Schema introspection: the fields a settings structure declares.
//!
//! Structures of settings implement [`Schema`], normally through
//! `#[derive(Schema)]`. Tree walks (attaching, inheritance, saving and loading)
//! only ever see fields through the closed [`Field`] enum.

use std::collections::HashSet;
use std::sync::Weak;

use crate::node::{Container, Node};

/// A structure of settings fields.
pub trait Schema: Send + Sync + Sized + 'static {
	/// The fields of this structure, in declaration order.
	fn fields(&self) -> Vec<FieldEntry<'_>>;

	/// A structurally identical copy with no values set and no links.
	fn fresh(&self) -> Self;
}

/// A node handle that can appear as a schema field or as a list item.
pub trait SchemaField: Node + Clone + 'static {
	fn as_field(&self) -> Field<'_>;

	/// A structurally identical copy of this field with no values set.
	fn fresh(&self) -> Self;
}

/// Type-erased view of one field.
#[derive(Clone, Copy)]
pub enum Field<'a> {
	Key(&'a dyn AnyKey),
	Bunch(&'a dyn AnyBunch),
	List(&'a dyn AnyList),
}

impl<'a> Field<'a> {
	pub fn node(self) -> &'a dyn Node {
		match self {
			Field::Key(key) => key,
			Field::Bunch(bunch) => bunch,
			Field::List(list) => list,
		}
	}
}

/// Key operations that do not depend on the value type.
pub trait AnyKey: Node {
	/// The local value rendered as text, if one is set.
	fn dump_value(&self) -> Option<String>;

	/// Parses and sets `text`, or clears the key for `None`. Returns false if the
	/// text is not a valid value.
	fn restore_value(&self, text: Option<&str>) -> bool;

	fn reset(&self);
}

pub trait AnyBunch: Node {
	fn entries(&self) -> Vec<FieldEntry<'_>>;
}

/// List operations that do not depend on the item type.
pub trait AnyList: Node {
	fn item_count(&self) -> usize;

	/// Calls `visit` with each item and its 0-based position.
	fn for_each_item(&self, visit: &mut dyn FnMut(usize, Field<'_>));

	/// Calls `visit` with the item at `index`, if there is one.
	fn with_item(&self, index: usize, visit: &mut dyn FnMut(Field<'_>));

	/// Appends fresh items until the list holds at least `len` of them.
	fn grow_to(&self, len: usize);

	/// Removes every item from position `len` on.
	fn truncate(&self, len: usize);

	fn reset(&self);
}

/// One declared field of a [`Schema`].
#[derive(Clone, Copy)]
pub struct FieldEntry<'a> {
	label: &'static str,
	private: bool,
	field: Field<'a>,
}

impl<'a> FieldEntry<'a> {
	/// Labels starting with `_` are private.
	pub fn new(label: &'static str, field: Field<'a>) -> Self {
		Self {
			label,
			private: label.starts_with('_'),
			field,
		}
	}

	/// Marks the field as private: never saved, and its updates stay local.
	pub fn private(mut self) -> Self {
		self.private = true;
		self
	}

	pub fn label(&self) -> &'static str {
		self.label
	}

	pub fn is_private(&self) -> bool {
		self.private
	}

	pub fn field(&self) -> Field<'a> {
		self.field
	}
}

/// Links every field to `container` under its label.
///
/// # Panics
///
/// Panics if two fields share a label.
pub(crate) fn attach_fields(entries: &[FieldEntry<'_>], container: &Weak<dyn Container>) {
	let mut seen = HashSet::with_capacity(entries.len());
	for entry in entries {
		assert!(
			seen.insert(entry.label),
			"duplicate settings field label `{}`",
			entry.label
		);
		entry
			.field
			.node()
			.core()
			.attach(entry.label, entry.private, Some(container.clone()));
	}
}

/// Links each field in `child` to the field at the same position in `parent`,
/// or unlinks it when `parent` is `None`.
pub(crate) fn inherit_fields(child: &[FieldEntry<'_>], parent: Option<&[FieldEntry<'_>]>) {
	for (index, entry) in child.iter().enumerate() {
		let source = parent
			.and_then(|fields| fields.get(index))
			.map(|source| source.field.node().as_any());
		entry.field.node().set_parent_dyn(source);
	}
}

pub(crate) fn any_set(entries: &[FieldEntry<'_>]) -> bool {
	entries
		.iter()
		.any(|entry| !entry.private && entry.field.node().is_set())
}

/// Clears every persisted value below `field`: keys are cleared, lists emptied.
pub(crate) fn reset_field(field: Field<'_>) {
	match field {
		Field::Key(key) => key.reset(),
		Field::Bunch(bunch) => reset_entries(&bunch.entries()),
		Field::List(list) => list.reset(),
	}
}

pub(crate) fn reset_entries(entries: &[FieldEntry<'_>]) {
	for entry in entries.iter().filter(|entry| !entry.private) {
		reset_field(entry.field);
	}
}

/// Fires the loaded listeners of `field` and its descendants, pre-order.
pub(crate) fn fire_loaded(field: Field<'_>) {
	field.node().core().fire_loaded();
	match field {
		Field::Key(_) => {}
		Field::Bunch(bunch) => {
			for entry in bunch.entries() {
				fire_loaded(entry.field);
			}
		}
		Field::List(list) => list.for_each_item(&mut |_, item| fire_loaded(item)),
	}
}
