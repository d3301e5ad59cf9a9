//! Settings layers.
//!
//! A [`Settings`] is one instance of a schema placed in a tree of layers. Every
//! field of a child layer inherits from the matching field of its parent layer.
//! Named layers map to sections of the settings file; anonymous layers are
//! never written.

use std::any::Any;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::lock;
use crate::node::{Container, Node, NodeCore, NodeKind};
use crate::schema::{self, FieldEntry, Schema};

/// Reduces `name` to the lowercase alphanumeric form used for layer names.
pub fn normalize(name: &str) -> String {
	name.chars()
		.flat_map(char::to_lowercase)
		.filter(|c| c.is_alphanumeric())
		.collect()
}

/// Returns `wanted`, or the first of `wanted2`, `wanted3`, ... not in `taken`.
fn unique_name(wanted: &str, taken: &[String]) -> String {
	if wanted.is_empty() || !taken.iter().any(|name| name == wanted) {
		return wanted.to_string();
	}
	let mut suffix = 2_usize;
	loop {
		let candidate = format!("{wanted}{suffix}");
		if !taken.contains(&candidate) {
			return candidate;
		}
		suffix += 1;
	}
}

/// A layer of settings described by the schema `S`.
///
/// Dereferences to `S`. `Settings` is a cheap handle: clones refer to the same
/// layer. A layer keeps its child layers alive, not its parent.
pub struct Settings<S: Schema> {
	pub(crate) inner: Arc<LayerInner<S>>,
}

pub(crate) struct LayerInner<S: Schema> {
	core: NodeCore,
	pub(crate) fields: S,
	tree: Mutex<LayerTree<S>>,
}

struct LayerTree<S: Schema> {
	name: String,
	parent: Option<Weak<LayerInner<S>>>,
	children: Vec<Settings<S>>,
}

impl<S: Schema> Settings<S> {
	/// Name of a root layer, and of the first section of a settings file.
	pub const MAIN: &'static str = "main";

	/// Creates a root layer named [`MAIN`](Self::MAIN).
	///
	/// # Panics
	///
	/// Panics if two fields of `S` share a label.
	pub fn new(fields: S) -> Self {
		Self::build(fields, Self::MAIN.to_string())
	}

	fn build(fields: S, name: String) -> Self {
		let inner = Arc::new(LayerInner {
			core: NodeCore::new(),
			fields,
			tree: Mutex::new(LayerTree {
				name,
				parent: None,
				children: Vec::new(),
			}),
		});
		let weak = Arc::downgrade(&inner);
		let this: Weak<dyn Container> = weak;
		inner.core.set_this(this.clone());
		schema::attach_fields(&inner.fields.fields(), &this);
		Self { inner }
	}

	/// Creates a child layer inheriting from this one.
	///
	/// `name` is normalized and made unique among the other children; an empty
	/// name creates an anonymous layer, which is never saved.
	pub fn add_layer(&self, name: &str) -> Settings<S> {
		let _tree = lock::tree();
		let name = self.unique_child_name(&normalize(name), None);
		let layer = Self::build(self.inner.fields.fresh(), name);
		layer.inherit_from(Some(self));
		layer.attach_to(self);
		tracing::trace!(domain = "settings", layer = %layer.name(), parent = %self.name(), "added layer");
		self.inner.core.notify_update(self);
		layer
	}

	/// Returns the child layer called `name` (after normalization).
	pub fn get_layer(&self, name: &str) -> Option<Settings<S>> {
		let name = normalize(name);
		if name.is_empty() {
			return None;
		}
		self.layers().into_iter().find(|layer| layer.name() == name)
	}

	/// Returns the child layer called `name`, creating it if needed.
	///
	/// A name that normalizes to nothing always creates a new anonymous layer.
	pub fn get_or_add_layer(&self, name: &str) -> Settings<S> {
		let _tree = lock::tree();
		match self.get_layer(name) {
			Some(layer) => layer,
			None => self.add_layer(name),
		}
	}

	/// Detaches and returns the child layer called `name`.
	pub fn remove_layer(&self, name: &str) -> Option<Settings<S>> {
		let _tree = lock::tree();
		let layer = self.get_layer(name)?;
		layer.set_parent(None);
		Some(layer)
	}

	/// Child layers, in the order they were added.
	pub fn layers(&self) -> Vec<Settings<S>> {
		let _tree = lock::tree();
		self.inner.tree.lock().children.clone()
	}

	pub fn parent(&self) -> Option<Settings<S>> {
		let _tree = lock::tree();
		let parent = self.inner.tree.lock().parent.as_ref().and_then(Weak::upgrade);
		parent.map(|inner| Self { inner })
	}

	pub fn is_root(&self) -> bool {
		self.parent().is_none()
	}

	pub fn name(&self) -> String {
		let _tree = lock::tree();
		self.inner.tree.lock().name.clone()
	}

	/// Renames this layer, normalizing `name` and making it unique among its
	/// siblings. An empty name makes the layer anonymous.
	///
	/// Returns false if this is a root layer and `name` normalizes to nothing.
	pub fn set_name(&self, name: &str) -> bool {
		let _tree = lock::tree();
		let wanted = normalize(name);
		let name = match self.parent() {
			Some(parent) => parent.unique_child_name(&wanted, Some(self)),
			None if wanted.is_empty() => return false,
			None => wanted,
		};
		self.rename(name);
		true
	}

	/// Names of the layers from the root (excluded) down to this one.
	pub fn section_path(&self) -> Vec<String> {
		let _tree = lock::tree();
		let mut path = Vec::new();
		let mut current = self.clone();
		while let Some(parent) = current.parent() {
			path.push(current.name());
			current = parent;
		}
		path.reverse();
		path
	}

	/// Moves this layer under `parent`, or makes it a root.
	///
	/// The old parent and the new parent each report an update. The name is made
	/// unique among the new siblings. Returns false, changing nothing, if
	/// `parent` is this layer or one of its descendants.
	pub fn set_parent(&self, parent: Option<&Settings<S>>) -> bool {
		let _tree = lock::tree();
		if let Some(parent) = parent
			&& parent.has_ancestor_or_self(self)
		{
			return false;
		}
		let current = self.parent();
		match (&current, parent) {
			(None, None) => return true,
			(Some(current), Some(parent)) if current.ptr_eq(parent) => return true,
			_ => {}
		}

		if let Some(old) = current {
			old.inner.tree.lock().children.retain(|child| !child.ptr_eq(self));
			self.inner.tree.lock().parent = None;
			self.inner.core.set_container(None);
			old.inner.core.notify_update(&old);
		}

		match parent {
			Some(parent) => {
				self.rename(parent.unique_child_name(&self.name(), Some(self)));
				self.inherit_from(Some(parent));
				self.attach_to(parent);
				tracing::trace!(domain = "settings", layer = %self.name(), parent = %parent.name(), "moved layer");
				parent.inner.core.notify_update(parent);
			}
			None => {
				if self.name().is_empty() {
					self.rename(Self::MAIN.to_string());
				}
				self.inherit_from(None);
			}
		}
		true
	}

	/// Calls `listener` whenever this layer, one of its fields or one of its
	/// descendant layers is updated.
	pub fn on_update<R>(&self, listener: impl Fn(&dyn Node) -> R + Send + Sync + 'static) {
		self.inner.core.on_update(listener);
	}

	/// Calls `listener` after a settings file has been loaded into this layer.
	pub fn on_loaded<R>(&self, listener: impl Fn() -> R + Send + Sync + 'static) {
		self.inner.core.on_loaded(listener);
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}

	pub(crate) fn entries(&self) -> Vec<FieldEntry<'_>> {
		self.inner.fields.fields()
	}

	fn rename(&self, name: String) {
		let previous = std::mem::replace(&mut self.inner.tree.lock().name, name.clone());
		if previous != name {
			tracing::trace!(domain = "settings", from = %previous, to = %name, "renamed layer");
			self.inner.core.notify_update(self);
		}
	}

	fn unique_child_name(&self, wanted: &str, exclude: Option<&Settings<S>>) -> String {
		let taken: Vec<String> = self
			.layers()
			.iter()
			.filter(|layer| exclude.is_none_or(|excluded| !excluded.ptr_eq(layer)))
			.map(Settings::name)
			.collect();
		unique_name(wanted, &taken)
	}

	fn inherit_from(&self, parent: Option<&Settings<S>>) {
		let parent_entries = parent.map(Settings::entries);
		schema::inherit_fields(&self.entries(), parent_entries.as_deref());
	}

	fn attach_to(&self, parent: &Settings<S>) {
		parent.inner.tree.lock().children.push(self.clone());
		self.inner.tree.lock().parent = Some(Arc::downgrade(&parent.inner));
		self.inner.core.set_container(parent.inner.core.this());
	}

	fn has_ancestor_or_self(&self, ancestor: &Settings<S>) -> bool {
		let mut current = Some(self.clone());
		while let Some(layer) = current {
			if layer.ptr_eq(ancestor) {
				return true;
			}
			current = layer.parent();
		}
		false
	}
}

impl<S: Schema> Clone for Settings<S> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<S: Schema> Deref for Settings<S> {
	type Target = S;

	fn deref(&self) -> &S {
		&self.inner.fields
	}
}

impl<S: Schema> Container for LayerInner<S> {
	fn core(&self) -> &NodeCore {
		&self.core
	}

	fn kind(&self) -> NodeKind {
		NodeKind::Layer
	}

	fn flush_update(self: Arc<Self>) {
		let layer = Settings { inner: self };
		layer.inner.core.fire_own_update(&layer);
	}
}

impl<S: Schema> Node for Settings<S> {
	fn kind(&self) -> NodeKind {
		NodeKind::Layer
	}

	fn label(&self) -> String {
		self.name()
	}

	/// The section path of this layer, joined with `/`.
	fn path(&self) -> String {
		self.section_path().join("/")
	}

	fn is_set(&self) -> bool {
		let _tree = lock::tree();
		schema::any_set(&self.entries())
	}

	fn as_any(&self) -> &dyn Any {
		self
	}

	fn core(&self) -> &NodeCore {
		&self.inner.core
	}

	fn set_parent_dyn(&self, parent: Option<&dyn Any>) -> bool {
		match parent {
			None => self.set_parent(None),
			Some(parent) => parent
				.downcast_ref::<Settings<S>>()
				.is_some_and(|parent| self.set_parent(Some(parent))),
		}
	}
}
