//! Fixed groups of settings.

use std::any::Any;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::lock;
use crate::node::{Container, Node, NodeCore, NodeKind};
use crate::schema::{self, AnyBunch, Field, FieldEntry, Schema, SchemaField};

/// A named group of settings described by the schema `S`.
///
/// Dereferences to `S`, so fields are reached directly: `bunch.size.get()`.
pub struct Bunch<S: Schema> {
	inner: Arc<BunchInner<S>>,
}

struct BunchInner<S: Schema> {
	core: NodeCore,
	fields: S,
	parent: Mutex<Option<Weak<BunchInner<S>>>>,
}

impl<S: Schema> Bunch<S> {
	/// Wraps `fields` into a bunch.
	///
	/// # Panics
	///
	/// Panics if two fields of `S` share a label.
	pub fn new(fields: S) -> Self {
		let inner = Arc::new(BunchInner {
			core: NodeCore::new(),
			fields,
			parent: Mutex::new(None),
		});
		let weak = Arc::downgrade(&inner);
		let this: Weak<dyn Container> = weak;
		inner.core.set_this(this.clone());
		schema::attach_fields(&inner.fields.fields(), &this);
		Self { inner }
	}

	pub fn fields(&self) -> &S {
		&self.inner.fields
	}

	/// Makes every field of this bunch inherit from the matching field of
	/// `parent`. Returns false if `parent` is this bunch or inherits from it.
	pub fn set_parent(&self, parent: Option<&Bunch<S>>) -> bool {
		let _tree = lock::tree();
		if let Some(parent) = parent
			&& parent.inherits_from(self)
		{
			return false;
		}
		*self.inner.parent.lock() = parent.map(|parent| Arc::downgrade(&parent.inner));
		let parent_fields = parent.map(|parent| parent.inner.fields.fields());
		schema::inherit_fields(&self.inner.fields.fields(), parent_fields.as_deref());
		true
	}

	pub fn parent(&self) -> Option<Bunch<S>> {
		let _tree = lock::tree();
		let parent = self.inner.parent.lock().as_ref().and_then(Weak::upgrade);
		parent.map(|inner| Self { inner })
	}

	/// Calls `listener` whenever this bunch or one of its fields is updated.
	pub fn on_update<R>(&self, listener: impl Fn(&dyn Node) -> R + Send + Sync + 'static) {
		self.inner.core.on_update(listener);
	}

	pub fn on_loaded<R>(&self, listener: impl Fn() -> R + Send + Sync + 'static) {
		self.inner.core.on_loaded(listener);
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}

	fn inherits_from(&self, ancestor: &Bunch<S>) -> bool {
		let mut current = Some(self.clone());
		while let Some(bunch) = current {
			if bunch.ptr_eq(ancestor) {
				return true;
			}
			current = bunch.parent();
		}
		false
	}
}

impl<S: Schema> Clone for Bunch<S> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<S: Schema> Deref for Bunch<S> {
	type Target = S;

	fn deref(&self) -> &S {
		&self.inner.fields
	}
}

impl<S: Schema> Container for BunchInner<S> {
	fn core(&self) -> &NodeCore {
		&self.core
	}

	fn kind(&self) -> NodeKind {
		NodeKind::Bunch
	}

	fn flush_update(self: Arc<Self>) {
		let bunch = Bunch { inner: self };
		bunch.inner.core.fire_own_update(&bunch);
	}
}

impl<S: Schema> Node for Bunch<S> {
	fn kind(&self) -> NodeKind {
		NodeKind::Bunch
	}

	fn is_set(&self) -> bool {
		let _tree = lock::tree();
		schema::any_set(&self.inner.fields.fields())
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
				.downcast_ref::<Bunch<S>>()
				.is_some_and(|parent| self.set_parent(Some(parent))),
		}
	}
}

impl<S: Schema> SchemaField for Bunch<S> {
	fn as_field(&self) -> Field<'_> {
		Field::Bunch(self)
	}

	fn fresh(&self) -> Self {
		Bunch::new(self.inner.fields.fresh())
	}
}

impl<S: Schema> AnyBunch for Bunch<S> {
	fn entries(&self) -> Vec<FieldEntry<'_>> {
		self.inner.fields.fields()
	}
}

#[cfg(test)]
mod tests;
