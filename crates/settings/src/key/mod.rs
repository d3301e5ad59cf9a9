//! Typed leaf settings.
//!
//! A [`Key`] resolves its value lazily: its local value if one is set, else its
//! parent's value, else its fallback, else its default. Parent links are weak,
//! so a key never keeps the layer it inherits from alive.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::lock;
use crate::node::{Listeners, Node, NodeCore, NodeKind};
use crate::schema::{AnyKey, Field, SchemaField};
use crate::serializer::{NativeSerializer, Serializable, Serializer, Value};

type Validator<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
type ValueChangeFn<T> = dyn Fn(&T) + Send + Sync;

/// A single typed setting.
///
/// `Key` is a cheap handle: clones refer to the same setting.
pub struct Key<T: Value> {
	inner: Arc<KeyInner<T>>,
}

struct KeyInner<T: Value> {
	core: NodeCore,
	default: T,
	serializer: Arc<dyn Serializer<T>>,
	validator: Mutex<Option<Validator<T>>>,
	state: Mutex<KeyState<T>>,
	value_changed: Listeners<ValueChangeFn<T>>,
}

struct KeyState<T: Value> {
	value: Option<T>,
	fallback: Option<T>,
	parent: Option<Weak<KeyInner<T>>>,
	children: Vec<Weak<KeyInner<T>>>,
}

impl<T: Value + Serializable> Key<T> {
	/// Creates a key whose value type provides its own text form.
	pub fn new(default: T) -> Self {
		Self::with_serializer(default, NativeSerializer::new())
	}
}

impl<T: Value> Key<T> {
	/// Creates a key that converts its values to text with `serializer`.
	pub fn with_serializer(default: T, serializer: impl Serializer<T> + 'static) -> Self {
		Self::build(default, Arc::new(serializer), None)
	}

	fn build(default: T, serializer: Arc<dyn Serializer<T>>, validator: Option<Validator<T>>) -> Self {
		Self {
			inner: Arc::new(KeyInner {
				core: NodeCore::new(),
				default,
				serializer,
				validator: Mutex::new(validator),
				state: Mutex::new(KeyState {
					value: None,
					fallback: None,
					parent: None,
					children: Vec::new(),
				}),
				value_changed: Listeners::new(),
			}),
		}
	}

	fn from_inner(inner: Arc<KeyInner<T>>) -> Self {
		Self { inner }
	}

	/// Returns the effective value of this key.
	pub fn get(&self) -> T {
		let _tree = lock::tree();
		let local = self.inner.state.lock().value.clone();
		local.unwrap_or_else(|| self.fallback())
	}

	/// The value this key resolves to while it has no local value: its parent's
	/// value if it has a parent, else the fallback, else the default.
	pub fn fallback(&self) -> T {
		let _tree = lock::tree();
		let (parent, fallback) = {
			let state = self.inner.state.lock();
			(state.parent.as_ref().and_then(Weak::upgrade), state.fallback.clone())
		};
		match parent {
			Some(parent) => Self::from_inner(parent).get(),
			None => fallback.unwrap_or_else(|| self.inner.default.clone()),
		}
	}

	pub fn default(&self) -> &T {
		&self.inner.default
	}

	/// Stores `value` locally.
	///
	/// Returns false and leaves the key untouched if the validator rejects the
	/// value. Listeners fire only if the effective value changes.
	pub fn set(&self, value: T) -> bool {
		let _tree = lock::tree();
		let validator = self.inner.validator.lock().clone();
		if let Some(validator) = validator
			&& !validator(&value)
		{
			tracing::debug!(domain = "settings", path = %self.inner.core.path(), "validator rejected value");
			return false;
		}

		let before = self.get();
		self.inner.state.lock().value = Some(value);
		self.finish_change(before);
		true
	}

	/// Whether this key holds a local value.
	pub fn is_set(&self) -> bool {
		let _tree = lock::tree();
		self.inner.state.lock().value.is_some()
	}

	/// Removes the local value, so the key inherits again.
	pub fn clear(&self) {
		let _tree = lock::tree();
		let before = self.get();
		let previous = self.inner.state.lock().value.take();
		if previous.is_some() {
			self.finish_change(before);
		}
	}

	/// Sets the key to `update(current value)` without letting any other
	/// thread observe or modify the key in between.
	pub fn update_value(&self, update: impl FnOnce(T) -> T) -> bool {
		let _tree = lock::tree();
		let next = update(self.get());
		self.set(next)
	}

	/// Sets the value used when this key has neither a local value nor a parent.
	pub fn set_fallback(&self, value: T) {
		let _tree = lock::tree();
		let before = self.get();
		self.inner.state.lock().fallback = Some(value);
		self.finish_change(before);
	}

	/// Installs `validator`. A value that is already set is not re-checked.
	pub fn set_validator(&self, validator: impl Fn(&T) -> bool + Send + Sync + 'static) {
		*self.inner.validator.lock() = Some(Arc::new(validator));
	}

	/// Makes this key inherit from `parent`, or from nothing.
	///
	/// Returns false, leaving the link unchanged, if `parent` is this key or
	/// inherits from it.
	pub fn set_parent(&self, parent: Option<&Key<T>>) -> bool {
		let _tree = lock::tree();
		if let Some(parent) = parent
			&& parent.inherits_from(self)
		{
			return false;
		}

		let current = self.parent();
		match (&current, parent) {
			(None, None) => return true,
			(Some(current), Some(parent)) if current.ptr_eq(parent) => return true,
			_ => {}
		}

		let before = self.get();
		if let Some(old) = current {
			let this = Arc::as_ptr(&self.inner);
			old.inner
				.state
				.lock()
				.children
				.retain(|child| child.strong_count() > 0 && !std::ptr::eq(child.as_ptr(), this));
		}
		let link = parent.map(|parent| {
			parent.inner.state.lock().children.push(Arc::downgrade(&self.inner));
			Arc::downgrade(&parent.inner)
		});
		self.inner.state.lock().parent = link;
		self.finish_change(before);
		true
	}

	pub fn parent(&self) -> Option<Key<T>> {
		let _tree = lock::tree();
		let parent = self.inner.state.lock().parent.as_ref().and_then(Weak::upgrade);
		parent.map(Self::from_inner)
	}

	/// Keys that currently inherit from this one.
	pub fn children(&self) -> Vec<Key<T>> {
		let _tree = lock::tree();
		let state = self.inner.state.lock();
		state
			.children
			.iter()
			.filter_map(Weak::upgrade)
			.map(Self::from_inner)
			.collect()
	}

	/// Calls `listener` with the new value whenever the effective value changes.
	pub fn on_value_change<R>(&self, listener: impl Fn(&T) -> R + Send + Sync + 'static) {
		let listener: Arc<ValueChangeFn<T>> = Arc::new(move |value: &T| {
			let _ = listener(value);
		});
		self.inner.value_changed.add(listener);
	}

	/// Calls `listener` with this key whenever it is updated.
	pub fn on_update<R>(&self, listener: impl Fn(&dyn Node) -> R + Send + Sync + 'static) {
		self.inner.core.on_update(listener);
	}

	/// Calls `listener` after a settings file has been loaded into this key's tree.
	pub fn on_loaded<R>(&self, listener: impl Fn() -> R + Send + Sync + 'static) {
		self.inner.core.on_loaded(listener);
	}

	/// Whether both handles refer to the same key.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}

	fn inherits_from(&self, ancestor: &Key<T>) -> bool {
		let mut current = Some(self.clone());
		while let Some(key) = current {
			if key.ptr_eq(ancestor) {
				return true;
			}
			current = key.parent();
		}
		false
	}

	fn finish_change(&self, before: T) {
		if self.get() == before {
			return;
		}
		self.announce_value_change(&before);
		self.inner.core.notify_update(self);
	}

	/// Fires value-change listeners on this key and on every descendant that
	/// still inherits, or defers them while a batch is open.
	fn announce_value_change(&self, before: &T) {
		let tree = lock::tree();
		if tree.borrow().is_open() {
			let id = Arc::as_ptr(&self.inner) as *const () as usize;
			let weak = Arc::downgrade(&self.inner);
			let before = before.clone();
			tree.borrow_mut().defer_change(
				id,
				Box::new(move || {
					if let Some(inner) = weak.upgrade() {
						let key = Key::from_inner(inner);
						let now = key.get();
						if now != before {
							key.fire_value_changed(&now);
						}
					}
				}),
			);
		} else {
			self.fire_value_changed(&self.get());
		}

		for child in self.children() {
			if !child.is_set() {
				child.announce_value_change(before);
			}
		}
	}

	fn fire_value_changed(&self, value: &T) {
		for listener in self.inner.value_changed.snapshot() {
			listener(value);
		}
	}
}

impl<T: Value> Clone for Key<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T: Value + fmt::Debug> fmt::Debug for Key<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Key")
			.field("path", &self.inner.core.path())
			.field("value", &self.get())
			.field("is_set", &self.is_set())
			.finish()
	}
}

impl<T: Value> Node for Key<T> {
	fn kind(&self) -> NodeKind {
		NodeKind::Key
	}

	fn is_set(&self) -> bool {
		Key::is_set(self)
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
				.downcast_ref::<Key<T>>()
				.is_some_and(|parent| self.set_parent(Some(parent))),
		}
	}
}

impl<T: Value> SchemaField for Key<T> {
	fn as_field(&self) -> Field<'_> {
		Field::Key(self)
	}

	fn fresh(&self) -> Self {
		let validator = self.inner.validator.lock().clone();
		Self::build(
			self.inner.default.clone(),
			Arc::clone(&self.inner.serializer),
			validator,
		)
	}
}

impl<T: Value> AnyKey for Key<T> {
	fn dump_value(&self) -> Option<String> {
		let _tree = lock::tree();
		let local = self.inner.state.lock().value.clone();
		local.map(|value| self.inner.serializer.to_str(&value))
	}

	fn restore_value(&self, text: Option<&str>) -> bool {
		let Some(text) = text else {
			self.clear();
			return true;
		};
		match self.inner.serializer.from_str(text) {
			Some(value) => self.set(value),
			None => false,
		}
	}

	fn reset(&self) {
		self.clear();
	}
}
