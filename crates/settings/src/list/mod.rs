//! Variable-length, homogeneous collections of settings.
//!
//! Items are built from a template that is never stored in the list itself.
//! A list may have a parent list; iterating with `with_parent` then also
//! yields the parent's items, recursively, before or after the list's own.

use std::any::Any;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::lock;
use crate::node::{Container, Node, NodeCore, NodeKind};
use crate::schema::{AnyList, Field, SchemaField};

/// Where inherited items go when a list is iterated together with its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListOrder {
	/// This list's own items, then the parent's.
	#[default]
	OwnFirst,
	/// The parent's items, then this list's own.
	ParentFirst,
}

/// An ordered list of settings items of type `E`, a [`Key`](crate::Key),
/// [`Bunch`](crate::Bunch) or nested `List`.
pub struct List<E: SchemaField> {
	inner: Arc<ListInner<E>>,
}

struct ListInner<E: SchemaField> {
	core: NodeCore,
	template: E,
	state: Mutex<ListState<E>>,
}

struct ListState<E: SchemaField> {
	items: Vec<E>,
	order: ListOrder,
	parent: Option<Weak<ListInner<E>>>,
}

impl<E: SchemaField> List<E> {
	pub fn new(template: E) -> Self {
		Self::with_order(template, ListOrder::default())
	}

	/// Creates a list whose [`iter`](Self::iter) uses `order` by default.
	pub fn with_order(template: E, order: ListOrder) -> Self {
		let inner = Arc::new(ListInner {
			core: NodeCore::new(),
			template,
			state: Mutex::new(ListState {
				items: Vec::new(),
				order,
				parent: None,
			}),
		});
		let weak = Arc::downgrade(&inner);
		let this: Weak<dyn Container> = weak;
		inner.core.set_this(this);
		Self { inner }
	}

	/// Appends a fresh item built from the template and returns it.
	pub fn append_one(&self) -> E {
		let _tree = lock::tree();
		self.insert_one(self.len())
	}

	/// Inserts a fresh item at `index` (clamped to the length) and returns it.
	pub fn insert_one(&self, index: usize) -> E {
		let item = self.inner.template.fresh();
		self.insert(index, item.clone());
		item
	}

	pub fn push(&self, item: E) {
		let _tree = lock::tree();
		self.insert(self.len(), item);
	}

	/// Inserts `item` at `index`, clamped to the current length.
	pub fn insert(&self, index: usize, item: E) {
		let _tree = lock::tree();
		{
			let mut state = self.inner.state.lock();
			let index = index.min(state.items.len());
			state.items.insert(index, item.clone());
		}
		item.core().attach("", false, self.inner.core.this());
		self.structure_changed();
	}

	pub fn remove(&self, index: usize) -> Option<E> {
		let _tree = lock::tree();
		let removed = {
			let mut state = self.inner.state.lock();
			(index < state.items.len()).then(|| state.items.remove(index))
		}?;
		removed.core().set_container(None);
		self.structure_changed();
		Some(removed)
	}

	pub fn pop(&self) -> Option<E> {
		let _tree = lock::tree();
		let last = self.len().checked_sub(1)?;
		self.remove(last)
	}

	/// Swaps two items. Returns false if either index is out of range.
	pub fn swap(&self, a: usize, b: usize) -> bool {
		let _tree = lock::tree();
		{
			let mut state = self.inner.state.lock();
			if a >= state.items.len() || b >= state.items.len() {
				return false;
			}
			state.items.swap(a, b);
		}
		if a != b {
			self.structure_changed();
		}
		true
	}

	/// Removes every item.
	pub fn clear(&self) {
		let _tree = lock::tree();
		let removed = std::mem::take(&mut self.inner.state.lock().items);
		if removed.is_empty() {
			return;
		}
		for item in &removed {
			item.core().set_container(None);
		}
		self.structure_changed();
	}

	/// Removes every item from position `len` on.
	pub fn truncate(&self, len: usize) {
		let _tree = lock::tree();
		let removed = {
			let mut state = self.inner.state.lock();
			if len >= state.items.len() {
				return;
			}
			state.items.split_off(len)
		};
		for item in &removed {
			item.core().set_container(None);
		}
		self.structure_changed();
	}

	pub fn get(&self, index: usize) -> Option<E> {
		let _tree = lock::tree();
		self.inner.state.lock().items.get(index).cloned()
	}

	pub fn len(&self) -> usize {
		let _tree = lock::tree();
		self.inner.state.lock().items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// A snapshot of this list's own items.
	pub fn items(&self) -> Vec<E> {
		let _tree = lock::tree();
		self.inner.state.lock().items.clone()
	}

	pub fn order(&self) -> ListOrder {
		self.inner.state.lock().order
	}

	pub fn set_order(&self, order: ListOrder) {
		self.inner.state.lock().order = order;
	}

	/// Iterates over a snapshot of the items, in this list's default order.
	pub fn iter(&self, with_parent: bool) -> Iter<E> {
		self.iter_ordered(with_parent, self.order())
	}

	/// Iterates over a snapshot of the items. With `with_parent`, the parent
	/// list's items (and theirs, recursively) are included per `order`.
	pub fn iter_ordered(&self, with_parent: bool, order: ListOrder) -> Iter<E> {
		let _tree = lock::tree();
		Iter {
			items: self.collect(with_parent, order).into_iter(),
		}
	}

	/// Makes `parent` the list whose items are inherited on iteration.
	/// Returns false if `parent` is this list or inherits from it.
	pub fn set_parent(&self, parent: Option<&List<E>>) -> bool {
		let _tree = lock::tree();
		if let Some(parent) = parent
			&& parent.inherits_from(self)
		{
			return false;
		}
		let unchanged = match (self.parent(), parent) {
			(None, None) => true,
			(Some(current), Some(parent)) => current.ptr_eq(parent),
			_ => false,
		};
		if unchanged {
			return true;
		}
		self.inner.state.lock().parent = parent.map(|parent| Arc::downgrade(&parent.inner));
		self.inner.core.notify_update(self);
		true
	}

	pub fn parent(&self) -> Option<List<E>> {
		let _tree = lock::tree();
		let parent = self.inner.state.lock().parent.as_ref().and_then(Weak::upgrade);
		parent.map(|inner| Self { inner })
	}

	/// Calls `listener` when items are added, removed or reordered, and when an
	/// item is updated.
	pub fn on_update<R>(&self, listener: impl Fn(&dyn Node) -> R + Send + Sync + 'static) {
		self.inner.core.on_update(listener);
	}

	pub fn on_loaded<R>(&self, listener: impl Fn() -> R + Send + Sync + 'static) {
		self.inner.core.on_loaded(listener);
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}

	fn collect(&self, with_parent: bool, order: ListOrder) -> Vec<E> {
		let (own, parent) = {
			let state = self.inner.state.lock();
			(
				state.items.clone(),
				state.parent.as_ref().and_then(Weak::upgrade),
			)
		};
		let Some(parent) = parent.filter(|_| with_parent) else {
			return own;
		};
		let inherited = List { inner: parent }.collect(true, order);
		match order {
			ListOrder::OwnFirst => own.into_iter().chain(inherited).collect(),
			ListOrder::ParentFirst => inherited.into_iter().chain(own).collect(),
		}
	}

	fn inherits_from(&self, ancestor: &List<E>) -> bool {
		let mut current = Some(self.clone());
		while let Some(list) = current {
			if list.ptr_eq(ancestor) {
				return true;
			}
			current = list.parent();
		}
		false
	}

	/// Relabels items by position and reports one structural update.
	fn structure_changed(&self) {
		for (index, item) in self.items().iter().enumerate() {
			item.core().set_label((index + 1).to_string());
		}
		self.inner.core.notify_update(self);
	}
}

impl<E: SchemaField> Clone for List<E> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<E: SchemaField> Container for ListInner<E> {
	fn core(&self) -> &NodeCore {
		&self.core
	}

	fn kind(&self) -> NodeKind {
		NodeKind::List
	}

	fn flush_update(self: Arc<Self>) {
		let list = List { inner: self };
		list.inner.core.fire_own_update(&list);
	}
}

impl<E: SchemaField> Node for List<E> {
	fn kind(&self) -> NodeKind {
		NodeKind::List
	}

	fn is_set(&self) -> bool {
		!self.is_empty()
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
				.downcast_ref::<List<E>>()
				.is_some_and(|parent| self.set_parent(Some(parent))),
		}
	}
}

impl<E: SchemaField> SchemaField for List<E> {
	fn as_field(&self) -> Field<'_> {
		Field::List(self)
	}

	fn fresh(&self) -> Self {
		List::with_order(self.inner.template.fresh(), self.order())
	}
}

impl<E: SchemaField> AnyList for List<E> {
	fn item_count(&self) -> usize {
		self.len()
	}

	fn for_each_item(&self, visit: &mut dyn FnMut(usize, Field<'_>)) {
		for (index, item) in self.items().iter().enumerate() {
			visit(index, item.as_field());
		}
	}

	fn with_item(&self, index: usize, visit: &mut dyn FnMut(Field<'_>)) {
		if let Some(item) = self.get(index) {
			visit(item.as_field());
		}
	}

	fn grow_to(&self, len: usize) {
		let _tree = lock::tree();
		let missing = len.saturating_sub(self.len());
		if missing == 0 {
			return;
		}
		let this = self.inner.core.this();
		for _ in 0..missing {
			let item = self.inner.template.fresh();
			item.core().attach("", false, this.clone());
			self.inner.state.lock().items.push(item);
		}
		self.structure_changed();
	}

	fn truncate(&self, len: usize) {
		List::truncate(self, len);
	}

	fn reset(&self) {
		self.clear();
	}
}

/// Iterator over a snapshot of list items. Cloning restarts from the clone point.
#[derive(Clone)]
pub struct Iter<E> {
	items: std::vec::IntoIter<E>,
}

impl<E> Iterator for Iter<E> {
	type Item = E;

	fn next(&mut self) -> Option<E> {
		self.items.next()
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		self.items.size_hint()
	}
}

impl<E> DoubleEndedIterator for Iter<E> {
	fn next_back(&mut self) -> Option<E> {
		self.items.next_back()
	}
}

impl<E> ExactSizeIterator for Iter<E> {}
