//! Common node model: identity, labels, container links and update propagation.

use std::any::Any;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::lock;

/// The closed set of node shapes in a settings tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
	Key,
	Bunch,
	List,
	Layer,
}

/// A member of a settings tree.
///
/// Update listeners receive the node where an update originated as a
/// `&dyn Node`; use [`Node::as_any`] to downcast it to a concrete handle such as
/// [`Key<T>`](crate::Key).
pub trait Node: Send + Sync {
	fn kind(&self) -> NodeKind;

	/// Name of this node within its container: a field label, or a 1-based
	/// position for list items.
	fn label(&self) -> String {
		self.core().label()
	}

	/// Dot-separated field path from the enclosing layer to this node.
	fn path(&self) -> String {
		self.core().path()
	}

	/// Whether this node or any persisted descendant holds a local value.
	fn is_set(&self) -> bool;

	/// Private nodes are never written to settings files.
	fn skip_on_save(&self) -> bool {
		self.core().is_private()
	}

	fn as_any(&self) -> &dyn Any;

	#[doc(hidden)]
	fn core(&self) -> &NodeCore;

	/// Links this node to `parent`, which must be a handle of the same concrete
	/// type. Returns false if it is not, or if the link would form a cycle.
	#[doc(hidden)]
	fn set_parent_dyn(&self, parent: Option<&dyn Any>) -> bool;
}

/// Nodes that contain other nodes and therefore receive their updates.
pub(crate) trait Container: Send + Sync {
	fn core(&self) -> &NodeCore;

	fn kind(&self) -> NodeKind;

	/// Fires this container's own update listeners with itself as the origin.
	fn flush_update(self: Arc<Self>);
}

pub(crate) type UpdateFn = dyn Fn(&dyn Node) + Send + Sync;
pub(crate) type LoadedFn = dyn Fn() + Send + Sync;

/// Registered callbacks, fired in registration order.
pub(crate) struct Listeners<F: ?Sized> {
	list: Mutex<Vec<Arc<F>>>,
}

impl<F: ?Sized> Listeners<F> {
	pub(crate) fn new() -> Self {
		Self {
			list: Mutex::new(Vec::new()),
		}
	}

	pub(crate) fn add(&self, listener: Arc<F>) {
		self.list.lock().push(listener);
	}

	/// Copies the current listeners so they can be called without holding the lock.
	pub(crate) fn snapshot(&self) -> Vec<Arc<F>> {
		self.list.lock().clone()
	}
}

struct Meta {
	label: String,
	private: bool,
	container: Option<Weak<dyn Container>>,
	this: Option<Weak<dyn Container>>,
}

/// State shared by every node: its label, its container link and its
/// update and loaded listeners.
pub struct NodeCore {
	meta: Mutex<Meta>,
	updated: Listeners<UpdateFn>,
	loaded: Listeners<LoadedFn>,
}

impl NodeCore {
	pub(crate) fn new() -> Self {
		Self {
			meta: Mutex::new(Meta {
				label: String::new(),
				private: false,
				container: None,
				this: None,
			}),
			updated: Listeners::new(),
			loaded: Listeners::new(),
		}
	}

	/// Registers the container that owns this core, for nodes that hold children.
	pub(crate) fn set_this(&self, this: Weak<dyn Container>) {
		self.meta.lock().this = Some(this);
	}

	pub(crate) fn this(&self) -> Option<Weak<dyn Container>> {
		self.meta.lock().this.clone()
	}

	pub(crate) fn label(&self) -> String {
		self.meta.lock().label.clone()
	}

	pub(crate) fn set_label(&self, label: impl Into<String>) {
		self.meta.lock().label = label.into();
	}

	pub(crate) fn is_private(&self) -> bool {
		self.meta.lock().private
	}

	pub(crate) fn attach(&self, label: &str, private: bool, container: Option<Weak<dyn Container>>) {
		let mut meta = self.meta.lock();
		meta.label = label.to_string();
		meta.private = private;
		meta.container = container;
	}

	pub(crate) fn set_container(&self, container: Option<Weak<dyn Container>>) {
		self.meta.lock().container = container;
	}

	pub(crate) fn container(&self) -> Option<Arc<dyn Container>> {
		self.meta.lock().container.as_ref().and_then(Weak::upgrade)
	}

	pub(crate) fn path(&self) -> String {
		let mut labels = vec![self.label()];
		let mut next = self.container();
		while let Some(container) = next {
			if container.kind() == NodeKind::Layer {
				break;
			}
			labels.push(container.core().label());
			next = container.core().container();
		}
		labels.retain(|label| !label.is_empty());
		labels.reverse();
		labels.join(".")
	}

	pub(crate) fn on_update<R>(&self, listener: impl Fn(&dyn Node) -> R + Send + Sync + 'static) {
		let listener: Arc<UpdateFn> = Arc::new(move |origin: &dyn Node| {
			let _ = listener(origin);
		});
		self.updated.add(listener);
	}

	pub(crate) fn on_loaded<R>(&self, listener: impl Fn() -> R + Send + Sync + 'static) {
		let listener: Arc<LoadedFn> = Arc::new(move || {
			let _ = listener();
		});
		self.loaded.add(listener);
	}

	pub(crate) fn fire_loaded(&self) {
		let _tree = lock::tree();
		for listener in self.loaded.snapshot() {
			listener();
		}
	}

	/// Fires only this node's update listeners.
	pub(crate) fn fire_own_update(&self, origin: &dyn Node) {
		let _tree = lock::tree();
		for listener in self.updated.snapshot() {
			listener(origin);
		}
	}

	/// Reports an update that originated at `origin` (usually the node owning
	/// this core) to this node and then to every container above it.
	///
	/// Propagation stops after the first private node. While a batch is open
	/// nothing fires; the layers on the way up are recorded instead.
	pub(crate) fn notify_update(&self, origin: &dyn Node) {
		let tree = lock::tree();
		if tree.borrow().is_open() {
			let mut layers = Vec::new();
			let mut cursor = self.this().and_then(|this| this.upgrade());
			let mut private = self.is_private();
			let mut next = self.container();
			loop {
				if let Some(container) = cursor.take()
					&& container.kind() == NodeKind::Layer
				{
					layers.push(container);
				}
				if private {
					break;
				}
				let Some(container) = next.take() else {
					break;
				};
				private = container.core().is_private();
				next = container.core().container();
				cursor = Some(container);
			}
			let mut batch = tree.borrow_mut();
			for layer in layers {
				batch.touch_layer(layer);
			}
			return;
		}

		self.fire_own_update(origin);
		if self.is_private() {
			return;
		}
		let mut next = self.container();
		while let Some(container) = next {
			container.core().fire_own_update(origin);
			if container.core().is_private() {
				break;
			}
			next = container.core().container();
		}
	}
}
