//! Process-wide tree lock and the notification batch used while loading.
//!
//! Every read and mutation of any settings node happens under [`tree`]. The lock
//! is reentrant, so listeners fired by a mutation may read and mutate the tree
//! from the same thread while other threads wait.

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::node::Container;

static TREE: ReentrantMutex<RefCell<Batch>> =
	parking_lot::const_reentrant_mutex(RefCell::new(Batch::new()));

pub(crate) type TreeGuard = ReentrantMutexGuard<'static, RefCell<Batch>>;

/// Deferred value-change notification for one key.
pub(crate) type DeferredChange = Box<dyn FnOnce() + Send>;

/// Acquires the tree lock.
pub(crate) fn tree() -> TreeGuard {
	TREE.lock()
}

/// Notifications suppressed while a batch is open.
pub(crate) struct Batch {
	depth: usize,
	layers: Vec<Arc<dyn Container>>,
	changes: Vec<(usize, DeferredChange)>,
}

impl Batch {
	const fn new() -> Self {
		Self {
			depth: 0,
			layers: Vec::new(),
			changes: Vec::new(),
		}
	}

	pub(crate) fn is_open(&self) -> bool {
		self.depth > 0
	}

	/// Records that `layer` received an update while the batch was open.
	pub(crate) fn touch_layer(&mut self, layer: Arc<dyn Container>) {
		let seen = self
			.layers
			.iter()
			.any(|known| std::ptr::addr_eq(Arc::as_ptr(known), Arc::as_ptr(&layer)));
		if !seen {
			self.layers.push(layer);
		}
	}

	/// Records a value-change check for the key identified by `id`.
	///
	/// Only the first record per key is kept: it carries the value the key had
	/// before the batch opened.
	pub(crate) fn defer_change(&mut self, id: usize, change: DeferredChange) {
		if !self.changes.iter().any(|(known, _)| *known == id) {
			self.changes.push((id, change));
		}
	}
}

/// Work collected by a batch, handed back when the outermost scope closes.
#[derive(Default)]
pub(crate) struct Deferred {
	pub(crate) layers: Vec<Arc<dyn Container>>,
	pub(crate) changes: Vec<DeferredChange>,
}

/// An open notification batch. Closing it without [`BatchScope::finish`]
/// (e.g. on unwind) discards the deferred work.
pub(crate) struct BatchScope {
	guard: TreeGuard,
	finished: bool,
}

pub(crate) fn begin_batch() -> BatchScope {
	let guard = tree();
	guard.borrow_mut().depth += 1;
	BatchScope {
		guard,
		finished: false,
	}
}

impl BatchScope {
	/// Closes the batch. Returns the deferred work if this was the outermost scope.
	pub(crate) fn finish(mut self) -> Deferred {
		self.finished = true;
		self.close()
	}

	fn close(&self) -> Deferred {
		let mut batch = self.guard.borrow_mut();
		batch.depth = batch.depth.saturating_sub(1);
		if batch.depth > 0 {
			return Deferred::default();
		}
		Deferred {
			layers: std::mem::take(&mut batch.layers),
			changes: std::mem::take(&mut batch.changes)
				.into_iter()
				.map(|(_, change)| change)
				.collect(),
		}
	}
}

impl Drop for BatchScope {
	fn drop(&mut self) {
		if !self.finished {
			drop(self.close());
		}
	}
}
