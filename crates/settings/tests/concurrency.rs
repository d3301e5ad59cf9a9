//! Settings shared between threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use sunset_settings::{Key, Node, Schema, Settings};

use parking_lot as _;
use pretty_assertions as _;
use proptest as _;
use rstest as _;
use sunset_macros as _;
use thiserror as _;
use tracing as _;

#[derive(Schema)]
struct Counters {
	hits: Key<i64>,
	mirror: Key<i64>,
}

fn counters() -> Settings<Counters> {
	Settings::new(Counters {
		hits: Key::new(5),
		mirror: Key::new(0),
	})
}

#[test]
fn test_update_value_never_loses_increments() {
	const THREADS: usize = 8;
	const ROUNDS: usize = 250;

	let root = counters();
	thread::scope(|scope| {
		for _ in 0..THREADS {
			scope.spawn(|| {
				for _ in 0..ROUNDS {
					root.hits.update_value(|hits| hits + 1);
				}
			});
		}
	});

	assert_eq!(root.hits.get(), 5 + (THREADS * ROUNDS) as i64);
}

#[test]
fn test_listener_may_mutate_the_tree() {
	let root = counters();
	let mirror = root.mirror.clone();
	root.hits.on_value_change(move |hits: &i64| mirror.set(hits * 2));

	let child = root.add_layer("child");
	thread::scope(|scope| {
		scope.spawn(|| root.hits.set(21));
	});

	assert_eq!(root.mirror.get(), 42);
	assert_eq!(child.mirror.get(), 42);
}

#[test]
fn test_layers_cross_threads() {
	let root = counters();
	let updates = Arc::new(AtomicUsize::new(0));
	let sink = Arc::clone(&updates);
	root.on_update(move |_: &dyn Node| {
		sink.fetch_add(1, Ordering::SeqCst);
	});

	let handles: Vec<_> = (0..4)
		.map(|index| {
			let root = root.clone();
			thread::spawn(move || {
				let layer = root.add_layer(&format!("worker{index}"));
				layer.hits.set(index);
				layer
			})
		})
		.collect();
	let layers: Vec<_> = handles
		.into_iter()
		.map(|handle| handle.join().unwrap())
		.collect();

	assert_eq!(root.layers().len(), 4);
	// One update for each layer added, one for each value set.
	assert_eq!(updates.load(Ordering::SeqCst), 8);
	for (index, layer) in layers.iter().enumerate() {
		assert_eq!(layer.hits.get(), index as i64);
	}
}
