//! Saving a tree and loading the text into a fresh tree reproduces it.

use proptest::collection;
use proptest::option;
use proptest::prelude::*;
use sunset_settings::{Key, List, Schema, Settings, Value};

use parking_lot as _;
use pretty_assertions as _;
use rstest as _;
use sunset_macros as _;
use thiserror as _;
use tracing as _;

#[derive(Schema)]
struct Prefs {
	title: Key<String>,
	count: Key<i64>,
	enabled: Key<bool>,
	values: List<Key<i32>>,
}

fn prefs() -> Settings<Prefs> {
	Settings::new(Prefs {
		title: Key::new("untitled".to_string()),
		count: Key::new(0),
		enabled: Key::new(true),
		values: List::new(Key::new(0)),
	})
}

#[derive(Debug, Clone, PartialEq)]
struct LayerValues {
	title: Option<String>,
	count: Option<i64>,
	enabled: Option<bool>,
	values: Vec<Option<i32>>,
}

fn layer_values() -> impl Strategy<Value = LayerValues> {
	(
		option::of(any::<String>()),
		option::of(any::<i64>()),
		option::of(any::<bool>()),
		collection::vec(option::of(any::<i32>()), 0..4),
	)
		.prop_map(|(title, count, enabled, values)| LayerValues {
			title,
			count,
			enabled,
			values,
		})
}

fn local<T: Value>(key: &Key<T>) -> Option<T> {
	key.is_set().then(|| key.get())
}

fn apply(layer: &Settings<Prefs>, values: &LayerValues) {
	if let Some(title) = &values.title {
		layer.title.set(title.clone());
	}
	if let Some(count) = values.count {
		layer.count.set(count);
	}
	if let Some(enabled) = values.enabled {
		layer.enabled.set(enabled);
	}
	for value in &values.values {
		let item = layer.values.append_one();
		if let Some(value) = value {
			item.set(*value);
		}
	}
}

fn snapshot(layer: &Settings<Prefs>) -> LayerValues {
	LayerValues {
		title: local(&layer.title),
		count: local(&layer.count),
		enabled: local(&layer.enabled),
		values: layer.values.items().iter().map(local).collect(),
	}
}

fn snapshot_tree(root: &Settings<Prefs>) -> Vec<(Vec<String>, LayerValues)> {
	fn walk(layer: &Settings<Prefs>, out: &mut Vec<(Vec<String>, LayerValues)>) {
		out.push((layer.section_path(), snapshot(layer)));
		for child in layer.layers() {
			walk(&child, out);
		}
	}
	let mut out = Vec::new();
	walk(root, &mut out);
	out.sort_by(|a, b| a.0.cmp(&b.0));
	out
}

proptest! {
	#[test]
	fn prop_save_load_reproduces_values(
		root_values in layer_values(),
		children in collection::vec(("[a-l][a-z0-9]{0,5}", layer_values(), any::<bool>()), 0..4),
	) {
		let original = prefs();
		apply(&original, &root_values);
		let mut created = vec![original.clone()];
		for (name, values, nested) in &children {
			let parent = match created.last() {
				Some(last) if *nested => last.clone(),
				_ => original.clone(),
			};
			let layer = parent.add_layer(name);
			apply(&layer, values);
			created.push(layer);
		}

		let text = original.to_text();
		let copy = prefs();
		let report = copy.load_str(&text);
		prop_assert!(report.is_clean(), "{:?}", report);
		prop_assert_eq!(snapshot_tree(&copy), snapshot_tree(&original));
		prop_assert_eq!(copy.to_text(), text.clone());

		let again = prefs();
		prop_assert!(again.load_str(&copy.to_text()).is_clean());
		prop_assert_eq!(again.to_text(), text);
	}

	#[test]
	fn prop_reload_is_stable(values in layer_values()) {
		let tree = prefs();
		apply(&tree, &values);
		let text = tree.to_text();

		let mut bytes = Vec::new();
		tree.save(&mut bytes).unwrap();
		prop_assert_eq!(String::from_utf8(bytes).unwrap(), text.clone());

		prop_assert!(tree.load(text.as_bytes()).unwrap().is_clean());
		prop_assert_eq!(snapshot(&tree), values);
		prop_assert_eq!(tree.to_text(), text);
	}
}
