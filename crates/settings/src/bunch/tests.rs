use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{Key, List};

use super::*;

#[derive(crate::Schema)]
struct Font {
	family: Key<String>,
	size: Key<u32>,
}

impl Font {
	fn new() -> Self {
		Self {
			family: Key::new("monospace".to_string()),
			size: Key::new(12),
		}
	}
}

#[derive(crate::Schema)]
struct Common {
	enabled: Key<bool>,
}

#[derive(crate::Schema)]
struct Panel {
	title: Key<String>,
	font: Bunch<Font>,
	#[setting(private)]
	scroll: Key<u32>,
	_cache: Key<String>,
	#[setting(flatten)]
	common: Common,
	tags: List<Key<String>>,
}

impl Panel {
	fn new() -> Self {
		Self {
			title: Key::new(String::new()),
			font: Bunch::new(Font::new()),
			scroll: Key::new(0),
			_cache: Key::new(String::new()),
			common: Common {
				enabled: Key::new(true),
			},
			tags: List::new(Key::new(String::new())),
		}
	}
}

#[test]
fn test_fields_in_declaration_order() {
	let panel = Bunch::new(Panel::new());
	let labels: Vec<_> = panel.entries().iter().map(FieldEntry::label).collect();
	assert_eq!(
		labels,
		["title", "font", "scroll", "_cache", "enabled", "tags"]
	);
}

#[test]
fn test_private_fields_are_flagged() {
	let panel = Bunch::new(Panel::new());
	assert!(panel.scroll.skip_on_save());
	assert!(panel._cache.skip_on_save());
	assert!(!panel.title.skip_on_save());
	assert!(!panel.common.enabled.skip_on_save());
}

#[test]
fn test_field_paths() {
	let panel = Bunch::new(Panel::new());
	assert_eq!(panel.title.path(), "title");
	assert_eq!(panel.font.size.path(), "font.size");
	assert_eq!(panel.common.enabled.path(), "enabled");
	assert_eq!(panel.font.label(), "font");
}

#[test]
fn test_field_update_reaches_bunch_with_field_origin() {
	let panel = Bunch::new(Panel::new());
	let origins = Arc::new(Mutex::new(Vec::new()));
	let log = Arc::clone(&origins);
	panel.on_update(move |origin: &dyn Node| log.lock().push(origin.path()));

	panel.font.size.set(14);
	panel.title.set("Logs".to_string());
	assert_eq!(*origins.lock(), ["font.size", "title"]);
}

#[test]
fn test_nested_bunch_sees_update_before_outer() {
	let panel = Bunch::new(Panel::new());
	let order = Arc::new(Mutex::new(Vec::new()));
	let log = Arc::clone(&order);
	panel.font.on_update(move |_| log.lock().push("font"));
	let log = Arc::clone(&order);
	panel.on_update(move |_| log.lock().push("panel"));

	panel.font.family.set("serif".to_string());
	assert_eq!(*order.lock(), ["font", "panel"]);
}

#[test]
fn test_private_field_updates_stay_local() {
	let panel = Bunch::new(Panel::new());
	let bunch_updates = Arc::new(AtomicUsize::new(0));
	let count = Arc::clone(&bunch_updates);
	panel.on_update(move |_| count.fetch_add(1, Ordering::SeqCst));
	let key_updates = Arc::new(AtomicUsize::new(0));
	let count = Arc::clone(&key_updates);
	panel.scroll.on_update(move |_| count.fetch_add(1, Ordering::SeqCst));

	panel.scroll.set(40);
	assert_eq!(key_updates.load(Ordering::SeqCst), 1);
	assert_eq!(bunch_updates.load(Ordering::SeqCst), 0);
}

#[test]
fn test_set_parent_links_every_field() {
	let parent = Bunch::new(Panel::new());
	let child = Bunch::new(Panel::new());
	assert!(child.set_parent(Some(&parent)));

	parent.title.set("Parent".to_string());
	parent.font.size.set(20);
	assert_eq!(child.title.get(), "Parent");
	assert_eq!(child.font.size.get(), 20);
	assert!(child.parent().is_some_and(|p| p.ptr_eq(&parent)));
	assert!(child.font.parent().is_some_and(|p| p.ptr_eq(&parent.font)));

	child.font.size.set(9);
	assert_eq!(parent.font.size.get(), 20);

	assert!(child.set_parent(None));
	assert_eq!(child.title.get(), "");
	assert_eq!(child.font.size.get(), 9);
}

#[test]
fn test_set_parent_refuses_cycles() {
	let a = Bunch::new(Font::new());
	let b = Bunch::new(Font::new());
	assert!(!a.set_parent(Some(&a)));
	assert!(b.set_parent(Some(&a)));
	assert!(!a.set_parent(Some(&b)));
	assert!(a.parent().is_none());
}

#[test]
fn test_is_set_ignores_private_fields() {
	let panel = Bunch::new(Panel::new());
	assert!(!Node::is_set(&panel));
	panel.scroll.set(3);
	assert!(!Node::is_set(&panel));
	panel.font.size.set(3);
	assert!(Node::is_set(&panel));
}

#[test]
fn test_fresh_copies_shape_only() {
	let panel = Bunch::new(Panel::new());
	panel.title.set("Original".to_string());
	panel.tags.append_one().set("a".to_string());

	let copy = panel.fresh();
	assert!(!copy.ptr_eq(&panel));
	assert!(!copy.title.is_set());
	assert!(copy.tags.is_empty());
	assert_eq!(copy.font.size.get(), 12);
}

#[derive(crate::Schema)]
struct Clashing {
	enabled: Key<bool>,
	#[setting(flatten)]
	common: Common,
}

#[test]
#[should_panic(expected = "duplicate settings field label `enabled`")]
fn test_duplicate_labels_panic() {
	Bunch::new(Clashing {
		enabled: Key::new(false),
		common: Common {
			enabled: Key::new(true),
		},
	});
}

#[derive(crate::Schema)]
struct Renamed {
	#[setting(rename = "type")]
	kind: Key<String>,
	r#loop: Key<bool>,
}

#[test]
fn test_rename_and_raw_identifiers() {
	let bunch = Bunch::new(Renamed {
		kind: Key::new(String::new()),
		r#loop: Key::new(false),
	});
	assert_eq!(bunch.kind.label(), "type");
	assert_eq!(bunch.r#loop.label(), "loop");
}
