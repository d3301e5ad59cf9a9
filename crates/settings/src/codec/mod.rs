//! Reading and writing settings files.
//!
//! A settings file is a sequence of sections, one per named layer:
//!
//! ```text
//! [main]
//! font.size = 12
//! servers.1.host = example.org
//!
//! [work/laptop]
//! font.size = 10
//! ```
//!
//! The root layer's section comes first, then the named layers in lexical order
//! of their `/`-joined names. Entries address fields by their dotted path; list
//! items are addressed by 1-based position. Lines that cannot be applied are
//! dropped and listed in the returned [`LoadReport`].

mod text;

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::lock::{self, Deferred};
use crate::node::Node;
use crate::schema::{self, Field, FieldEntry, Schema};
use crate::settings::Settings;
use text::Line;

/// Largest list position accepted from a settings file.
pub const MAX_LIST_INDEX: usize = 1 << 16;

/// Writer options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
	/// Separate sections with an empty line.
	pub blank_lines: bool,
}

impl Default for SaveOptions {
	fn default() -> Self {
		Self { blank_lines: true }
	}
}

/// Why a line of a settings file was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
	/// Neither a section header nor a `path = value` entry, or a header that
	/// names no section.
	Malformed,
	/// An entry before the first valid section header.
	OutsideSection,
	/// The path does not lead to a persisted field.
	UnknownPath,
	/// The value could not be parsed or was refused by the key's validator.
	InvalidValue,
}

/// A dropped line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected {
	/// 1-based line number.
	pub line: usize,
	pub reason: Rejection,
}

/// Outcome of a load. Rejected lines are not errors: the rest of the file was
/// applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
	rejected: Vec<Rejected>,
}

impl LoadReport {
	pub fn rejected(&self) -> &[Rejected] {
		&self.rejected
	}

	/// Whether every line was applied.
	pub fn is_clean(&self) -> bool {
		self.rejected.is_empty()
	}

	fn reject(&mut self, line: usize, reason: Rejection) {
		tracing::debug!(domain = "settings", line, ?reason, "dropped settings line");
		self.rejected.push(Rejected { line, reason });
	}
}

type Entries = Vec<(String, Option<String>)>;

impl<S: Schema> Settings<S> {
	/// Writes this layer and its named descendants to `out`.
	pub fn save<W: Write>(&self, out: W) -> Result<()> {
		self.save_with(out, SaveOptions::default())
	}

	pub fn save_with<W: Write>(&self, mut out: W, options: SaveOptions) -> Result<()> {
		out.write_all(self.render(options).as_bytes())?;
		out.flush()?;
		Ok(())
	}

	/// Renders this layer and its named descendants with default options.
	pub fn to_text(&self) -> String {
		self.render(SaveOptions::default())
	}

	/// Replaces the persisted state of this layer and its named descendants with
	/// the content of `input`.
	///
	/// Every persisted layer is reset first, so fields absent from the input end
	/// up unset. Sections naming missing layers create them. Anonymous layers are
	/// left alone. Listeners are held back until the whole input is applied; see
	/// the crate documentation for the order in which they then fire.
	///
	/// The input is read completely before anything is changed, so an I/O or
	/// encoding error leaves the tree untouched.
	pub fn load<R: BufRead>(&self, mut input: R) -> Result<LoadReport> {
		let mut lines = Vec::new();
		loop {
			let mut bytes = Vec::new();
			if input.read_until(b'\n', &mut bytes)? == 0 {
				break;
			}
			let line = String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8 {
				line: lines.len() + 1,
			})?;
			lines.push(line);
		}
		Ok(self.apply(lines.iter().map(String::as_str)))
	}

	/// Like [`load`](Self::load), from a string.
	pub fn load_str(&self, text: &str) -> LoadReport {
		self.apply(text.lines())
	}

	fn section_name(&self) -> String {
		let name = self.name();
		if name.is_empty() {
			Self::MAIN.to_string()
		} else {
			name
		}
	}

	/// Named descendant layers with their section paths, in pre-order.
	///
	/// Anonymous layers are skipped; their named children are listed under the
	/// path of the nearest named ancestor.
	fn persisted_layers(&self) -> Vec<(String, Settings<S>)> {
		let mut found = Vec::new();
		collect_persisted(self, "", &mut found);
		found
	}

	fn render(&self, options: SaveOptions) -> String {
		let _tree = lock::tree();
		let mut root = Entries::new();
		dump_entries(&self.entries(), "", &mut root);

		let mut sections: BTreeMap<String, Entries> = BTreeMap::new();
		for (path, layer) in self.persisted_layers() {
			dump_entries(&layer.entries(), "", sections.entry(path).or_default());
		}

		let mut text = String::new();
		write_section(&mut text, &self.section_name(), &root);
		for (path, entries) in &sections {
			if options.blank_lines {
				text.push('\n');
			}
			write_section(&mut text, path, entries);
		}
		text
	}

	fn apply<'a>(&self, lines: impl IntoIterator<Item = &'a str>) -> LoadReport {
		let _tree = lock::tree();
		let batch = lock::begin_batch();
		let mut report = LoadReport::default();

		schema::reset_entries(&self.entries());
		for (_, layer) in self.persisted_layers() {
			schema::reset_entries(&layer.entries());
		}

		let mut section: Option<Settings<S>> = None;
		for (index, raw) in lines.into_iter().enumerate() {
			let line = index + 1;
			match text::parse_line(raw) {
				Line::Blank => {}
				Line::Malformed => report.reject(line, Rejection::Malformed),
				Line::Section(fragments) => {
					section = self.resolve_section(&fragments);
					if section.is_none() {
						report.reject(line, Rejection::Malformed);
					}
				}
				Line::Entry { path, value } => {
					let Some(layer) = &section else {
						report.reject(line, Rejection::OutsideSection);
						continue;
					};
					if let Err(reason) = restore_entry(&layer.entries(), &path, value.as_deref()) {
						if reason == Rejection::InvalidValue {
							tracing::warn!(
								domain = "settings",
								line,
								path = %path.join("."),
								"invalid value in settings file"
							);
						}
						report.reject(line, reason);
					}
				}
			}
		}

		let deferred = batch.finish();
		self.flush_load(deferred);
		report
	}

	/// Finds or creates the layer a section header names.
	fn resolve_section(&self, fragments: &[String]) -> Option<Settings<S>> {
		match fragments {
			[] => None,
			[only] if *only == self.section_name() => Some(self.clone()),
			_ => {
				let mut current = self.clone();
				for fragment in fragments {
					current = match find_persisted_child(&current, fragment) {
						Some(layer) => layer,
						None => current.add_layer(fragment),
					};
				}
				Some(current)
			}
		}
	}

	/// Fires what a load held back: loaded listeners of every node, then
	/// value-change listeners of keys that changed, then one update per layer
	/// that was updated.
	fn flush_load(&self, deferred: Deferred) {
		let mut layers = vec![self.clone()];
		layers.extend(self.persisted_layers().into_iter().map(|(_, layer)| layer));

		for layer in &layers {
			Node::core(layer).fire_loaded();
			for entry in layer.entries() {
				schema::fire_loaded(entry.field());
			}
		}

		for change in deferred.changes {
			change();
		}

		let mut touched = deferred.layers;
		for layer in &layers {
			let position = touched
				.iter()
				.position(|known| std::ptr::addr_eq(Arc::as_ptr(known), Arc::as_ptr(&layer.inner)));
			if let Some(position) = position {
				touched.remove(position);
				Node::core(layer).fire_own_update(layer);
			}
		}
		for container in touched {
			container.flush_update();
		}
	}
}

fn collect_persisted<S: Schema>(layer: &Settings<S>, prefix: &str, found: &mut Vec<(String, Settings<S>)>) {
	for child in layer.layers() {
		let name = child.name();
		if name.is_empty() {
			collect_persisted(&child, prefix, found);
			continue;
		}
		let path = if prefix.is_empty() {
			name
		} else {
			format!("{prefix}{}{name}", text::SECTION_SEPARATOR)
		};
		found.push((path.clone(), child.clone()));
		collect_persisted(&child, &path, found);
	}
}

/// Finds the named layer `name` directly under `layer`, or under one of its
/// anonymous descendants.
fn find_persisted_child<S: Schema>(layer: &Settings<S>, name: &str) -> Option<Settings<S>> {
	let children = layer.layers();
	if let Some(child) = children.iter().find(|child| child.name() == name) {
		return Some(child.clone());
	}
	children
		.iter()
		.filter(|child| child.name().is_empty())
		.find_map(|child| find_persisted_child(child, name))
}

fn write_section(out: &mut String, header: &str, entries: &Entries) {
	out.push('[');
	out.push_str(header);
	out.push_str("]\n");
	for (path, value) in entries {
		out.push_str(path);
		out.push_str(" =");
		if let Some(value) = value {
			out.push(' ');
			out.push_str(&text::escape(value));
		}
		out.push('\n');
	}
}

fn join(prefix: &str, label: &str) -> String {
	if prefix.is_empty() {
		label.to_string()
	} else {
		format!("{prefix}{}{label}", text::PATH_SEPARATOR)
	}
}

fn dump_entries(entries: &[FieldEntry<'_>], prefix: &str, out: &mut Entries) {
	for entry in entries.iter().filter(|entry| !entry.is_private()) {
		dump_field(entry.field(), &join(prefix, entry.label()), out);
	}
}

fn dump_field(field: Field<'_>, path: &str, out: &mut Entries) {
	match field {
		Field::Key(key) => {
			if let Some(value) = key.dump_value() {
				out.push((path.to_string(), Some(value)));
			}
		}
		Field::Bunch(bunch) => dump_entries(&bunch.entries(), path, out),
		Field::List(list) => list.for_each_item(&mut |index, item| {
			let item_path = join(path, &(index + 1).to_string());
			let written = out.len();
			dump_field(item, &item_path, out);
			// Keep the position of items that hold nothing.
			if out.len() == written {
				out.push((item_path, None));
			}
		}),
	}
}

fn restore_entry(
	entries: &[FieldEntry<'_>],
	path: &[String],
	value: Option<&str>,
) -> std::result::Result<(), Rejection> {
	let (head, rest) = path.split_first().ok_or(Rejection::UnknownPath)?;
	let entry = entries
		.iter()
		.find(|entry| !entry.is_private() && entry.label() == head.as_str())
		.ok_or(Rejection::UnknownPath)?;
	restore_field(entry.field(), rest, value)
}

fn restore_field(
	field: Field<'_>,
	path: &[String],
	value: Option<&str>,
) -> std::result::Result<(), Rejection> {
	match field {
		Field::Key(key) if path.is_empty() => {
			if key.restore_value(value) {
				Ok(())
			} else {
				Err(Rejection::InvalidValue)
			}
		}
		Field::Key(_) => Err(Rejection::UnknownPath),
		Field::Bunch(bunch) => restore_entry(&bunch.entries(), path, value),
		Field::List(list) => {
			let (head, rest) = path.split_first().ok_or(Rejection::UnknownPath)?;
			let position = head
				.parse::<usize>()
				.ok()
				.filter(|position| (1..=MAX_LIST_INDEX).contains(position))
				.ok_or(Rejection::UnknownPath)?;
			let len = list.item_count();
			list.grow_to(position);
			if rest.is_empty() && value.is_none() {
				return Ok(());
			}
			let mut outcome = Err(Rejection::UnknownPath);
			list.with_item(position - 1, &mut |item| {
				outcome = restore_field(item, rest, value);
			});
			// A dropped entry leaves no items behind.
			if outcome.is_err() {
				list.truncate(len);
			}
			outcome
		}
	}
}
