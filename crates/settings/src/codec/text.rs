//! Line grammar of the settings text format.

use std::borrow::Cow;

use crate::settings::normalize;

pub(crate) const SECTION_SEPARATOR: char = '/';
pub(crate) const PATH_SEPARATOR: char = '.';

/// One classified input line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Line {
	Blank,
	/// A `[header]`, as normalized layer names. Empty when nothing usable remains.
	Section(Vec<String>),
	/// A `path = value` entry. `None` means the entry is present but unset.
	Entry {
		path: Vec<String>,
		value: Option<String>,
	},
	Malformed,
}

pub(crate) fn parse_line(raw: &str) -> Line {
	let line = raw.trim();
	if line.is_empty() {
		return Line::Blank;
	}
	if let Some(header) = line
		.strip_prefix('[')
		.and_then(|rest| rest.strip_suffix(']'))
	{
		return Line::Section(section_fragments(header));
	}
	let Some((path, value)) = line.split_once('=') else {
		return Line::Malformed;
	};
	let path = path_fragments(path);
	if path.is_empty() {
		return Line::Malformed;
	}
	let value = value.trim();
	Line::Entry {
		path,
		value: (!value.is_empty()).then(|| unescape(value)),
	}
}

pub(crate) fn section_fragments(header: &str) -> Vec<String> {
	header
		.split(SECTION_SEPARATOR)
		.map(normalize)
		.filter(|fragment| !fragment.is_empty())
		.collect()
}

pub(crate) fn path_fragments(path: &str) -> Vec<String> {
	path.split(PATH_SEPARATOR)
		.map(|fragment| {
			fragment
				.chars()
				.filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_'))
				.collect::<String>()
		})
		.filter(|fragment| !fragment.is_empty())
		.collect()
}

fn needs_quotes(value: &str) -> bool {
	value.is_empty()
		|| value.contains(|c| matches!(c, '"' | '\\' | '\n'))
		|| value.starts_with(char::is_whitespace)
		|| value.ends_with(char::is_whitespace)
}

/// Quotes `value` when it would not survive a trip through [`parse_line`] as is.
pub(crate) fn escape(value: &str) -> Cow<'_, str> {
	if !needs_quotes(value) {
		return Cow::Borrowed(value);
	}
	let mut quoted = String::with_capacity(value.len() + 2);
	quoted.push('"');
	for c in value.chars() {
		match c {
			'"' => quoted.push_str("\\\""),
			'\\' => quoted.push_str("\\\\"),
			'\n' => quoted.push_str("\\n"),
			c => quoted.push(c),
		}
	}
	quoted.push('"');
	Cow::Owned(quoted)
}

/// Inverse of [`escape`]. Text without quotes or backslashes is taken verbatim.
pub(crate) fn unescape(value: &str) -> String {
	if !value.contains(|c| matches!(c, '"' | '\\')) || value.len() <= 1 {
		return value.to_string();
	}
	let value = value.strip_prefix('"').unwrap_or(value);
	let value = value.strip_suffix('"').unwrap_or(value);

	let mut plain = String::with_capacity(value.len());
	let mut escaped = false;
	for c in value.chars() {
		if escaped {
			plain.push(if c == 'n' { '\n' } else { c });
			escaped = false;
		} else if c == '\\' {
			escaped = true;
		} else {
			plain.push(c);
		}
	}
	plain
}
