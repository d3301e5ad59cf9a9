//! Conversion of single setting values to and from their text form.
//!
//! A [`Key`](crate::Key) delegates all text handling to a [`Serializer`]. Types
//! that know how to represent themselves implement [`Serializable`] and get a
//! serializer for free through [`NativeSerializer`]; anything else can be stored
//! by passing a custom adapter to [`Key::with_serializer`](crate::Key::with_serializer).

use std::fmt;
use std::marker::PhantomData;

/// Values that can be held by a [`Key`](crate::Key).
pub trait Value: Clone + PartialEq + Send + Sync + 'static {}

impl<T: Clone + PartialEq + Send + Sync + 'static> Value for T {}

/// Converts values of type `T` to and from strings.
///
/// `from_str` returns `None` for input that does not describe a valid `T`.
pub trait Serializer<T>: Send + Sync {
	/// Renders `value` as text.
	fn to_str(&self, value: &T) -> String;

	/// Parses `text`, or returns `None` if it is not a valid value.
	fn from_str(&self, text: &str) -> Option<T>;
}

/// Types with a built-in text representation.
pub trait Serializable: Sized {
	/// Renders `self` as text.
	fn to_str(&self) -> String;

	/// Parses `text`, or returns `None` if it is not a valid value.
	fn from_str(text: &str) -> Option<Self>;
}

/// [`Serializer`] backed by the value type's own [`Serializable`] impl.
pub struct NativeSerializer<T>(PhantomData<fn() -> T>);

impl<T> NativeSerializer<T> {
	pub const fn new() -> Self {
		Self(PhantomData)
	}
}

impl<T> Default for NativeSerializer<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> fmt::Debug for NativeSerializer<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("NativeSerializer")
	}
}

impl<T: Serializable> Serializer<T> for NativeSerializer<T> {
	fn to_str(&self, value: &T) -> String {
		value.to_str()
	}

	fn from_str(&self, text: &str) -> Option<T> {
		T::from_str(text)
	}
}

impl Serializable for bool {
	fn to_str(&self) -> String {
		String::from(if *self { "true" } else { "false" })
	}

	fn from_str(text: &str) -> Option<Self> {
		match text.trim().to_lowercase().as_str() {
			"true" | "yes" | "y" | "on" | "1" => Some(true),
			"false" | "no" | "n" | "off" | "0" => Some(false),
			_ => None,
		}
	}
}

impl Serializable for String {
	fn to_str(&self) -> String {
		self.clone()
	}

	fn from_str(text: &str) -> Option<Self> {
		Some(text.to_string())
	}
}

macro_rules! serializable_via_parse {
	($($ty:ty),* $(,)?) => {
		$(
			impl Serializable for $ty {
				fn to_str(&self) -> String {
					self.to_string()
				}

				fn from_str(text: &str) -> Option<Self> {
					text.trim().parse().ok()
				}
			}
		)*
	};
}

serializable_via_parse!(
	i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
);
