// Copyright 2023 Strixpyrr
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod convert;
mod iter;
mod table;
mod text;

pub use convert::*;
pub use iter::*;
pub use table::*;
pub use text::*;

use std::fmt;
use num_traits::PrimInt;
use crate::error::{Error, Result};

/// The byte encoding of a string or view.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[repr(u8)]
pub enum Encoding {
	/// Seven-bit ASCII, one byte per code point.
	Ascii = 0,
	/// UTF-8, one to four bytes per code point.
	#[default]
	Utf8,
	/// UTF-16 little-endian, one or two 16-bit units per code point.
	Utf16,
}

impl Encoding {
	/// Returns the size in bytes of one code unit.
	pub const fn unit_size(self) -> usize {
		match self {
			Self::Utf16 => 2,
			_ => 1,
		}
	}
}

/// A borrowed, read-only view over encoded text: bytes, an encoding tag and
/// whether a null terminator code unit follows the bytes.
///
/// The view carries no ownership; it is a plain borrow. Equality normalizes
/// across ASCII and UTF-8 (ASCII is a byte-identical subset) and otherwise
/// compares decoded code points.
#[derive(Copy, Clone)]
pub struct StrSpan<'a> {
	bytes: &'a [u8],
	encoding: Encoding,
	null_terminated: bool,
}

impl<'a> StrSpan<'a> {
	/// An empty view with the given encoding.
	pub const fn empty(encoding: Encoding) -> Self {
		Self {
			bytes: &[],
			encoding,
			null_terminated: false,
		}
	}

	/// Wraps raw bytes, excluding any null terminator; `null_terminated`
	/// asserts that a terminator code unit follows the span.
	pub const fn new(bytes: &'a [u8], encoding: Encoding, null_terminated: bool) -> Self {
		Self { bytes, encoding, null_terminated }
	}

	/// Views an ASCII string slice. Code points above 0x7F keep their UTF-8
	/// bytes but will fail ASCII decoding; pass real ASCII here.
	pub const fn ascii(text: &'a str) -> Self {
		Self::new(text.as_bytes(), Encoding::Ascii, false)
	}

	/// Views a string slice as UTF-8.
	pub const fn utf8(text: &'a str) -> Self {
		Self::new(text.as_bytes(), Encoding::Utf8, false)
	}

	/// Views native-endian UTF-16 units.
	pub fn utf16(units: &'a [u16]) -> Self {
		Self::new(bytemuck::cast_slice(units), Encoding::Utf16, false)
	}

	/// Returns the text bytes, excluding any null terminator.
	pub fn bytes(&self) -> &'a [u8] { self.bytes }

	/// Returns the view size in bytes, excluding any null terminator.
	pub fn size_in_bytes(&self) -> usize { self.bytes.len() }

	/// Returns `true` when the view contains no bytes.
	pub fn is_empty(&self) -> bool { self.bytes.is_empty() }

	/// Returns the encoding of the viewed bytes.
	pub fn encoding(&self) -> Encoding { self.encoding }

	/// Returns `true` if a null terminator code unit follows the bytes.
	pub fn is_null_terminated(&self) -> bool { self.null_terminated }

	/// Returns a cursor over the code points, dispatching on the encoding.
	pub fn cursor(&self) -> AnyCursor<'a> {
		AnyCursor::new(self.bytes, self.encoding)
	}

	/// Iterates the code points from the start. Iteration stops at the first
	/// invalid sequence.
	pub fn code_points(&self) -> CodePoints<'a> {
		CodePoints::new(self.cursor())
	}

	/// Returns the sub-view of `length` bytes starting at byte `offset`.
	/// `offset + length` may equal the size (an empty or suffix slice);
	/// anything further is out of range. The result keeps the terminator
	/// claim only when it reaches the end of this view.
	pub fn slice_start_length(&self, offset: usize, length: usize) -> Result<StrSpan<'a>> {
		let Some(end) = offset.checked_add(length) else {
			return Err(Error::out_of_range())
		};
		if end > self.bytes.len() {
			return Err(Error::out_of_range())
		}

		Ok(Self {
			bytes: &self.bytes[offset..end],
			encoding: self.encoding,
			null_terminated: self.null_terminated && end == self.bytes.len(),
		})
	}

	/// Returns `true` if this view starts with `prefix`, comparing the way
	/// equality does.
	pub fn starts_with(&self, prefix: StrSpan<'_>) -> bool {
		match self.slice_start_length(0, prefix.size_in_bytes()) {
			Ok(head) if byte_comparable(self.encoding, prefix.encoding) => head == prefix,
			_ => {
				let mut chars = self.code_points();
				prefix.code_points().all(|c| chars.next() == Some(c))
			}
		}
	}

	/// Returns `true` if this view ends with `suffix`, comparing the way
	/// equality does.
	pub fn ends_with(&self, suffix: StrSpan<'_>) -> bool {
		if byte_comparable(self.encoding, suffix.encoding) {
			return self.bytes.ends_with(suffix.bytes)
		}

		let tail: Vec<char> = self.code_points().collect();
		let suffix: Vec<char> = suffix.code_points().collect();
		tail.ends_with(&suffix)
	}

	/// Returns `true` if any code point equals `c`.
	pub fn contains_code_point(&self, c: char) -> bool {
		let mut cursor = self.cursor();
		cursor.advance_until_match(c)
	}

	/// Parses the whole view as a decimal integer with an optional leading
	/// minus sign. Empty views, stray characters and overflow all return
	/// `None`.
	pub fn parse_int<T: PrimInt>(&self) -> Option<T> {
		let mut chars = self.code_points().peekable();
		let negative = chars.peek() == Some(&'-');
		if negative {
			chars.next();
			// A sign only parses into a type that can hold negatives.
			if T::min_value() >= T::zero() {
				return None
			}
		}

		let ten = T::from(10)?;
		let mut value = T::zero();
		let mut any = false;
		for c in chars {
			let digit = T::from(c.to_digit(10)?)?;
			value = value.checked_mul(&ten)?;
			value = if negative {
				value.checked_sub(&digit)?
			} else {
				value.checked_add(&digit)?
			};
			any = true;
		}

		if any { Some(value) } else { None }
	}
}

/// `true` when two encodings share a byte-identical representation, so
/// comparisons and copies can stay at the byte level.
pub(crate) fn byte_comparable(a: Encoding, b: Encoding) -> bool {
	a == b ||
		matches!((a, b), (Encoding::Ascii, Encoding::Utf8) | (Encoding::Utf8, Encoding::Ascii))
}

impl PartialEq for StrSpan<'_> {
	fn eq(&self, other: &Self) -> bool {
		if byte_comparable(self.encoding, other.encoding) {
			return self.bytes == other.bytes
		}

		let mut a = self.cursor();
		let mut b = other.cursor();
		loop {
			match (a.advance_read(), b.advance_read()) {
				(None, None) => return a.is_at_end() && b.is_at_end(),
				(Some(x), Some(y)) if x == y => { }
				_ => return false,
			}
		}
	}
}

impl Eq for StrSpan<'_> { }

impl PartialEq<&str> for StrSpan<'_> {
	fn eq(&self, other: &&str) -> bool {
		*self == StrSpan::utf8(other)
	}
}

impl<'a> From<&'a str> for StrSpan<'a> {
	fn from(text: &'a str) -> Self {
		Self::utf8(text)
	}
}

impl fmt::Debug for StrSpan<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "StrSpan({:?}, ", self.encoding)?;
		for c in self.code_points() {
			write!(f, "{}", c.escape_debug())?;
		}
		write!(f, ")")
	}
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use super::{Encoding, StrSpan};

	#[test]
	fn ascii_and_utf8_views_compare_equal() {
		let a = StrSpan::new(&[0x68, 0x65, 0x6C, 0x6C, 0x6F], Encoding::Utf8, false);
		let b = StrSpan::new(&[0x68, 0x65, 0x6C, 0x6C, 0x6F], Encoding::Ascii, false);
		assert_eq!(a, b);
		assert_eq!(b, a);
	}

	#[test]
	fn utf16_compares_by_code_point() {
		let units: Vec<u16> = "hello".encode_utf16().collect();
		let wide = StrSpan::utf16(&units);
		assert_eq!(wide, StrSpan::utf8("hello"));
		assert_eq!(StrSpan::utf8("hello"), wide);
		assert!(wide != StrSpan::utf8("hellx"));
	}

	#[test]
	fn empty_views_are_equal_regardless_of_source() {
		let empty = StrSpan::empty(Encoding::Utf8);
		let sliced = StrSpan::utf8("x").slice_start_length(1, 0).unwrap();
		assert_eq!(empty, sliced);
	}

	#[test]
	fn slice_bounds_are_exact() {
		let span = StrSpan::utf8("abcdef");
		let sliced = span.slice_start_length(2, 4).unwrap();
		assert_eq!(sliced, "cdef");
		assert!(span.slice_start_length(2, 5).is_err());
		assert!(span.slice_start_length(6, 0).is_ok());
		assert!(span.slice_start_length(7, 0).is_err());
	}

	#[test]
	fn slice_keeps_terminator_only_at_the_end() {
		let span = StrSpan::new(b"path", Encoding::Ascii, true);
		assert!(span.slice_start_length(1, 3).unwrap().is_null_terminated());
		assert!(!span.slice_start_length(0, 2).unwrap().is_null_terminated());
	}

	#[test]
	fn starts_and_ends_with() {
		let span = StrSpan::utf8("wide load");
		assert!(span.starts_with(StrSpan::ascii("wide")));
		assert!(span.ends_with(StrSpan::ascii("load")));
		assert!(!span.starts_with(StrSpan::ascii("load")));

		let units: Vec<u16> = "wide".encode_utf16().collect();
		assert!(span.starts_with(StrSpan::utf16(&units)));
	}

	#[test]
	fn contains_code_point_decodes() {
		let span = StrSpan::utf8("日本語");
		assert!(span.contains_code_point('本'));
		assert!(!span.contains_code_point('x'));
	}

	#[test]
	fn parse_int_round_trips() {
		assert_eq!(StrSpan::ascii("123").parse_int::<i32>(), Some(123));
		assert_eq!(StrSpan::ascii("-45").parse_int::<i64>(), Some(-45));
		assert_eq!(StrSpan::ascii("-45").parse_int::<u32>(), None);
		assert_eq!(StrSpan::ascii("").parse_int::<i32>(), None);
		assert_eq!(StrSpan::ascii("12x").parse_int::<i32>(), None);
		assert_eq!(StrSpan::ascii("128").parse_int::<i8>(), None, "overflow fails");
		assert_eq!(StrSpan::ascii("-128").parse_int::<i8>(), Some(i8::MIN));
	}
}
