// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::ops::{Deref, DerefMut};
use crate::buffer::{Buffer, GrowableBuffer};
use crate::error::Result;
use crate::segment::{InlineStorage, Segment, SegmentTag};
use crate::vector::Vector;
use super::{convert, Encoding, StrSpan};

/// An owned string: a byte buffer plus an encoding tag.
///
/// Whenever the string is non-empty, a null terminator code unit (one zero
/// byte, two for UTF-16) follows the content bytes in the buffer, and every
/// mutation preserves that. Views handed to OS APIs can therefore rely on
/// the terminator without copying.
///
/// Appending or assigning a view with a different encoding transcodes it
/// into this string's encoding; a view that cannot be represented fails and
/// leaves the string unchanged.
#[repr(C)]
pub struct StrBuf {
	encoding: Encoding,
	buffer: Buffer,
}

impl StrBuf {
	/// An empty UTF-8 string.
	pub fn new() -> Self {
		Self::with_encoding(Encoding::Utf8)
	}

	/// An empty string with the given encoding.
	pub fn with_encoding(encoding: Encoding) -> Self {
		Self { encoding, buffer: Buffer::new() }
	}

	/// An empty string allocating from the stack selected by `tag`.
	pub fn new_in(tag: SegmentTag, encoding: Encoding) -> Self {
		Self { encoding, buffer: Buffer::new_in(tag) }
	}

	/// A string holding `view` transcoded into `encoding`.
	pub fn from_view(view: StrSpan<'_>, encoding: Encoding) -> Result<Self> {
		let mut string = Self::with_encoding(encoding);
		string.append(view)?;
		Ok(string)
	}

	/// Returns the encoding of the stored bytes.
	pub fn encoding(&self) -> Encoding { self.encoding }

	/// Returns the content size in bytes, excluding the null terminator.
	pub fn size_in_bytes(&self) -> usize {
		self.buffer.size().saturating_sub(self.encoding.unit_size())
	}

	/// Returns `true` when the string holds no content.
	pub fn is_empty(&self) -> bool { self.buffer.is_empty() }

	/// Returns a view of the content. Non-empty strings always view as
	/// null-terminated.
	pub fn view(&self) -> StrSpan<'_> {
		StrSpan::new(
			&self.buffer.as_slice()[..self.size_in_bytes()],
			self.encoding,
			!self.is_empty(),
		)
	}

	/// Returns the content bytes including the terminator code unit, for
	/// handing to APIs that expect terminated strings. Empty for an empty
	/// string.
	pub fn bytes_including_terminator(&self) -> &[u8] {
		self.buffer.as_slice()
	}

	fn terminate(&mut self) -> Result {
		if !self.buffer.is_empty() {
			self.buffer.append(&[0u8; 2][..self.encoding.unit_size()])?;
		}
		Ok(())
	}

	/// Appends `view`, transcoding into this string's encoding. On failure
	/// the string is unchanged.
	pub fn append(&mut self, view: StrSpan<'_>) -> Result {
		let size = self.size_in_bytes();
		self.buffer.truncate(size);
		let result = convert::transcode_append(view, self.encoding, &mut self.buffer);
		// The terminator comes back even after a rollback; its capacity is
		// already reserved.
		self.terminate()?;
		result
	}

	/// Appends one code point.
	pub fn push(&mut self, c: char) -> Result {
		let mut scratch = [0u8; 4];
		self.append(StrSpan::utf8(c.encode_utf8(&mut scratch)))
	}

	/// Replaces the content with `view`, transcoding into this string's
	/// encoding. On failure the previous content is kept.
	pub fn assign(&mut self, view: StrSpan<'_>) -> Result {
		let old = self.size_in_bytes();
		self.append(view)?;
		// The old content slides out from under the appended bytes.
		if old > 0 {
			let total = self.buffer.size();
			self.buffer.as_mut_slice().copy_within(old..total, 0);
			self.buffer.truncate(total - old);
		}
		Ok(())
	}

	/// Removes all content. The string becomes empty with no terminator.
	pub fn clear(&mut self) {
		self.buffer.clear();
	}

	/// Cuts the content back to `size` bytes, keeping the terminator in
	/// place. `size` must land on a code unit boundary.
	pub(crate) fn truncate_content(&mut self, size: usize) {
		if size >= self.size_in_bytes() {
			return
		}
		if size == 0 {
			self.buffer.clear();
			return
		}

		let unit = self.encoding.unit_size();
		self.buffer.truncate(size + unit);
		self.buffer.as_mut_slice()[size..].fill(0);
	}

	/// Returns `true` while the content lives in an inline buffer.
	pub fn is_inline(&self) -> bool { self.buffer.is_inline() }
}

impl Default for StrBuf {
	fn default() -> Self { Self::new() }
}

impl Clone for StrBuf {
	fn clone(&self) -> Self {
		let string = Self::from_view(self.view(), self.encoding);
		string.expect("allocation failed while cloning")
	}
}

impl From<&str> for StrBuf {
	fn from(text: &str) -> Self {
		Self::from_view(StrSpan::utf8(text), Encoding::Utf8)
			.expect("allocation failed while constructing a string")
	}
}

impl PartialEq for StrBuf {
	fn eq(&self, other: &Self) -> bool { self.view() == other.view() }
}

impl Eq for StrBuf { }

impl PartialEq<StrSpan<'_>> for StrBuf {
	fn eq(&self, other: &StrSpan<'_>) -> bool { self.view() == *other }
}

impl PartialEq<&str> for StrBuf {
	fn eq(&self, other: &&str) -> bool { self.view() == StrSpan::utf8(other) }
}

impl PartialEq<str> for StrBuf {
	fn eq(&self, other: &str) -> bool { self.view() == StrSpan::utf8(other) }
}

impl fmt::Debug for StrBuf {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "StrBuf({:?}, ", self.encoding)?;
		for c in self.view().code_points() {
			write!(f, "{}", c.escape_debug())?;
		}
		write!(f, ")")
	}
}

impl GrowableBuffer for StrBuf {
	fn data(&self) -> &[u8] {
		&self.buffer.as_slice()[..self.size_in_bytes()]
	}

	fn data_mut(&mut self) -> &mut [u8] {
		let size = self.size_in_bytes();
		&mut self.buffer.as_mut_slice()[..size]
	}

	fn size(&self) -> usize { self.size_in_bytes() }

	fn resize_uninitialized(&mut self, size: usize) -> Result {
		let current_size = self.size_in_bytes();
		self.buffer.truncate(current_size);
		self.buffer.resize_uninitialized(size)?;
		self.terminate()
	}
}

/// A [`StrBuf`] whose buffer starts in an inline block of `N` bytes,
/// spilling to the heap once content and terminator exceed it. Short strings
/// therefore move with their content, which also makes them safe to insert
/// into containers inside a position-independent scope.
#[repr(C)]
pub struct SmallStrBuf<const N: usize> {
	string: StrBuf,
	inline: InlineStorage<u8, N>,
}

impl<const N: usize> SmallStrBuf<N> {
	pub fn new() -> Self {
		Self::with_encoding(Encoding::Utf8)
	}

	pub fn with_encoding(encoding: Encoding) -> Self {
		Self {
			string: StrBuf {
				encoding,
				buffer: Buffer {
					segment: Vector { segment: Segment::with_inline(SegmentTag::Global, N, false) },
				},
			},
			inline: InlineStorage::new(),
		}
	}

	pub fn from_view(view: StrSpan<'_>, encoding: Encoding) -> Result<Self> {
		let mut string = Self::with_encoding(encoding);
		string.append(view)?;
		Ok(string)
	}
}

impl<const N: usize> Default for SmallStrBuf<N> {
	fn default() -> Self { Self::new() }
}

impl<const N: usize> Deref for SmallStrBuf<N> {
	type Target = StrBuf;

	fn deref(&self) -> &StrBuf { &self.string }
}

impl<const N: usize> DerefMut for SmallStrBuf<N> {
	fn deref_mut(&mut self) -> &mut StrBuf { &mut self.string }
}

impl<const N: usize> Clone for SmallStrBuf<N> {
	fn clone(&self) -> Self {
		let string = Self::from_view(self.view(), self.encoding());
		string.expect("allocation failed while cloning")
	}
}

impl<const N: usize> From<&str> for SmallStrBuf<N> {
	fn from(text: &str) -> Self {
		Self::from_view(StrSpan::utf8(text), Encoding::Utf8)
			.expect("allocation failed while constructing a string")
	}
}

impl<const N: usize> PartialEq for SmallStrBuf<N> {
	fn eq(&self, other: &Self) -> bool { self.string == other.string }
}

impl<const N: usize> Eq for SmallStrBuf<N> { }

impl<const N: usize> PartialEq<&str> for SmallStrBuf<N> {
	fn eq(&self, other: &&str) -> bool { self.string == *other }
}

impl<const N: usize> fmt::Debug for SmallStrBuf<N> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.string.fmt(f)
	}
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use quickcheck_macros::quickcheck;
	use crate::string::{Encoding, StrSpan};
	use super::{SmallStrBuf, StrBuf};

	#[test]
	fn non_empty_strings_are_null_terminated() {
		let string = StrBuf::from("hi");
		assert_eq!(string.size_in_bytes(), 2);
		assert_eq!(string.bytes_including_terminator(), b"hi\0");
		assert!(string.view().is_null_terminated());

		let empty = StrBuf::new();
		assert_eq!(empty.bytes_including_terminator(), b"");
	}

	#[test]
	fn utf16_terminator_is_two_bytes() {
		let string = StrBuf::from_view(StrSpan::utf8("ab"), Encoding::Utf16).unwrap();
		assert_eq!(string.size_in_bytes(), 4);
		assert_eq!(string.bytes_including_terminator(), &[b'a', 0, b'b', 0, 0, 0]);
	}

	#[test]
	fn assign_transcodes_between_encodings() {
		let mut wide = StrBuf::with_encoding(Encoding::Utf16);
		wide.assign(StrSpan::utf8("日本語")).unwrap();
		assert_eq!(wide.view().bytes(), &[0xE5, 0x65, 0x2C, 0x67, 0x9E, 0x8A]);
		assert_eq!(wide, "日本語");
	}

	#[test]
	fn append_failure_leaves_string_unchanged() {
		let mut ascii = StrBuf::with_encoding(Encoding::Ascii);
		ascii.append(StrSpan::ascii("ok")).unwrap();
		assert!(ascii.append(StrSpan::utf8("né")).is_err());
		assert_eq!(ascii, "ok");
		assert_eq!(ascii.bytes_including_terminator(), b"ok\0");
	}

	#[test]
	fn push_appends_code_points() {
		let mut string = StrBuf::new();
		string.push('a').unwrap();
		string.push('本').unwrap();
		assert_eq!(string, "a本");
	}

	#[test]
	fn small_string_stays_inline_then_spills() {
		let mut string = SmallStrBuf::<8>::new();
		string.append(StrSpan::ascii("abc")).unwrap();
		assert!(string.is_inline());

		string.append(StrSpan::ascii("defghij")).unwrap();
		assert!(!string.is_inline());
		assert_eq!(string, "abcdefghij");
	}

	#[test]
	fn equality_normalizes_encodings() {
		let utf8 = StrBuf::from("ASDF");
		let wide = StrBuf::from_view(StrSpan::utf8("ASDF"), Encoding::Utf16).unwrap();
		let ascii = StrBuf::from_view(StrSpan::utf8("ASDF"), Encoding::Ascii).unwrap();
		assert_eq!(utf8, wide);
		assert_eq!(utf8, ascii);
		assert_eq!(wide, ascii);
	}

	#[quickcheck]
	fn terminator_bytes_are_zero(text: String) {
		let string = StrBuf::from(text.as_str());
		if string.is_empty() {
			return
		}

		let bytes = string.bytes_including_terminator();
		let size = string.size_in_bytes();
		assert_eq!(&bytes[size..], &[0u8][..]);
		assert_eq!(string.view().bytes(), text.as_bytes());
	}
}
