// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use crate::vector::Vector;
use super::{Encoding, StrBuf, StrSpan};

/// Packs any number of null-terminated strings into one contiguous buffer,
/// recording where each begins.
///
/// This is the shape OS boundaries want for argument and environment
/// tables: every entry is terminated in place, entries are contiguous, and
/// each can be handed out as a terminated view without copying. Entries are
/// transcoded into the arena's encoding on append.
pub struct StringsArena {
	string: StrBuf,
	starts: Vector<usize>,
}

impl StringsArena {
	pub fn new(encoding: Encoding) -> Self {
		Self {
			string: StrBuf::with_encoding(encoding),
			starts: Vector::new(),
		}
	}

	/// Returns the number of packed strings.
	pub fn count(&self) -> usize { self.starts.size() }

	/// Returns the encoding every entry is stored in.
	pub fn encoding(&self) -> Encoding { self.string.encoding() }

	/// Returns the whole table as one string, entries separated by their
	/// terminators.
	pub fn view(&self) -> StrSpan<'_> { self.string.view() }

	/// Appends one string as a new entry. On failure the arena is
	/// unchanged.
	pub fn append(&mut self, view: StrSpan<'_>) -> Result {
		self.append_joined(&[view])
	}

	/// Appends several views joined into one single entry. On failure the
	/// arena is unchanged.
	pub fn append_joined(&mut self, views: &[StrSpan<'_>]) -> Result {
		let start = self.string.size_in_bytes();
		self.starts.push_back(start)?;

		let result = self.append_entry(views);
		if result.is_err() {
			self.starts.pop_back();
			self.string.truncate_content(start);
		}
		result
	}

	fn append_entry(&mut self, views: &[StrSpan<'_>]) -> Result {
		for view in views {
			self.string.append(*view)?;
		}
		// Each entry carries its own terminator as content; the buffer's
		// trailing terminator belongs to the table as a whole.
		self.string.push('\0')
	}

	/// Returns entry `index` as a null-terminated view in the arena's
	/// encoding.
	pub fn get(&self, index: usize) -> Option<StrSpan<'_>> {
		let starts = self.starts.as_slice();
		let start = *starts.get(index)?;
		let unit = self.string.encoding().unit_size();
		let end = starts
			.get(index + 1)
			.copied()
			.unwrap_or_else(|| self.string.size_in_bytes());

		let bytes = &self.string.view().bytes()[start..end - unit];
		Some(StrSpan::new(bytes, self.string.encoding(), true))
	}

	/// Iterates the entries in append order.
	pub fn iter(&self) -> impl Iterator<Item = StrSpan<'_>> {
		(0..self.count()).map(|index| self.get(index).unwrap_or(StrSpan::empty(self.encoding())))
	}

	/// Copies the entry views into `out`, failing when it is too small.
	/// Useful for building fixed-size argument tables.
	pub fn write_to<'a>(&'a self, out: &mut [StrSpan<'a>]) -> Result {
		if out.len() < self.count() {
			return Err(Error::out_of_range())
		}

		for (index, slot) in out.iter_mut().take(self.count()).enumerate() {
			*slot = self.get(index).unwrap_or(StrSpan::empty(self.encoding()));
		}
		Ok(())
	}
}
