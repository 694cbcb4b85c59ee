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

use std::fmt;
use std::ops::{Deref, DerefMut};
use crate::error::Result;
use crate::segment::{InlineStorage, Segment, SegmentTag};

/// The minimal growable-bytes interface consumed by the string builder and
/// by collaborators that stream bytes into caller-owned storage. Resizing is
/// the only capacity-changing call; content past the previous size is
/// arbitrary until written.
pub trait GrowableBuffer {
	/// The live bytes.
	fn data(&self) -> &[u8];

	/// The live bytes, writable.
	fn data_mut(&mut self) -> &mut [u8];

	/// The live byte count.
	fn size(&self) -> usize;

	/// Sets the byte count to exactly `size` without initializing new bytes.
	fn resize_uninitialized(&mut self, size: usize) -> Result;

	/// Restores any invariant the target maintains over its bytes, called
	/// once after a batch of writes.
	fn finalize(&mut self) -> Result { Ok(()) }
}

/// A heap allocated byte buffer on a plain segment.
#[repr(C)]
#[derive(Default, Clone, Eq, PartialEq)]
pub struct Buffer {
	pub(crate) segment: crate::Vector<u8>,
}

impl Buffer {
	pub fn new() -> Self {
		Self::new_in(SegmentTag::Global)
	}

	pub fn new_in(tag: SegmentTag) -> Self {
		Self { segment: crate::Vector::new_in(tag) }
	}

	pub fn from_slice(bytes: &[u8]) -> Result<Self> {
		let mut buffer = Self::new();
		buffer.append(bytes)?;
		Ok(buffer)
	}
}

impl Deref for Buffer {
	type Target = Segment<u8>;

	fn deref(&self) -> &Segment<u8> { &self.segment.segment }
}

impl DerefMut for Buffer {
	fn deref_mut(&mut self) -> &mut Segment<u8> { &mut self.segment.segment }
}

impl GrowableBuffer for Buffer {
	fn data(&self) -> &[u8] { self.as_slice() }

	fn data_mut(&mut self) -> &mut [u8] { self.as_mut_slice() }

	fn size(&self) -> usize { self.segment.size() }

	fn resize_uninitialized(&mut self, size: usize) -> Result {
		self.segment.resize_uninitialized(size)
	}
}

impl fmt::Debug for Buffer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Buffer({} bytes)", self.segment.size())
	}
}

/// A [`Buffer`] with an inline buffer of `N` bytes, spilling to the heap as
/// needed. Passes everywhere a `&mut Buffer` or `&mut Segment<u8>` is
/// accepted.
#[repr(C)]
pub struct SmallBuffer<const N: usize> {
	buffer: Buffer,
	inline: InlineStorage<u8, N>,
}

impl<const N: usize> SmallBuffer<N> {
	pub fn new() -> Self {
		Self::new_in(SegmentTag::Global)
	}

	pub fn new_in(tag: SegmentTag) -> Self {
		Self {
			buffer: Buffer {
				segment: crate::Vector { segment: Segment::with_inline(tag, N, false) },
			},
			inline: InlineStorage::new(),
		}
	}
}

impl<const N: usize> Default for SmallBuffer<N> {
	fn default() -> Self { Self::new() }
}

impl<const N: usize> GrowableBuffer for SmallBuffer<N> {
	fn data(&self) -> &[u8] { self.buffer.data() }

	fn data_mut(&mut self) -> &mut [u8] { self.buffer.data_mut() }

	fn size(&self) -> usize { self.buffer.size() }

	fn resize_uninitialized(&mut self, size: usize) -> Result {
		self.buffer.resize_uninitialized(size)
	}
}

impl<const N: usize> Deref for SmallBuffer<N> {
	type Target = Buffer;

	fn deref(&self) -> &Buffer { &self.buffer }
}

impl<const N: usize> DerefMut for SmallBuffer<N> {
	fn deref_mut(&mut self) -> &mut Buffer { &mut self.buffer }
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use super::{Buffer, GrowableBuffer, SmallBuffer};

	#[test]
	fn append_and_read_back() {
		let mut buffer = Buffer::new();
		buffer.append(b"hello").unwrap();
		buffer.append(b" world").unwrap();
		assert_eq!(buffer.as_slice(), b"hello world");
	}

	#[test]
	fn growable_interface_resizes() {
		fn fill(out: &mut dyn GrowableBuffer) {
			let old = out.size();
			out.resize_uninitialized(old + 3).unwrap();
			out.data_mut()[old..].copy_from_slice(b"abc");
		}

		let mut buffer = Buffer::from_slice(b"x").unwrap();
		fill(&mut buffer);
		assert_eq!(buffer.data(), b"xabc");

		let mut small = SmallBuffer::<8>::new();
		fill(&mut small);
		assert_eq!(small.data(), b"abc");
		assert!(small.is_inline());
	}

	#[test]
	fn small_buffer_spills() {
		let mut buffer = SmallBuffer::<4>::new();
		buffer.append(b"abcdef").unwrap();
		assert!(!buffer.is_inline());
		assert_eq!(buffer.as_slice(), b"abcdef");
	}
}
