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

/// A contiguous sequence of heap allocated elements, growing through the
/// current allocator of its tag's registry stack.
///
/// Everywhere a `&mut Segment<T>` is accepted, a [`SmallVector`] or an
/// [`Array`] can be passed instead; the callee cannot observe which variant
/// backs the storage.
#[repr(C)]
pub struct Vector<T> {
	pub(crate) segment: Segment<T>,
}

impl<T> Vector<T> {
	/// Creates an empty vector allocating from the process-wide stack.
	pub fn new() -> Self {
		Self::new_in(SegmentTag::Global)
	}

	/// Creates an empty vector allocating from the stack selected by `tag`.
	pub fn new_in(tag: SegmentTag) -> Self {
		Self { segment: Segment::new(tag) }
	}

	/// Creates a vector with at least `capacity` reserved elements.
	pub fn with_capacity(capacity: usize) -> Result<Self> {
		let mut vector = Self::new();
		vector.reserve(capacity)?;
		Ok(vector)
	}

	/// Creates a vector holding copies of `items`.
	pub fn from_slice(items: &[T]) -> Result<Self>
	where
		T: Clone,
	{
		let mut vector = Self::new();
		vector.append(items)?;
		Ok(vector)
	}

	/// Appends a default-constructed element and returns a reference to it,
	/// for populating the element in place. This is the building block for
	/// filling containers inside a position-independent scope, where moving
	/// a non-empty heap-backed value would break its payload offset.
	pub fn push_default(&mut self) -> Result<&mut T>
	where
		T: Default,
	{
		self.segment.push_back(T::default())?;
		let index = self.segment.size() - 1;
		Ok(&mut self.segment.as_mut_slice()[index])
	}
}

impl<T> Default for Vector<T> {
	fn default() -> Self { Self::new() }
}

impl<T> Deref for Vector<T> {
	type Target = Segment<T>;

	fn deref(&self) -> &Segment<T> { &self.segment }
}

impl<T> DerefMut for Vector<T> {
	fn deref_mut(&mut self) -> &mut Segment<T> { &mut self.segment }
}

impl<T: Clone> Clone for Vector<T> {
	fn clone(&self) -> Self {
		let mut vector = Self::new_in(self.segment.tag());
		let appended = vector.append(self.as_slice());
		assert!(appended.is_ok(), "allocation failed while cloning");
		vector
	}
}

impl<T: PartialEq> PartialEq for Vector<T> {
	fn eq(&self, other: &Self) -> bool { self.segment == other.segment }
}

impl<T: Eq> Eq for Vector<T> { }

impl<T: fmt::Debug> fmt::Debug for Vector<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.segment.fmt(f)
	}
}

/// A [`Vector`] with an inline buffer for `N` elements, falling back to the
/// heap once the inline capacity is exceeded. [`shrink_to_fit`] migrates the
/// payload back when the live elements fit again.
///
/// [`shrink_to_fit`]: Segment::shrink_to_fit
#[repr(C)]
pub struct SmallVector<T, const N: usize> {
	vector: Vector<T>,
	inline: InlineStorage<T, N>,
}

impl<T, const N: usize> SmallVector<T, N> {
	pub fn new() -> Self {
		Self::new_in(SegmentTag::Global)
	}

	pub fn new_in(tag: SegmentTag) -> Self {
		Self {
			vector: Vector { segment: Segment::with_inline(tag, N, false) },
			inline: InlineStorage::new(),
		}
	}

	pub fn from_slice(items: &[T]) -> Result<Self>
	where
		T: Clone,
	{
		let mut vector = Self::new();
		vector.append(items)?;
		Ok(vector)
	}
}

impl<T, const N: usize> Default for SmallVector<T, N> {
	fn default() -> Self { Self::new() }
}

impl<T, const N: usize> Deref for SmallVector<T, N> {
	type Target = Vector<T>;

	fn deref(&self) -> &Vector<T> { &self.vector }
}

impl<T, const N: usize> DerefMut for SmallVector<T, N> {
	fn deref_mut(&mut self) -> &mut Vector<T> { &mut self.vector }
}

impl<T: Clone, const N: usize> Clone for SmallVector<T, N> {
	fn clone(&self) -> Self {
		let mut vector = Self::new_in(self.tag());
		let appended = vector.append(self.as_slice());
		assert!(appended.is_ok(), "allocation failed while cloning");
		vector
	}
}

impl<T: PartialEq, const N: usize> PartialEq for SmallVector<T, N> {
	fn eq(&self, other: &Self) -> bool { self.vector == other.vector }
}

impl<T: Eq, const N: usize> Eq for SmallVector<T, N> { }

impl<T: fmt::Debug, const N: usize> fmt::Debug for SmallVector<T, N> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.vector.fmt(f)
	}
}

/// A bounded sequence whose capacity is its inline buffer. Operations that
/// would exceed `N` elements fail instead of growing; the heap is never
/// touched.
#[repr(C)]
pub struct Array<T, const N: usize> {
	segment: Segment<T>,
	inline: InlineStorage<T, N>,
}

impl<T, const N: usize> Array<T, N> {
	pub fn new() -> Self {
		Self {
			segment: Segment::with_inline(SegmentTag::Global, N, true),
			inline: InlineStorage::new(),
		}
	}

	/// Creates an array holding copies of `items`, failing when they exceed
	/// the bounded capacity.
	pub fn from_slice(items: &[T]) -> Result<Self>
	where
		T: Clone,
	{
		let mut array = Self::new();
		array.append(items)?;
		Ok(array)
	}
}

impl<T, const N: usize> Default for Array<T, N> {
	fn default() -> Self { Self::new() }
}

impl<T, const N: usize> Deref for Array<T, N> {
	type Target = Segment<T>;

	fn deref(&self) -> &Segment<T> { &self.segment }
}

impl<T, const N: usize> DerefMut for Array<T, N> {
	fn deref_mut(&mut self) -> &mut Segment<T> { &mut self.segment }
}

impl<T: Clone, const N: usize> Clone for Array<T, N> {
	fn clone(&self) -> Self {
		let mut array = Self::new();
		let appended = array.append(self.as_slice());
		assert!(appended.is_ok(), "bounded capacity exceeded while cloning");
		array
	}
}

impl<T: PartialEq, const N: usize> PartialEq for Array<T, N> {
	fn eq(&self, other: &Self) -> bool { self.segment == other.segment }
}

impl<T: Eq, const N: usize> Eq for Array<T, N> { }

impl<T: fmt::Debug, const N: usize> fmt::Debug for Array<T, N> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.segment.fmt(f)
	}
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use crate::segment::Segment;
	use super::{Array, SmallVector, Vector};

	#[test]
	fn small_vector_spills_to_heap() {
		let mut vector = SmallVector::<i32, 3>::new();
		assert!(vector.is_inline());
		assert_eq!(vector.capacity(), 3);

		for value in [1, 2, 3] {
			vector.push_back(value).unwrap();
		}
		assert!(vector.is_inline(), "inline until the buffer overflows");

		vector.push_back(4).unwrap();
		assert_eq!(vector.size(), 4);
		assert!(vector.capacity() >= 4);
		assert!(!vector.is_inline());
		assert!(vector.has_inline_storage());
		assert_eq!(vector.as_slice(), &[1, 2, 3, 4]);
	}

	#[test]
	fn small_vector_shrinks_back_inline() {
		let mut vector = SmallVector::<i32, 3>::new();
		vector.append(&[1, 2, 3, 4]).unwrap();
		assert!(!vector.is_inline());

		assert_eq!(vector.pop_back(), Some(4));
		vector.shrink_to_fit().unwrap();
		assert_eq!(vector.size(), 3);
		assert_eq!(vector.capacity(), 3);
		assert!(vector.is_inline());
		assert_eq!(vector.as_slice(), &[1, 2, 3]);
	}

	#[test]
	fn small_vector_moves_with_inline_payload() {
		let mut vector = SmallVector::<String, 4>::new();
		vector.push_back("a".to_string()).unwrap();
		vector.push_back("b".to_string()).unwrap();

		// The inline payload is addressed from the header, so a plain move
		// carries it along.
		let moved = vector;
		assert_eq!(moved.as_slice(), &["a".to_string(), "b".to_string()]);
		assert!(moved.is_inline());
	}

	#[test]
	fn array_fails_at_capacity() {
		let mut array = Array::<u8, 2>::new();
		array.push_back(10).unwrap();
		array.push_back(20).unwrap();

		assert!(array.push_back(30).is_err());
		assert_eq!(array.as_slice(), &[10, 20], "failed push leaves state unchanged");
		assert!(array.reserve(3).is_err());
		assert!(array.insert(1, &[9, 9]).is_err());
		assert_eq!(array.as_slice(), &[10, 20]);
	}

	#[test]
	fn variants_are_interchangeable_through_segment() {
		fn sum(segment: &mut Segment<i32>) -> i32 {
			segment.push_back(0).ok();
			segment.iter().sum()
		}

		let mut plain = Vector::from_slice(&[1, 2]).unwrap();
		let mut small = SmallVector::<i32, 8>::from_slice(&[1, 2]).unwrap();
		let mut bounded = Array::<i32, 8>::from_slice(&[1, 2]).unwrap();

		assert_eq!(sum(&mut plain), 3);
		assert_eq!(sum(&mut small), 3);
		assert_eq!(sum(&mut bounded), 3);
	}

	#[test]
	fn clone_preserves_contents() {
		let vector = Vector::from_slice(&[1, 2, 3]).unwrap();
		let copy = vector.clone();
		assert_eq!(vector, copy);

		let small = SmallVector::<i32, 2>::from_slice(&[5, 6, 7]).unwrap();
		let copy = small.clone();
		assert_eq!(small, copy);
	}

	#[test]
	fn push_default_builds_in_place() {
		let mut vector = Vector::<Vector<i32>>::new();
		let inner = vector.push_default().unwrap();
		inner.append(&[1, 2, 3]).unwrap();
		assert_eq!(vector.size(), 1);
		assert_eq!(vector.as_slice()[0].as_slice(), &[1, 2, 3]);
	}
}
