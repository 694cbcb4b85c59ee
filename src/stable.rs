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

use std::marker::PhantomData;
use std::mem;
use std::ptr;
use std::slice;
use crate::error::{Error, Result};
use crate::vmem::VirtualMemory;

/// A growable array that never moves its elements in memory.
///
/// Elements live directly in a [`VirtualMemory`] reservation; growing
/// commits more pages and shrinking decommits them, while the base address
/// stays put. References and pointers into the array therefore stay valid
/// across every resize up to the reserved bound.
pub struct StableArray<T> {
	memory: VirtualMemory,
	len: usize,
	cap: usize,
	_marker: PhantomData<T>,
}

impl<T> StableArray<T> {
	/// Creates an array with no reservation. [`reserve`][Self::reserve] must
	/// be called before elements can be added.
	pub fn new() -> Self {
		Self {
			memory: VirtualMemory::new(),
			len: 0,
			cap: 0,
			_marker: PhantomData,
		}
	}

	/// Creates an array with address space reserved for `max_elements`.
	pub fn with_capacity(max_elements: usize) -> Result<Self> {
		let mut array = Self::new();
		array.reserve(max_elements)?;
		Ok(array)
	}

	/// Reserves address space for up to `max_elements`. Succeeds trivially
	/// when the current reservation already covers the request; an existing
	/// smaller reservation cannot be extended without moving, so that fails.
	pub fn reserve(&mut self, max_elements: usize) -> Result {
		if max_elements <= self.cap {
			return Ok(())
		}
		if self.cap != 0 {
			return Err(Error::virtual_memory())
		}

		self.memory.reserve(max_elements * mem::size_of::<T>())?;
		self.cap = max_elements;
		Ok(())
	}

	/// Returns the number of reserved elements (consuming address space).
	pub fn capacity(&self) -> usize { self.cap }

	/// Returns the number of live elements.
	pub fn size(&self) -> usize { self.len }

	/// Returns `true` if the array holds no elements.
	pub fn is_empty(&self) -> bool { self.len == 0 }

	/// Returns the number of reserved bytes (consuming address space only).
	pub fn virtual_bytes_capacity(&self) -> usize { self.memory.capacity() }

	/// Returns the number of committed bytes (consuming physical memory).
	pub fn virtual_bytes_size(&self) -> usize { self.memory.size() }

	pub fn data(&self) -> *const T { self.memory.data() as *const T }

	pub fn as_slice(&self) -> &[T] {
		if self.len == 0 {
			return &[]
		}

		unsafe { slice::from_raw_parts(self.memory.data() as *const T, self.len) }
	}

	pub fn as_mut_slice(&mut self) -> &mut [T] {
		if self.len == 0 {
			return &mut []
		}

		unsafe { slice::from_raw_parts_mut(self.memory.data() as *mut T, self.len) }
	}

	/// Grows or shrinks to exactly `size` elements, committing or
	/// decommitting pages as needed. New slots are default-constructed;
	/// removed slots are dropped.
	pub fn resize(&mut self, size: usize) -> Result
	where
		T: Default,
	{
		let old = self.len;
		if size < old {
			unsafe {
				let tail = (self.memory.data() as *mut T).add(size);
				ptr::drop_in_place(slice::from_raw_parts_mut(tail, old - size));
			}
			// Elements are gone either way; a failed decommit only keeps the
			// pages resident.
			self.len = size;
			return self.memory.decommit(size * mem::size_of::<T>())
		}

		self.commit_elements(size)?;
		unsafe {
			let base = self.memory.data() as *mut T;
			for index in old..size {
				base.add(index).write(T::default());
			}
		}
		self.len = size;
		Ok(())
	}

	/// Sets the size to exactly `size` without constructing or dropping
	/// elements. New slots hold arbitrary bytes.
	pub fn resize_uninitialized(&mut self, size: usize) -> Result
	where
		T: bytemuck::Pod,
	{
		if size < self.len {
			self.len = size;
			return self.memory.decommit(size * mem::size_of::<T>())
		}

		self.commit_elements(size)?;
		self.len = size;
		Ok(())
	}

	fn commit_elements(&mut self, count: usize) -> Result {
		if count > self.cap {
			return Err(Error::virtual_memory())
		}

		self.memory.commit(count * mem::size_of::<T>())
	}

	/// Appends an element, committing another page when the current prefix
	/// is full. Fails at the reserved bound.
	pub fn push_back(&mut self, value: T) -> Result {
		self.commit_elements(self.len + 1)?;
		unsafe {
			(self.memory.data() as *mut T).add(self.len).write(value);
		}
		self.len += 1;
		Ok(())
	}

	/// Removes and returns the last element.
	pub fn pop_back(&mut self) -> Option<T> {
		if self.len == 0 {
			return None
		}

		self.len -= 1;
		Some(unsafe { (self.memory.data() as *const T).add(self.len).read() })
	}

	/// Drops every element. Committed pages are kept for reuse.
	pub fn clear(&mut self) {
		let len = self.len;
		self.len = 0;
		if mem::needs_drop::<T>() && len > 0 {
			unsafe {
				let base = self.memory.data() as *mut T;
				ptr::drop_in_place(slice::from_raw_parts_mut(base, len));
			}
		}
	}

	/// Returns the entire reservation to the system without dropping
	/// elements; use [`clear`][Self::clear] first when element destructors
	/// matter. The array reverts to the unreserved state.
	pub fn release(&mut self) {
		self.memory.release();
		self.len = 0;
		self.cap = 0;
	}

	/// Drops every element, then releases the reservation.
	pub fn clear_and_release(&mut self) {
		self.clear();
		self.release();
	}
}

impl<T> Default for StableArray<T> {
	fn default() -> Self { Self::new() }
}

impl<T> Drop for StableArray<T> {
	fn drop(&mut self) {
		self.clear_and_release();
	}
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use super::StableArray;

	#[test]
	fn elements_never_move() {
		let mut array = StableArray::<u64>::with_capacity(1 << 16).unwrap();
		array.push_back(7).unwrap();
		let first = &array.as_slice()[0] as *const u64;

		for value in 0..10_000u64 {
			array.push_back(value).unwrap();
		}
		assert_eq!(&array.as_slice()[0] as *const u64, first);
		assert_eq!(array.as_slice()[0], 7);
		assert_eq!(array.size(), 10_001);
	}

	#[test]
	fn resize_constructs_and_drops() {
		let mut array = StableArray::<String>::with_capacity(64).unwrap();
		array.resize(3).unwrap();
		assert_eq!(array.as_slice(), &["", "", ""]);

		array.as_mut_slice()[1].push_str("middle");
		array.resize(2).unwrap();
		assert_eq!(array.as_slice(), &["", "middle"]);
	}

	#[test]
	fn push_fails_at_reserved_bound() {
		let mut array = StableArray::<u8>::with_capacity(64).unwrap();
		array.resize_uninitialized(array.capacity()).unwrap();
		assert!(array.push_back(1).is_err());
		assert_eq!(array.size(), 64);
	}

	#[test]
	fn shrink_decommits_pages() {
		let mut array = StableArray::<u8>::with_capacity(1 << 20).unwrap();
		array.resize_uninitialized(1 << 20).unwrap();
		let committed = array.virtual_bytes_size();
		array.resize_uninitialized(1).unwrap();
		assert!(array.virtual_bytes_size() < committed);
		assert_eq!(array.size(), 1);
	}
}
