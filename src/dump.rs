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

//! Turns a live object graph into a flat, relocatable byte image.
//!
//! A [`DumpArena`] owns a virtual-memory bump allocator. [`DumpArena::build`]
//! places an empty root object at the arena base, then populates it while
//! the arena is the current thread-local allocator in position-independent
//! mode: every segment the closure constructs allocates inside the arena and
//! references its payload by a self-relative offset. Afterwards the bytes
//! `[base, base + high_water)` describe the whole graph, independent of
//! address. They can be appended to any ordinary buffer, persisted, and
//! later reinterpreted read-only with [`view`].
//!
//! There is no framing: no header, no magic number, no version. The layout
//! *is* the in-memory layout of the root type, so changing any participating
//! type between write and read yields garbage. Prepend your own framing if
//! you need any.
//!
//! ## Building discipline
//!
//! Rust moves are bitwise, so a value whose segment already points at a
//! self-relative heap payload must not be moved; the offset would dangle.
//! Two rules keep every move inside the closure safe:
//!
//! - move values into containers only while they are empty or inline (an
//!   empty segment has no payload; an inline payload travels with the
//!   value), then fill them in place, e.g. through
//!   [`Vector::push_default`][crate::Vector::push_default];
//! - reserve a container's capacity before filling its elements with heap
//!   content, so later growth never relocates populated elements.
//!
//! Mutating a re-materialized [`view`] is not possible through the shared
//! reference it returns; to mutate, clone the root out under a normal
//! allocator.

use std::alloc::Layout;
use std::mem;
use std::slice;
use crate::alloc::{Allocator, AllocatorKind, AllocatorScope, VirtualAllocator};
use crate::error::{Error, Result};

/// An arena for building relocatable object graphs; see the module docs.
pub struct DumpArena {
	alloc: VirtualAllocator,
}

impl DumpArena {
	/// Reserves `max_bytes` of address space for the graph.
	pub fn new(max_bytes: usize) -> Result<Self> {
		Ok(Self { alloc: VirtualAllocator::reserve(max_bytes)? })
	}

	/// Constructs a default `T` at the arena base and populates it with
	/// `populate` under the arena's position-independent allocator scope.
	/// Everything the closure allocates lands inside the arena.
	///
	/// The root stays pinned in the arena; it is handed out by reference
	/// and never dropped. Anything it owns is reclaimed wholesale when the
	/// arena goes away.
	pub fn build<T: Default>(
		&mut self,
		populate: impl FnOnce(&mut T) -> Result,
	) -> Result<&mut T> {
		let root = self.alloc.allocate(Layout::new::<T>()) as *mut T;
		if root.is_null() {
			return Err(Error::alloc())
		}

		let scope =
			AllocatorScope::position_independent(AllocatorKind::ThreadLocal, &self.alloc);
		// The root must be constructed inside the scope so its segments
		// adopt self-relative payload references.
		unsafe {
			root.write(T::default());
		}
		let result = populate(unsafe { &mut *root });
		drop(scope);
		result?;
		Ok(unsafe { &mut *root })
	}

	/// Runs `f` with the arena as the current position-independent
	/// thread-local allocator, for building additional objects after
	/// [`build`][Self::build].
	pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
		let scope =
			AllocatorScope::position_independent(AllocatorKind::ThreadLocal, &self.alloc);
		let result = f();
		drop(scope);
		result
	}

	/// The bytes describing everything allocated so far. Copy them anywhere
	/// at the root's alignment and [`view`] the copy.
	pub fn live_bytes(&self) -> &[u8] {
		unsafe { slice::from_raw_parts(self.alloc.data(), self.alloc.size()) }
	}

	/// Returns the number of bytes allocated so far.
	pub fn size(&self) -> usize { self.alloc.size() }

	/// Returns the reserved upper bound in bytes.
	pub fn capacity(&self) -> usize { self.alloc.capacity() }
}

/// Reinterprets the first bytes of `dump` as a read-only `T`.
///
/// # Safety
///
/// `dump` must start with the live bytes of a graph built by
/// [`DumpArena::build`] with the same root type `T`, compiled into this same
/// program, and must be at least `size_of::<T>()` long at `T`'s alignment.
/// The returned reference is read-only by construction; do not mutate
/// through interior pointers.
pub unsafe fn view<T>(dump: &[u8]) -> &T {
	assert!(dump.len() >= mem::size_of::<T>());
	assert_eq!(dump.as_ptr() as usize % mem::align_of::<T>(), 0);
	&*(dump.as_ptr() as *const T)
}
