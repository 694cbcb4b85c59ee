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

use std::alloc::{self as system, Layout};
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::mem;
use std::ptr;
use std::sync::RwLock;
use once_cell::sync::Lazy;
use crate::error::{Error, Result};
use crate::vmem::VirtualMemory;

/// A raw memory source consulted by segments when they grow or shrink.
///
/// All methods report failure by returning null; the allocator state is left
/// unchanged on failure. Alignment passed to [`reallocate`][] and
/// [`release`][] must match the alignment the block was allocated with.
///
/// [`reallocate`]: Self::reallocate
/// [`release`]: Self::release
pub trait Allocator {
	/// Allocates a block for `layout`, or returns null.
	fn allocate(&self, layout: Layout) -> *mut u8;

	/// Grows or shrinks `ptr` (allocated with `layout`) to `new_size` bytes,
	/// preserving the first `min(layout.size(), new_size)` bytes. May return
	/// a different pointer, or null on failure.
	fn reallocate(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8;

	/// Returns a block to the allocator. Bump-style allocators may treat this
	/// as a no-op.
	fn release(&self, ptr: *mut u8, layout: Layout);
}

/// Forwards to the system allocator through the process-wide registry stack.
#[derive(Copy, Clone, Debug, Default)]
pub struct GlobalAllocator;

/// Forwards to the system allocator through the per-thread registry stack.
#[derive(Copy, Clone, Debug, Default)]
pub struct ThreadLocalAllocator;

macro_rules! system_allocator {
	($type:ty) => {
		impl Allocator for $type {
			fn allocate(&self, layout: Layout) -> *mut u8 {
				debug_assert!(layout.size() > 0);
				unsafe { system::alloc(layout) }
			}

			fn reallocate(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
				debug_assert!(new_size > 0);
				unsafe { system::realloc(ptr, layout, new_size) }
			}

			fn release(&self, ptr: *mut u8, layout: Layout) {
				unsafe { system::dealloc(ptr, layout) }
			}
		}
	};
}

system_allocator! { GlobalAllocator }
system_allocator! { ThreadLocalAllocator }

/// A bump allocator over a caller-supplied span of bytes.
///
/// Allocation advances an offset; `release` is a no-op except for the most
/// recent allocation, which is rolled back. Exhaustion returns null.
pub struct FixedAllocator<'buf> {
	base: *mut u8,
	len: usize,
	used: Cell<usize>,
	last_offset: Cell<usize>,
	last_size: Cell<usize>,
	_marker: PhantomData<&'buf mut [u8]>,
}

impl<'buf> FixedAllocator<'buf> {
	pub fn new(buffer: &'buf mut [u8]) -> Self {
		Self {
			base: buffer.as_mut_ptr(),
			len: buffer.len(),
			used: Cell::new(0),
			last_offset: Cell::new(usize::MAX),
			last_size: Cell::new(0),
			_marker: PhantomData,
		}
	}

	/// Returns the number of bytes consumed so far.
	pub fn used(&self) -> usize { self.used.get() }

	/// Returns the total number of bytes in the backing span.
	pub fn capacity(&self) -> usize { self.len }

	fn bump(&self, size: usize, align: usize) -> *mut u8 {
		let offset = round_up(self.used.get(), align);
		let Some(end) = offset.checked_add(size) else { return ptr::null_mut() };
		if end > self.len {
			return ptr::null_mut()
		}

		self.used.set(end);
		self.last_offset.set(offset);
		self.last_size.set(size);
		unsafe { self.base.add(offset) }
	}

	fn is_last(&self, ptr: *mut u8) -> bool {
		self.last_offset.get() != usize::MAX &&
			ptr as usize == self.base as usize + self.last_offset.get()
	}
}

impl Allocator for FixedAllocator<'_> {
	fn allocate(&self, layout: Layout) -> *mut u8 {
		self.bump(layout.size(), layout.align())
	}

	fn reallocate(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
		if self.is_last(ptr) {
			// The most recent allocation can grow or shrink in place.
			let offset = self.last_offset.get();
			if offset + new_size > self.len {
				return ptr::null_mut()
			}

			self.used.set(offset + new_size);
			self.last_size.set(new_size);
			return ptr
		}

		if new_size <= layout.size() {
			return ptr
		}

		let new_ptr = self.bump(new_size, layout.align());
		if !new_ptr.is_null() {
			// The old block is abandoned; bump allocators reclaim nothing.
			unsafe {
				ptr::copy_nonoverlapping(ptr, new_ptr, layout.size());
			}
		}
		new_ptr
	}

	fn release(&self, ptr: *mut u8, layout: Layout) {
		if self.is_last(ptr) && layout.size() == self.last_size.get() {
			self.used.set(self.last_offset.get());
			self.last_offset.set(usize::MAX);
		}
	}
}

/// A bump allocator over a [`VirtualMemory`] reservation, committing pages on
/// demand as the high-water mark advances.
///
/// The committed prefix `[data, data + size)` is the live image of everything
/// allocated so far, which is what makes the memory dump workflow possible.
/// `release` is a no-op; dropping unused tail pages goes through
/// [`trim`][Self::trim].
pub struct VirtualAllocator {
	memory: RefCell<VirtualMemory>,
	used: Cell<usize>,
	last_offset: Cell<usize>,
}

impl VirtualAllocator {
	/// Wraps an existing reservation. `memory` must already be reserved.
	pub fn new(memory: VirtualMemory) -> Self {
		Self {
			memory: RefCell::new(memory),
			used: Cell::new(0),
			last_offset: Cell::new(usize::MAX),
		}
	}

	/// Reserves `max_bytes` of address space and wraps it.
	pub fn reserve(max_bytes: usize) -> Result<Self> {
		let mut memory = VirtualMemory::new();
		memory.reserve(max_bytes)?;
		Ok(Self::new(memory))
	}

	/// Returns the base address of the reservation.
	pub fn data(&self) -> *mut u8 { self.memory.borrow().data() }

	/// Returns the high-water mark, the number of bytes handed out so far.
	pub fn size(&self) -> usize { self.used.get() }

	/// Returns the reserved upper bound in bytes.
	pub fn capacity(&self) -> usize { self.memory.borrow().capacity() }

	/// Rolls the high-water mark back to `size` bytes and decommits the tail
	/// pages. Everything allocated past `size` becomes invalid.
	pub fn trim(&self, size: usize) -> Result {
		if size > self.used.get() {
			return Err(Error::virtual_memory())
		}

		self.memory.borrow_mut().decommit(size)?;
		self.used.set(size);
		self.last_offset.set(usize::MAX);
		Ok(())
	}

	/// Unwraps the underlying reservation.
	pub fn into_memory(self) -> VirtualMemory {
		self.memory.into_inner()
	}

	fn bump(&self, size: usize, align: usize) -> *mut u8 {
		let offset = round_up(self.used.get(), align);
		let Some(end) = offset.checked_add(size) else { return ptr::null_mut() };
		let mut memory = self.memory.borrow_mut();
		if end > memory.capacity() || memory.commit(end).is_err() {
			return ptr::null_mut()
		}

		self.used.set(end);
		self.last_offset.set(offset);
		unsafe { memory.data().add(offset) }
	}
}

impl Allocator for VirtualAllocator {
	fn allocate(&self, layout: Layout) -> *mut u8 {
		self.bump(layout.size(), layout.align())
	}

	fn reallocate(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
		let base = self.data() as usize;
		if self.last_offset.get() != usize::MAX && ptr as usize == base + self.last_offset.get() {
			let offset = self.last_offset.get();
			let mut memory = self.memory.borrow_mut();
			if offset + new_size > memory.capacity() || memory.commit(offset + new_size).is_err() {
				return ptr::null_mut()
			}

			self.used.set(offset + new_size);
			return ptr
		}

		if new_size <= layout.size() {
			return ptr
		}

		let new_ptr = self.bump(new_size, layout.align());
		if !new_ptr.is_null() {
			unsafe {
				ptr::copy_nonoverlapping(ptr, new_ptr, layout.size());
			}
		}
		new_ptr
	}

	fn release(&self, _ptr: *mut u8, _layout: Layout) { }
}

/// Selects one of the two registry stacks.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AllocatorKind {
	/// The process-wide stack, visible to all threads. Pushing and popping on
	/// it must be synchronized externally; in practice it is configured at
	/// startup and left alone.
	Global,
	/// The per-thread stack, race-free by construction.
	ThreadLocal,
}

#[derive(Copy, Clone)]
pub(crate) struct CurrentAllocator {
	pub alloc: &'static dyn Allocator,
	pub position_independent: bool,
}

// Entries hold lifetime-erased references kept alive by the scope guard that
// pushed them; the stacks themselves are synchronized or thread-local.
unsafe impl Send for CurrentAllocator { }
unsafe impl Sync for CurrentAllocator { }

static DEFAULT_GLOBAL: GlobalAllocator = GlobalAllocator;
static DEFAULT_THREAD_LOCAL: ThreadLocalAllocator = ThreadLocalAllocator;

static PROCESS_STACK: Lazy<RwLock<Vec<CurrentAllocator>>> = Lazy::new(|| RwLock::new(Vec::new()));

thread_local! {
	static THREAD_STACK: RefCell<Vec<CurrentAllocator>> = RefCell::new(Vec::new());
}

pub(crate) fn current(kind: AllocatorKind) -> CurrentAllocator {
	match kind {
		AllocatorKind::Global => {
			let stack = PROCESS_STACK.read().unwrap_or_else(|e| e.into_inner());
			stack.last().copied().unwrap_or(CurrentAllocator {
				alloc: &DEFAULT_GLOBAL,
				position_independent: false,
			})
		}
		AllocatorKind::ThreadLocal =>
			THREAD_STACK.with(|stack| stack.borrow().last().copied()).unwrap_or(CurrentAllocator {
				alloc: &DEFAULT_THREAD_LOCAL,
				position_independent: false,
			}),
	}
}

/// Returns `true` if the top of this thread's stack is a position-independent
/// scope. Segments constructed while one is active default to self-relative
/// payload references and the thread-local allocator.
pub(crate) fn position_independent_scope_active() -> bool {
	THREAD_STACK.with(|stack| {
		stack.borrow().last().map_or(false, |entry| entry.position_independent)
	})
}

fn push(kind: AllocatorKind, entry: CurrentAllocator) {
	match kind {
		AllocatorKind::Global =>
			PROCESS_STACK.write().unwrap_or_else(|e| e.into_inner()).push(entry),
		AllocatorKind::ThreadLocal =>
			THREAD_STACK.with(|stack| stack.borrow_mut().push(entry)),
	}
}

fn pop(kind: AllocatorKind) {
	match kind {
		AllocatorKind::Global => {
			let popped = PROCESS_STACK.write().unwrap_or_else(|e| e.into_inner()).pop();
			debug_assert!(popped.is_some(), "unbalanced allocator pop");
		}
		AllocatorKind::ThreadLocal => THREAD_STACK.with(|stack| {
			let popped = stack.borrow_mut().pop();
			debug_assert!(popped.is_some(), "unbalanced allocator pop");
		}),
	}
}

/// Runs `f` with the allocator currently on top of the `kind` stack.
pub fn with_current<R>(kind: AllocatorKind, f: impl FnOnce(&dyn Allocator) -> R) -> R {
	f(current(kind).alloc)
}

/// Makes `allocator` the current allocator for `kind` until the scope guard
/// is dropped, restoring the previous top. Guards must be dropped in reverse
/// push order within one thread.
///
/// Containers consult the stack at the moment an allocation is required, not
/// at construction; a container created under one scope may grow under
/// another. That is permitted, but rarely what you want.
pub struct AllocatorScope<'a> {
	kind: AllocatorKind,
	_marker: PhantomData<&'a dyn Allocator>,
}

impl<'a> AllocatorScope<'a> {
	pub fn new(kind: AllocatorKind, allocator: &'a dyn Allocator) -> Self {
		Self::with_flags(kind, allocator, false)
	}

	/// As [`new`][Self::new], additionally marking the scope as
	/// position-independent: segments constructed inside it store their
	/// payload reference as a self-relative offset. Only meaningful for the
	/// thread-local stack.
	pub fn position_independent(kind: AllocatorKind, allocator: &'a dyn Allocator) -> Self {
		Self::with_flags(kind, allocator, true)
	}

	fn with_flags(kind: AllocatorKind, allocator: &'a dyn Allocator, pi: bool) -> Self {
		// Erase the lifetime; the entry is popped before 'a ends because the
		// guard is dropped first.
		let erased = unsafe {
			mem::transmute::<&'a dyn Allocator, &'static dyn Allocator>(allocator)
		};
		push(kind, CurrentAllocator { alloc: erased, position_independent: pi });
		Self { kind, _marker: PhantomData }
	}
}

impl Drop for AllocatorScope<'_> {
	fn drop(&mut self) {
		pop(self.kind);
	}
}

pub(crate) fn round_up(value: usize, align: usize) -> usize {
	debug_assert!(align.is_power_of_two());
	(value + align - 1) & !(align - 1)
}
