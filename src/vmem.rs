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

use std::ptr;
use cfg_if::cfg_if;
use crate::error::{Error, Result};

/// A contiguous slice of reserved virtual address space, committing only a
/// prefix of it to physical memory.
///
/// On 64-bit systems the address space is large enough that reserving a big
/// upper bound up front is cheap. The reserved base address never changes, so
/// anything placed inside the committed prefix keeps its address as the
/// committed prefix grows or shrinks. Memory must be committed before it is
/// read or written.
pub struct VirtualMemory {
	base: *mut u8,
	reserved: usize,
	committed: usize,
}

// The raw base pointer is exclusively owned; moving the struct between
// threads is fine, shared mutation is not.
unsafe impl Send for VirtualMemory { }

impl Default for VirtualMemory {
	fn default() -> Self { Self::new() }
}

impl VirtualMemory {
	/// Creates an object with no reservation.
	pub const fn new() -> Self {
		Self {
			base: ptr::null_mut(),
			reserved: 0,
			committed: 0,
		}
	}

	/// Returns the system memory page size in bytes.
	pub fn page_size() -> usize { sys::page_size() }

	/// Rounds `size` up to the next multiple of the system page size.
	pub fn round_up_to_page_size(size: usize) -> usize {
		let page = Self::page_size();
		(size + page - 1) / page * page
	}

	/// Returns the number of currently committed bytes.
	pub fn size(&self) -> usize { self.committed }

	/// Returns the number of currently reserved bytes.
	pub fn capacity(&self) -> usize { self.reserved }

	/// Returns the start of the reserved range, or null without a reservation.
	pub fn data(&self) -> *mut u8 { self.base }

	/// Reserves at least `max_bytes` of virtual address space, rounded up to
	/// the page size. No physical pages are charged until [`commit`][].
	///
	/// Fails without changing state when a reservation already exists or the
	/// system refuses the mapping.
	///
	/// [`commit`]: Self::commit
	pub fn reserve(&mut self, max_bytes: usize) -> Result {
		if !self.base.is_null() || max_bytes == 0 {
			return Err(Error::virtual_memory())
		}

		let rounded = Self::round_up_to_page_size(max_bytes);
		let base = sys::reserve(rounded)?;
		self.base = base;
		self.reserved = rounded;
		self.committed = 0;
		Ok(())
	}

	/// Ensures the first `size_bytes` of the reservation are backed by
	/// physical memory, rounding up to whole pages. Idempotent when the
	/// committed prefix already covers the request.
	pub fn commit(&mut self, size_bytes: usize) -> Result {
		if size_bytes > self.reserved {
			return Err(Error::virtual_memory())
		}

		let rounded = Self::round_up_to_page_size(size_bytes);
		if rounded <= self.committed {
			return Ok(())
		}

		sys::commit(self.base, self.committed, rounded)?;
		self.committed = rounded;
		Ok(())
	}

	/// Releases physical pages beyond the first `size_bytes`. The addresses
	/// stay reserved and may be committed again later.
	pub fn decommit(&mut self, size_bytes: usize) -> Result {
		if size_bytes > self.reserved {
			return Err(Error::virtual_memory())
		}

		let rounded = Self::round_up_to_page_size(size_bytes);
		if rounded >= self.committed {
			return Ok(())
		}

		sys::decommit(self.base, rounded, self.committed)?;
		self.committed = rounded;
		Ok(())
	}

	/// Returns the entire reservation to the system. The object reverts to
	/// the "no reservation" state and may be reused.
	pub fn release(&mut self) {
		if !self.base.is_null() {
			sys::release(self.base, self.reserved);
			self.base = ptr::null_mut();
			self.reserved = 0;
			self.committed = 0;
		}
	}
}

impl Drop for VirtualMemory {
	fn drop(&mut self) {
		self.release();
	}
}

cfg_if! {
	if #[cfg(unix)] {
		mod sys {
			use once_cell::sync::Lazy;
			use crate::error::{Error, Result};

			static PAGE_SIZE: Lazy<usize> = Lazy::new(|| {
				let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
				if size > 0 { size as usize } else { 4096 }
			});

			pub fn page_size() -> usize { *PAGE_SIZE }

			pub fn reserve(len: usize) -> Result<*mut u8> {
				let base = unsafe {
					libc::mmap(
						std::ptr::null_mut(),
						len,
						libc::PROT_NONE,
						libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
						-1,
						0,
					)
				};

				if base == libc::MAP_FAILED {
					Err(Error::virtual_memory())
				} else {
					Ok(base as *mut u8)
				}
			}

			pub fn commit(base: *mut u8, _old_len: usize, new_len: usize) -> Result {
				let result = unsafe {
					libc::mprotect(
						base as *mut libc::c_void,
						new_len,
						libc::PROT_READ | libc::PROT_WRITE,
					)
				};

				if result == 0 { Ok(()) } else { Err(Error::virtual_memory()) }
			}

			pub fn decommit(base: *mut u8, keep_len: usize, old_len: usize) -> Result {
				let tail = unsafe { base.add(keep_len) } as *mut libc::c_void;
				let tail_len = old_len - keep_len;
				let result = unsafe {
					// Returning the pages first keeps the RSS accounting
					// honest before the protection flips back to none.
					libc::madvise(tail, tail_len, libc::MADV_DONTNEED);
					libc::mprotect(tail, tail_len, libc::PROT_NONE)
				};

				if result == 0 { Ok(()) } else { Err(Error::virtual_memory()) }
			}

			pub fn release(base: *mut u8, len: usize) {
				unsafe {
					libc::munmap(base as *mut libc::c_void, len);
				}
			}
		}
	} else {
		// Fallback without page-level control: the whole reservation is
		// committed through the system allocator and commit/decommit only
		// track the accessible prefix.
		mod sys {
			use std::alloc::{alloc_zeroed, dealloc, Layout};
			use crate::error::{Error, Result};

			pub fn page_size() -> usize { 4096 }

			fn layout(len: usize) -> Layout {
				Layout::from_size_align(len, page_size()).expect("reservation layout")
			}

			pub fn reserve(len: usize) -> Result<*mut u8> {
				let base = unsafe { alloc_zeroed(layout(len)) };
				if base.is_null() {
					Err(Error::virtual_memory())
				} else {
					Ok(base)
				}
			}

			pub fn commit(_base: *mut u8, _old_len: usize, _new_len: usize) -> Result {
				Ok(())
			}

			pub fn decommit(_base: *mut u8, _keep_len: usize, _old_len: usize) -> Result {
				Ok(())
			}

			pub fn release(base: *mut u8, len: usize) {
				unsafe {
					dealloc(base, layout(len));
				}
			}
		}
	}
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use super::VirtualMemory;

	#[test]
	fn reserve_commit_decommit_release() {
		let page = VirtualMemory::page_size();
		let mut memory = VirtualMemory::new();
		memory.reserve(page * 8).unwrap();
		assert_eq!(memory.capacity(), page * 8);
		assert_eq!(memory.size(), 0);

		memory.commit(1).unwrap();
		assert_eq!(memory.size(), page, "commit rounds up to a whole page");

		unsafe {
			memory.data().write(0xAB);
			assert_eq!(memory.data().read(), 0xAB);
		}

		memory.commit(page * 3).unwrap();
		assert_eq!(memory.size(), page * 3);

		// Already covered; nothing changes.
		memory.commit(page).unwrap();
		assert_eq!(memory.size(), page * 3);

		memory.decommit(page).unwrap();
		assert_eq!(memory.size(), page);
		assert_eq!(memory.capacity(), page * 8);

		// The decommitted range can be committed again.
		memory.commit(page * 2).unwrap();
		assert_eq!(memory.size(), page * 2);

		memory.release();
		assert_eq!(memory.capacity(), 0);
		assert_eq!(memory.size(), 0);
	}

	#[test]
	fn commit_beyond_reservation_fails() {
		let page = VirtualMemory::page_size();
		let mut memory = VirtualMemory::new();
		memory.reserve(page).unwrap();
		assert!(memory.commit(page + 1).is_err());
		assert_eq!(memory.size(), 0, "failed commit leaves state unchanged");
	}

	#[test]
	fn double_reserve_fails() {
		let mut memory = VirtualMemory::new();
		memory.reserve(1024).unwrap();
		let capacity = memory.capacity();
		assert!(memory.reserve(1024).is_err());
		assert_eq!(memory.capacity(), capacity);
	}

	#[test]
	fn addresses_are_stable_across_commit_growth() {
		let page = VirtualMemory::page_size();
		let mut memory = VirtualMemory::new();
		memory.reserve(page * 64).unwrap();
		memory.commit(page).unwrap();
		let base = memory.data();
		memory.commit(page * 64).unwrap();
		assert_eq!(memory.data(), base);
	}
}
