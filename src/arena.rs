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
use std::mem::MaybeUninit;
use crate::error::{Error, Result};
use crate::vector::Vector;

/// An opaque key into an [`Arena`], stable across unrelated insert and
/// remove operations on other slots. After the entry it points at is
/// removed, the handle goes stale and resolves to nothing, even if the slot
/// is later reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle {
	index: u32,
	generation: u32,
}

const OCCUPIED: u32 = u32::MAX;

struct Slot<T> {
	generation: u32,
	// OCCUPIED, or anything else for a free slot. The free set is implicit;
	// reuse picks the lowest free index.
	state: u32,
	value: MaybeUninit<T>,
}

impl<T> Slot<T> {
	fn empty() -> Self {
		Self {
			generation: 0,
			state: 0,
			value: MaybeUninit::uninit(),
		}
	}

	fn is_occupied(&self) -> bool { self.state == OCCUPIED }
}

impl<T> Drop for Slot<T> {
	fn drop(&mut self) {
		if self.is_occupied() {
			unsafe {
				self.value.assume_init_drop();
			}
		}
	}
}

/// A fixed-capacity slot container whose keys survive unrelated mutations.
///
/// Every slot carries a generation counter; removal bumps it, so a stale
/// [`Handle`] can never alias a different live entry. Freed slots are reused
/// lowest index first. Iteration is in slot order.
pub struct Arena<T> {
	slots: Vector<Slot<T>>,
	free_hint: u32,
	len: u32,
}

impl<T> Arena<T> {
	/// Creates an arena with room for exactly `capacity` entries.
	pub fn with_capacity(capacity: usize) -> Result<Self> {
		let mut slots = Vector::with_capacity(capacity)?;
		for _ in 0..capacity {
			slots.push_back(Slot::empty())?;
		}
		Ok(Self { slots, free_hint: 0, len: 0 })
	}

	/// Returns the fixed number of slots.
	pub fn capacity(&self) -> usize { self.slots.size() }

	/// Returns the number of live entries.
	pub fn size(&self) -> usize { self.len as usize }

	/// Returns `true` if the arena holds no entries.
	pub fn is_empty(&self) -> bool { self.len == 0 }

	/// Places `value` in the lowest free slot and returns its handle. Fails
	/// when every slot is occupied.
	pub fn insert(&mut self, value: T) -> Result<Handle> {
		let slots = self.slots.as_mut_slice();
		let start = self.free_hint as usize;
		let index = (start..slots.len())
			.find(|&index| !slots[index].is_occupied())
			.ok_or(Error::bounded())?;

		let slot = &mut slots[index];
		slot.state = OCCUPIED;
		slot.value.write(value);
		self.free_hint = index as u32 + 1;
		self.len += 1;
		Ok(Handle { index: index as u32, generation: slot.generation })
	}

	/// Removes and returns the entry behind `handle`. Stale or invalid
	/// handles return `None` and change nothing.
	pub fn remove(&mut self, handle: Handle) -> Option<T> {
		let slot = self.slots.as_mut_slice().get_mut(handle.index as usize)?;
		if !slot.is_occupied() || slot.generation != handle.generation {
			return None
		}

		slot.state = 0;
		// A bumped generation permanently invalidates outstanding handles to
		// this slot.
		slot.generation = slot.generation.wrapping_add(1);
		self.len -= 1;
		self.free_hint = self.free_hint.min(handle.index);
		Some(unsafe { slot.value.assume_init_read() })
	}

	/// Resolves `handle` to its entry, or `None` when stale or invalid.
	pub fn get(&self, handle: Handle) -> Option<&T> {
		let slot = self.slots.as_slice().get(handle.index as usize)?;
		if slot.is_occupied() && slot.generation == handle.generation {
			Some(unsafe { slot.value.assume_init_ref() })
		} else {
			None
		}
	}

	/// Resolves `handle` to its entry writable, or `None` when stale or
	/// invalid.
	pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
		let slot = self.slots.as_mut_slice().get_mut(handle.index as usize)?;
		if slot.is_occupied() && slot.generation == handle.generation {
			Some(unsafe { slot.value.assume_init_mut() })
		} else {
			None
		}
	}

	/// Iterates live entries in slot order.
	pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
		self.slots
			.as_slice()
			.iter()
			.enumerate()
			.filter(|(_, slot)| slot.is_occupied())
			.map(|(index, slot)| {
				let handle = Handle { index: index as u32, generation: slot.generation };
				(handle, unsafe { slot.value.assume_init_ref() })
			})
	}

	/// Removes every entry. Slot generations are bumped, so all outstanding
	/// handles go stale.
	pub fn clear(&mut self) {
		for slot in self.slots.as_mut_slice() {
			if slot.is_occupied() {
				slot.state = 0;
				slot.generation = slot.generation.wrapping_add(1);
				unsafe {
					slot.value.assume_init_drop();
				}
			}
		}
		self.free_hint = 0;
		self.len = 0;
	}
}

impl<T: fmt::Debug> fmt::Debug for Arena<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_map().entries(self.iter()).finish()
	}
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use super::Arena;

	#[test]
	fn insert_get_remove() {
		let mut arena = Arena::with_capacity(4).unwrap();
		let a = arena.insert("a").unwrap();
		let b = arena.insert("b").unwrap();
		assert_eq!(arena.size(), 2);
		assert_eq!(arena.get(a), Some(&"a"));
		assert_eq!(arena.get(b), Some(&"b"));

		assert_eq!(arena.remove(a), Some("a"));
		assert_eq!(arena.get(a), None);
		assert_eq!(arena.size(), 1);
		assert_eq!(arena.remove(a), None, "stale handle removes nothing");
	}

	#[test]
	fn stale_handle_never_aliases_reused_slot() {
		let mut arena = Arena::with_capacity(4).unwrap();
		let _first = arena.insert(1).unwrap();
		let second = arena.insert(2).unwrap();

		assert_eq!(arena.remove(second), Some(2));
		let third = arena.insert(3).unwrap();

		// The freed slot is reused, but the old handle stays dead.
		assert_eq!(arena.get(second), None);
		assert_eq!(arena.get(third), Some(&3));
	}

	#[test]
	fn freed_slots_are_reused_lowest_first() {
		let mut arena = Arena::with_capacity(8).unwrap();
		let handles: Vec<_> = (0..5).map(|value| arena.insert(value).unwrap()).collect();

		arena.remove(handles[3]);
		arena.remove(handles[1]);

		let replacement = arena.insert(10).unwrap();
		assert_eq!(arena.get(replacement), Some(&10));

		let values: Vec<_> = arena.iter().map(|(_, value)| *value).collect();
		assert_eq!(values, [0, 10, 2, 4], "slot 1 is refilled before slot 3");
	}

	#[test]
	fn insert_fails_when_full() {
		let mut arena = Arena::with_capacity(2).unwrap();
		arena.insert(1).unwrap();
		arena.insert(2).unwrap();
		assert!(arena.insert(3).is_err());
		assert_eq!(arena.size(), 2);
	}

	#[test]
	fn handles_survive_unrelated_mutations() {
		let mut arena = Arena::with_capacity(8).unwrap();
		let keep = arena.insert("keep").unwrap();
		let churn: Vec<_> = (0..5).map(|_| arena.insert("churn").unwrap()).collect();

		for handle in churn {
			arena.remove(handle);
			arena.insert("again").unwrap();
		}
		assert_eq!(arena.get(keep), Some(&"keep"));
	}

	#[test]
	fn clear_invalidates_everything() {
		let mut arena = Arena::with_capacity(4).unwrap();
		let a = arena.insert(String::from("x")).unwrap();
		arena.clear();
		assert!(arena.is_empty());
		assert_eq!(arena.get(a), None);
	}
}
