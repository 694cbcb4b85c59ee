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
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A primitive usable as the numeric value of a [`StrongId`]: it has a
/// sentinel marking "absent" and a successor for scanning to an unused value.
pub trait IdValue: Copy + Eq {
	const INVALID: Self;
	const FIRST: Self;

	fn next(self) -> Self;
}

macro_rules! signed_id_value {
	($($type:ty)+) => {$(
		impl IdValue for $type {
			const INVALID: Self = -1;
			const FIRST: Self = 0;

			fn next(self) -> Self { self + 1 }
		}
	)+};
}

macro_rules! unsigned_id_value {
	($($type:ty)+) => {$(
		impl IdValue for $type {
			const INVALID: Self = <$type>::MAX;
			const FIRST: Self = 0;

			fn next(self) -> Self { self + 1 }
		}
	)+};
}

signed_id_value! { i8 i16 i32 i64 }
unsigned_id_value! { u8 u16 u32 u64 }

/// A key type that can produce a value not yet present in a collection,
/// implemented by [`StrongId`] and usable by
/// [`VectorMap::insert_value_unique_key`][].
///
/// [`VectorMap::insert_value_unique_key`]: crate::VectorMap::insert_value_unique_key
pub trait UniqueId: Sized + PartialEq {
	/// Returns the lowest candidate for which `taken` reports `false`.
	fn generate_unique(taken: impl FnMut(&Self) -> bool) -> Self;
}

/// A strongly typed identifier: an integer wrapped with a tag type so two
/// IDs with the same numeric value but different tags never compare or
/// assign to each other. The default state is the invalid sentinel.
///
/// The tag is a phantom; any empty type works:
///
/// ```
/// use keel::StrongId;
///
/// enum WindowTag { }
/// type WindowId = StrongId<WindowTag>;
///
/// let id = WindowId::new(3);
/// assert!(id.is_valid());
/// assert_ne!(id, WindowId::invalid());
/// ```
pub struct StrongId<Tag, I: IdValue = i32> {
	value: I,
	_tag: PhantomData<fn() -> Tag>,
}

impl<Tag, I: IdValue> StrongId<Tag, I> {
	/// Wraps a numeric value explicitly.
	pub const fn new(value: I) -> Self {
		Self { value, _tag: PhantomData }
	}

	/// Returns the invalid sentinel ID.
	pub const fn invalid() -> Self {
		Self::new(I::INVALID)
	}

	/// Returns the wrapped numeric value.
	pub fn value(&self) -> I { self.value }

	/// Returns `true` unless this is the invalid sentinel.
	pub fn is_valid(&self) -> bool { self.value != I::INVALID }

	/// Scans for the lowest ID not contained in `collection`, where
	/// `collection` is any lookup closure such as
	/// `|id| map.contains(id)`. Intended for small contexts; the scan is
	/// linear in the number of taken IDs.
	pub fn generate_unique_key(mut collection: impl FnMut(&Self) -> bool) -> Self {
		let mut candidate = Self::new(I::FIRST);
		while collection(&candidate) {
			candidate = Self::new(candidate.value.next());
		}
		candidate
	}
}

impl<Tag, I: IdValue> UniqueId for StrongId<Tag, I> {
	fn generate_unique(taken: impl FnMut(&Self) -> bool) -> Self {
		Self::generate_unique_key(taken)
	}
}

// Manual implementations keep the tag free of bounds.

impl<Tag, I: IdValue> Copy for StrongId<Tag, I> { }

impl<Tag, I: IdValue> Clone for StrongId<Tag, I> {
	fn clone(&self) -> Self { *self }
}

impl<Tag, I: IdValue> Default for StrongId<Tag, I> {
	fn default() -> Self { Self::invalid() }
}

impl<Tag, I: IdValue> PartialEq for StrongId<Tag, I> {
	fn eq(&self, other: &Self) -> bool { self.value == other.value }
}

impl<Tag, I: IdValue> Eq for StrongId<Tag, I> { }

impl<Tag, I: IdValue + Hash> Hash for StrongId<Tag, I> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.value.hash(state);
	}
}

impl<Tag, I: IdValue + fmt::Debug> fmt::Debug for StrongId<Tag, I> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "StrongId({:?})", self.value)
	}
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use crate::map::VectorMap;
	use super::StrongId;

	enum TestTag { }
	type TestId = StrongId<TestTag>;

	#[test]
	fn default_is_invalid() {
		let id = TestId::default();
		assert!(!id.is_valid());
		assert_eq!(id, TestId::invalid());
		assert!(TestId::new(0).is_valid());
	}

	#[test]
	fn generate_unique_key_picks_lowest_unused() {
		let mut map: VectorMap<TestId, &str> = VectorMap::new();
		map.insert_if_absent(TestId::new(0), "zero").unwrap();
		map.insert_if_absent(TestId::new(1), "one").unwrap();
		map.insert_if_absent(TestId::new(3), "three").unwrap();

		let id = TestId::generate_unique_key(|id| map.contains(id));
		assert_eq!(id, TestId::new(2));
		assert!(!map.contains(&id));
	}

	#[test]
	fn insert_value_unique_key_never_collides() {
		let mut map: VectorMap<TestId, i32> = VectorMap::new();
		for value in 0..10 {
			let id = map.insert_value_unique_key(value).unwrap();
			assert!(id.is_valid());
			assert_eq!(map.get(&id), Some(&value));
		}
		assert_eq!(map.size(), 10);
	}
}
