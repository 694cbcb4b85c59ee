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
use std::slice;
use crate::error::Result;
use crate::id::UniqueId;
use crate::vector::Vector;

/// A key-value pair held by [`VectorMap`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MapItem<K, V> {
	pub key: K,
	pub value: V,
}

/// A map of key-value pairs kept in insertion order over a plain [`Vector`].
///
/// Lookup is a linear scan; for the small- to medium-sized keyed collections
/// this is meant for, cache locality beats hashing. Keys are compared with
/// `==`, and any type comparable to the key can be used for lookup, so an
/// owned-string key can be found from a borrowed view without constructing
/// the owned form.
#[derive(Clone, Default)]
pub struct VectorMap<K, V> {
	pub items: Vector<MapItem<K, V>>,
}

impl<K, V> VectorMap<K, V> {
	pub fn new() -> Self {
		Self { items: Vector::new() }
	}

	/// Returns the number of key-value pairs in the map.
	pub fn size(&self) -> usize { self.items.size() }

	/// Returns `true` if the map holds no pairs.
	pub fn is_empty(&self) -> bool { self.items.is_empty() }

	/// Iterates the pairs in insertion order.
	pub fn iter(&self) -> slice::Iter<'_, MapItem<K, V>> {
		self.items.as_slice().iter()
	}

	/// Returns `true` if a pair with the given key exists.
	pub fn contains<Q: ?Sized>(&self, key: &Q) -> bool
	where
		K: PartialEq<Q>,
	{
		self.iter().any(|item| item.key == *key)
	}

	/// Returns the value for `key`, if present.
	pub fn get<Q: ?Sized>(&self, key: &Q) -> Option<&V>
	where
		K: PartialEq<Q>,
	{
		self.iter().find(|item| item.key == *key).map(|item| &item.value)
	}

	/// Returns the value for `key` writable, if present.
	pub fn get_mut<Q: ?Sized>(&mut self, key: &Q) -> Option<&mut V>
	where
		K: PartialEq<Q>,
	{
		self.items
			.as_mut_slice()
			.iter_mut()
			.find(|item| item.key == *key)
			.map(|item| &mut item.value)
	}

	/// Inserts the pair unless the key already exists. Returns `false` when
	/// the key was already present, leaving the existing value alone.
	pub fn insert_if_absent(&mut self, key: K, value: V) -> Result<bool>
	where
		K: PartialEq,
	{
		if self.contains(&key) {
			return Ok(false)
		}

		self.items.push_back(MapItem { key, value })?;
		Ok(true)
	}

	/// Inserts the pair, overwriting an existing value for the same key.
	/// Returns the stored value.
	pub fn insert_or_overwrite(&mut self, key: K, value: V) -> Result<&mut V>
	where
		K: PartialEq,
	{
		if let Some(index) = self.items.index_of_key(&key) {
			let item = &mut self.items.as_mut_slice()[index];
			item.value = value;
			return Ok(&mut item.value)
		}

		self.items.push_back(MapItem { key, value })?;
		let index = self.items.size() - 1;
		Ok(&mut self.items.as_mut_slice()[index].value)
	}

	/// Returns the value for `key`, inserting a default-constructed value
	/// under it first when absent.
	pub fn get_or_create<Q: ?Sized>(&mut self, key: &Q) -> Result<&mut V>
	where
		K: PartialEq<Q> + for<'q> From<&'q Q>,
		V: Default,
	{
		if let Some(index) = self.items.index_of_key(key) {
			return Ok(&mut self.items.as_mut_slice()[index].value)
		}

		self.items.push_back(MapItem { key: K::from(key), value: V::default() })?;
		let index = self.items.size() - 1;
		Ok(&mut self.items.as_mut_slice()[index].value)
	}

	/// Inserts `value` under a freshly generated key that is not yet present
	/// in the map, returning the key. Pairs with [`StrongId`][] keys.
	///
	/// [`StrongId`]: crate::StrongId
	pub fn insert_value_unique_key(&mut self, value: V) -> Result<K>
	where
		K: UniqueId + Clone,
	{
		let key = K::generate_unique(|candidate| self.contains(candidate));
		self.items.push_back(MapItem { key: key.clone(), value })?;
		Ok(key)
	}

	/// Removes the pair with the given key. Returns `true` if one existed.
	pub fn remove<Q: ?Sized>(&mut self, key: &Q) -> bool
	where
		K: PartialEq<Q>,
	{
		match self.items.index_of_key(key) {
			Some(index) => self.items.remove_at(index).is_some(),
			None => false,
		}
	}
}

impl<K, V> Vector<MapItem<K, V>> {
	fn index_of_key<Q: ?Sized>(&self, key: &Q) -> Option<usize>
	where
		K: PartialEq<Q>,
	{
		self.as_slice().iter().position(|item| item.key == *key)
	}
}

impl<'a, K, V> IntoIterator for &'a VectorMap<K, V> {
	type Item = &'a MapItem<K, V>;
	type IntoIter = slice::Iter<'a, MapItem<K, V>>;

	fn into_iter(self) -> Self::IntoIter { self.iter() }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for VectorMap<K, V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_map()
			.entries(self.iter().map(|item| (&item.key, &item.value)))
			.finish()
	}
}

/// A deduplicated sequence of values in insertion order over a plain
/// [`Vector`].
#[derive(Clone, Default)]
pub struct VectorSet<V> {
	pub items: Vector<V>,
}

impl<V> VectorSet<V> {
	pub fn new() -> Self {
		Self { items: Vector::new() }
	}

	/// Returns the number of values in the set.
	pub fn size(&self) -> usize { self.items.size() }

	/// Returns `true` if the set holds no values.
	pub fn is_empty(&self) -> bool { self.items.is_empty() }

	/// Iterates the values in insertion order.
	pub fn iter(&self) -> slice::Iter<'_, V> {
		self.items.as_slice().iter()
	}

	/// Returns `true` if the set holds a value equal to `value`.
	pub fn contains<Q: ?Sized>(&self, value: &Q) -> bool
	where
		V: PartialEq<Q>,
	{
		self.items.contains(value)
	}

	/// Inserts `value` unless an equal value already exists. Returns `false`
	/// when it was already present.
	pub fn insert(&mut self, value: V) -> Result<bool>
	where
		V: PartialEq,
	{
		if self.contains(&value) {
			return Ok(false)
		}

		self.items.push_back(value)?;
		Ok(true)
	}

	/// Removes the value equal to `value`. Returns `true` if one existed.
	pub fn remove<Q: ?Sized>(&mut self, value: &Q) -> bool
	where
		V: PartialEq<Q>,
	{
		self.items.remove_value(value)
	}
}

impl<'a, V> IntoIterator for &'a VectorSet<V> {
	type Item = &'a V;
	type IntoIter = slice::Iter<'a, V>;

	fn into_iter(self) -> Self::IntoIter { self.iter() }
}

impl<V: fmt::Debug> fmt::Debug for VectorSet<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_set().entries(self.iter()).finish()
	}
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use super::{VectorMap, VectorSet};

	#[test]
	fn insert_if_absent_rejects_duplicates() {
		let mut map = VectorMap::new();
		assert!(map.insert_if_absent("one", 1).unwrap());
		assert!(!map.insert_if_absent("one", 9).unwrap());
		assert_eq!(map.get(&"one"), Some(&1));
		assert_eq!(map.size(), 1);
	}

	#[test]
	fn insert_or_overwrite_replaces() {
		let mut map = VectorMap::new();
		map.insert_or_overwrite("k", 1).unwrap();
		map.insert_or_overwrite("k", 2).unwrap();
		assert_eq!(map.get(&"k"), Some(&2));
		assert_eq!(map.size(), 1);
	}

	#[test]
	fn iteration_is_insertion_order() {
		let mut map = VectorMap::new();
		for (key, value) in [("b", 2), ("a", 1), ("c", 3)] {
			map.insert_if_absent(key, value).unwrap();
		}

		let keys: Vec<_> = map.iter().map(|item| item.key).collect();
		assert_eq!(keys, ["b", "a", "c"]);

		map.remove(&"a");
		let keys: Vec<_> = map.iter().map(|item| item.key).collect();
		assert_eq!(keys, ["b", "c"]);
	}

	#[test]
	fn get_or_create_inserts_default() {
		let mut map: VectorMap<String, i32> = VectorMap::new();
		*map.get_or_create("counter").unwrap() += 5;
		*map.get_or_create("counter").unwrap() += 5;
		assert_eq!(map.get("counter"), Some(&10));
		assert_eq!(map.size(), 1);
	}

	#[test]
	fn set_deduplicates() {
		let mut set = VectorSet::new();
		assert!(set.insert(3).unwrap());
		assert!(set.insert(1).unwrap());
		assert!(!set.insert(3).unwrap());
		assert_eq!(set.size(), 2);
		assert!(set.contains(&1));

		assert!(set.remove(&3));
		assert!(!set.contains(&3));
		assert!(!set.remove(&3));
	}
}
