use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::iter::FusedIterator;
use core::mem;
use core::ops::Index;

use allocator_api2::alloc::Allocator;
use allocator_api2::alloc::Global;

use crate::DefaultHashBuilder;
use crate::error::TryReserveError;
use crate::hash_table;
use crate::hash_table::HashTable;

pub(crate) fn make_hash<Q, S>(hash_builder: &S, key: &Q) -> u64
where
    Q: Hash + ?Sized,
    S: BuildHasher,
{
    hash_builder.hash_one(key)
}

/// Re-hashes stored pairs by key, for growth.
pub(crate) fn make_hasher<K, V, S>(hash_builder: &S) -> impl Fn(&(K, V)) -> u64 + '_
where
    K: Hash,
    S: BuildHasher,
{
    move |(k, _): &(K, V)| make_hash(hash_builder, k)
}

fn equivalent_key<Q, K, V>(key: &Q) -> impl Fn(&(K, V)) -> bool + '_
where
    Q: Eq + ?Sized,
    K: Borrow<Q>,
{
    move |(k, _): &(K, V)| key == <K as Borrow<Q>>::borrow(k)
}

/// A hash map built on the Swiss-table [`HashTable`].
///
/// `HashMap<K, V, S, A>` stores key-value pairs where keys implement
/// `Hash + Eq`, hashes them with the builder `S` and draws its storage from
/// the allocator `A`.
///
/// Besides the familiar [`insert`](Self::insert) (which replaces), the map
/// offers the insert-if-absent family [`add`](Self::add),
/// [`add_pair`](Self::add_pair) and [`add_cloned`](Self::add_cloned): they
/// never touch an existing entry, and hand owned arguments back untouched
/// when the key is already present.
///
/// # Performance Characteristics
///
/// - **Memory**: one control byte per slot plus the size of `(K, V)`, with a
///   maximum load factor of 7/8.
///
/// # Examples
///
/// ```rust
/// use swiss_hash::HashMap;
///
/// let mut stock = HashMap::new();
/// stock.add("apples", 3);
/// stock.add("pears", 5);
///
/// let added = stock.add("apples", 100);
/// assert!(!added.inserted());
/// assert_eq!(*added.value(), 3);
///
/// assert_eq!(stock.get("pears"), Some(&5));
/// ```
pub struct HashMap<K, V, S = DefaultHashBuilder, A: Allocator = Global> {
    table: HashTable<(K, V), A>,
    hash_builder: S,
}

impl<K, V, S, A> Clone for HashMap<K, V, S, A>
where
    K: Clone,
    V: Clone,
    S: Clone,
    A: Allocator + Clone,
{
    fn clone(&self) -> Self {
        HashMap {
            table: self.table.clone(),
            hash_builder: self.hash_builder.clone(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.table.clone_from(&source.table);
        self.hash_builder.clone_from(&source.hash_builder);
    }
}

impl<K, V, S, A> Debug for HashMap<K, V, S, A>
where
    K: Debug,
    V: Debug,
    A: Allocator,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(any(feature = "std", feature = "foldhash"))]
impl<K, V> HashMap<K, V, DefaultHashBuilder> {
    /// Creates an empty map with the default hasher.
    ///
    /// Nothing is allocated until the first insertion.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_hash::HashMap;
    /// #
    /// let map: HashMap<i32, String> = HashMap::new();
    /// assert!(map.is_empty());
    /// assert_eq!(map.capacity(), 0);
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }

    /// Creates an empty map with room for at least `capacity` entries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_hash::HashMap;
    /// #
    /// let map: HashMap<i32, String> = HashMap::with_capacity(100);
    /// assert!(map.capacity() >= 100);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K, V, S> HashMap<K, V, S> {
    /// Creates a new hash map with the given hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use swiss_hash::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let map: HashMap<i32, String, _> = HashMap::with_hasher(SimpleHasher);
    /// assert!(map.is_empty());
    /// ```
    pub const fn with_hasher(hash_builder: S) -> Self {
        Self::with_hasher_in(hash_builder, Global)
    }

    /// Creates a new hash map with the specified capacity and hasher builder.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self::with_capacity_and_hasher_in(capacity, hash_builder, Global)
    }
}

impl<K, V, S, A: Allocator> HashMap<K, V, S, A> {
    /// Creates an empty map using `hash_builder` and allocating from `alloc`.
    pub const fn with_hasher_in(hash_builder: S, alloc: A) -> Self {
        HashMap {
            table: HashTable::new_in(alloc),
            hash_builder,
        }
    }

    /// Creates a map with room for at least `capacity` entries, using
    /// `hash_builder` and allocating from `alloc`.
    pub fn with_capacity_and_hasher_in(capacity: usize, hash_builder: S, alloc: A) -> Self {
        HashMap {
            table: HashTable::with_capacity_in(capacity, alloc),
            hash_builder,
        }
    }

    /// Returns a reference to the map's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Returns a reference to the map's allocator.
    pub fn allocator(&self) -> &A {
        self.table.allocator()
    }

    /// Returns the number of entries in the map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_hash::HashMap;
    /// #
    /// let mut map = HashMap::new();
    /// assert_eq!(map.len(), 0);
    /// map.insert(1, "a");
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns how many entries the map holds before it has to grow.
    ///
    /// This only changes when the map reallocates.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Removes every entry, keeping the allocation.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Keeps only the entries for which `f` returns `true`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_hash::HashMap;
    /// #
    /// let mut map: HashMap<i32, i32> = (0..8).map(|x| (x, x * 10)).collect();
    /// map.retain(|&k, _| k % 2 == 0);
    /// assert_eq!(map.len(), 4);
    /// ```
    pub fn retain(&mut self, mut f: impl FnMut(&K, &mut V) -> bool) {
        self.table.retain(|(k, v)| f(k, v));
    }

    /// An iterator over the entries, in unspecified order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// An iterator over the entries with mutable references to the values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.table.iter_mut(),
        }
    }

    /// An iterator over the keys.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// An iterator over the values.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// An iterator over mutable references to the values.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Removes all entries, yielding them by value. The allocation is kept.
    pub fn drain(&mut self) -> Drain<'_, K, V, A> {
        Drain {
            inner: self.table.drain(),
        }
    }
}

impl<K, V, S, A> HashMap<K, V, S, A>
where
    K: Hash + Eq,
    S: BuildHasher,
    A: Allocator,
{
    /// Inserts `key` and `value` unless the key is already present.
    ///
    /// On insertion both arguments are moved into the map. If the key is
    /// present, the stored entry is left untouched and the arguments come
    /// back unused through [`Added::into_rejected`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_hash::HashMap;
    /// #
    /// let mut map = HashMap::new();
    /// assert!(map.add(1, "one".to_string()).inserted());
    ///
    /// let again = map.add(1, "uno".to_string());
    /// assert_eq!(again.value(), "one");
    /// assert_eq!(again.into_rejected(), Some((1, "uno".to_string())));
    /// ```
    pub fn add(&mut self, key: K, value: V) -> Added<'_, K, V> {
        let hash = make_hash(&self.hash_builder, &key);
        let entry = self.table.entry(
            hash,
            equivalent_key(&key),
            make_hasher(&self.hash_builder),
        );

        match entry {
            hash_table::Entry::Occupied(entry) => {
                let (k, v) = entry.into_mut();
                Added {
                    key: k,
                    value: v,
                    inserted: false,
                    rejected: Some((key, value)),
                }
            }
            hash_table::Entry::Vacant(entry) => {
                let (k, v) = entry.insert((key, value));
                Added {
                    key: k,
                    value: v,
                    inserted: true,
                    rejected: None,
                }
            }
        }
    }

    /// [`add`](Self::add) taking the entry as a pair.
    pub fn add_pair(&mut self, (key, value): (K, V)) -> Added<'_, K, V> {
        self.add(key, value)
    }

    /// Inserts clones of `key` and `value` unless the key is already present.
    ///
    /// Each argument is cloned exactly once on insertion and not at all when
    /// the key already exists.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_hash::HashMap;
    /// #
    /// let mut map = HashMap::new();
    /// let key = String::from("k");
    /// let value = vec![1, 2, 3];
    ///
    /// assert!(map.add_cloned(&key, &value).inserted());
    /// assert!(!map.add_cloned(&key, &vec![]).inserted());
    /// assert_eq!(map[&key], value);
    /// ```
    pub fn add_cloned(&mut self, key: &K, value: &V) -> Added<'_, K, V>
    where
        K: Clone,
        V: Clone,
    {
        let hash = make_hash(&self.hash_builder, key);
        let entry = self
            .table
            .entry(hash, equivalent_key(key), make_hasher(&self.hash_builder));

        match entry {
            hash_table::Entry::Occupied(entry) => {
                let (k, v) = entry.into_mut();
                Added {
                    key: k,
                    value: v,
                    inserted: false,
                    rejected: None,
                }
            }
            hash_table::Entry::Vacant(entry) => {
                let (k, v) = entry.insert((key.clone(), value.clone()));
                Added {
                    key: k,
                    value: v,
                    inserted: true,
                    rejected: None,
                }
            }
        }
    }

    /// Inserts a key-value pair, replacing the value of an existing entry.
    ///
    /// Returns the previous value. The stored key is not updated.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_hash::HashMap;
    /// #
    /// let mut map = HashMap::new();
    /// assert_eq!(map.insert(37, "a"), None);
    /// assert_eq!(map.insert(37, "b"), Some("a"));
    /// assert_eq!(map[&37], "b");
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = make_hash(&self.hash_builder, &key);
        let entry = self.table.entry(
            hash,
            equivalent_key(&key),
            make_hasher(&self.hash_builder),
        );

        match entry {
            hash_table::Entry::Occupied(mut entry) => {
                Some(mem::replace(&mut entry.get_mut().1, value))
            }
            hash_table::Entry::Vacant(entry) => {
                entry.insert((key, value));
                None
            }
        }
    }

    /// Gets the entry for `key` for in-place manipulation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_hash::HashMap;
    /// #
    /// let mut counts = HashMap::new();
    /// for word in "a b a c a".split(' ') {
    ///     *counts.entry(word).or_insert(0) += 1;
    /// }
    /// assert_eq!(counts["a"], 3);
    /// ```
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, A> {
        let hash = make_hash(&self.hash_builder, &key);
        let entry = self.table.entry(
            hash,
            equivalent_key(&key),
            make_hasher(&self.hash_builder),
        );

        match entry {
            hash_table::Entry::Occupied(entry) => Entry::Occupied(OccupiedEntry { entry }),
            hash_table::Entry::Vacant(entry) => Entry::Vacant(VacantEntry { entry, key }),
        }
    }

    /// Looks up `key`, returning the stored key and value.
    pub fn find<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = make_hash(&self.hash_builder, key);
        self.table
            .find(hash, equivalent_key(key))
            .map(|(k, v)| (k, v))
    }

    /// Returns a reference to the value stored for `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_hash::HashMap;
    /// #
    /// let mut map = HashMap::new();
    /// map.insert("key".to_string(), 1);
    /// assert_eq!(map.get("key"), Some(&1));
    /// assert_eq!(map.get("nope"), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find(key).map(|(_, v)| v)
    }

    /// Returns a mutable reference to the value stored for `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = make_hash(&self.hash_builder, key);
        self.table
            .find_mut(hash, equivalent_key(key))
            .map(|(_, v)| v)
    }

    /// Returns `true` if the map holds an entry for `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find(key).is_some()
    }

    /// Removes the entry for `key` and returns its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes the entry for `key` and returns the stored key and value.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = make_hash(&self.hash_builder, key);
        self.table.remove(hash, equivalent_key(key))
    }

    /// Drops the entry for `key` in place. Returns whether it existed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_hash::HashMap;
    /// #
    /// let mut map = HashMap::new();
    /// map.insert(1, "a");
    /// assert!(map.erase(&1));
    /// assert!(!map.erase(&1));
    /// ```
    pub fn erase<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = make_hash(&self.hash_builder, key);
        self.table.erase(hash, equivalent_key(key))
    }

    /// Reserves room for at least `additional` more entries.
    pub fn reserve(&mut self, additional: usize) {
        self.table
            .reserve(additional, make_hasher(&self.hash_builder));
    }

    /// Like [`reserve`](Self::reserve), but reports failure instead of
    /// panicking.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.table
            .try_reserve(additional, make_hasher(&self.hash_builder))
    }

    /// Shrinks the storage as much as the current entries allow.
    pub fn shrink_to_fit(&mut self) {
        self.table
            .shrink_to_fit(make_hasher(&self.hash_builder));
    }

    /// Shrinks the storage, keeping room for at least `min_capacity` entries.
    pub fn shrink_to(&mut self, min_capacity: usize) {
        self.table
            .shrink_to(min_capacity, make_hasher(&self.hash_builder));
    }

    /// Replaces the contents of this map with clones of the entries of
    /// `source`, which may use a different hasher and allocator.
    ///
    /// Entries are re-hashed and cloned one by one into this map's own
    /// storage; the current allocation is reused when it is large enough.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use swiss_hash::HashMap;
    /// # use std::hash::RandomState;
    /// #
    /// let source: HashMap<u32, &str, RandomState> =
    ///     [(1, "a"), (2, "b")].into_iter().collect();
    ///
    /// let mut target = HashMap::new();
    /// target.insert(9, "z");
    /// target.clone_from_map(&source);
    ///
    /// assert_eq!(target.len(), 2);
    /// assert!(!target.contains_key(&9));
    /// ```
    pub fn clone_from_map<S2, A2>(&mut self, source: &HashMap<K, V, S2, A2>)
    where
        K: Clone,
        V: Clone,
        A2: Allocator,
    {
        self.clear();
        self.reserve(source.len());
        for (k, v) in source.iter() {
            let hash = make_hash(&self.hash_builder, k);
            self.table.insert_unique(
                hash,
                (k.clone(), v.clone()),
                make_hasher(&self.hash_builder),
            );
        }
    }

    /// Number of allocated slots.
    #[cfg(test)]
    pub(crate) fn slot_capacity(&self) -> usize {
        self.table.slot_capacity()
    }
}

/// The result of [`HashMap::add`] and friends.
///
/// Points at the entry stored for the key, whether it was just inserted or
/// was already there.
#[derive(Debug)]
pub struct Added<'a, K, V> {
    key: &'a K,
    value: &'a mut V,
    inserted: bool,
    rejected: Option<(K, V)>,
}

impl<'a, K, V> Added<'a, K, V> {
    /// `true` if this call inserted the entry, `false` if the key was already
    /// present.
    pub fn inserted(&self) -> bool {
        self.inserted
    }

    /// The key stored in the map.
    pub fn key(&self) -> &K {
        self.key
    }

    /// The value stored in the map.
    pub fn value(&self) -> &V {
        self.value
    }

    /// Mutable access to the value stored in the map.
    pub fn value_mut(&mut self) -> &mut V {
        self.value
    }

    /// Converts into a mutable reference to the stored value.
    pub fn into_value(self) -> &'a mut V {
        self.value
    }

    /// The owned key and value that were not inserted because the key was
    /// already present.
    ///
    /// Always `None` after an insertion, and after
    /// [`add_cloned`](HashMap::add_cloned), which owns nothing to give back.
    pub fn into_rejected(self) -> Option<(K, V)> {
        self.rejected
    }
}

/// A view into a single entry in a map, which may be vacant or occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashMap`].
///
/// [`entry`]: HashMap::entry
pub enum Entry<'a, K, V, A: Allocator = Global> {
    /// A vacant entry.
    Vacant(VacantEntry<'a, K, V, A>),
    /// An occupied entry.
    Occupied(OccupiedEntry<'a, K, V, A>),
}

impl<'a, K, V, A: Allocator> Entry<'a, K, V, A> {
    /// Inserts a default value if the entry is vacant and returns a mutable
    /// reference.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts a value computed from a closure if the entry is vacant and
    /// returns a mutable reference.
    pub fn or_insert_with<F>(self, default: F) -> &'a mut V
    where
        F: FnOnce() -> V,
    {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Like [`or_insert_with`](Self::or_insert_with), passing the key to the
    /// closure.
    pub fn or_insert_with_key<F>(self, default: F) -> &'a mut V
    where
        F: FnOnce(&K) -> V,
    {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let value = default(&entry.key);
                entry.insert(value)
            }
        }
    }

    /// Provides in-place mutable access to an occupied entry before any
    /// potential inserts.
    pub fn and_modify<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }

    /// Returns a reference to this entry's key.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(entry) => entry.key(),
            Entry::Vacant(entry) => entry.key(),
        }
    }
}

impl<'a, K, V, A> Entry<'a, K, V, A>
where
    V: Default,
    A: Allocator,
{
    /// Inserts the default value if the entry is vacant and returns a mutable
    /// reference.
    pub fn or_default(self) -> &'a mut V {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant entry in the map.
pub struct VacantEntry<'a, K, V, A: Allocator = Global> {
    entry: hash_table::VacantEntry<'a, (K, V), A>,
    key: K,
}

impl<'a, K, V, A: Allocator> VacantEntry<'a, K, V, A> {
    /// Gets a reference to the key that would be used when inserting a value.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Take ownership of the key.
    pub fn into_key(self) -> K {
        self.key
    }

    /// Inserts the value into the map and returns a mutable reference to it.
    pub fn insert(self, value: V) -> &'a mut V {
        &mut self.entry.insert((self.key, value)).1
    }
}

/// A view into an occupied entry in the map.
pub struct OccupiedEntry<'a, K, V, A: Allocator = Global> {
    entry: hash_table::OccupiedEntry<'a, (K, V), A>,
}

impl<'a, K, V, A: Allocator> OccupiedEntry<'a, K, V, A> {
    /// Gets a reference to the key in the entry.
    pub fn key(&self) -> &K {
        &self.entry.get().0
    }

    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        &self.entry.get().1
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        &mut self.entry.get_mut().1
    }

    /// Converts the entry into a mutable reference to the value.
    pub fn into_mut(self) -> &'a mut V {
        &mut self.entry.into_mut().1
    }

    /// Inserts a value into the entry and returns the old value.
    pub fn insert(&mut self, value: V) -> V {
        mem::replace(&mut self.entry.get_mut().1, value)
    }

    /// Removes the entry from the map and returns the value.
    pub fn remove(self) -> V {
        self.entry.remove().1
    }

    /// Removes the entry from the map and returns the key and value.
    pub fn remove_entry(self) -> (K, V) {
        self.entry.remove()
    }
}

impl<K, V, S, A> PartialEq for HashMap<K, V, S, A>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
    A: Allocator,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|other_v| v == other_v))
    }
}

impl<K, V, S, A> Eq for HashMap<K, V, S, A>
where
    K: Hash + Eq,
    V: Eq,
    S: BuildHasher,
    A: Allocator,
{
}

impl<K, V, S, A> Default for HashMap<K, V, S, A>
where
    S: Default,
    A: Allocator + Default,
{
    fn default() -> Self {
        Self::with_hasher_in(S::default(), A::default())
    }
}

impl<K, Q, V, S, A> Index<&Q> for HashMap<K, V, S, A>
where
    K: Hash + Eq + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    S: BuildHasher,
    A: Allocator,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if the key is not present.
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("key not found")
    }
}

impl<K, V, S, A> Extend<(K, V)> for HashMap<K, V, S, A>
where
    K: Hash + Eq,
    S: BuildHasher,
    A: Allocator,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        // Duplicates may make the hint an overestimate; only trust half of it
        // for a non-empty map.
        let reserve = if self.is_empty() {
            iter.size_hint().0
        } else {
            iter.size_hint().0.div_ceil(2)
        };
        self.reserve(reserve);
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<'a, K, V, S, A> Extend<(&'a K, &'a V)> for HashMap<K, V, S, A>
where
    K: Hash + Eq + Copy,
    V: Copy,
    S: BuildHasher,
    A: Allocator,
{
    fn extend<I: IntoIterator<Item = (&'a K, &'a V)>>(&mut self, iter: I) {
        self.extend(iter.into_iter().map(|(&k, &v)| (k, v)));
    }
}

impl<K, V, S, A> FromIterator<(K, V)> for HashMap<K, V, S, A>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
    A: Allocator + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S, A: Allocator> IntoIterator for &'a HashMap<K, V, S, A> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S, A: Allocator> IntoIterator for &'a mut HashMap<K, V, S, A> {
    type IntoIter = IterMut<'a, K, V>;
    type Item = (&'a K, &'a mut V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, S, A: Allocator> IntoIterator for HashMap<K, V, S, A> {
    type IntoIter = IntoIter<K, V, A>;
    type Item = (K, V);

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.table.into_iter(),
        }
    }
}

/// An iterator over the key-value pairs of a `HashMap`.
pub struct Iter<'a, K, V> {
    inner: hash_table::Iter<'a, (K, V)>,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// An iterator over the entries of a `HashMap` with mutable values.
pub struct IterMut<'a, K, V> {
    inner: hash_table::IterMut<'a, (K, V)>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (&*k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// An iterator over the keys of a `HashMap`.
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

impl<K, V> FusedIterator for Keys<'_, K, V> {}

/// An iterator over the values of a `HashMap`.
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

impl<K, V> FusedIterator for Values<'_, K, V> {}

/// An iterator over mutable references to the values of a `HashMap`.
pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}

impl<K, V> FusedIterator for ValuesMut<'_, K, V> {}

/// A draining iterator over the key-value pairs of a `HashMap`.
pub struct Drain<'a, K, V, A: Allocator = Global> {
    inner: hash_table::Drain<'a, (K, V), A>,
}

impl<K, V, A: Allocator> Iterator for Drain<'_, K, V, A> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, A: Allocator> ExactSizeIterator for Drain<'_, K, V, A> {}

impl<K, V, A: Allocator> FusedIterator for Drain<'_, K, V, A> {}

/// An owning iterator over the key-value pairs of a `HashMap`.
pub struct IntoIter<K, V, A: Allocator = Global> {
    inner: hash_table::IntoIter<(K, V), A>,
}

impl<K, V, A: Allocator> Iterator for IntoIter<K, V, A> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, A: Allocator> ExactSizeIterator for IntoIter<K, V, A> {}

impl<K, V, A: Allocator> FusedIterator for IntoIter<K, V, A> {}

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::Cell;
    use core::hash::BuildHasher;
    use core::hash::Hasher;

    use rand::Rng;
    use rand::SeedableRng;
    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use rand::rngs::SmallRng;
    use siphasher::sip::SipHasher;

    use super::*;
    use crate::hash_table::tests::CountingAlloc;
    use crate::hash_table::tests::Tracked;

    #[derive(Clone)]
    struct SipHashBuilder {
        k1: u64,
        k2: u64,
    }

    impl BuildHasher for SipHashBuilder {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> Self::Hasher {
            SipHasher::new_with_keys(self.k1, self.k2)
        }
    }

    impl Default for SipHashBuilder {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k1: rng.try_next_u64().unwrap_or(0),
                k2: rng.try_next_u64().unwrap_or(0),
            }
        }
    }

    /// Sends every key to the same hash, so all entries share one probe chain.
    #[derive(Clone, Default)]
    struct ConstantHashBuilder;

    struct ConstantHasher;

    impl Hasher for ConstantHasher {
        fn finish(&self) -> u64 {
            0x1234_5678
        }

        fn write(&mut self, _bytes: &[u8]) {}
    }

    impl BuildHasher for ConstantHashBuilder {
        type Hasher = ConstantHasher;

        fn build_hasher(&self) -> Self::Hasher {
            ConstantHasher
        }
    }

    /// A value that counts how often it is cloned.
    #[derive(Debug)]
    struct CloneCounter {
        id: u64,
        clones: Rc<Cell<usize>>,
    }

    impl Clone for CloneCounter {
        fn clone(&self) -> Self {
            self.clones.set(self.clones.get() + 1);
            CloneCounter {
                id: self.id,
                clones: self.clones.clone(),
            }
        }
    }

    impl PartialEq for CloneCounter {
        fn eq(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }

    impl Eq for CloneCounter {}

    impl core::hash::Hash for CloneCounter {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.id.hash(state);
        }
    }

    type SipMap<K, V> = HashMap<K, V, SipHashBuilder>;

    #[test]
    fn test_new_and_with_hasher() {
        let map: SipMap<i32, String> = HashMap::default();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);

        let map2 = HashMap::<i32, String, _>::with_hasher(SipHashBuilder::default());
        assert!(map2.is_empty());
        assert_eq!(map2.capacity(), 0);
    }

    #[test]
    fn test_with_capacity() {
        let map2 =
            HashMap::<i32, String, _>::with_capacity_and_hasher(200, SipHashBuilder::default());
        assert!(map2.capacity() >= 200);
        assert!(map2.is_empty());
    }

    #[test]
    fn test_insert_and_get() {
        let mut map = HashMap::with_hasher(SipHashBuilder::default());

        assert_eq!(map.insert(1, "hello".to_string()), None);
        assert_eq!(map.len(), 1);
        assert!(!map.is_empty());

        assert_eq!(map.get(&1), Some(&"hello".to_string()));
        assert_eq!(map.get(&2), None);

        assert_eq!(
            map.insert(1, "world".to_string()),
            Some("hello".to_string())
        );
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&1), Some(&"world".to_string()));

        *map.get_mut(&1).unwrap() += "!";
        assert_eq!(map[&1], "world!");
    }

    #[test]
    fn add_is_insert_if_absent() {
        let mut map: SipMap<u64, String> = HashMap::default();

        let first = map.add(7, "first".to_string());
        assert!(first.inserted());
        assert_eq!(*first.key(), 7);
        assert_eq!(first.value(), "first");
        assert_eq!(first.into_rejected(), None);

        let second = map.add(7, "second".to_string());
        assert!(!second.inserted());
        assert_eq!(second.value(), "first");
        assert_eq!(second.into_rejected(), Some((7, "second".to_string())));

        let mut third = map.add_pair((7, "third".to_string()));
        third.value_mut().push_str(" edited");
        assert_eq!(map.get(&7).map(String::as_str), Some("first edited"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn add_cloned_clones_only_on_insert() {
        let clones = Rc::new(Cell::new(0));
        let key = CloneCounter {
            id: 1,
            clones: clones.clone(),
        };
        let value = CloneCounter {
            id: 100,
            clones: clones.clone(),
        };
        let mut map: SipMap<CloneCounter, CloneCounter> = HashMap::default();

        assert!(map.add_cloned(&key, &value).inserted());
        assert_eq!(clones.get(), 2);

        let other = CloneCounter {
            id: 200,
            clones: clones.clone(),
        };
        let again = map.add_cloned(&key, &other);
        assert!(!again.inserted());
        assert_eq!(again.value().id, 100);
        assert_eq!(again.into_rejected(), None);
        assert_eq!(clones.get(), 2);

        // Moving arguments in never clones either.
        let added = map.add(
            CloneCounter {
                id: 2,
                clones: clones.clone(),
            },
            other,
        );
        assert!(added.inserted());
        assert_eq!(clones.get(), 2);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn allocation_accounting() {
        let alloc = CountingAlloc::default();
        let mut map: HashMap<u64, u64, SipHashBuilder, CountingAlloc> =
            HashMap::with_hasher_in(SipHashBuilder::default(), alloc.clone());
        assert_eq!(alloc.allocations.get(), 0);

        assert!(map.add(1, 11).inserted());
        assert_eq!(alloc.allocations.get(), 1);
        assert_eq!(map.len(), 1);
        assert_eq!(map.capacity(), 1);

        assert!(!map.add(1, 99).inserted());
        assert_eq!(alloc.allocations.get(), 1);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&1), Some(&11));

        assert!(map.add(2, 22).inserted());
        assert_eq!(alloc.allocations.get(), 2);
        assert_eq!(alloc.frees.get(), 1);
        assert_eq!(map.capacity(), 3);

        drop(map);
        assert_eq!(alloc.frees.get(), 2);
    }

    #[test]
    fn reserve_avoids_reallocation() {
        let alloc = CountingAlloc::default();
        let mut map: HashMap<u64, u64, SipHashBuilder, CountingAlloc> =
            HashMap::with_hasher_in(SipHashBuilder::default(), alloc.clone());
        map.reserve(1000);
        assert_eq!(alloc.allocations.get(), 1);
        for k in 0..1000 {
            map.add(k, k);
        }
        assert_eq!(alloc.allocations.get(), 1);
        assert_eq!(alloc.frees.get(), 0);
    }

    #[test]
    fn capacity_changes_only_when_reallocating() {
        let alloc = CountingAlloc::default();
        let mut map: HashMap<u64, u64, SipHashBuilder, CountingAlloc> =
            HashMap::with_hasher_in(SipHashBuilder::default(), alloc.clone());
        let mut capacity = map.capacity();
        let mut allocations = alloc.allocations.get();
        for k in 0..5000u64 {
            map.add(k, k);
            assert_eq!(map.len() as u64, k + 1);
            assert!(map.capacity() >= map.len());
            if map.capacity() != capacity {
                assert_eq!(alloc.allocations.get(), allocations + 1);
                capacity = map.capacity();
                allocations = alloc.allocations.get();
            } else {
                assert_eq!(alloc.allocations.get(), allocations);
            }
        }
    }

    #[test]
    fn tombstone_keeps_colliding_key_reachable() {
        let mut map: HashMap<u64, &str, ConstantHashBuilder> = HashMap::default();
        map.add(1, "a");
        map.add(2, "b");
        map.add(3, "c");

        assert_eq!(map.remove(&1), Some("a"));
        assert_eq!(map.get(&2), Some(&"b"));
        assert_eq!(map.get(&3), Some(&"c"));
        assert_eq!(map.get(&1), None);

        assert!(map.add(1, "again").inserted());
        assert_eq!(map.len(), 3);
        assert!(map.erase(&2));
        assert_eq!(map.find(&3), Some((&3, &"c")));
        assert_eq!(map.find(&1), Some((&1, &"again")));
    }

    #[test]
    fn uniqueness_and_round_trip() {
        let mut rng = SmallRng::seed_from_u64(17);
        let mut map: SipMap<u32, u32> = HashMap::default();
        let mut expected = hashbrown::HashMap::new();

        for _ in 0..10_000 {
            let key = rng.random_range(0..2000u32);
            let value = rng.random::<u32>();
            let added = map.add(key, value);
            let stored = *added.value();
            expected.entry(key).or_insert(value);
            assert_eq!(Some(&stored), expected.get(&key));
        }

        let mut keys: Vec<u32> = map.keys().copied().collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), map.len());
        assert_eq!(map.len(), expected.len());
        for (k, v) in &expected {
            let (stored_k, stored_v) = map.find(k).unwrap();
            assert_eq!(stored_k, k);
            assert_eq!(stored_v, v);
        }
    }

    #[test]
    fn randomized_against_hashbrown() {
        let mut rng = SmallRng::seed_from_u64(0xabad_1dea);
        let mut map: SipMap<u16, u64> = HashMap::default();
        let mut oracle = hashbrown::HashMap::new();

        for step in 0..50_000u64 {
            let key = rng.random_range(0..1024u16);
            match rng.random_range(0..6) {
                0 | 1 => assert_eq!(map.insert(key, step), oracle.insert(key, step)),
                2 => assert_eq!(
                    map.add(key, step).inserted(),
                    oracle.add_if_absent(key, step)
                ),
                3 => assert_eq!(map.remove(&key), oracle.remove(&key)),
                4 => assert_eq!(map.erase(&key), oracle.remove(&key).is_some()),
                _ => assert_eq!(map.get(&key), oracle.get(&key)),
            }
            assert_eq!(map.len(), oracle.len());
        }

        let mut ours: Vec<(u16, u64)> = map.into_iter().collect();
        let mut theirs: Vec<(u16, u64)> = oracle.into_iter().collect();
        ours.sort_unstable();
        theirs.sort_unstable();
        assert_eq!(ours, theirs);
    }

    trait AddIfAbsent<K, V> {
        fn add_if_absent(&mut self, key: K, value: V) -> bool;
    }

    impl<K: core::hash::Hash + Eq, V> AddIfAbsent<K, V> for hashbrown::HashMap<K, V> {
        fn add_if_absent(&mut self, key: K, value: V) -> bool {
            match self.entry(key) {
                hashbrown::hash_map::Entry::Occupied(_) => false,
                hashbrown::hash_map::Entry::Vacant(entry) => {
                    entry.insert(value);
                    true
                }
            }
        }
    }

    #[test]
    fn borrowed_lookups() {
        let mut map: SipMap<String, usize> = HashMap::default();
        for word in ["alpha", "beta", "gamma"] {
            map.insert(word.to_string(), word.len());
        }
        assert_eq!(map.get("beta"), Some(&4));
        assert!(map.contains_key("gamma"));
        assert_eq!(map.remove_entry("alpha"), Some(("alpha".to_string(), 5)));
        assert!(!map.contains_key("alpha"));
        assert_eq!(map["gamma"], 5);
    }

    #[test]
    #[should_panic(expected = "key not found")]
    fn index_missing_key_panics() {
        let map: SipMap<u8, u8> = HashMap::default();
        let _ = map[&0];
    }

    #[test]
    fn entry_api() {
        let mut map: SipMap<&str, Vec<u32>> = HashMap::default();
        map.entry("a").or_default().push(1);
        map.entry("a").or_default().push(2);
        map.entry("b").or_insert_with(Vec::new).push(3);
        let len = map.entry("c").or_insert_with_key(|k| vec![k.len() as u32]).len();
        assert_eq!(len, 1);

        map.entry("a").and_modify(|v| v.push(9)).or_default();
        assert_eq!(map["a"], [1, 2, 9]);

        match map.entry("b") {
            Entry::Occupied(mut entry) => {
                assert_eq!(entry.key(), &"b");
                assert_eq!(entry.insert(vec![]), [3]);
                assert_eq!(entry.remove_entry(), ("b", vec![]));
            }
            Entry::Vacant(_) => panic!("b should be present"),
        }

        match map.entry("z") {
            Entry::Vacant(entry) => assert_eq!(entry.into_key(), "z"),
            Entry::Occupied(_) => panic!("z should be absent"),
        }
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn iterators_and_drain() {
        let mut map: SipMap<u32, u32> = (0..100).map(|k| (k, k * 2)).collect();
        assert_eq!(map.iter().len(), 100);
        assert_eq!(map.keys().map(|&k| k as u64).sum::<u64>(), 4950);
        assert_eq!(map.values().map(|&v| v as u64).sum::<u64>(), 9900);

        for v in map.values_mut() {
            *v += 1;
        }
        for (k, v) in &mut map {
            assert_eq!(*v, k * 2 + 1);
        }

        map.retain(|k, _| k % 10 == 0);
        assert_eq!(map.len(), 10);

        let mut drained: Vec<(u32, u32)> = map.drain().collect();
        drained.sort_unstable();
        assert_eq!(drained[0], (0, 1));
        assert_eq!(drained.len(), 10);
        assert!(map.is_empty());
        assert!(map.capacity() >= 100);
    }

    #[test]
    fn extend_equality_and_debug() {
        let mut a: SipMap<u8, char> = HashMap::default();
        a.extend([(1, 'a'), (2, 'b')]);
        a.extend([(&3, &'c')]);

        let mut b: SipMap<u8, char> = HashMap::default();
        b.extend([(3, 'c'), (2, 'b'), (1, 'a')]);
        assert_eq!(a, b);

        b.insert(3, 'x');
        assert_ne!(a, b);

        let single: SipMap<u8, char> = [(1, 'a')].into_iter().collect();
        assert_eq!(format!("{single:?}"), "{1: 'a'}");
    }

    #[test]
    fn clone_and_clone_from_map() {
        let live = Rc::new(Cell::new(0));
        let mut source: SipMap<u64, Tracked> = HashMap::default();
        for k in 0..50 {
            source.insert(k, Tracked::new(k, &live));
        }

        let copy = source.clone();
        assert_eq!(live.get(), 100);
        assert_eq!(copy.len(), 50);
        assert!(copy.iter().all(|(k, v)| *k == v.key));

        let alloc = CountingAlloc::default();
        let mut target: HashMap<u64, Tracked, ConstantHashBuilder, CountingAlloc> =
            HashMap::with_capacity_and_hasher_in(64, ConstantHashBuilder, alloc.clone());
        target.insert(999, Tracked::new(999, &live));
        let allocations = alloc.allocations.get();

        target.clone_from_map(&source);
        assert_eq!(alloc.allocations.get(), allocations);
        assert_eq!(target.len(), 50);
        assert!(!target.contains_key(&999));
        for k in 0..50 {
            assert_eq!(target[&k].key, k);
        }
        assert_eq!(live.get(), 150);

        let mut small: SipMap<u64, Tracked> = HashMap::default();
        small.clone_from_map(&target);
        assert_eq!(small.len(), 50);
        assert!(small.slot_capacity() > 0);

        drop(source);
        drop(copy);
        drop(target);
        drop(small);
        assert_eq!(live.get(), 0);
    }

    #[test]
    fn shrink_and_try_reserve() {
        let mut map: SipMap<u64, u64> = HashMap::default();
        for k in 0..1000 {
            map.insert(k, k);
        }
        map.retain(|k, _| *k < 5);
        let before = map.capacity();
        map.shrink_to_fit();
        assert!(map.capacity() < before);
        assert!(map.capacity() >= 5);
        for k in 0..5 {
            assert_eq!(map[&k], k);
        }

        let shrunk = map.capacity();
        map.shrink_to(100);
        assert_eq!(map.capacity(), shrunk);
        assert_eq!(map.try_reserve(usize::MAX), Err(TryReserveError::CapacityOverflow));
        assert!(map.try_reserve(10).is_ok());
    }
}
