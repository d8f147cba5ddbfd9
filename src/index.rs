//! Parallel index sets: ascending global-to-local mappings with per-index
//! attributes.
//!
//! A global index names the same degree of freedom on every process. Each
//! process attaches a [`LocalIndex`] to the globals it holds: the local
//! array position, a domain-defined attribute (owner / border / overlap or
//! similar), and whether the index may also exist on another process.

use std::marker::PhantomData;

use crate::error::{HaloclineError, Result};

/// System-wide unique, totally ordered identifier of a degree of freedom.
pub type GlobalIndex = u64;

/// Domain-defined per-index attribute with a one-byte wire representation.
///
/// The discovery core stores and transmits attributes as raw bytes and
/// widens them back on read, so the mapping must round-trip:
/// `from_byte(to_byte(a)) == a`.
pub trait Attribute: Copy + Default + Eq + std::fmt::Debug {
    fn to_byte(self) -> u8;
    fn from_byte(byte: u8) -> Self;
}

/// Identity mapping, used when no richer attribute type is needed.
impl Attribute for u8 {
    fn to_byte(self) -> u8 {
        self
    }

    fn from_byte(byte: u8) -> Self {
        byte
    }
}

/// Lifecycle state of a local index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexState {
    #[default]
    Valid,
    Deleted,
}

/// A local index with its attribute and visibility.
///
/// The attribute is stored as a byte and widened to `A` on read. `public`
/// marks indices that may also exist on another process; only those are
/// offered for exchange unless the caller overrides the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalIndex<A> {
    local: u32,
    attribute: u8,
    public: bool,
    state: IndexState,
    _attr: PhantomData<A>,
}

impl<A: Attribute> LocalIndex<A> {
    pub fn new(local: u32, attribute: A, public: bool) -> Self {
        Self {
            local,
            attribute: attribute.to_byte(),
            public,
            state: IndexState::Valid,
            _attr: PhantomData,
        }
    }

    /// The position of this index in the process-local array.
    pub fn local(&self) -> u32 {
        self.local
    }

    pub fn attribute(&self) -> A {
        A::from_byte(self.attribute)
    }

    /// The raw wire representation of the attribute.
    pub fn attribute_byte(&self) -> u8 {
        self.attribute
    }

    pub fn set_attribute(&mut self, attribute: A) {
        self.attribute = attribute.to_byte();
    }

    /// Whether this index may also be known to another process.
    pub fn is_public(&self) -> bool {
        self.public
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    pub fn set_state(&mut self, state: IndexState) {
        self.state = state;
    }
}

impl<A: Attribute> Default for LocalIndex<A> {
    fn default() -> Self {
        Self::new(0, A::default(), false)
    }
}

/// One entry of an index set: a global index and its local counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexPair<A> {
    pub global: GlobalIndex,
    pub local: LocalIndex<A>,
}

/// Ordered set of [`IndexPair`]s, strictly ascending in global index.
///
/// Mutations bump `sequence_number`, which remote maps record at build time
/// to detect staleness. Pair positions are stable handles: entries are only
/// ever appended, never reordered or removed.
#[derive(Debug, Clone)]
pub struct IndexSet<A> {
    pairs: Vec<IndexPair<A>>,
    seq_no: i32,
    public_count: usize,
}

impl<A: Attribute> IndexSet<A> {
    pub fn new() -> Self {
        Self {
            pairs: Vec::new(),
            seq_no: 0,
            public_count: 0,
        }
    }

    /// Append a pair. The global must exceed every global already present.
    pub fn add(&mut self, global: GlobalIndex, local: LocalIndex<A>) -> Result<()> {
        if let Some(last) = self.pairs.last() {
            if global <= last.global {
                return Err(HaloclineError::IndexSet(format!(
                    "global {} does not exceed predecessor {}",
                    global, last.global
                )));
            }
        }
        if local.is_public() {
            self.public_count += 1;
        }
        self.pairs.push(IndexPair { global, local });
        self.seq_no += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Number of entries marked public.
    pub fn public_count(&self) -> usize {
        self.public_count
    }

    /// Monotone counter, bumped on every mutation.
    pub fn sequence_number(&self) -> i32 {
        self.seq_no
    }

    pub fn pairs(&self) -> &[IndexPair<A>] {
        &self.pairs
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IndexPair<A>> {
        self.pairs.iter()
    }

    /// Look up a pair by global index.
    pub fn find(&self, global: GlobalIndex) -> Option<&IndexPair<A>> {
        self.pairs
            .binary_search_by_key(&global, |pair| pair.global)
            .ok()
            .map(|pos| &self.pairs[pos])
    }
}

impl<A: Attribute> Default for IndexSet<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, A: Attribute> IntoIterator for &'a IndexSet<A> {
    type Item = &'a IndexPair<A>;
    type IntoIter = std::slice::Iter<'a, IndexPair<A>>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_index_default_is_private_and_valid() {
        let idx: LocalIndex<u8> = LocalIndex::default();
        assert_eq!(idx.local(), 0);
        assert_eq!(idx.attribute(), 0);
        assert!(!idx.is_public());
        assert_eq!(idx.state(), IndexState::Valid);
    }

    #[test]
    fn attribute_round_trips_through_byte() {
        let mut idx: LocalIndex<u8> = LocalIndex::new(7, 3, true);
        assert_eq!(idx.attribute(), 3);
        idx.set_attribute(200);
        assert_eq!(idx.attribute_byte(), 200);
        assert_eq!(idx.attribute(), 200);
    }

    #[test]
    fn add_enforces_ascending_globals() {
        let mut set: IndexSet<u8> = IndexSet::new();
        set.add(10, LocalIndex::new(0, 1, true)).unwrap();
        set.add(20, LocalIndex::new(1, 1, false)).unwrap();
        assert!(set.add(20, LocalIndex::new(2, 1, false)).is_err());
        assert!(set.add(5, LocalIndex::new(2, 1, false)).is_err());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn public_count_tracks_public_entries() {
        let mut set: IndexSet<u8> = IndexSet::new();
        set.add(1, LocalIndex::new(0, 0, true)).unwrap();
        set.add(2, LocalIndex::new(1, 0, false)).unwrap();
        set.add(3, LocalIndex::new(2, 0, true)).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.public_count(), 2);
    }

    #[test]
    fn sequence_number_bumps_on_mutation() {
        let mut set: IndexSet<u8> = IndexSet::new();
        assert_eq!(set.sequence_number(), 0);
        set.add(1, LocalIndex::default()).unwrap();
        let after_one = set.sequence_number();
        assert!(after_one > 0);
        set.add(2, LocalIndex::default()).unwrap();
        assert!(set.sequence_number() > after_one);
    }

    #[test]
    fn find_locates_pairs_by_global() {
        let mut set: IndexSet<u8> = IndexSet::new();
        set.add(10, LocalIndex::new(0, 1, true)).unwrap();
        set.add(30, LocalIndex::new(1, 2, true)).unwrap();
        assert_eq!(set.find(30).unwrap().local.local(), 1);
        assert!(set.find(20).is_none());
    }
}
