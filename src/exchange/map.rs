//! The remote map: which local indices exist on which peers, and with
//! which attribute there.
//!
//! Built by a single collective pass over all ranks (see [`super::ring`]),
//! then queried locally. The map borrows its two index-set views and the
//! communicator for its whole lifetime and owns the per-peer entry lists
//! it produces.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use super::{codec, matcher, merge, ring};
use crate::comm::Communicator;
use crate::error::{HaloclineError, Result};
use crate::index::{Attribute, IndexPair, IndexSet};

/// Tag distinguishing discovery traffic on a shared communicator.
pub const COMM_TAG: i32 = 333;

/// Which of the map's two index-set views a handle points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Destination,
}

/// Stable, non-owning reference to a pair inside one of the map's index
/// sets: the side and the pair's position there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairHandle {
    pub side: Side,
    pub pos: usize,
}

/// One local index that a specific peer also holds, together with the
/// peer's attribute for it.
///
/// Resolve the handle with [`RemoteMap::local_pair`]. Entries are
/// invalidated by the next `rebuild`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteEntry<A> {
    attribute: u8,
    handle: PairHandle,
    _attr: PhantomData<A>,
}

impl<A: Attribute> RemoteEntry<A> {
    pub(crate) fn new(attribute: u8, handle: PairHandle) -> Self {
        Self {
            attribute,
            handle,
            _attr: PhantomData,
        }
    }

    /// The attribute the peer attaches to this index.
    pub fn attribute(&self) -> A {
        A::from_byte(self.attribute)
    }

    pub fn handle(&self) -> PairHandle {
        self.handle
    }
}

/// The send and receive lists attached to one peer.
///
/// When source and destination are the same set the exchange is symmetric
/// and both directions deliberately share a single list.
#[derive(Debug, Clone)]
pub enum PeerLists<A> {
    Symmetric(Vec<RemoteEntry<A>>),
    Asymmetric {
        send: Vec<RemoteEntry<A>>,
        receive: Vec<RemoteEntry<A>>,
    },
}

impl<A: Attribute> PeerLists<A> {
    /// Entries to send to this peer, ascending in global index.
    pub fn send(&self) -> &[RemoteEntry<A>] {
        match self {
            PeerLists::Symmetric(list) => list,
            PeerLists::Asymmetric { send, .. } => send,
        }
    }

    /// Entries to receive from this peer, ascending in global index.
    pub fn receive(&self) -> &[RemoteEntry<A>] {
        match self {
            PeerLists::Symmetric(list) => list,
            PeerLists::Asymmetric { receive, .. } => receive,
        }
    }

    /// Whether both directions share one list.
    pub fn is_aliased(&self) -> bool {
        matches!(self, PeerLists::Symmetric(_))
    }

    fn is_empty(&self) -> bool {
        self.send().is_empty() && self.receive().is_empty()
    }
}

/// Per-peer send/receive maps over two borrowed index-set views.
///
/// `rebuild` is collective: every rank on the communicator must call it
/// with the same `ignore_public` value. Between rebuilds the map can be
/// queried freely; `is_synced` reports whether the underlying sets have
/// mutated since the last build.
pub struct RemoteMap<'a, A: Attribute> {
    source: &'a IndexSet<A>,
    dest: &'a IndexSet<A>,
    comm: &'a dyn Communicator,
    source_seq: i32,
    dest_seq: i32,
    copy_local: Vec<(u32, u32)>,
    peers: BTreeMap<usize, PeerLists<A>>,
}

impl<'a, A: Attribute> RemoteMap<'a, A> {
    /// Record the two index-set views (which may be the same object) and
    /// the communicator. No communication happens until `rebuild`.
    pub fn new(
        source: &'a IndexSet<A>,
        dest: &'a IndexSet<A>,
        comm: &'a dyn Communicator,
    ) -> Self {
        Self {
            source,
            dest,
            comm,
            source_seq: -1,
            dest_seq: -1,
            copy_local: Vec::new(),
            peers: BTreeMap::new(),
        }
    }

    fn same_sets(&self) -> bool {
        std::ptr::eq(self.source, self.dest)
    }

    /// Rebuild the whole map from the current index sets. Collective.
    ///
    /// With `ignore_public` every index is treated as public; otherwise
    /// only public indices are offered for exchange. Previous peer lists
    /// and remote entries are invalidated.
    pub fn rebuild(&mut self, ignore_public: bool) -> Result<()> {
        let _span =
            tracing::debug_span!("rebuild", rank = self.comm.rank(), ignore_public).entered();

        self.copy_local.clear();
        if !self.same_sets() {
            self.copy_local = merge::merge_copy_local(self.source, self.dest, ignore_public);
        }
        self.build_remote(ignore_public)?;

        self.source_seq = self.source.sequence_number();
        self.dest_seq = self.dest.sequence_number();
        tracing::debug!(
            peers = self.peers.len(),
            copy_local = self.copy_local.len(),
            "remote map rebuilt"
        );
        Ok(())
    }

    /// Whether the map still matches the current index sets.
    pub fn is_synced(&self) -> bool {
        self.source_seq == self.source.sequence_number()
            && self.dest_seq == self.dest.sequence_number()
    }

    /// Iterate the peers with non-empty lists, in ascending rank order.
    pub fn peers(&self) -> impl Iterator<Item = (usize, &PeerLists<A>)> + '_ {
        self.peers.iter().map(|(&rank, lists)| (rank, lists))
    }

    pub fn peer(&self, rank: usize) -> Option<&PeerLists<A>> {
        self.peers.get(&rank)
    }

    /// `(source_local, dest_local)` aliases found by the local merge.
    /// Empty when source and destination are the same set.
    pub fn copy_local(&self) -> &[(u32, u32)] {
        &self.copy_local
    }

    /// Resolve a remote entry to the local pair it refers to.
    pub fn local_pair(&self, entry: &RemoteEntry<A>) -> &IndexPair<A> {
        let handle = entry.handle();
        let set = match handle.side {
            Side::Source => self.source,
            Side::Destination => self.dest,
        };
        &set.pairs()[handle.pos]
    }

    /// The discovery collective proper: census, sizing, ring rotation,
    /// per-hop matching.
    fn build_remote(&mut self, ignore_public: bool) -> Result<()> {
        self.peers.clear();

        let comm = self.comm;
        let procs = comm.size();
        if procs == 1 {
            // Nothing to discover in sequential mode.
            return Ok(());
        }

        let source_set = self.source;
        let dest_set = self.dest;
        let send_two = !self.same_sets();

        let source_published = published_positions(source_set, ignore_public);
        let dest_published = if send_two {
            published_positions(dest_set, ignore_public)
        } else {
            // One set serves both directions.
            Vec::new()
        };

        let publish = source_published.len() + dest_published.len();
        let max_publish = comm.all_reduce_max(publish)?;
        let capacity = codec::HEADER_BYTES + max_publish * codec::RECORD_BYTES;

        let mut first = vec![0u8; capacity];
        let mut position = 0;
        codec::pack_header(
            send_two,
            source_published.len() as u32,
            dest_published.len() as u32,
            &mut first,
            &mut position,
        )?;
        pack_entries(source_set, &source_published, &mut first, &mut position)?;
        if send_two {
            pack_entries(dest_set, &dest_published, &mut first, &mut position)?;
        }
        first.truncate(position);

        // Receive lists match the peer's source records against our
        // destination side; with a single set that side is the source.
        let (recv_set, recv_published, recv_side) = if send_two {
            (dest_set, &dest_published[..], Side::Destination)
        } else {
            (source_set, &source_published[..], Side::Source)
        };

        let mut peers: BTreeMap<usize, PeerLists<A>> = BTreeMap::new();

        ring::rotate(comm, COMM_TAG, capacity, first, |origin, payload| {
            let mut position = 0;
            let (two_index_sets, n_receive, n_send) =
                codec::unpack_header(payload, &mut position)?;
            let expected = codec::HEADER_BYTES + (n_receive + n_send) * codec::RECORD_BYTES;
            if expected != payload.len() {
                return Err(HaloclineError::Protocol(format!(
                    "rank {origin} declares {n_receive}+{n_send} records in {} bytes, expected {expected}",
                    payload.len()
                )));
            }

            let mut receive = Vec::new();
            matcher::match_section(
                payload,
                &mut position,
                n_receive,
                recv_set,
                recv_published,
                recv_side,
                &mut receive,
            )?;

            let lists = if two_index_sets || send_two {
                let mut send = Vec::new();
                matcher::match_section(
                    payload,
                    &mut position,
                    n_send,
                    source_set,
                    &source_published,
                    Side::Source,
                    &mut send,
                )?;
                PeerLists::Asymmetric { send, receive }
            } else {
                PeerLists::Symmetric(receive)
            };

            if !lists.is_empty() {
                peers.insert(origin, lists);
            }
            Ok(())
        })?;

        self.peers = peers;
        Ok(())
    }
}

/// Positions of the entries a set offers for exchange, in set order
/// (ascending global).
fn published_positions<A: Attribute>(set: &IndexSet<A>, ignore_public: bool) -> Vec<usize> {
    set.pairs()
        .iter()
        .enumerate()
        .filter(|(_, pair)| ignore_public || pair.local.is_public())
        .map(|(pos, _)| pos)
        .collect()
}

fn pack_entries<A: Attribute>(
    set: &IndexSet<A>,
    published: &[usize],
    buf: &mut [u8],
    position: &mut usize,
) -> Result<()> {
    for &pos in published {
        let pair = &set.pairs()[pos];
        codec::pack_pair(pair.global, pair.local.attribute_byte(), buf, position)?;
    }
    Ok(())
}

/// Informational dump: per-rank copy-local pairs, then per-peer send and
/// receive listings. The format is not a stable interface.
impl<A: Attribute> fmt::Display for RemoteMap<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rank = self.comm.rank();

        if !self.copy_local.is_empty() {
            write!(f, "{rank}: copying local:")?;
            for (source_local, dest_local) in &self.copy_local {
                write!(f, " {source_local}->{dest_local},")?;
            }
            writeln!(f)?;
        }

        for (peer, lists) in &self.peers {
            if !lists.send().is_empty() {
                write!(f, "{rank}: process {peer}: send:")?;
                for entry in lists.send() {
                    let pair = self.local_pair(entry);
                    write!(
                        f,
                        " [global={}, attribute={:?}]",
                        pair.global,
                        entry.attribute()
                    )?;
                }
                writeln!(f)?;
            }
            if !lists.receive().is_empty() {
                write!(f, "{rank}: process {peer}: receive:")?;
                for entry in lists.receive() {
                    let pair = self.local_pair(entry);
                    write!(
                        f,
                        " [global={}, attribute={:?}]",
                        pair.global,
                        entry.attribute()
                    )?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SingleProcessComm;
    use crate::index::LocalIndex;

    fn set(entries: &[(u64, u32, bool)]) -> IndexSet<u8> {
        let mut out = IndexSet::new();
        for &(global, local, public) in entries {
            out.add(global, LocalIndex::new(local, 0, public)).unwrap();
        }
        out
    }

    #[test]
    fn fresh_map_is_not_synced() {
        let source = set(&[(1, 0, true)]);
        let comm = SingleProcessComm;
        let map = RemoteMap::new(&source, &source, &comm);
        assert!(!map.is_synced());
    }

    #[test]
    fn rebuild_syncs_and_mutation_unsyncs() {
        let mut source = set(&[(1, 0, true)]);
        let comm = SingleProcessComm;
        {
            let mut map = RemoteMap::new(&source, &source, &comm);
            map.rebuild(false).unwrap();
            assert!(map.is_synced());
        }
        source.add(2, LocalIndex::new(1, 0, true)).unwrap();
        {
            let mut map = RemoteMap::new(&source, &source, &comm);
            assert!(!map.is_synced());
            map.rebuild(false).unwrap();
            assert!(map.is_synced());
        }
    }

    #[test]
    fn single_process_has_no_peers() {
        let source = set(&[(1, 0, true), (2, 1, true)]);
        let comm = SingleProcessComm;
        let mut map = RemoteMap::new(&source, &source, &comm);
        map.rebuild(false).unwrap();
        assert_eq!(map.peers().count(), 0);
        assert!(map.copy_local().is_empty());
    }

    #[test]
    fn distinct_sets_populate_copy_local() {
        let source = set(&[(1, 0, true), (2, 1, true)]);
        let dest = set(&[(2, 0, true), (3, 1, true)]);
        let comm = SingleProcessComm;
        let mut map = RemoteMap::new(&source, &dest, &comm);
        map.rebuild(false).unwrap();
        assert_eq!(map.copy_local(), &[(1, 0)]);
    }

    #[test]
    fn rebuild_refreshes_copy_local() {
        let source = set(&[(1, 0, true)]);
        let mut dest = set(&[(1, 0, true)]);
        let comm = SingleProcessComm;
        {
            let mut map = RemoteMap::new(&source, &dest, &comm);
            map.rebuild(false).unwrap();
            assert_eq!(map.copy_local(), &[(0, 0)]);
        }
        dest.add(2, LocalIndex::new(1, 0, true)).unwrap();
        {
            let mut map = RemoteMap::new(&source, &dest, &comm);
            map.rebuild(false).unwrap();
            assert_eq!(map.copy_local(), &[(0, 0)]);
        }
    }

    #[test]
    fn dump_lists_copy_local_pairs() {
        let source = set(&[(1, 0, true), (2, 1, true)]);
        let dest = set(&[(2, 0, true)]);
        let comm = SingleProcessComm;
        let mut map = RemoteMap::new(&source, &dest, &comm);
        map.rebuild(false).unwrap();
        let dump = map.to_string();
        assert!(dump.contains("copying local"));
        assert!(dump.contains("1->0"));
    }
}
