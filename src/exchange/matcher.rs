//! Ordered match of a received record section against the local published
//! pairs.
//!
//! Both streams are ascending in global index, so one forward merge pass
//! decides every record: equal globals emit a match, a remote global we do
//! not hold is skipped, a local global the peer does not hold is stepped
//! over. The entire section is always decoded, even after the local array
//! is exhausted, so the cursor lands exactly at the section end and the
//! buffer can be forwarded whole on the next hop.

use super::codec;
use super::map::{PairHandle, RemoteEntry, Side};
use crate::error::Result;
use crate::index::{Attribute, IndexSet};

/// Decode `n_remote` records starting at `position` and append a
/// [`RemoteEntry`] to `out` for every global also present in `published`
/// (positions into `local_set`, ascending in global).
pub(crate) fn match_section<A: Attribute>(
    buf: &[u8],
    position: &mut usize,
    n_remote: usize,
    local_set: &IndexSet<A>,
    published: &[usize],
    side: Side,
    out: &mut Vec<RemoteEntry<A>>,
) -> Result<()> {
    let pairs = local_set.pairs();
    let mut cursor = 0;

    for _ in 0..n_remote {
        let (global, attribute) = codec::unpack_pair(buf, position)?;
        while cursor < published.len() && pairs[published[cursor]].global < global {
            cursor += 1;
        }
        if cursor < published.len() && pairs[published[cursor]].global == global {
            out.push(RemoteEntry::new(
                attribute,
                PairHandle {
                    side,
                    pos: published[cursor],
                },
            ));
            cursor += 1;
        }
        // Otherwise the peer holds an index unknown here; the record is
        // consumed and dropped.
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::LocalIndex;

    fn set(globals: &[u64]) -> IndexSet<u8> {
        let mut out = IndexSet::new();
        for (pos, &global) in globals.iter().enumerate() {
            out.add(global, LocalIndex::new(pos as u32, 0, true)).unwrap();
        }
        out
    }

    fn stream(records: &[(u64, u8)]) -> Vec<u8> {
        let mut buf = vec![0u8; records.len() * codec::RECORD_BYTES];
        let mut position = 0;
        for &(global, attribute) in records {
            codec::pack_pair(global, attribute, &mut buf, &mut position).unwrap();
        }
        buf
    }

    #[test]
    fn matching_globals_emit_entries_in_order() {
        let local = set(&[10, 20, 30]);
        let published = [0, 1, 2];
        let buf = stream(&[(10, 1), (30, 3)]);

        let mut out = Vec::new();
        let mut position = 0;
        match_section(&buf, &mut position, 2, &local, &published, Side::Source, &mut out)
            .unwrap();

        assert_eq!(position, buf.len());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].attribute(), 1);
        assert_eq!(out[0].handle().pos, 0);
        assert_eq!(out[1].attribute(), 3);
        assert_eq!(out[1].handle().pos, 2);
    }

    #[test]
    fn unknown_remote_globals_are_skipped() {
        let local = set(&[20]);
        let published = [0];
        let buf = stream(&[(5, 1), (20, 2), (25, 3)]);

        let mut out = Vec::new();
        let mut position = 0;
        match_section(&buf, &mut position, 3, &local, &published, Side::Source, &mut out)
            .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].handle().pos, 0);
        // All three records were consumed.
        assert_eq!(position, buf.len());
    }

    #[test]
    fn exhausted_local_array_still_consumes_the_section() {
        let local = set(&[10]);
        let published = [0];
        let buf = stream(&[(10, 1), (11, 2), (12, 3), (13, 4)]);

        let mut out = Vec::new();
        let mut position = 0;
        match_section(&buf, &mut position, 4, &local, &published, Side::Source, &mut out)
            .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(position, buf.len());
    }

    #[test]
    fn respects_the_published_subset() {
        let local = set(&[10, 20, 30]);
        // Only the middle entry is published.
        let published = [1];
        let buf = stream(&[(10, 1), (20, 2), (30, 3)]);

        let mut out = Vec::new();
        let mut position = 0;
        match_section(&buf, &mut position, 3, &local, &published, Side::Destination, &mut out)
            .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].handle().pos, 1);
        assert_eq!(out[0].handle().side, Side::Destination);
    }

    #[test]
    fn truncated_section_is_a_codec_error() {
        let local = set(&[10]);
        let published = [0];
        let buf = stream(&[(10, 1)]);

        let mut out = Vec::new();
        let mut position = 0;
        let result =
            match_section(&buf, &mut position, 2, &local, &published, Side::Source, &mut out);
        assert!(result.is_err());
    }
}
