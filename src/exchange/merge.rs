//! Copy-local merge: on-process aliases between two index sets.
//!
//! When a remote map is built over distinct source and destination sets,
//! globals present in both can be copied locally instead of exchanged.
//! This merge finds them.

use crate::index::{Attribute, IndexSet};

/// Two-pointer merge over both sets in ascending global order.
///
/// Emits `(source_local, dest_local)` for every global present in both
/// sets, filtered to public entries unless `ignore_public` is set. Passing
/// the same set twice yields the identity over its published entries, so
/// callers skip the merge in that case.
pub fn merge_copy_local<A: Attribute>(
    source: &IndexSet<A>,
    dest: &IndexSet<A>,
    ignore_public: bool,
) -> Vec<(u32, u32)> {
    let source_pairs = source.pairs();
    let dest_pairs = dest.pairs();
    let mut out = Vec::new();
    let mut s = 0;
    let mut d = 0;

    while s < source_pairs.len() && d < dest_pairs.len() {
        let source_global = source_pairs[s].global;
        let dest_global = dest_pairs[d].global;
        if source_global == dest_global {
            if ignore_public
                || (source_pairs[s].local.is_public() && dest_pairs[d].local.is_public())
            {
                out.push((source_pairs[s].local.local(), dest_pairs[d].local.local()));
            }
            s += 1;
            d += 1;
        } else if dest_global < source_global {
            d += 1;
        } else {
            s += 1;
        }
    }
    out
}
