//! The discovery collective: wire codec, copy-local merge, ring rotation,
//! and the per-peer matching that produces the remote map.

pub mod codec;
pub mod map;
pub(crate) mod matcher;
pub mod merge;
pub mod ring;

pub use map::{PairHandle, PeerLists, RemoteEntry, RemoteMap, Side};
