//! Remote index discovery for distributed sparse linear algebra.
//!
//! In a distributed iterative solver each process owns an ascending-by-
//! global set of indices; degrees of freedom on subdomain boundaries exist
//! on several processes at once, each with its own attribute. Before any
//! value exchange, every process needs to know which of its local indices
//! its peers also hold, and with which attribute there. [`RemoteMap`]
//! computes exactly that: a ring collective circulates every rank's
//! published `(global, attribute)` records, and an ordered merge against
//! the local sets produces per-peer send and receive lists.
//!
//! Communication goes through the [`comm::Communicator`] trait: a no-op
//! single-process backend, an in-process multi-rank backend for tests and
//! simulation, and an MPI backend behind the `distributed` feature.

pub mod comm;
pub mod error;
pub mod exchange;
pub mod index;
pub mod vector;

pub use error::{HaloclineError, Result};
pub use exchange::{PairHandle, PeerLists, RemoteEntry, RemoteMap, Side};
pub use index::{Attribute, GlobalIndex, IndexPair, IndexSet, IndexState, LocalIndex};
