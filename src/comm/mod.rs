//! Communication backend abstraction for the discovery collective.
//!
//! Provides a trait for the point-to-point and reduction primitives the
//! ring rotation needs and a no-op single-process implementation.

pub mod local;
#[cfg(feature = "distributed")]
pub mod mpi;

use crate::error::{HaloclineError, Result};

/// Abstraction over inter-process communication.
///
/// Implementations: [`SingleProcessComm`] (no-op), [`local::LocalRingComm`]
/// (in-process, for tests and simulation), `mpi::MpiComm` (via the mpi
/// crate, behind the `distributed` feature).
pub trait Communicator: Send + Sync {
    /// This process's rank.
    fn rank(&self) -> usize;

    /// Total number of ranks.
    fn size(&self) -> usize;

    /// Synchronous send of a byte message: must not complete before the
    /// matching receive has been posted on `dest`.
    fn sync_send(&self, buf: &[u8], dest: usize, tag: i32) -> Result<()>;

    /// Blocking receive of one message from `source` into `buf`.
    ///
    /// Returns the number of bytes received, which may be smaller than
    /// `buf.len()`.
    fn recv(&self, buf: &mut [u8], source: usize, tag: i32) -> Result<usize>;

    /// Max of a local count across all ranks.
    fn all_reduce_max(&self, local: usize) -> Result<usize>;
}

/// No-op communication backend for single-process execution.
///
/// Reductions pass through unchanged. Point-to-point calls fail: a single
/// process has no peers to exchange with.
pub struct SingleProcessComm;

impl Communicator for SingleProcessComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn sync_send(&self, _buf: &[u8], dest: usize, _tag: i32) -> Result<()> {
        Err(HaloclineError::Transport(format!(
            "single-process communicator has no peer rank {dest}"
        )))
    }

    fn recv(&self, _buf: &mut [u8], source: usize, _tag: i32) -> Result<usize> {
        Err(HaloclineError::Transport(format!(
            "single-process communicator has no peer rank {source}"
        )))
    }

    fn all_reduce_max(&self, local: usize) -> Result<usize> {
        Ok(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_process_rank_and_size() {
        let comm = SingleProcessComm;
        assert_eq!(comm.rank(), 0);
        assert_eq!(comm.size(), 1);
    }

    #[test]
    fn single_process_all_reduce_max_is_identity() {
        let comm = SingleProcessComm;
        assert_eq!(comm.all_reduce_max(42).unwrap(), 42);
        assert_eq!(comm.all_reduce_max(0).unwrap(), 0);
    }

    #[test]
    fn single_process_point_to_point_fails() {
        let comm = SingleProcessComm;
        assert!(comm.sync_send(&[1, 2, 3], 1, 0).is_err());
        let mut buf = [0u8; 4];
        assert!(comm.recv(&mut buf, 1, 0).is_err());
    }
}
