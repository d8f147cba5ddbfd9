//! MPI communication backend.
//!
//! Requires the `distributed` feature flag and an MPI installation.
//! Implements [`Communicator`] using `mpi::traits::*` for tagged
//! point-to-point messages and the MAX all-reduce.
//!
//! # Usage
//!
//! The caller must initialize MPI before constructing `MpiComm`:
//!
//! ```ignore
//! let universe = mpi::initialize().expect("MPI init failed");
//! let comm = MpiComm::new();
//! ```

use mpi::collective::SystemOperation;
use mpi::datatype::Equivalence;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use super::Communicator;
use crate::error::{HaloclineError, Result};

/// MPI-based communication backend.
///
/// Wraps the MPI world communicator. Requires `mpi::initialize()` to have
/// been called before construction.
pub struct MpiComm;

impl MpiComm {
    /// Create a new MPI communication backend.
    ///
    /// Panics if MPI has not been initialized via `mpi::initialize()`.
    pub fn new() -> Self {
        Self
    }
}

impl Default for MpiComm {
    fn default() -> Self {
        Self::new()
    }
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        let world = SimpleCommunicator::world();
        world.rank() as usize
    }

    fn size(&self) -> usize {
        let world = SimpleCommunicator::world();
        world.size() as usize
    }

    fn sync_send(&self, buf: &[u8], dest: usize, tag: i32) -> Result<()> {
        let world = SimpleCommunicator::world();
        world
            .process_at_rank(dest as i32)
            .synchronous_send_with_tag(buf, tag);
        Ok(())
    }

    fn recv(&self, buf: &mut [u8], source: usize, tag: i32) -> Result<usize> {
        let world = SimpleCommunicator::world();
        let status = world
            .process_at_rank(source as i32)
            .receive_into_with_tag(buf, tag);
        let count = status.count(u8::equivalent_datatype());
        if count < 0 {
            return Err(HaloclineError::Transport(format!(
                "receive from rank {source} reported negative count {count}"
            )));
        }
        Ok(count as usize)
    }

    fn all_reduce_max(&self, local: usize) -> Result<usize> {
        let world = SimpleCommunicator::world();
        let local = local as u64;
        let mut global = 0u64;
        world.all_reduce_into(&local, &mut global, SystemOperation::max());
        Ok(global as usize)
    }
}
