//! Ring rotation: the collective that circulates every rank's published
//! indices to every other rank.
//!
//! Ranks form a logical ring in rank order. For `P - 1` hops, each rank
//! sends its current buffer to `rank + 1` and receives from `rank - 1`
//! (mod `P`); the received buffer becomes the next hop's outgoing buffer.
//! Even ranks send then receive, odd ranks receive then send, so some rank
//! on every cycle of the ring is always ready to receive. Sends are
//! synchronous: memory never exceeds the two hop buffers regardless of P.
//!
//! Any transport error aborts the collective; there is no partial-success
//! story, every rank must run the same number of hops.

use crate::comm::Communicator;
use crate::error::Result;

/// Rotate `first_out` around the ring, handing each received message to
/// `on_message` together with the rank that originated it.
///
/// `capacity` must bound the byte size of every rank's initial message;
/// callers derive it from the all-reduced maximum publication count.
pub fn rotate<F>(
    comm: &dyn Communicator,
    tag: i32,
    capacity: usize,
    first_out: Vec<u8>,
    mut on_message: F,
) -> Result<()>
where
    F: FnMut(usize, &[u8]) -> Result<()>,
{
    let rank = comm.rank();
    let procs = comm.size();
    let next = (rank + 1) % procs;
    let prev = (rank + procs - 1) % procs;

    let mut out_len = first_out.len();
    let mut out_buf = first_out;
    out_buf.resize(capacity, 0);
    let mut in_buf = vec![0u8; capacity];

    for hop in 1..procs {
        let received = if rank % 2 == 0 {
            comm.sync_send(&out_buf[..out_len], next, tag)?;
            comm.recv(&mut in_buf, prev, tag)?
        } else {
            let received = comm.recv(&mut in_buf, prev, tag)?;
            comm.sync_send(&out_buf[..out_len], next, tag)?;
            received
        };

        let origin = (rank + procs - hop) % procs;
        tracing::trace!(hop, origin, bytes = received, "ring hop");
        on_message(origin, &in_buf[..received])?;

        std::mem::swap(&mut out_buf, &mut in_buf);
        out_len = received;
    }
    Ok(())
}
