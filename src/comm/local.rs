//! In-process communicator for tests and deterministic simulations.
//!
//! Simulates a multi-rank run inside a single process: every rank gets one
//! endpoint, endpoints are moved onto their own threads, and point-to-point
//! messages travel over rendezvous channels. A rendezvous channel
//! (`sync_channel(0)`) blocks the sender until the receiver arrives, which
//! is exactly the synchronous-send guarantee the ring rotation relies on
//! for bounded buffering.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Condvar, Mutex};

use super::Communicator;
use crate::error::{HaloclineError, Result};

struct Packet {
    tag: i32,
    payload: Vec<u8>,
}

/// Reusable all-reduce rendezvous shared by every endpoint of one group.
struct ReduceCell {
    round: Mutex<ReduceRound>,
    done: Condvar,
}

struct ReduceRound {
    arrived: usize,
    value: usize,
    result: usize,
    generation: u64,
}

impl ReduceCell {
    fn new() -> Self {
        Self {
            round: Mutex::new(ReduceRound {
                arrived: 0,
                value: 0,
                result: 0,
                generation: 0,
            }),
            done: Condvar::new(),
        }
    }
}

fn poisoned<T>(_: T) -> HaloclineError {
    HaloclineError::Transport("communicator state poisoned by a panicked rank".into())
}

/// One rank's endpoint of an in-process communicator group.
///
/// Create a connected group with [`LocalRingComm::connected`] and move each
/// endpoint onto its own thread.
pub struct LocalRingComm {
    rank: usize,
    size: usize,
    to_peer: Vec<Option<Mutex<SyncSender<Packet>>>>,
    from_peer: Vec<Option<Mutex<Receiver<Packet>>>>,
    reduce: Arc<ReduceCell>,
}

impl LocalRingComm {
    /// Build a fully connected group of `size` endpoints.
    ///
    /// Endpoint `i` of the returned vector is rank `i`.
    pub fn connected(size: usize) -> Vec<Self> {
        assert!(size > 0, "communicator group must have at least one rank");

        let reduce = Arc::new(ReduceCell::new());
        let mut senders: Vec<Vec<Option<Mutex<SyncSender<Packet>>>>> = (0..size)
            .map(|_| (0..size).map(|_| None).collect())
            .collect();
        let mut receivers: Vec<Vec<Option<Mutex<Receiver<Packet>>>>> = (0..size)
            .map(|_| (0..size).map(|_| None).collect())
            .collect();

        for src in 0..size {
            for dst in 0..size {
                if src == dst {
                    continue;
                }
                let (tx, rx) = sync_channel(0);
                senders[src][dst] = Some(Mutex::new(tx));
                receivers[dst][src] = Some(Mutex::new(rx));
            }
        }

        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (to_peer, from_peer))| Self {
                rank,
                size,
                to_peer,
                from_peer,
                reduce: Arc::clone(&reduce),
            })
            .collect()
    }
}

impl Communicator for LocalRingComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn sync_send(&self, buf: &[u8], dest: usize, tag: i32) -> Result<()> {
        let slot = self
            .to_peer
            .get(dest)
            .and_then(|slot| slot.as_ref())
            .ok_or_else(|| HaloclineError::Transport(format!("no route to rank {dest}")))?;
        let tx = slot.lock().map_err(poisoned)?;
        tx.send(Packet {
            tag,
            payload: buf.to_vec(),
        })
        .map_err(|_| HaloclineError::Transport(format!("rank {dest} disconnected")))
    }

    fn recv(&self, buf: &mut [u8], source: usize, tag: i32) -> Result<usize> {
        let slot = self
            .from_peer
            .get(source)
            .and_then(|slot| slot.as_ref())
            .ok_or_else(|| HaloclineError::Transport(format!("no route from rank {source}")))?;
        let rx = slot.lock().map_err(poisoned)?;
        let packet = rx
            .recv()
            .map_err(|_| HaloclineError::Transport(format!("rank {source} disconnected")))?;
        if packet.tag != tag {
            return Err(HaloclineError::Protocol(format!(
                "expected tag {tag} from rank {source}, got {}",
                packet.tag
            )));
        }
        if packet.payload.len() > buf.len() {
            return Err(HaloclineError::Transport(format!(
                "message of {} bytes from rank {source} exceeds receive buffer of {}",
                packet.payload.len(),
                buf.len()
            )));
        }
        buf[..packet.payload.len()].copy_from_slice(&packet.payload);
        Ok(packet.payload.len())
    }

    fn all_reduce_max(&self, local: usize) -> Result<usize> {
        let mut round = self.reduce.round.lock().map_err(poisoned)?;
        let generation = round.generation;
        round.value = round.value.max(local);
        round.arrived += 1;
        if round.arrived == self.size {
            // Last arrival publishes the result and opens the next round.
            round.result = round.value;
            round.value = 0;
            round.arrived = 0;
            round.generation += 1;
            self.reduce.done.notify_all();
            return Ok(round.result);
        }
        while round.generation == generation {
            round = self.reduce.done.wait(round).map_err(poisoned)?;
        }
        Ok(round.result)
    }
}
