//! Wire codec for the discovery protocol.
//!
//! Fixed little-endian layout. A message is a header of three u32 values
//! (`send_two`, `n_source`, `n_dest`) followed by `n_source`, then
//! optionally `n_dest`, nine-byte records: the 64-bit global index and one
//! attribute byte. An index's state and visibility are peer-private and
//! never cross the wire.
//!
//! All functions take an explicit position cursor that advances past the
//! bytes consumed or produced. A cursor outside the buffer is fatal: the
//! sender sized the buffer from the all-reduced maximum publication count,
//! so an overrun means a mis-count or corruption.

use crate::error::{HaloclineError, Result};
use crate::index::GlobalIndex;

/// Encoded size of one `(global, attribute)` record.
pub const RECORD_BYTES: usize = 8 + 1;

/// Encoded size of the message header.
pub const HEADER_BYTES: usize = 3 * 4;

fn overrun(what: &str, need: usize, position: usize, len: usize) -> HaloclineError {
    HaloclineError::Codec(format!(
        "{what}: {need} bytes at offset {position} exceed buffer of {len}"
    ))
}

pub fn pack_u32(value: u32, buf: &mut [u8], position: &mut usize) -> Result<()> {
    let end = *position + 4;
    if end > buf.len() {
        return Err(overrun("pack u32", 4, *position, buf.len()));
    }
    buf[*position..end].copy_from_slice(&value.to_le_bytes());
    *position = end;
    Ok(())
}

pub fn unpack_u32(buf: &[u8], position: &mut usize) -> Result<u32> {
    let end = *position + 4;
    if end > buf.len() {
        return Err(overrun("unpack u32", 4, *position, buf.len()));
    }
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[*position..end]);
    *position = end;
    Ok(u32::from_le_bytes(bytes))
}

/// Append one `(global, attribute)` record.
pub fn pack_pair(
    global: GlobalIndex,
    attribute: u8,
    buf: &mut [u8],
    position: &mut usize,
) -> Result<()> {
    let end = *position + RECORD_BYTES;
    if end > buf.len() {
        return Err(overrun("pack record", RECORD_BYTES, *position, buf.len()));
    }
    buf[*position..*position + 8].copy_from_slice(&global.to_le_bytes());
    buf[*position + 8] = attribute;
    *position = end;
    Ok(())
}

/// Read one `(global, attribute)` record.
pub fn unpack_pair(buf: &[u8], position: &mut usize) -> Result<(GlobalIndex, u8)> {
    let end = *position + RECORD_BYTES;
    if end > buf.len() {
        return Err(overrun("unpack record", RECORD_BYTES, *position, buf.len()));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[*position..*position + 8]);
    let attribute = buf[*position + 8];
    *position = end;
    Ok((GlobalIndex::from_le_bytes(bytes), attribute))
}

/// Append the message header.
pub fn pack_header(
    send_two: bool,
    n_source: u32,
    n_dest: u32,
    buf: &mut [u8],
    position: &mut usize,
) -> Result<()> {
    pack_u32(u32::from(send_two), buf, position)?;
    pack_u32(n_source, buf, position)?;
    pack_u32(n_dest, buf, position)
}

/// Read the message header: `(send_two, n_source, n_dest)`.
pub fn unpack_header(buf: &[u8], position: &mut usize) -> Result<(bool, usize, usize)> {
    let send_two = unpack_u32(buf, position)? != 0;
    let n_source = unpack_u32(buf, position)? as usize;
    let n_dest = unpack_u32(buf, position)? as usize;
    Ok((send_two, n_source, n_dest))
}
