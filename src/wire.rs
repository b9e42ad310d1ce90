//! Big-endian integer primitives and domain-name (de)compression (RFC 1035 §4.1.4).

use thiserror::Error;

/// Pointer jumps are bounded; a chain longer than this is treated as a cycle.
const MAX_POINTER_JUMPS: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("buffer underflow at offset {0}")]
    Underflow(usize),
    #[error("reserved label length bits at offset {0}")]
    ReservedLabelBits(usize),
    #[error("compression pointer at offset {0} does not point strictly backward")]
    PointerNotBackward(usize),
    #[error("compression pointer chain exceeded {0} jumps")]
    PointerChainTooLong(usize),
    #[error("domain name exceeds 255 wire bytes")]
    NameTooLong,
    #[error("label exceeds 63 bytes: {0}")]
    LabelTooLong(usize),
    #[error("label at offset {0} is not valid UTF-8")]
    InvalidUtf8(usize),
}

pub fn read_u8(msg: &[u8], cursor: &mut usize) -> Result<u8, WireError> {
    let v = *msg.get(*cursor).ok_or(WireError::Underflow(*cursor))?;
    *cursor += 1;
    Ok(v)
}

pub fn read_u16(msg: &[u8], cursor: &mut usize) -> Result<u16, WireError> {
    if *cursor + 2 > msg.len() {
        return Err(WireError::Underflow(*cursor));
    }
    let v = u16::from_be_bytes([msg[*cursor], msg[*cursor + 1]]);
    *cursor += 2;
    Ok(v)
}

pub fn read_u32(msg: &[u8], cursor: &mut usize) -> Result<u32, WireError> {
    if *cursor + 4 > msg.len() {
        return Err(WireError::Underflow(*cursor));
    }
    let v = u32::from_be_bytes([msg[*cursor], msg[*cursor + 1], msg[*cursor + 2], msg[*cursor + 3]]);
    *cursor += 4;
    Ok(v)
}

/// Reads exactly `n` bytes starting at `*cursor`, advancing it by `n`.
pub fn read_string(msg: &[u8], cursor: &mut usize, n: usize) -> Result<Vec<u8>, WireError> {
    if *cursor + n > msg.len() {
        return Err(WireError::Underflow(*cursor));
    }
    let v = msg[*cursor..*cursor + n].to_vec();
    *cursor += n;
    Ok(v)
}

pub fn write_u8(buf: &mut Vec<u8>, v: u8) {
    buf.push(v);
}

pub fn write_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_be_bytes());
}

pub fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// Reads a (possibly compressed) domain name starting at `*cursor`.
///
/// `*cursor` is always advanced past the name's on-wire representation in the
/// *current* stream: if a pointer is followed, the outer cursor stops right
/// after the 2-byte pointer, regardless of how far the jump chain reads.
pub fn read_domain(msg: &[u8], cursor: &mut usize) -> Result<String, WireError> {
    let mut labels: Vec<String> = Vec::new();
    let mut pos = *cursor;
    let mut after_pointer: Option<usize> = None;
    let mut jumps = 0usize;
    let mut total_len = 0usize;

    loop {
        if pos >= msg.len() {
            return Err(WireError::Underflow(pos));
        }
        let len = msg[pos];

        match len & 0xC0 {
            0x00 => {
                if len == 0 {
                    pos += 1;
                    if after_pointer.is_none() {
                        after_pointer = Some(pos);
                    }
                    break;
                }
                let label_len = len as usize;
                let start = pos + 1;
                let end = start + label_len;
                if end > msg.len() {
                    return Err(WireError::Underflow(start));
                }
                let label = std::str::from_utf8(&msg[start..end])
                    .map_err(|_| WireError::InvalidUtf8(start))?
                    .to_string();
                labels.push(label);
                total_len += label_len + 1;
                if total_len > 255 {
                    return Err(WireError::NameTooLong);
                }
                pos = end;
            }
            0xC0 => {
                if pos + 1 >= msg.len() {
                    return Err(WireError::Underflow(pos));
                }
                let offset = (((len & 0x3F) as usize) << 8) | msg[pos + 1] as usize;
                if after_pointer.is_none() {
                    after_pointer = Some(pos + 2);
                }
                // Must strictly move backward, so the chain cannot cycle.
                if offset >= pos {
                    return Err(WireError::PointerNotBackward(pos));
                }
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return Err(WireError::PointerChainTooLong(MAX_POINTER_JUMPS));
                }
                pos = offset;
            }
            _ => return Err(WireError::ReservedLabelBits(pos)),
        }
    }

    *cursor = after_pointer.unwrap_or(pos);
    Ok(labels.join("."))
}
