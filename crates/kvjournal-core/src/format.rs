//! Binary format of journal records
//!
//! Every record is one frame: FrameHeader (12 bytes) + body.
//!
//! Body layout (all integers little-endian):
//!   op(u8) + fingerprint(u64) + key_len(u32) + key + value_len(u32) + value + timestamp(i64) + ttl(i64)
//!
//! The header's magic and CRC32C let a reader skip a damaged frame and find
//! the next one; an incomplete frame at end of file is a torn write.

use crate::entry::{OpCode, Record};
use crate::error::{JournalError, JournalResult};

/// Magic bytes opening every frame: "KVJR"
pub const MAGIC: [u8; 4] = *b"KVJR";

/// Frame header size in bytes
pub const HEADER_SIZE: usize = 12;

/// Body bytes that do not depend on key/value length
pub const FIXED_BODY_SIZE: usize = 1 + 8 + 4 + 4 + 8 + 8;

/// Maximum key size in bytes (64KB)
pub const MAX_KEY_SIZE: usize = 64 * 1024;

/// Maximum value size in bytes (64MB)
pub const MAX_VALUE_SIZE: usize = 64 * 1024 * 1024;

/// Frame header
///
/// Layout:
///   [0..4]   magic:    [u8;4] - "KVJR"
///   [4..8]   length:   u32    - body length in bytes
///   [8..12]  checksum: u32    - CRC32C of body bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic: [u8; 4],
    pub length: u32,
    pub checksum: u32,
}

impl FrameHeader {
    pub fn new(length: u32, checksum: u32) -> Self {
        Self { magic: MAGIC, length, checksum }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..8].copy_from_slice(&self.length.to_le_bytes());
        buf[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        Self {
            magic: [bytes[0], bytes[1], bytes[2], bytes[3]],
            length: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            checksum: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        }
    }
}

/// Reject keys and values that cannot be framed.
///
/// Runs on the producer side so an oversized entry fails its `append`
/// instead of being dead-lettered later.
pub fn check_entry_size(key: &[u8], value: &[u8]) -> JournalResult<()> {
    if key.len() > MAX_KEY_SIZE {
        return Err(JournalError::OversizedEntry {
            component: "key",
            size: key.len() as u64,
            max: MAX_KEY_SIZE as u64,
        });
    }
    if value.len() > MAX_VALUE_SIZE {
        return Err(JournalError::OversizedEntry {
            component: "value",
            size: value.len() as u64,
            max: MAX_VALUE_SIZE as u64,
        });
    }
    Ok(())
}

/// Encode a record into a complete frame.
pub fn encode_record(record: &Record) -> JournalResult<Vec<u8>> {
    let key = record.key.as_bytes();
    check_entry_size(key, &record.value)?;

    let body_len = FIXED_BODY_SIZE + key.len() + record.value.len();
    let mut frame = Vec::with_capacity(HEADER_SIZE + body_len);
    frame.extend_from_slice(&[0u8; HEADER_SIZE]);

    frame.push(record.op as u8);
    frame.extend_from_slice(&record.fingerprint.to_le_bytes());
    frame.extend_from_slice(&(key.len() as u32).to_le_bytes());
    frame.extend_from_slice(key);
    frame.extend_from_slice(&(record.value.len() as u32).to_le_bytes());
    frame.extend_from_slice(&record.value);
    frame.extend_from_slice(&record.timestamp.to_le_bytes());
    frame.extend_from_slice(&record.ttl.to_le_bytes());

    let checksum = crc32c::crc32c(&frame[HEADER_SIZE..]);
    let header = FrameHeader::new(body_len as u32, checksum);
    frame[..HEADER_SIZE].copy_from_slice(&header.to_bytes());

    Ok(frame)
}

/// Decode the frame starting at `data[0]`.
///
/// Returns the record and the number of bytes consumed. `offset` is only used
/// for error context.
pub fn decode_record(data: &[u8], offset: u64) -> JournalResult<(Record, usize)> {
    if data.len() < HEADER_SIZE {
        return Err(JournalError::TornWrite {
            offset,
            needed: HEADER_SIZE as u64,
            available: data.len() as u64,
        });
    }

    let mut header_bytes = [0u8; HEADER_SIZE];
    header_bytes.copy_from_slice(&data[..HEADER_SIZE]);
    let header = FrameHeader::from_bytes(&header_bytes);

    if header.magic != MAGIC {
        return Err(JournalError::Corrupted {
            offset,
            reason: format!("bad magic {:02x?}", header.magic),
        });
    }

    let frame_len = HEADER_SIZE + header.length as usize;
    if data.len() < frame_len {
        return Err(JournalError::TornWrite {
            offset,
            needed: frame_len as u64,
            available: data.len() as u64,
        });
    }

    let body = &data[HEADER_SIZE..frame_len];
    let actual = crc32c::crc32c(body);
    if actual != header.checksum {
        return Err(JournalError::ChecksumMismatch {
            offset,
            expected: header.checksum,
            actual,
        });
    }

    let record = decode_body(body).map_err(|reason| JournalError::Corrupted { offset, reason })?;
    Ok((record, frame_len))
}

/// Parse a checksummed body. Errors here mean the writer and reader disagree
/// on layout, not that the disk lied.
fn decode_body(body: &[u8]) -> Result<Record, String> {
    let mut cursor = BodyCursor { body, pos: 0 };

    let op_byte = cursor.take(1)?[0];
    let op = OpCode::from_u8(op_byte).ok_or_else(|| format!("invalid op code {}", op_byte))?;
    let fingerprint = u64::from_le_bytes(cursor.array()?);

    let key_len = u32::from_le_bytes(cursor.array()?) as usize;
    let key = String::from_utf8(cursor.take(key_len)?.to_vec())
        .map_err(|e| format!("key is not UTF-8: {}", e))?;

    let value_len = u32::from_le_bytes(cursor.array()?) as usize;
    let value = cursor.take(value_len)?.to_vec();

    let timestamp = i64::from_le_bytes(cursor.array()?);
    let ttl = i64::from_le_bytes(cursor.array()?);

    if cursor.pos != body.len() {
        return Err(format!("{} trailing bytes in body", body.len() - cursor.pos));
    }

    Ok(Record { op, fingerprint, key, value, timestamp, ttl })
}

struct BodyCursor<'a> {
    body: &'a [u8],
    pos: usize,
}

impl<'a> BodyCursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.body.len()).ok_or_else(|| {
            format!("body too short: need {} bytes at {}, have {}", n, self.pos, self.body.len())
        })?;
        let body: &'a [u8] = self.body;
        let slice = &body[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], String> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

/// Scan forward for the next frame magic at or after `start`.
pub fn find_next_magic(buffer: &[u8], start: usize) -> Option<usize> {
    if buffer.len() < MAGIC.len() {
        return None;
    }
    (start..=buffer.len() - MAGIC.len()).find(|&i| buffer[i..i + MAGIC.len()] == MAGIC)
}
