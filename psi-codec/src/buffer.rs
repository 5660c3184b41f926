//! Bounds-checked bit/byte cursor used by every decoder and encoder.
//!
//! A [`PsiBuffer`] holds one byte region and two independent cursors, one for
//! reading and one for writing. Both are tracked at bit granularity, most
//! significant bit first. The readable area is bounded by the write cursor, so
//! a buffer created from existing bytes can be read up to its end, and a
//! buffer being written can be re-read up to what has been written so far.
//!
//! Nothing in here panics on malformed input. Reading past the bound sets a
//! sticky read error and yields zero; writing past the capacity (or a value
//! wider than its field) sets a sticky write error. Decoders guard their loops
//! with [`PsiBuffer::can_read`] / [`PsiBuffer::can_read_bytes`].
//!
//! ```text
//! +------------------+----------------+-----------------+
//! |   already read   |    readable    |  free capacity  |
//! +------------------+----------------+-----------------+
//! 0               read cursor     write cursor      capacity
//! ```

use bytes::{Bytes, BytesMut};

/// Maximum payload size of a descriptor (8-bit length field).
pub const MAX_DESCRIPTOR_PAYLOAD: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Position {
    byte: usize,
    bit: u8,
}

impl Position {
    fn bits(self) -> usize {
        self.byte * 8 + self.bit as usize
    }

    fn advance(&mut self, bits: usize) {
        let total = self.bits() + bits;
        self.byte = total / 8;
        self.bit = (total % 8) as u8;
    }
}

/// A pending sub-region, closed by [`PsiBuffer::pop_state`].
#[derive(Debug, Clone, Copy)]
enum Region {
    /// Reading restricted to `[.., end)`; `saved_end` is the outer bound.
    Read { saved_end: usize, end: usize },
    /// A length placeholder waiting to be back-patched.
    Write {
        length_at: Position,
        length_bits: u8,
        content_start: usize,
    },
}

/// Bit- and byte-granular cursor over a bounded byte region.
#[derive(Debug, Clone)]
pub struct PsiBuffer {
    data: BytesMut,
    read: Position,
    write: Position,
    /// Byte bound on reading, narrowed by read sub-regions.
    read_end: usize,
    regions: Vec<Region>,
    read_error: bool,
    write_error: bool,
    user_error: bool,
}

impl PsiBuffer {
    /// Create an empty buffer able to hold `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        PsiBuffer {
            data: BytesMut::zeroed(capacity),
            read: Position::default(),
            write: Position::default(),
            read_end: capacity,
            regions: Vec::new(),
            read_error: false,
            write_error: false,
            user_error: false,
        }
    }

    /// Create a buffer for decoding: readable from the start, full for writing.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut buf = PsiBuffer::with_capacity(data.len());
        buf.data.copy_from_slice(data);
        buf.write = Position {
            byte: data.len(),
            bit: 0,
        };
        buf
    }

    /// Total capacity of the region in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    // ------------------------------------------------------------------
    // Error state
    // ------------------------------------------------------------------

    /// A read went past the readable bound.
    pub fn read_error(&self) -> bool {
        self.read_error
    }

    /// A write went past the capacity, or a value did not fit its field.
    pub fn write_error(&self) -> bool {
        self.write_error
    }

    /// A decoder detected a schema inconsistency.
    pub fn user_error(&self) -> bool {
        self.user_error
    }

    /// Any of the three error flags.
    pub fn error(&self) -> bool {
        self.read_error || self.write_error || self.user_error
    }

    /// Flag the content as inconsistent with its schema.
    pub fn set_user_error(&mut self) {
        self.user_error = true;
    }

    // ------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------

    fn read_limit_bits(&self) -> usize {
        (self.read_end * 8).min(self.write.bits())
    }

    /// Number of bits left to read in the current region.
    pub fn remaining_read_bits(&self) -> usize {
        self.read_limit_bits().saturating_sub(self.read.bits())
    }

    /// Number of whole bytes left to read in the current region.
    pub fn remaining_read_bytes(&self) -> usize {
        self.remaining_read_bits() / 8
    }

    /// At least one bit can be read and no read error occurred.
    pub fn can_read(&self) -> bool {
        self.can_read_bits(1)
    }

    /// `bits` bits can be read without error.
    pub fn can_read_bits(&self, bits: usize) -> bool {
        !self.read_error && self.remaining_read_bits() >= bits
    }

    /// `bytes` bytes can be read without error.
    pub fn can_read_bytes(&self, bytes: usize) -> bool {
        self.can_read_bits(bytes * 8)
    }

    /// The read cursor reached the end of the current region.
    pub fn end_of_read(&self) -> bool {
        self.remaining_read_bits() == 0
    }

    /// The read cursor is on a byte boundary.
    pub fn read_is_byte_aligned(&self) -> bool {
        self.read.bit == 0
    }

    /// Current read position in bytes (rounded down).
    pub fn read_position(&self) -> usize {
        self.read.byte
    }

    /// Read an unsigned value of `bits` bits (at most 64).
    ///
    /// Returns zero and sets the read error when not enough bits remain;
    /// the cursor is not moved in that case.
    pub fn get_bits(&mut self, bits: usize) -> u64 {
        if bits == 0 {
            return 0;
        }
        if bits > 64 || !self.can_read_bits(bits) {
            self.read_error = true;
            return 0;
        }
        let mut value = 0u64;
        let mut remaining = bits;
        while remaining > 0 {
            let byte = self.data[self.read.byte];
            let avail = 8 - self.read.bit as usize;
            let take = avail.min(remaining);
            let shift = avail - take;
            let chunk = (byte >> shift) as u64 & low_mask(take);
            value = (value << take) | chunk;
            self.read.advance(take);
            remaining -= take;
        }
        value
    }

    /// Read one bit as a flag.
    pub fn get_bit(&mut self) -> bool {
        self.get_bits(1) != 0
    }

    pub fn get_u8(&mut self) -> u8 {
        self.get_bits(8) as u8
    }

    pub fn get_u16(&mut self) -> u16 {
        self.get_bits(16) as u16
    }

    pub fn get_u24(&mut self) -> u32 {
        self.get_bits(24) as u32
    }

    pub fn get_u32(&mut self) -> u32 {
        self.get_bits(32) as u32
    }

    pub fn get_u48(&mut self) -> u64 {
        self.get_bits(48)
    }

    pub fn get_u64(&mut self) -> u64 {
        self.get_bits(64)
    }

    /// Skip `bits` bits.
    pub fn skip_bits(&mut self, bits: usize) {
        if !self.can_read_bits(bits) {
            self.read_error = true;
            return;
        }
        self.read.advance(bits);
    }

    /// Skip reserved bits. Their content is not checked.
    pub fn skip_reserved_bits(&mut self, bits: usize) {
        self.skip_bits(bits);
    }

    /// Read `count` bytes. Returns an empty vector on error.
    pub fn get_bytes(&mut self, count: usize) -> Vec<u8> {
        if !self.can_read_bytes(count) {
            self.read_error = true;
            return Vec::new();
        }
        if self.read_is_byte_aligned() {
            let start = self.read.byte;
            self.read.byte += count;
            self.data[start..start + count].to_vec()
        } else {
            (0..count).map(|_| self.get_u8()).collect()
        }
    }

    /// Read all remaining whole bytes of the current region.
    pub fn get_remaining_bytes(&mut self) -> Vec<u8> {
        let count = self.remaining_read_bytes();
        self.get_bytes(count)
    }

    /// Read a 3-character ISO 639 language code (one byte per character).
    pub fn get_language_code(&mut self) -> String {
        if !self.can_read_bytes(3) {
            self.read_error = true;
            return String::new();
        }
        self.get_bytes(3).into_iter().map(char::from).collect()
    }

    /// Read a length field of `bits` bits and restrict reading to that many
    /// bytes until the matching [`pop_state`](Self::pop_state).
    ///
    /// A length larger than what remains sets the read error; the region is
    /// then clamped to the available bytes.
    pub fn push_read_size_from_length(&mut self, bits: usize) {
        let length = self.get_bits(bits) as usize;
        if !self.read_is_byte_aligned() {
            self.read_error = true;
        }
        let available = self.remaining_read_bytes();
        if length > available {
            self.read_error = true;
        }
        let end = self.read.byte + length.min(available);
        self.regions.push(Region::Read {
            saved_end: self.read_end,
            end,
        });
        self.read_end = end;
    }

    // ------------------------------------------------------------------
    // Write side
    // ------------------------------------------------------------------

    /// Number of bits that can still be written.
    pub fn remaining_write_bits(&self) -> usize {
        (self.capacity() * 8).saturating_sub(self.write.bits())
    }

    /// The write cursor is on a byte boundary.
    pub fn write_is_byte_aligned(&self) -> bool {
        self.write.bit == 0
    }

    /// Number of bytes written so far, counting a partial last byte.
    pub fn write_position(&self) -> usize {
        self.write.byte + usize::from(self.write.bit > 0)
    }

    /// Write `value` on `bits` bits (at most 64).
    ///
    /// A value wider than `bits` or a lack of capacity sets the write error
    /// and writes nothing.
    pub fn put_bits(&mut self, value: u64, bits: usize) {
        if bits == 0 || self.write_error {
            return;
        }
        if bits > 64 || (bits < 64 && value >> bits != 0) || self.remaining_write_bits() < bits {
            self.write_error = true;
            return;
        }
        let at = self.write;
        store_bits(&mut self.data, at, value, bits);
        self.write.advance(bits);
    }

    pub fn put_bit(&mut self, bit: bool) {
        self.put_bits(u64::from(bit), 1);
    }

    pub fn put_u8(&mut self, value: u8) {
        self.put_bits(value as u64, 8);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.put_bits(value as u64, 16);
    }

    pub fn put_u24(&mut self, value: u32) {
        self.put_bits(value as u64, 24);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.put_bits(value as u64, 32);
    }

    pub fn put_u48(&mut self, value: u64) {
        self.put_bits(value, 48);
    }

    pub fn put_u64(&mut self, value: u64) {
        self.put_bits(value, 64);
    }

    /// Write `bits` reserved bits, normalized to zero.
    pub fn put_reserved(&mut self, bits: usize) {
        let mut left = bits;
        while left > 0 {
            let chunk = left.min(64);
            self.put_bits(0, chunk);
            left -= chunk;
        }
    }

    /// Write a byte string.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        if self.write_error {
            return;
        }
        if self.remaining_write_bits() < bytes.len() * 8 {
            self.write_error = true;
            return;
        }
        if self.write_is_byte_aligned() {
            let start = self.write.byte;
            self.data[start..start + bytes.len()].copy_from_slice(bytes);
            self.write.byte += bytes.len();
        } else {
            for &b in bytes {
                self.put_u8(b);
            }
        }
    }

    /// Write a 3-character language code. Anything else is a write error.
    pub fn put_language_code(&mut self, code: &str) {
        let bytes: Option<Vec<u8>> = code.chars().map(|c| u8::try_from(c).ok()).collect();
        match bytes {
            Some(bytes) if bytes.len() == 3 => self.put_bytes(&bytes),
            _ => self.write_error = true,
        }
    }

    /// Reserve a length field of `bits` bits; the content that follows is
    /// measured and the field back-patched by [`pop_state`](Self::pop_state).
    ///
    /// The write cursor must be byte-aligned after the length field.
    pub fn push_write_sequence_with_leading_length(&mut self, bits: usize) {
        let length_at = self.write;
        self.put_bits(0, bits);
        if !self.write_is_byte_aligned() {
            self.write_error = true;
        }
        self.regions.push(Region::Write {
            length_at,
            length_bits: bits.min(64) as u8,
            content_start: self.write.byte,
        });
    }

    /// Close the innermost sub-region.
    ///
    /// For a read region, the unread part of the region is skipped and the
    /// outer bound restored. For a write region, the length placeholder is
    /// filled with the size of the content written since. Returns `false`
    /// when there is no open region.
    pub fn pop_state(&mut self) -> bool {
        match self.regions.pop() {
            None => false,
            Some(Region::Read { saved_end, end }) => {
                if self.read.bits() < end * 8 {
                    self.read = Position { byte: end, bit: 0 };
                }
                self.read_end = saved_end;
                true
            }
            Some(Region::Write {
                length_at,
                length_bits,
                content_start,
            }) => {
                if self.write_error {
                    return true;
                }
                let bits = length_bits as usize;
                let length = self.write_position().saturating_sub(content_start) as u64;
                if !self.write_is_byte_aligned() || (bits < 64 && length >> bits != 0) {
                    self.write_error = true;
                } else {
                    store_bits(&mut self.data, length_at, length, bits);
                }
                true
            }
        }
    }

    /// Number of sub-regions currently open.
    pub fn open_regions(&self) -> usize {
        self.regions.len()
    }

    /// Copy of everything written so far.
    pub fn bytes_written(&self) -> Bytes {
        Bytes::copy_from_slice(&self.data[..self.write_position()])
    }
}

fn low_mask(bits: usize) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Overwrite `bits` bits at `at` with the low bits of `value`.
fn store_bits(data: &mut BytesMut, at: Position, value: u64, bits: usize) {
    let mut pos = at;
    let mut remaining = bits;
    while remaining > 0 {
        let room = 8 - pos.bit as usize;
        let take = room.min(remaining);
        let shift = room - take;
        let chunk = (value >> (remaining - take)) & low_mask(take);
        let mask = (low_mask(take) << shift) as u8;
        let byte = &mut data[pos.byte];
        *byte = (*byte & !mask) | ((chunk << shift) as u8 & mask);
        pos.advance(take);
        remaining -= take;
    }
}
