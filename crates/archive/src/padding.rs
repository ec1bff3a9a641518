//! Alignment and padding engine
//!
//! Record payloads are consumed zero-copy (memory mapped) downstream, so
//! every payload must start on an alignment boundary. The pad sits inside
//! the record's local header as a ZIP extra field:
//!
//! ```text
//! [local header][name][zip64 extra?]["FB" u16 id][pad len u16][pad bytes][payload]
//!                                                                        ^ aligned
//! ```

/// ZIP extra field id carrying the alignment pad ("FB", little-endian)
pub const PADDING_EXTRA_ID: u16 = 0x4246;

/// Size of an extra field's id + length prefix
pub const EXTRA_FIELD_HEADER_SIZE: u64 = 4;

/// Byte value used for padding
pub const PAD_BYTE: u8 = 0;

/// Minimum pad so that `position + pad` is a multiple of `alignment`.
///
/// `alignment` must be a power of two.
pub fn padding_len(position: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    let mask = alignment - 1;
    (alignment - (position & mask)) & mask
}

/// Round `position` up to the next multiple of `alignment`.
pub fn align_up(position: u64, alignment: u64) -> u64 {
    position + padding_len(position, alignment)
}

/// Returns true if `position` is a multiple of `alignment`.
pub fn is_aligned(position: u64, alignment: u64) -> bool {
    padding_len(position, alignment) == 0
}

/// Append the padding extra field for a payload that would otherwise start
/// at `payload_start` (the position right after this extra's 4-byte
/// prefix). Returns the pad length written.
pub fn write_padding_extra(buf: &mut Vec<u8>, payload_start: u64, alignment: u64) -> u16 {
    // alignment <= MAX_ALIGNMENT, so the pad always fits in a u16
    let pad = padding_len(payload_start, alignment) as u16;
    buf.extend_from_slice(&PADDING_EXTRA_ID.to_le_bytes());
    buf.extend_from_slice(&pad.to_le_bytes());
    buf.resize(buf.len() + pad as usize, PAD_BYTE);
    pad
}
