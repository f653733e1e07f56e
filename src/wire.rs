//! Binary wire primitives: fixed-width scalar access at an explicit byte
//! order, and fixed-point scaling between vendor integer encodings and
//! canonical physical units.
//!
//! # Endianness
//! Every scalar read or written by a format codec goes through these
//! functions with the byte order named at the call site, never through
//! host-order casts. A format that stores big-endian fields simply
//! instantiates with [`BigEndian`]; no per-field swap branching anywhere
//! else in the crate.
//!
//! # Contract
//! These are pure functions over byte slices. They always succeed given
//! enough bytes; callers are responsible for bounds-checking slice length
//! before invoking them (the record codecs do so once per record, against
//! the declared payload size).
//!
//! # Fixed-point
//! Vendor formats store physical quantities as scaled integers (depth in
//! centimeters, headings in 0.01 degree, and so on). [`fixed_to_f64`] and
//! [`f64_to_fixed`] convert against an explicit scale; encoding rounds to
//! nearest so a round trip is bounded by half the scale step.

pub use byteorder::{BigEndian, ByteOrder, LittleEndian};

// ── Scalar get/put over byte slices ─────────────────────────────────────────

#[inline]
pub fn get_u8(buf: &[u8], at: usize) -> u8 {
    buf[at]
}

#[inline]
pub fn get_i8(buf: &[u8], at: usize) -> i8 {
    buf[at] as i8
}

#[inline]
pub fn get_u16<B: ByteOrder>(buf: &[u8], at: usize) -> u16 {
    B::read_u16(&buf[at..at + 2])
}

#[inline]
pub fn get_i16<B: ByteOrder>(buf: &[u8], at: usize) -> i16 {
    B::read_i16(&buf[at..at + 2])
}

#[inline]
pub fn get_u32<B: ByteOrder>(buf: &[u8], at: usize) -> u32 {
    B::read_u32(&buf[at..at + 4])
}

#[inline]
pub fn get_i32<B: ByteOrder>(buf: &[u8], at: usize) -> i32 {
    B::read_i32(&buf[at..at + 4])
}

#[inline]
pub fn get_u64<B: ByteOrder>(buf: &[u8], at: usize) -> u64 {
    B::read_u64(&buf[at..at + 8])
}

#[inline]
pub fn get_i64<B: ByteOrder>(buf: &[u8], at: usize) -> i64 {
    B::read_i64(&buf[at..at + 8])
}

#[inline]
pub fn get_f32<B: ByteOrder>(buf: &[u8], at: usize) -> f32 {
    B::read_f32(&buf[at..at + 4])
}

#[inline]
pub fn get_f64<B: ByteOrder>(buf: &[u8], at: usize) -> f64 {
    B::read_f64(&buf[at..at + 8])
}

#[inline]
pub fn put_u8(buf: &mut [u8], at: usize, v: u8) {
    buf[at] = v;
}

#[inline]
pub fn put_i8(buf: &mut [u8], at: usize, v: i8) {
    buf[at] = v as u8;
}

#[inline]
pub fn put_u16<B: ByteOrder>(buf: &mut [u8], at: usize, v: u16) {
    B::write_u16(&mut buf[at..at + 2], v);
}

#[inline]
pub fn put_i16<B: ByteOrder>(buf: &mut [u8], at: usize, v: i16) {
    B::write_i16(&mut buf[at..at + 2], v);
}

#[inline]
pub fn put_u32<B: ByteOrder>(buf: &mut [u8], at: usize, v: u32) {
    B::write_u32(&mut buf[at..at + 4], v);
}

#[inline]
pub fn put_i32<B: ByteOrder>(buf: &mut [u8], at: usize, v: i32) {
    B::write_i32(&mut buf[at..at + 4], v);
}

#[inline]
pub fn put_u64<B: ByteOrder>(buf: &mut [u8], at: usize, v: u64) {
    B::write_u64(&mut buf[at..at + 8], v);
}

#[inline]
pub fn put_i64<B: ByteOrder>(buf: &mut [u8], at: usize, v: i64) {
    B::write_i64(&mut buf[at..at + 8], v);
}

#[inline]
pub fn put_f32<B: ByteOrder>(buf: &mut [u8], at: usize, v: f32) {
    B::write_f32(&mut buf[at..at + 4], v);
}

#[inline]
pub fn put_f64<B: ByteOrder>(buf: &mut [u8], at: usize, v: f64) {
    B::write_f64(&mut buf[at..at + 8], v);
}

// ── Sequential cursor ───────────────────────────────────────────────────────

/// Walks a record payload field by field, advancing an index the way the
/// record layouts are documented. Bounds are the caller's concern, checked
/// once against the declared payload size before decoding begins.
pub struct WireCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn u8(&mut self) -> u8 {
        let v = get_u8(self.buf, self.pos);
        self.pos += 1;
        v
    }

    pub fn i16<B: ByteOrder>(&mut self) -> i16 {
        let v = get_i16::<B>(self.buf, self.pos);
        self.pos += 2;
        v
    }

    pub fn u16<B: ByteOrder>(&mut self) -> u16 {
        let v = get_u16::<B>(self.buf, self.pos);
        self.pos += 2;
        v
    }

    pub fn i32<B: ByteOrder>(&mut self) -> i32 {
        let v = get_i32::<B>(self.buf, self.pos);
        self.pos += 4;
        v
    }

    pub fn u32<B: ByteOrder>(&mut self) -> u32 {
        let v = get_u32::<B>(self.buf, self.pos);
        self.pos += 4;
        v
    }

    pub fn f32<B: ByteOrder>(&mut self) -> f32 {
        let v = get_f32::<B>(self.buf, self.pos);
        self.pos += 4;
        v
    }

    pub fn f64<B: ByteOrder>(&mut self) -> f64 {
        let v = get_f64::<B>(self.buf, self.pos);
        self.pos += 8;
        v
    }

    pub fn bytes(&mut self, n: usize) -> &'a [u8] {
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        s
    }
}

/// Write-side counterpart of [`WireCursor`]; appends fields to a growable
/// buffer so encoders never pre-compute record sizes by hand.
#[derive(Default)]
pub struct WireBuilder {
    buf: Vec<u8>,
}

impl WireBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            buf: Vec::with_capacity(n),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn i16<B: ByteOrder>(&mut self, v: i16) -> &mut Self {
        let mut tmp = [0u8; 2];
        B::write_i16(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
        self
    }

    pub fn u16<B: ByteOrder>(&mut self, v: u16) -> &mut Self {
        let mut tmp = [0u8; 2];
        B::write_u16(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
        self
    }

    pub fn i32<B: ByteOrder>(&mut self, v: i32) -> &mut Self {
        let mut tmp = [0u8; 4];
        B::write_i32(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
        self
    }

    pub fn u32<B: ByteOrder>(&mut self, v: u32) -> &mut Self {
        let mut tmp = [0u8; 4];
        B::write_u32(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
        self
    }

    pub fn f32<B: ByteOrder>(&mut self, v: f32) -> &mut Self {
        let mut tmp = [0u8; 4];
        B::write_f32(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
        self
    }

    pub fn f64<B: ByteOrder>(&mut self, v: f64) -> &mut Self {
        let mut tmp = [0u8; 8];
        B::write_f64(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
        self
    }

    pub fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(v);
        self
    }
}

// ── Fixed-point scaling ─────────────────────────────────────────────────────

/// Convert a scaled integer field to its physical value.
///
/// `scale` is the physical size of one integer step: 0.01 for centimeter
/// depths in meters, 0.1 for decidegree headings, and so on.
#[inline]
pub fn fixed_to_f64(raw: i32, scale: f64) -> f64 {
    raw as f64 * scale
}

/// Convert a physical value to the nearest scaled integer. Rounds to
/// nearest, ties away from zero, so `fixed_to_f64(f64_to_fixed(x, s), s)`
/// differs from `x` by at most `s / 2`.
#[inline]
pub fn f64_to_fixed(value: f64, scale: f64) -> i32 {
    (value / scale).round() as i32
}

/// Saturating variant for two-byte array fields. Values outside the i16
/// range clamp to the range edge instead of wrapping.
#[inline]
pub fn f64_to_fixed16(value: f64, scale: f64) -> i16 {
    let scaled = (value / scale).round();
    if scaled >= i16::MAX as f64 {
        i16::MAX
    } else if scaled <= i16::MIN as f64 {
        i16::MIN
    } else {
        scaled as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn scalar_round_trip_both_orders() {
        let mut buf = [0u8; 8];
        put_u32::<BigEndian>(&mut buf, 0, 0xDEAD_BEEF);
        assert_eq!(get_u32::<BigEndian>(&buf, 0), 0xDEAD_BEEF);
        assert_eq!(&buf[..4], &[0xDE, 0xAD, 0xBE, 0xEF]);

        put_u32::<LittleEndian>(&mut buf, 0, 0xDEAD_BEEF);
        assert_eq!(get_u32::<LittleEndian>(&buf, 0), 0xDEAD_BEEF);
        assert_eq!(&buf[..4], &[0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn cursor_walks_fields_in_order() {
        let mut b = WireBuilder::new();
        b.u16::<LittleEndian>(7)
            .f64::<LittleEndian>(123.5)
            .i16::<LittleEndian>(-40);
        let bytes = b.into_bytes();

        let mut c = WireCursor::new(&bytes);
        assert_eq!(c.u16::<LittleEndian>(), 7);
        assert_eq!(c.f64::<LittleEndian>(), 123.5);
        assert_eq!(c.i16::<LittleEndian>(), -40);
        assert_eq!(c.remaining(), 0);
    }

    #[test]
    fn fixed16_saturates() {
        assert_eq!(f64_to_fixed16(1.0e9, 0.01), i16::MAX);
        assert_eq!(f64_to_fixed16(-1.0e9, 0.01), i16::MIN);
    }

    proptest! {
        #[test]
        fn fixed_point_error_bounded_by_half_step(
            depth in -5000.0f64..5000.0,
            scale in prop::sample::select(vec![0.001, 0.01, 0.1]),
        ) {
            let raw = f64_to_fixed(depth, scale);
            let back = fixed_to_f64(raw, scale);
            prop_assert!((back - depth).abs() <= scale / 2.0 + 1e-12);
        }

        #[test]
        fn scalars_survive_slice_round_trip(v in any::<i64>(), at in 0usize..8) {
            let mut buf = [0u8; 16];
            put_i64::<BigEndian>(&mut buf, at, v);
            prop_assert_eq!(get_i64::<BigEndian>(&buf, at), v);
        }
    }
}
