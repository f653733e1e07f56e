//! The generic swath format ("gsw"): this crate's home wire format and
//! the reference instance of the codec contract.
//!
//! # Layout
//! A gsw stream is a bare sequence of self-describing records; there is no
//! file-level framing beyond an optional [`RecordKind::Header`] record at
//! the start. Every record is:
//!
//! ```text
//! magic        u16    0x4753
//! kind         u16    record kind tag
//! payload_len  u32    bytes following this header
//! checksum     u32    CRC32 of the payload bytes
//! payload      [u8; payload_len]
//! ```
//!
//! All scalars use the codec's byte order: big-endian for format id 71
//! (the interchange default), little-endian for 72. The two variants are
//! the same code instantiated at different [`ByteOrder`]s; no field-level
//! swap branching exists anywhere.
//!
//! # Fixed-point conventions
//! Ping bathymetry and sidescan arrays are two-byte fixed-point. Each ping
//! carries its own `depth_scale` and `distance_scale` (meters per count),
//! chosen at encode time from the ping's extrema, so deep and shallow
//! surveys both keep sub-centimeter-class resolution. Amplitude and
//! sidescan values use a fixed 0.01 scale. Null beams are written as a
//! null flag byte with zeroed value fields; readers must not interpret
//! the zeros.

use std::io::{Read, Write};
use std::marker::PhantomData;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use crc32fast::Hasher;

use crate::error::{Error, RecordCategory, Result};
use crate::format::{FormatCaps, FormatId, ReadSeek, SwathCodec};
use crate::record::{
    AttitudeGroup, AttitudeSample, BeamFlag, FileHeader, Navigation, Ping, ProcessingParameters,
    Record, RecordKind, SoundVelocityProfile,
};
use crate::wire::{f64_to_fixed16, fixed_to_f64, WireBuilder, WireCursor};

/// Record magic, first two bytes of every record header.
pub const GSW_MAGIC: u16 = 0x4753;
/// On-disk record header size in bytes.
pub const GSW_HEADER_SIZE: usize = 12;
/// Maximum number of bathymetry/amplitude beams a ping may declare.
pub const GSW_BEAMS_MAX: usize = 1024;
/// Maximum number of sidescan pixels a ping may declare.
pub const GSW_PIXELS_MAX: usize = 4096;
/// Upper bound on a plausible payload; larger declared sizes are treated
/// as corruption rather than honored.
const GSW_PAYLOAD_CAP: usize = 1 << 20;

/// Fixed scale for amplitude and sidescan intensity counts.
const INTENSITY_SCALE: f64 = 0.01;

// Record kind tags. Frozen; never reused.
const TAG_HEADER: u16 = 1;
const TAG_COMMENT: u16 = 2;
const TAG_DATA: u16 = 3;
const TAG_NAV: u16 = 4;
const TAG_ATTITUDE: u16 = 5;
const TAG_SVP: u16 = 6;
const TAG_PARAMS: u16 = 7;

// Ping presence flags.
const PF_AMPLITUDE: u8 = 0x01;
const PF_TRAVEL_TIME: u8 = 0x02;
const PF_SIDESCAN: u8 = 0x04;

fn tag_to_kind(tag: u16) -> Option<RecordKind> {
    match tag {
        TAG_HEADER => Some(RecordKind::Header),
        TAG_COMMENT => Some(RecordKind::Comment),
        TAG_DATA => Some(RecordKind::Data),
        TAG_NAV => Some(RecordKind::NavSource),
        TAG_ATTITUDE => Some(RecordKind::Attitude),
        TAG_SVP => Some(RecordKind::SoundVelocityProfile),
        TAG_PARAMS => Some(RecordKind::ProcessingParameters),
        _ => None,
    }
}

/// Codec for the generic swath format, parameterized by byte order.
#[derive(Debug)]
pub struct GswCodec<B: ByteOrder + Send + 'static> {
    caps: FormatCaps,
    /// Payload scratch, sized once and reused across records.
    scratch: Vec<u8>,
    _order: PhantomData<B>,
}

impl GswCodec<BigEndian> {
    /// Format id 71: big-endian generic swath.
    pub fn big_endian() -> Self {
        Self::with_order()
    }
}

impl GswCodec<LittleEndian> {
    /// Format id 72: little-endian generic swath.
    pub fn little_endian() -> Self {
        Self::with_order()
    }
}

impl<B: ByteOrder + Send + 'static> GswCodec<B> {
    fn with_order() -> Self {
        GswCodec {
            caps: FormatCaps {
                variable_beams: true,
                travel_times: true,
                beam_flagging: true,
                nav_source: RecordKind::Data,
                heading_source: RecordKind::Data,
                attitude_source: RecordKind::Attitude,
                svp_source: RecordKind::SoundVelocityProfile,
                beams_bath_max: GSW_BEAMS_MAX,
                beams_amp_max: GSW_BEAMS_MAX,
                pixels_ss_max: GSW_PIXELS_MAX,
            },
            scratch: Vec::new(),
            _order: PhantomData,
        }
    }

    // ── Framing ─────────────────────────────────────────────────────────────

    /// Read one record header. A stream positioned exactly at end-of-data
    /// yields `Error::Eof`; a header truncated partway is corruption.
    fn read_header(&self, reader: &mut dyn ReadSeek) -> Result<(u16, usize, u32)> {
        let mut hdr = [0u8; GSW_HEADER_SIZE];
        let mut filled = 0usize;
        while filled < GSW_HEADER_SIZE {
            let n = reader.read(&mut hdr[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Err(Error::Eof);
                }
                return Err(Error::SizeMismatch {
                    declared: GSW_HEADER_SIZE,
                    found: filled,
                });
            }
            filled += n;
        }

        let magic = B::read_u16(&hdr[0..2]);
        if magic != GSW_MAGIC {
            return Err(Error::UnrecognizedRecord(magic));
        }
        let tag = B::read_u16(&hdr[2..4]);
        let payload_len = B::read_u32(&hdr[4..8]) as usize;
        let checksum = B::read_u32(&hdr[8..12]);
        if payload_len > GSW_PAYLOAD_CAP {
            return Err(Error::SizeMismatch {
                declared: payload_len,
                found: GSW_PAYLOAD_CAP,
            });
        }
        Ok((tag, payload_len, checksum))
    }

    fn read_payload(&mut self, reader: &mut dyn ReadSeek, len: usize) -> Result<()> {
        self.scratch.resize(len, 0);
        let mut filled = 0usize;
        while filled < len {
            let n = reader.read(&mut self.scratch[filled..])?;
            if n == 0 {
                return Err(Error::SizeMismatch {
                    declared: len,
                    found: filled,
                });
            }
            filled += n;
        }
        Ok(())
    }

    fn write_record(&self, writer: &mut dyn Write, tag: u16, payload: &[u8]) -> Result<()> {
        let mut hasher = Hasher::new();
        hasher.update(payload);
        let checksum = hasher.finalize();

        let mut hdr = [0u8; GSW_HEADER_SIZE];
        B::write_u16(&mut hdr[0..2], GSW_MAGIC);
        B::write_u16(&mut hdr[2..4], tag);
        B::write_u32(&mut hdr[4..8], payload.len() as u32);
        B::write_u32(&mut hdr[8..12], checksum);
        writer.write_all(&hdr).map_err(Error::Write)?;
        writer.write_all(payload).map_err(Error::Write)?;
        Ok(())
    }

    // ── Payload decoders ────────────────────────────────────────────────────

    fn decode_ping(&self) -> Result<Ping> {
        const FIXED_PART: usize = 8 * 5 + 4 * 5 + 2 + 4 + 4 + 1 + 2 + 2 + 2;
        let buf = &self.scratch;
        if buf.len() < FIXED_PART {
            return Err(Error::decode(
                RecordCategory::Data,
                format!("payload of {} bytes is below the fixed section", buf.len()),
            ));
        }
        let mut c = WireCursor::new(buf);
        let mut p = Ping {
            time_d: c.f64::<B>(),
            longitude: c.f64::<B>(),
            latitude: c.f64::<B>(),
            sensor_depth: c.f64::<B>(),
            altitude: c.f64::<B>(),
            heading: c.f32::<B>() as f64,
            speed: c.f32::<B>() as f64,
            roll: c.f32::<B>() as f64,
            pitch: c.f32::<B>() as f64,
            heave: c.f32::<B>() as f64,
            sensor_id: c.u16::<B>(),
            ..Ping::default()
        };
        let depth_scale = c.f32::<B>() as f64;
        let distance_scale = c.f32::<B>() as f64;
        let present = c.u8();
        let nbath = c.u16::<B>() as usize;
        let namp = c.u16::<B>() as usize;
        let npix = c.u16::<B>() as usize;

        if nbath > GSW_BEAMS_MAX {
            return Err(Error::InsufficientBuffer {
                needed: nbath,
                have: GSW_BEAMS_MAX,
            });
        }
        if namp > nbath {
            return Err(Error::decode(
                RecordCategory::Data,
                format!("amplitude count {namp} exceeds beam count {nbath}"),
            ));
        }
        if npix > GSW_PIXELS_MAX {
            return Err(Error::InsufficientBuffer {
                needed: npix,
                have: GSW_PIXELS_MAX,
            });
        }
        if present & PF_AMPLITUDE == 0 && namp != 0 {
            return Err(Error::decode(
                RecordCategory::Data,
                "amplitude count present without amplitude flag",
            ));
        }

        let has_amp = present & PF_AMPLITUDE != 0;
        let has_tt = present & PF_TRAVEL_TIME != 0;
        let has_ss = present & PF_SIDESCAN != 0;

        let mut expected = FIXED_PART + nbath * 7;
        if has_amp {
            expected += namp * 2;
        }
        if has_tt {
            expected += nbath * 8;
        }
        if has_ss {
            expected += npix * 6;
        }
        if buf.len() != expected {
            return Err(Error::SizeMismatch {
                declared: buf.len(),
                found: expected,
            });
        }

        p.flags.reserve(nbath);
        for _ in 0..nbath {
            p.flags.push(BeamFlag::from_u8(c.u8()));
        }
        p.bath.reserve(nbath);
        for _ in 0..nbath {
            p.bath.push(fixed_to_f64(c.i16::<B>() as i32, depth_scale));
        }
        p.across.reserve(nbath);
        for _ in 0..nbath {
            p.across.push(fixed_to_f64(c.i16::<B>() as i32, distance_scale));
        }
        p.along.reserve(nbath);
        for _ in 0..nbath {
            p.along.push(fixed_to_f64(c.i16::<B>() as i32, distance_scale));
        }
        if has_amp {
            p.amp.reserve(namp);
            for _ in 0..namp {
                p.amp.push(fixed_to_f64(c.i16::<B>() as i32, INTENSITY_SCALE));
            }
        }
        if has_tt {
            p.travel_time.reserve(nbath);
            for _ in 0..nbath {
                p.travel_time.push(c.f32::<B>() as f64);
            }
            p.angle.reserve(nbath);
            for _ in 0..nbath {
                p.angle.push(c.f32::<B>() as f64);
            }
        }
        if has_ss {
            p.ss.reserve(npix);
            for _ in 0..npix {
                p.ss.push(fixed_to_f64(c.i16::<B>() as i32, INTENSITY_SCALE));
            }
            p.ss_across.reserve(npix);
            for _ in 0..npix {
                p.ss_across.push(fixed_to_f64(c.i16::<B>() as i32, distance_scale));
            }
            p.ss_along.reserve(npix);
            for _ in 0..npix {
                p.ss_along.push(fixed_to_f64(c.i16::<B>() as i32, distance_scale));
            }
        }
        Ok(p)
    }

    fn decode_comment(&self) -> Result<String> {
        String::from_utf8(self.scratch.clone())
            .map_err(|_| Error::decode(RecordCategory::Comment, "comment is not valid UTF-8"))
    }

    fn decode_header(&self) -> Result<FileHeader> {
        let buf = &self.scratch;
        if buf.len() < 4 {
            return Err(Error::decode(RecordCategory::Header, "short header record"));
        }
        let mut c = WireCursor::new(buf);
        let format_version = c.u16::<B>();
        let name_len = c.u16::<B>() as usize;
        if c.remaining() != name_len {
            return Err(Error::decode(
                RecordCategory::Header,
                format!("name length {} disagrees with payload", name_len),
            ));
        }
        let sonar_name = String::from_utf8(c.bytes(name_len).to_vec())
            .map_err(|_| Error::decode(RecordCategory::Header, "sonar name is not valid UTF-8"))?;
        Ok(FileHeader {
            sonar_name,
            format_version,
        })
    }

    fn decode_nav(&self) -> Result<Navigation> {
        let buf = &self.scratch;
        if buf.len() != 8 * 3 + 4 * 2 {
            return Err(Error::decode(
                RecordCategory::Navigation,
                format!("navigation record of {} bytes", buf.len()),
            ));
        }
        let mut c = WireCursor::new(buf);
        Ok(Navigation {
            time_d: c.f64::<B>(),
            longitude: c.f64::<B>(),
            latitude: c.f64::<B>(),
            speed: c.f32::<B>() as f64,
            heading: c.f32::<B>() as f64,
        })
    }

    fn decode_attitude(&self) -> Result<AttitudeGroup> {
        let buf = &self.scratch;
        if buf.len() < 2 {
            return Err(Error::decode(RecordCategory::Attitude, "short attitude record"));
        }
        let mut c = WireCursor::new(buf);
        let n = c.u16::<B>() as usize;
        if c.remaining() != n * 20 {
            return Err(Error::decode(
                RecordCategory::Attitude,
                format!("{} samples declared, {} bytes remain", n, c.remaining()),
            ));
        }
        let mut samples = Vec::with_capacity(n);
        for _ in 0..n {
            samples.push(AttitudeSample {
                time_d: c.f64::<B>(),
                roll: c.f32::<B>() as f64,
                pitch: c.f32::<B>() as f64,
                heave: c.f32::<B>() as f64,
            });
        }
        Ok(AttitudeGroup { samples })
    }

    fn decode_svp(&self) -> Result<SoundVelocityProfile> {
        let buf = &self.scratch;
        if buf.len() < 10 {
            return Err(Error::decode(
                RecordCategory::VelocityProfile,
                "short velocity profile record",
            ));
        }
        let mut c = WireCursor::new(buf);
        let time_d = c.f64::<B>();
        let n = c.u16::<B>() as usize;
        if c.remaining() != n * 8 {
            return Err(Error::decode(
                RecordCategory::VelocityProfile,
                format!("{} points declared, {} bytes remain", n, c.remaining()),
            ));
        }
        let mut points = Vec::with_capacity(n);
        for _ in 0..n {
            let depth = c.f32::<B>() as f64;
            let velocity = c.f32::<B>() as f64;
            points.push((depth, velocity));
        }
        Ok(SoundVelocityProfile { time_d, points })
    }

    fn decode_params(&self) -> Result<ProcessingParameters> {
        let buf = &self.scratch;
        if buf.len() < 2 {
            return Err(Error::decode(
                RecordCategory::ProcessingParameters,
                "short parameter record",
            ));
        }
        let mut c = WireCursor::new(buf);
        let n = c.u16::<B>() as usize;
        let mut entries = Vec::with_capacity(n);
        for i in 0..n {
            if c.remaining() < 2 {
                return Err(Error::decode(
                    RecordCategory::ProcessingParameters,
                    format!("parameter {i} truncated"),
                ));
            }
            let klen = c.u16::<B>() as usize;
            if c.remaining() < klen + 2 {
                return Err(Error::decode(
                    RecordCategory::ProcessingParameters,
                    format!("parameter {i} key truncated"),
                ));
            }
            let key = String::from_utf8(c.bytes(klen).to_vec()).map_err(|_| {
                Error::decode(RecordCategory::ProcessingParameters, "key is not valid UTF-8")
            })?;
            let vlen = c.u16::<B>() as usize;
            if c.remaining() < vlen {
                return Err(Error::decode(
                    RecordCategory::ProcessingParameters,
                    format!("parameter {i} value truncated"),
                ));
            }
            let value = String::from_utf8(c.bytes(vlen).to_vec()).map_err(|_| {
                Error::decode(RecordCategory::ProcessingParameters, "value is not valid UTF-8")
            })?;
            entries.push((key, value));
        }
        if c.remaining() != 0 {
            return Err(Error::decode(
                RecordCategory::ProcessingParameters,
                format!("{} trailing bytes", c.remaining()),
            ));
        }
        Ok(ProcessingParameters { entries })
    }

    // ── Payload encoders ────────────────────────────────────────────────────

    fn encode_ping(&self, p: &Ping) -> Result<Vec<u8>> {
        let nbath = p.beam_count();
        if nbath > GSW_BEAMS_MAX {
            return Err(Error::InsufficientBuffer {
                needed: nbath,
                have: GSW_BEAMS_MAX,
            });
        }
        if p.flags.len() != nbath || p.across.len() != nbath || p.along.len() != nbath {
            return Err(Error::decode(
                RecordCategory::Data,
                "beam arrays disagree in length",
            ));
        }
        let namp = p.amp.len();
        if namp > nbath {
            return Err(Error::decode(
                RecordCategory::Data,
                format!("amplitude count {namp} exceeds beam count {nbath}"),
            ));
        }
        let npix = p.pixel_count();
        if npix > GSW_PIXELS_MAX {
            return Err(Error::InsufficientBuffer {
                needed: npix,
                have: GSW_PIXELS_MAX,
            });
        }
        if p.ss_across.len() != npix || p.ss_along.len() != npix {
            return Err(Error::decode(
                RecordCategory::Data,
                "sidescan arrays disagree in length",
            ));
        }
        let has_tt = p.has_travel_times();
        if has_tt && p.travel_time.len() != nbath {
            return Err(Error::decode(
                RecordCategory::Data,
                "travel time arrays disagree with beam count",
            ));
        }

        // Per-ping scales from the extrema, floored so a flat zero ping
        // still encodes.
        let depth_extent = p
            .bath
            .iter()
            .fold(0.0f64, |m, v| m.max(v.abs()))
            .max(p.sensor_depth.abs());
        let depth_scale = (depth_extent / 30000.0).max(0.001);
        let dist_extent = p
            .across
            .iter()
            .chain(p.along.iter())
            .chain(p.ss_across.iter())
            .chain(p.ss_along.iter())
            .fold(0.0f64, |m, v| m.max(v.abs()));
        let distance_scale = (dist_extent / 30000.0).max(0.001);

        let mut present = 0u8;
        if namp > 0 {
            present |= PF_AMPLITUDE;
        }
        if has_tt {
            present |= PF_TRAVEL_TIME;
        }
        if npix > 0 {
            present |= PF_SIDESCAN;
        }

        let mut b = WireBuilder::with_capacity(64 + nbath * 15 + npix * 6);
        b.f64::<B>(p.time_d)
            .f64::<B>(p.longitude)
            .f64::<B>(p.latitude)
            .f64::<B>(p.sensor_depth)
            .f64::<B>(p.altitude)
            .f32::<B>(p.heading as f32)
            .f32::<B>(p.speed as f32)
            .f32::<B>(p.roll as f32)
            .f32::<B>(p.pitch as f32)
            .f32::<B>(p.heave as f32)
            .u16::<B>(p.sensor_id)
            .f32::<B>(depth_scale as f32)
            .f32::<B>(distance_scale as f32)
            .u8(present)
            .u16::<B>(nbath as u16)
            .u16::<B>(namp as u16)
            .u16::<B>(npix as u16);

        for f in &p.flags {
            b.u8(f.to_u8());
        }
        for (i, v) in p.bath.iter().enumerate() {
            // Null beams carry the sentinel zero, never stale values.
            let raw = if p.flags[i].is_null() {
                0
            } else {
                f64_to_fixed16(*v, depth_scale)
            };
            b.i16::<B>(raw);
        }
        for (i, v) in p.across.iter().enumerate() {
            let raw = if p.flags[i].is_null() {
                0
            } else {
                f64_to_fixed16(*v, distance_scale)
            };
            b.i16::<B>(raw);
        }
        for (i, v) in p.along.iter().enumerate() {
            let raw = if p.flags[i].is_null() {
                0
            } else {
                f64_to_fixed16(*v, distance_scale)
            };
            b.i16::<B>(raw);
        }
        for v in &p.amp {
            b.i16::<B>(f64_to_fixed16(*v, INTENSITY_SCALE));
        }
        if has_tt {
            for v in &p.travel_time {
                b.f32::<B>(*v as f32);
            }
            for v in &p.angle {
                b.f32::<B>(*v as f32);
            }
        }
        for v in &p.ss {
            b.i16::<B>(f64_to_fixed16(*v, INTENSITY_SCALE));
        }
        for v in &p.ss_across {
            b.i16::<B>(f64_to_fixed16(*v, distance_scale));
        }
        for v in &p.ss_along {
            b.i16::<B>(f64_to_fixed16(*v, distance_scale));
        }
        Ok(b.into_bytes())
    }

    fn encode_nav(&self, n: &Navigation) -> Vec<u8> {
        let mut b = WireBuilder::with_capacity(32);
        b.f64::<B>(n.time_d)
            .f64::<B>(n.longitude)
            .f64::<B>(n.latitude)
            .f32::<B>(n.speed as f32)
            .f32::<B>(n.heading as f32);
        b.into_bytes()
    }

    fn encode_attitude(&self, g: &AttitudeGroup) -> Vec<u8> {
        let mut b = WireBuilder::with_capacity(2 + g.samples.len() * 20);
        b.u16::<B>(g.samples.len() as u16);
        for s in &g.samples {
            b.f64::<B>(s.time_d)
                .f32::<B>(s.roll as f32)
                .f32::<B>(s.pitch as f32)
                .f32::<B>(s.heave as f32);
        }
        b.into_bytes()
    }

    fn encode_svp(&self, svp: &SoundVelocityProfile) -> Vec<u8> {
        let mut b = WireBuilder::with_capacity(10 + svp.points.len() * 8);
        b.f64::<B>(svp.time_d).u16::<B>(svp.points.len() as u16);
        for (depth, velocity) in &svp.points {
            b.f32::<B>(*depth as f32).f32::<B>(*velocity as f32);
        }
        b.into_bytes()
    }

    fn encode_params(&self, pp: &ProcessingParameters) -> Vec<u8> {
        let mut b = WireBuilder::new();
        b.u16::<B>(pp.entries.len() as u16);
        for (key, value) in &pp.entries {
            b.u16::<B>(key.len() as u16).bytes(key.as_bytes());
            b.u16::<B>(value.len() as u16).bytes(value.as_bytes());
        }
        b.into_bytes()
    }

    fn encode_file_header(&self, h: &FileHeader) -> Vec<u8> {
        let mut b = WireBuilder::with_capacity(4 + h.sonar_name.len());
        b.u16::<B>(h.format_version)
            .u16::<B>(h.sonar_name.len() as u16)
            .bytes(h.sonar_name.as_bytes());
        b.into_bytes()
    }
}

impl<B: ByteOrder + Send + 'static> SwathCodec for GswCodec<B> {
    fn id(&self) -> FormatId {
        // The two monomorphizations are the two registered ids.
        if std::any::TypeId::of::<B>() == std::any::TypeId::of::<LittleEndian>() {
            FormatId::GenericSwathLe
        } else {
            FormatId::GenericSwath
        }
    }

    fn caps(&self) -> &FormatCaps {
        &self.caps
    }

    fn decode_next(&mut self, reader: &mut dyn ReadSeek) -> Result<Record> {
        let (tag, payload_len, stored) = self.read_header(reader)?;
        self.read_payload(reader, payload_len)?;

        let mut hasher = Hasher::new();
        hasher.update(&self.scratch);
        let computed = hasher.finalize();
        if computed != stored {
            return Err(Error::Checksum { stored, computed });
        }

        let kind = tag_to_kind(tag).ok_or(Error::UnrecognizedRecord(tag))?;
        tracing::trace!(kind = kind.name(), payload_len, "decoded record");
        match kind {
            RecordKind::Data => Ok(Record::Data(self.decode_ping()?)),
            RecordKind::Comment => Ok(Record::Comment(self.decode_comment()?)),
            RecordKind::Header => Ok(Record::Header(self.decode_header()?)),
            RecordKind::NavSource => Ok(Record::NavSource(self.decode_nav()?)),
            RecordKind::Attitude => Ok(Record::Attitude(self.decode_attitude()?)),
            RecordKind::SoundVelocityProfile => {
                Ok(Record::SoundVelocityProfile(self.decode_svp()?))
            }
            RecordKind::ProcessingParameters => {
                Ok(Record::ProcessingParameters(self.decode_params()?))
            }
            other => Ok(Record::Other(other)),
        }
    }

    fn encode(&mut self, writer: &mut dyn Write, record: &Record) -> Result<()> {
        let (tag, payload) = match record {
            Record::Data(p) => (TAG_DATA, self.encode_ping(p)?),
            Record::Comment(c) => (TAG_COMMENT, c.as_bytes().to_vec()),
            Record::Header(h) => (TAG_HEADER, self.encode_file_header(h)),
            Record::NavSource(n) => (TAG_NAV, self.encode_nav(n)),
            Record::Attitude(g) => (TAG_ATTITUDE, self.encode_attitude(g)),
            Record::SoundVelocityProfile(s) => (TAG_SVP, self.encode_svp(s)),
            Record::ProcessingParameters(pp) => (TAG_PARAMS, self.encode_params(pp)),
            Record::Other(k) => {
                return Err(Error::decode(
                    RecordCategory::Data,
                    format!("gsw cannot encode {} records", k.name()),
                ))
            }
        };
        self.write_record(writer, tag, &payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_ping() -> Ping {
        Ping {
            time_d: 1_089_804_645.25,
            longitude: -121.9375,
            latitude: 36.8025,
            speed: 9.3,
            heading: 271.5,
            sensor_depth: 2.15,
            altitude: 48.2,
            roll: 1.25,
            pitch: -0.75,
            heave: 0.1,
            sensor_id: 710,
            flags: vec![BeamFlag::Ok, BeamFlag::Null, BeamFlag::Manual, BeamFlag::Ok],
            bath: vec![51.2, 0.0, 49.8, 50.6],
            across: vec![-25.0, 0.0, 8.0, 24.0],
            along: vec![0.5, 0.0, -0.3, 0.4],
            amp: vec![12.5, 0.0, 8.25, 11.0],
            travel_time: vec![0.066, 0.0, 0.064, 0.065],
            angle: vec![-45.0, 0.0, 10.0, 44.0],
            ss: vec![20.0, 21.5, 19.0],
            ss_across: vec![-30.0, 0.0, 30.0],
            ss_along: vec![0.0, 0.0, 0.0],
        }
    }

    fn round_trip(codec: &mut dyn SwathCodec, rec: &Record) -> Record {
        let mut bytes = Vec::new();
        codec.encode(&mut bytes, rec).unwrap();
        let mut cur = Cursor::new(bytes);
        codec.decode_next(&mut cur).unwrap()
    }

    #[test]
    fn ping_round_trip_within_scale_tolerance() {
        for_each_order(|mut codec| {
            let ping = sample_ping();
            let out = round_trip(codec.as_mut(), &Record::Data(ping.clone()));
            let q = out.as_ping().unwrap();

            assert_eq!(q.time_d, ping.time_d);
            assert_eq!(q.longitude, ping.longitude);
            assert_eq!(q.latitude, ping.latitude);
            assert_eq!(q.sensor_id, ping.sensor_id);
            assert_eq!(q.flags, ping.flags);
            // Fixed-point error bound: half a count at the encoded scale.
            let depth_scale = 0.001f64.max(51.2 / 30000.0);
            for (a, b) in q.bath.iter().zip(&ping.bath) {
                if *b != 0.0 {
                    assert!((a - b).abs() <= depth_scale / 2.0 + 1e-9);
                }
            }
            assert!((q.heading - ping.heading).abs() < 1e-3);
            assert_eq!(q.travel_time.len(), ping.travel_time.len());
            assert_eq!(q.ss.len(), ping.ss.len());
        });
    }

    fn for_each_order(mut f: impl FnMut(Box<dyn SwathCodec>)) {
        f(Box::new(GswCodec::big_endian()));
        f(Box::new(GswCodec::little_endian()));
    }

    #[test]
    fn null_beams_encode_sentinel_zero() {
        let mut codec = GswCodec::big_endian();
        let mut ping = sample_ping();
        ping.bath[1] = 987.0; // stale value behind a null flag
        let out = round_trip(&mut codec, &Record::Data(ping));
        let q = out.as_ping().unwrap();
        assert!(q.flags[1].is_null());
        assert_eq!(q.bath[1], 0.0);
    }

    #[test]
    fn comment_and_header_round_trip() {
        let mut codec = GswCodec::little_endian();
        let out = round_trip(&mut codec, &Record::Comment("survey line 14".into()));
        match out {
            Record::Comment(c) => assert_eq!(c, "survey line 14"),
            other => panic!("expected comment, got {:?}", other.kind()),
        }

        let hdr = FileHeader {
            sonar_name: "EM302".into(),
            format_version: 3,
        };
        let out = round_trip(&mut codec, &Record::Header(hdr));
        match out {
            Record::Header(h) => {
                assert_eq!(h.sonar_name, "EM302");
                assert_eq!(h.format_version, 3);
            }
            other => panic!("expected header, got {:?}", other.kind()),
        }
    }

    #[test]
    fn svp_attitude_and_params_round_trip() {
        let mut codec = GswCodec::big_endian();

        let svp = SoundVelocityProfile {
            time_d: 1000.0,
            points: vec![(0.0, 1500.0), (50.0, 1495.5), (200.0, 1488.0)],
        };
        match round_trip(&mut codec, &Record::SoundVelocityProfile(svp)) {
            Record::SoundVelocityProfile(s) => {
                assert_eq!(s.points.len(), 3);
                assert_eq!(s.points[1], (50.0, 1495.5));
            }
            other => panic!("expected svp, got {:?}", other.kind()),
        }

        let group = AttitudeGroup {
            samples: vec![
                AttitudeSample {
                    time_d: 1.0,
                    roll: 0.5,
                    pitch: -0.25,
                    heave: 0.0,
                },
                AttitudeSample {
                    time_d: 2.0,
                    roll: 0.75,
                    pitch: -0.5,
                    heave: 0.125,
                },
            ],
        };
        match round_trip(&mut codec, &Record::Attitude(group)) {
            Record::Attitude(g) => assert_eq!(g.samples.len(), 2),
            other => panic!("expected attitude, got {:?}", other.kind()),
        }

        let pp = ProcessingParameters {
            entries: vec![
                ("SVPMODE".into(), "1".into()),
                ("DRAFT".into(), "2.15".into()),
            ],
        };
        match round_trip(&mut codec, &Record::ProcessingParameters(pp)) {
            Record::ProcessingParameters(p) => {
                assert_eq!(p.entries[0].0, "SVPMODE");
                assert_eq!(p.entries[1].1, "2.15");
            }
            other => panic!("expected parameters, got {:?}", other.kind()),
        }
    }

    #[test]
    fn clean_eof_is_distinct_from_truncation() {
        let mut codec = GswCodec::big_endian();

        let mut empty = Cursor::new(Vec::new());
        match codec.decode_next(&mut empty) {
            Err(Error::Eof) => {}
            other => panic!("expected Eof, got {other:?}"),
        }

        let mut bytes = Vec::new();
        codec
            .encode(&mut bytes, &Record::Comment("abc".into()))
            .unwrap();
        bytes.truncate(bytes.len() - 1);
        let mut cur = Cursor::new(bytes);
        match codec.decode_next(&mut cur) {
            Err(Error::SizeMismatch { .. }) => {}
            other => panic!("expected SizeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn corrupt_payload_fails_checksum() {
        let mut codec = GswCodec::big_endian();
        let mut bytes = Vec::new();
        codec
            .encode(&mut bytes, &Record::Comment("checksum me".into()))
            .unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let mut cur = Cursor::new(bytes);
        match codec.decode_next(&mut cur) {
            Err(Error::Checksum { .. }) => {}
            other => panic!("expected Checksum, got {other:?}"),
        }
    }

    #[test]
    fn bad_magic_is_unrecognized() {
        let mut codec = GswCodec::big_endian();
        let mut bytes = Vec::new();
        codec
            .encode(&mut bytes, &Record::Comment("x".into()))
            .unwrap();
        bytes[0] = 0xFF;
        let mut cur = Cursor::new(bytes);
        match codec.decode_next(&mut cur) {
            Err(Error::UnrecognizedRecord(_)) => {}
            other => panic!("expected UnrecognizedRecord, got {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_tag_is_unrecognized() {
        let mut codec = GswCodec::big_endian();
        // Hand-build a record with kind tag 0x99 and a valid checksum.
        let payload = b"??";
        let mut hasher = Hasher::new();
        hasher.update(payload);
        let sum = hasher.finalize();
        let mut bytes = Vec::new();
        let mut hdr = [0u8; GSW_HEADER_SIZE];
        BigEndian::write_u16(&mut hdr[0..2], GSW_MAGIC);
        BigEndian::write_u16(&mut hdr[2..4], 0x99);
        BigEndian::write_u32(&mut hdr[4..8], payload.len() as u32);
        BigEndian::write_u32(&mut hdr[8..12], sum);
        bytes.extend_from_slice(&hdr);
        bytes.extend_from_slice(payload);
        let mut cur = Cursor::new(bytes);
        match codec.decode_next(&mut cur) {
            Err(Error::UnrecognizedRecord(0x99)) => {}
            other => panic!("expected UnrecognizedRecord(0x99), got {other:?}"),
        }
    }

    #[test]
    fn decode_advances_stream_to_next_record() {
        let mut codec = GswCodec::big_endian();
        let mut bytes = Vec::new();
        codec.encode(&mut bytes, &Record::Comment("one".into())).unwrap();
        codec.encode(&mut bytes, &Record::Comment("two".into())).unwrap();
        let mut cur = Cursor::new(bytes);
        match codec.decode_next(&mut cur).unwrap() {
            Record::Comment(c) => assert_eq!(c, "one"),
            _ => unreachable!(),
        }
        match codec.decode_next(&mut cur).unwrap() {
            Record::Comment(c) => assert_eq!(c, "two"),
            _ => unreachable!(),
        }
        assert!(matches!(codec.decode_next(&mut cur), Err(Error::Eof)));
    }

    #[test]
    fn oversized_beam_count_reports_insufficient_buffer() {
        let mut codec = GswCodec::big_endian();
        let mut ping = sample_ping();
        let n = GSW_BEAMS_MAX + 1;
        ping.flags = vec![BeamFlag::Ok; n];
        ping.bath = vec![10.0; n];
        ping.across = vec![0.0; n];
        ping.along = vec![0.0; n];
        ping.amp.clear();
        ping.travel_time.clear();
        ping.angle.clear();
        ping.ss.clear();
        ping.ss_across.clear();
        ping.ss_along.clear();
        let mut out = Vec::new();
        match codec.encode(&mut out, &Record::Data(ping)) {
            Err(Error::InsufficientBuffer { needed, have }) => {
                assert_eq!(needed, n);
                assert_eq!(have, GSW_BEAMS_MAX);
            }
            other => panic!("expected InsufficientBuffer, got {other:?}"),
        }
    }
}
