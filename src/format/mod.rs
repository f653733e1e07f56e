//! Format registry: frozen integer identities + the codec contract every
//! vendor format implements.
//!
//! # Identity rules
//! Every format is identified by a small integer id. That id is:
//!   - The registry key callers pass to [`Session::open`](crate::session::Session::open).
//!   - Stable across releases; an id is never reused, even if a format is
//!     deprecated.
//!
//! Names are an in-process convenience only; they are never parsed from
//! data files and never negotiated at runtime.
//!
//! # The codec contract
//! A [`SwathCodec`] owns whatever per-stream working storage its format
//! needs and implements the uniform operation set: decode the next
//! physical record into one canonical [`Record`], encode one record back
//! to its home-format byte image, and the small accessor set (navigation,
//! attitude and travel times, altitude, copy). `decode_next` must read
//! exactly one record, advance the stream by that record's on-disk size,
//! and distinguish clean end-of-stream ([`Error::Eof`]) from a corrupt
//! record (a decode error variant).
//!
//! Codecs hold no cross-stream state: many sessions may each construct a
//! codec for the same format concurrently.

use std::io::{Read, Seek, Write};

use crate::error::{Error, Result};
use crate::record::{Navigation, Record, RecordKind};

pub mod gsw;

pub use gsw::{GswCodec, GSW_BEAMS_MAX, GSW_PIXELS_MAX};

/// Blanket helper for the stream bound codecs decode from.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

// ── Format ids ──────────────────────────────────────────────────────────────

/// Runtime format discriminant. The integer values are the frozen
/// registry keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatId {
    /// Generic swath format, big-endian byte order (the interchange
    /// default).
    GenericSwath,
    /// Generic swath format, little-endian byte order.
    GenericSwathLe,
}

impl FormatId {
    /// Returns the frozen registry id for this format.
    #[inline]
    pub fn id(self) -> i32 {
        match self {
            FormatId::GenericSwath => 71,
            FormatId::GenericSwathLe => 72,
        }
    }

    /// Resolve a registry id to a FormatId.
    /// Returns `None` if the id is not recognised by this build.
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            71 => Some(FormatId::GenericSwath),
            72 => Some(FormatId::GenericSwathLe),
            _ => None,
        }
    }

    /// Human-readable name (for diagnostics only — never parsed from
    /// data).
    pub fn name(self) -> &'static str {
        match self {
            FormatId::GenericSwath => "gsw",
            FormatId::GenericSwathLe => "gswle",
        }
    }

    /// Parse from a tool-facing string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gsw" => Some(FormatId::GenericSwath),
            "gswle" => Some(FormatId::GenericSwathLe),
            _ => None,
        }
    }
}

// ── Capability descriptor ───────────────────────────────────────────────────

/// Fixed capability block describing one format. Immutable once a codec
/// is constructed; sessions size their buffers from the maxima here
/// exactly once, at open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatCaps {
    /// Beam count varies ping to ping (vs. fixed array geometry).
    pub variable_beams: bool,
    /// Pings can carry raw two-way travel times and takeoff angles.
    pub travel_times: bool,
    /// Per-beam flag bytes survive an encode/decode round trip.
    pub beam_flagging: bool,
    /// Which record kind supplies navigation fixes.
    pub nav_source: RecordKind,
    /// Which record kind supplies heading.
    pub heading_source: RecordKind,
    /// Which record kind supplies attitude.
    pub attitude_source: RecordKind,
    /// Which record kind supplies sound velocity.
    pub svp_source: RecordKind,
    pub beams_bath_max: usize,
    pub beams_amp_max: usize,
    pub pixels_ss_max: usize,
}

// ── Codec trait ─────────────────────────────────────────────────────────────

pub trait SwathCodec: Send + std::fmt::Debug {
    fn id(&self) -> FormatId;

    fn caps(&self) -> &FormatCaps;

    /// Read exactly one physical record from the current stream position
    /// and return its canonical form. Advances the stream by the record's
    /// on-disk size. Clean end-of-stream is [`Error::Eof`]; anything that
    /// violates the format is a decode error.
    fn decode_next(&mut self, reader: &mut dyn ReadSeek) -> Result<Record>;

    /// Write one record's home-format byte image. Fields the format
    /// cannot represent are written as its documented sentinel values.
    fn encode(&mut self, writer: &mut dyn Write, record: &Record) -> Result<()>;

    /// Navigation fix carried by this record, if any.
    fn extract_nav(&self, record: &Record) -> Option<Navigation> {
        match record {
            Record::Data(p) => Some(Navigation {
                time_d: p.time_d,
                longitude: p.longitude,
                latitude: p.latitude,
                speed: p.speed,
                heading: p.heading,
            }),
            Record::NavSource(n) => Some(*n),
            _ => None,
        }
    }

    /// Overwrite the navigation fields of a record in place.
    fn insert_nav(&self, record: &mut Record, nav: &Navigation) {
        match record {
            Record::Data(p) => {
                p.time_d = nav.time_d;
                p.longitude = nav.longitude;
                p.latitude = nav.latitude;
                p.speed = nav.speed;
                p.heading = nav.heading;
            }
            Record::NavSource(n) => *n = *nav,
            _ => {}
        }
    }

    /// Attitude scalars (roll, pitch, heave) for a ping record.
    fn extract_attitude(&self, record: &Record) -> Option<(f64, f64, f64)> {
        record.as_ping().map(|p| (p.roll, p.pitch, p.heave))
    }

    /// Travel times and takeoff angles for a ping record, when the format
    /// preserves raw timing.
    fn extract_travel_times<'r>(&self, record: &'r Record) -> Option<(&'r [f64], &'r [f64])> {
        let p = record.as_ping()?;
        if p.has_travel_times() {
            Some((&p.travel_time, &p.angle))
        } else {
            None
        }
    }

    /// Overwrite a ping's travel time and angle arrays in place.
    fn insert_travel_times(&self, record: &mut Record, travel_time: &[f64], angle: &[f64]) {
        if let Some(p) = record.as_ping_mut() {
            p.travel_time = travel_time.to_vec();
            p.angle = angle.to_vec();
        }
    }

    /// Transducer depth and altitude above bottom for a ping record.
    fn extract_altitude(&self, record: &Record) -> Option<(f64, f64)> {
        record.as_ping().map(|p| (p.sensor_depth, p.altitude))
    }

    /// Duplicate a record. Codecs whose records share interned storage
    /// may override; the canonical representation just clones.
    fn copy_record(&self, record: &Record) -> Record {
        record.clone()
    }
}

// ── Factory ─────────────────────────────────────────────────────────────────

/// Resolve a registry id to a fresh codec instance.
///
/// Returns `Err(Error::UnsupportedFormat)` if the id is not recognised.
/// The caller MUST NOT fall back to any other format — fail hard.
pub fn get_codec_by_id(id: i32) -> Result<Box<dyn SwathCodec>> {
    match FormatId::from_id(id) {
        Some(f) => get_codec(f),
        None => Err(Error::UnsupportedFormat(id)),
    }
}

/// Resolve a FormatId to a fresh codec instance.
pub fn get_codec(id: FormatId) -> Result<Box<dyn SwathCodec>> {
    match id {
        FormatId::GenericSwath => Ok(Box::new(GswCodec::big_endian())),
        FormatId::GenericSwathLe => Ok(Box::new(GswCodec::little_endian())),
    }
}
