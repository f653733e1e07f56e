//! Canonical, format-independent records.
//!
//! Every codec decodes its vendor bytes into one [`Record`] and encodes
//! from one; nothing above the codec layer ever sees vendor field layouts.
//! Units are canonical throughout: seconds since the Unix epoch for time,
//! signed decimal degrees for longitude/latitude, meters for depths and
//! distances, degrees for headings and angles.
//!
//! A freshly decoded record lives for one read cycle: it is consumed by
//! the averaging engine or handed to the caller, never cached by the
//! session beyond its accumulation buffers.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// ── Record kinds ────────────────────────────────────────────────────────────

/// The kind tag attached to every canonical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// A survey ping: bathymetry, amplitude, sidescan.
    Data,
    Comment,
    /// File-level header written once at the start of a stream.
    Header,
    Calibrate,
    /// Standalone navigation fix from the vessel's nav source.
    NavSource,
    MeanVelocity,
    /// Water-column velocity profile (a legacy kind distinct from
    /// [`RecordKind::SoundVelocityProfile`] in some formats).
    VelocityProfile,
    Standby,
    SensorParameters,
    ProcessingParameters,
    /// A group of attitude (roll/pitch/heave) measurements.
    Attitude,
    SoundVelocityProfile,
    SwathSummary,
    NavigationError,
}

impl RecordKind {
    pub fn name(self) -> &'static str {
        match self {
            RecordKind::Data => "data",
            RecordKind::Comment => "comment",
            RecordKind::Header => "header",
            RecordKind::Calibrate => "calibrate",
            RecordKind::NavSource => "nav source",
            RecordKind::MeanVelocity => "mean velocity",
            RecordKind::VelocityProfile => "velocity profile",
            RecordKind::Standby => "standby",
            RecordKind::SensorParameters => "sensor parameters",
            RecordKind::ProcessingParameters => "processing parameters",
            RecordKind::Attitude => "attitude",
            RecordKind::SoundVelocityProfile => "sound velocity profile",
            RecordKind::SwathSummary => "swath summary",
            RecordKind::NavigationError => "navigation error",
        }
    }
}

// ── Beam flags ──────────────────────────────────────────────────────────────

/// Per-beam validity state.
///
/// The wire codes are a frozen bitmask shared by every format that stores
/// flag bytes: bit 0 marks a null beam, bit 1 a flagged beam, and bits 2-4
/// record who flagged it. They are stable across releases; journals and
/// encoded files depend on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeamFlag {
    /// Valid sounding.
    Ok,
    /// No data for this beam.
    Null,
    /// Flagged bad by a human editor.
    Manual,
    /// Flagged bad by an automatic filter.
    Filter,
    /// Flagged bad by the sonar itself.
    Sonar,
}

impl BeamFlag {
    const NULL_BIT: u8 = 0x01;
    const FLAG_BIT: u8 = 0x02;
    const MANUAL_BIT: u8 = 0x04;
    const FILTER_BIT: u8 = 0x08;
    const SONAR_BIT: u8 = 0x10;

    /// Frozen on-disk byte for this flag state.
    pub fn to_u8(self) -> u8 {
        match self {
            BeamFlag::Ok => 0x00,
            BeamFlag::Null => Self::NULL_BIT,
            BeamFlag::Manual => Self::FLAG_BIT | Self::MANUAL_BIT,
            BeamFlag::Filter => Self::FLAG_BIT | Self::FILTER_BIT,
            BeamFlag::Sonar => Self::FLAG_BIT | Self::SONAR_BIT,
        }
    }

    /// Decode a wire byte. Unknown flagged combinations collapse to
    /// [`BeamFlag::Manual`]; the null bit dominates everything else.
    pub fn from_u8(v: u8) -> Self {
        if v & Self::NULL_BIT != 0 {
            BeamFlag::Null
        } else if v & Self::FLAG_BIT != 0 {
            if v & Self::FILTER_BIT != 0 {
                BeamFlag::Filter
            } else if v & Self::SONAR_BIT != 0 {
                BeamFlag::Sonar
            } else {
                BeamFlag::Manual
            }
        } else {
            BeamFlag::Ok
        }
    }

    /// True when the beam carries a usable sounding.
    pub fn is_ok(self) -> bool {
        matches!(self, BeamFlag::Ok)
    }

    /// True when the beam has no data at all.
    pub fn is_null(self) -> bool {
        matches!(self, BeamFlag::Null)
    }

    /// True when the beam has data but has been flagged bad.
    pub fn is_flagged(self) -> bool {
        matches!(self, BeamFlag::Manual | BeamFlag::Filter | BeamFlag::Sonar)
    }
}

impl Default for BeamFlag {
    fn default() -> Self {
        BeamFlag::Null
    }
}

// ── Payloads ────────────────────────────────────────────────────────────────

/// One survey ping in canonical units.
#[derive(Debug, Clone, Default)]
pub struct Ping {
    /// Seconds since the Unix epoch.
    pub time_d: f64,
    pub longitude: f64,
    pub latitude: f64,
    /// km/hr, as reported by the format; 0 when the format has none.
    pub speed: f64,
    /// Degrees, [0, 360).
    pub heading: f64,
    /// Transducer depth below the surface, meters.
    pub sensor_depth: f64,
    /// Height of the transducer above the bottom, meters; 0 if unknown.
    pub altitude: f64,
    pub roll: f64,
    pub pitch: f64,
    pub heave: f64,
    /// Vendor sensor model identifier; used by the capability probe's
    /// qualifying-sensor filter. 0 when the format does not record one.
    pub sensor_id: u16,

    // Per-beam bathymetry. All vectors share beam indexing; `flags`,
    // `bath`, `across` and `along` always have `beam_count()` entries.
    pub flags: Vec<BeamFlag>,
    pub bath: Vec<f64>,
    pub across: Vec<f64>,
    pub along: Vec<f64>,
    /// Per-beam amplitude; empty when the format carries none.
    pub amp: Vec<f64>,
    /// Per-beam two-way travel times, seconds; empty unless the format
    /// preserves raw timing.
    pub travel_time: Vec<f64>,
    /// Per-beam takeoff angles, degrees from vertical; parallel to
    /// `travel_time`.
    pub angle: Vec<f64>,

    // Sidescan triples; all three share pixel indexing.
    pub ss: Vec<f64>,
    pub ss_across: Vec<f64>,
    pub ss_along: Vec<f64>,
}

impl Ping {
    pub fn beam_count(&self) -> usize {
        self.bath.len()
    }

    pub fn pixel_count(&self) -> usize {
        self.ss.len()
    }

    /// True when this ping carries the raw timing needed to re-derive
    /// bathymetry by ray tracing.
    pub fn has_travel_times(&self) -> bool {
        !self.travel_time.is_empty() && self.travel_time.len() == self.angle.len()
    }

    /// Ping time as a calendar timestamp.
    pub fn time(&self) -> DateTime<Utc> {
        epoch_to_datetime(self.time_d)
    }
}

/// A standalone navigation fix.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Navigation {
    pub time_d: f64,
    pub longitude: f64,
    pub latitude: f64,
    pub speed: f64,
    pub heading: f64,
}

/// One attitude sample inside an [`AttitudeGroup`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AttitudeSample {
    pub time_d: f64,
    pub roll: f64,
    pub pitch: f64,
    pub heave: f64,
}

/// A group of attitude measurements delivered as one record.
#[derive(Debug, Clone, Default)]
pub struct AttitudeGroup {
    pub samples: Vec<AttitudeSample>,
}

/// A water-column sound velocity profile.
#[derive(Debug, Clone, Default)]
pub struct SoundVelocityProfile {
    pub time_d: f64,
    /// (depth meters, velocity m/s) pairs, shallow to deep.
    pub points: Vec<(f64, f64)>,
}

/// Key/value processing parameters carried in-stream.
#[derive(Debug, Clone, Default)]
pub struct ProcessingParameters {
    pub entries: Vec<(String, String)>,
}

/// File-level header identifying the producing system.
#[derive(Debug, Clone, Default)]
pub struct FileHeader {
    pub sonar_name: String,
    pub format_version: u16,
}

// ── The tagged record ───────────────────────────────────────────────────────

/// The canonical tagged record every codec produces and consumes.
///
/// Kinds with no structured payload yet (calibrate, standby, swath
/// summary, ...) carry their kind alone; the averaging engine only needs
/// to classify them.
#[derive(Debug, Clone)]
pub enum Record {
    Data(Ping),
    Comment(String),
    Header(FileHeader),
    NavSource(Navigation),
    Attitude(AttitudeGroup),
    SoundVelocityProfile(SoundVelocityProfile),
    ProcessingParameters(ProcessingParameters),
    /// Any other kind, classified but not decomposed.
    Other(RecordKind),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Data(_) => RecordKind::Data,
            Record::Comment(_) => RecordKind::Comment,
            Record::Header(_) => RecordKind::Header,
            Record::NavSource(_) => RecordKind::NavSource,
            Record::Attitude(_) => RecordKind::Attitude,
            Record::SoundVelocityProfile(_) => RecordKind::SoundVelocityProfile,
            Record::ProcessingParameters(_) => RecordKind::ProcessingParameters,
            Record::Other(k) => *k,
        }
    }

    pub fn as_ping(&self) -> Option<&Ping> {
        match self {
            Record::Data(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_ping_mut(&mut self) -> Option<&mut Ping> {
        match self {
            Record::Data(p) => Some(p),
            _ => None,
        }
    }
}

// ── Time helpers ────────────────────────────────────────────────────────────

/// Epoch seconds to a UTC timestamp, preserving sub-second precision.
pub fn epoch_to_datetime(time_d: f64) -> DateTime<Utc> {
    let secs = time_d.floor() as i64;
    let nanos = ((time_d - secs as f64) * 1e9).round() as u32;
    match Utc.timestamp_opt(secs, nanos.min(999_999_999)) {
        chrono::LocalResult::Single(t) => t,
        _ => Utc.timestamp_opt(0, 0).unwrap(),
    }
}

/// UTC timestamp to epoch seconds.
pub fn datetime_to_epoch(t: DateTime<Utc>) -> f64 {
    t.timestamp() as f64 + t.timestamp_subsec_nanos() as f64 * 1e-9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beam_flag_wire_codes_are_frozen() {
        assert_eq!(BeamFlag::Ok.to_u8(), 0x00);
        assert_eq!(BeamFlag::Null.to_u8(), 0x01);
        assert_eq!(BeamFlag::Manual.to_u8(), 0x06);
        assert_eq!(BeamFlag::Filter.to_u8(), 0x0A);
        assert_eq!(BeamFlag::Sonar.to_u8(), 0x12);
        for f in [
            BeamFlag::Ok,
            BeamFlag::Null,
            BeamFlag::Manual,
            BeamFlag::Filter,
            BeamFlag::Sonar,
        ] {
            assert_eq!(BeamFlag::from_u8(f.to_u8()), f);
        }
    }

    #[test]
    fn null_bit_dominates_flag_bits() {
        assert_eq!(BeamFlag::from_u8(0x01 | 0x02 | 0x08), BeamFlag::Null);
    }

    #[test]
    fn unknown_flagged_combination_reads_as_manual() {
        assert_eq!(BeamFlag::from_u8(0x02), BeamFlag::Manual);
        assert_eq!(BeamFlag::from_u8(0x02 | 0x20), BeamFlag::Manual);
    }

    #[test]
    fn epoch_round_trip_keeps_milliseconds() {
        let t = Utc.with_ymd_and_hms(2004, 7, 14, 12, 30, 45).unwrap()
            + chrono::Duration::milliseconds(250);
        let d = datetime_to_epoch(t);
        let back = epoch_to_datetime(d);
        assert_eq!(back, t);
    }

    #[test]
    fn ping_travel_time_presence_requires_parallel_angles() {
        let mut p = Ping::default();
        p.travel_time = vec![0.1, 0.2];
        assert!(!p.has_travel_times());
        p.angle = vec![45.0, 30.0];
        assert!(p.has_travel_times());
    }
}
