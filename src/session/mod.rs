//! Per-stream session handles.
//!
//! A [`Session`] exclusively owns one open stream and one codec bound at
//! open time through the format registry. Its working buffers are sized
//! once, from the codec's declared capability maxima, and reused for every
//! record; nothing reallocates per ping.
//!
//! Sessions are fully synchronous and single-threaded; independent
//! sessions on independent streams may be driven from independent threads
//! with no coordination, because the only shared state is the immutable
//! registry.
//!
//! The reading returned by [`Session::read`] borrows the session's
//! buffers: it is valid until the next call on the same session, which
//! overwrites them. The borrow checker enforces what the equivalent
//! caller contract in older systems could only document.

mod read;
mod writer;

pub use read::Reading;
pub use writer::RecordWriter;

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Condition, Error, Result};
use crate::format::{get_codec_by_id, FormatCaps, SwathCodec};
use crate::nav::{normalize_longitude, LonMode};
use crate::record::Record;

use read::Accumulator;

/// Sentinel below which a ping time is treated as unknown and exempted
/// from time gating.
pub const TIME_D_UNKNOWN: f64 = -2_208_988_800.0;

// ── Configuration ───────────────────────────────────────────────────────────

/// Session configuration. Must be supplied at open, before the first
/// read; the defaults accept everything and average nothing.
///
/// Loads from a JSON sidecar via [`SessionConfig::from_json_file`] so
/// batch tools can keep per-survey settings next to the data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Registry id of the format to bind.
    pub format: i32,
    /// Number of pings averaged into one reading. 1 disables averaging
    /// (single readings pass through untouched).
    pub pings_avg: u32,
    /// Acceptance window: lon min, lon max, lat min, lat max (degrees).
    pub bounds: [f64; 4],
    /// Start of the accepted time window, epoch seconds. With
    /// `etime_d <= btime_d` the window is disabled.
    pub btime_d: f64,
    /// End of the accepted time window, epoch seconds.
    pub etime_d: f64,
    /// Minimum plausible survey speed, km/hr. 0 disables the gate.
    pub speed_min: f64,
    /// Maximum tolerated gap between consecutive pings, minutes.
    pub timegap: f64,
    /// Longitude normalization mode applied to every fix.
    pub lonflip: LonMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            format: 0,
            pings_avg: 1,
            bounds: [-360.0, 360.0, -90.0, 90.0],
            btime_d: 0.0,
            etime_d: 0.0,
            speed_min: 0.0,
            timegap: 1.0,
            lonflip: LonMode::Centered,
        }
    }
}

impl SessionConfig {
    /// Configuration for one format with everything else defaulted.
    pub fn for_format(format: i32) -> Self {
        SessionConfig {
            format,
            ..SessionConfig::default()
        }
    }

    /// Load a configuration from a JSON file. Unknown fields are
    /// rejected so a typo'd gate name cannot silently accept everything.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(Error::Open)?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }

    /// True when the time window is active.
    pub(crate) fn time_window_active(&self) -> bool {
        self.etime_d > self.btime_d
    }
}

// ── Session ─────────────────────────────────────────────────────────────────

/// One open swath data stream bound to one codec.
pub struct Session<R: Read + Seek> {
    stream: R,
    codec: Box<dyn SwathCodec>,
    config: SessionConfig,

    pub(crate) reading: Reading,
    pub(crate) accum: Accumulator,

    // Cross-call bookkeeping.
    /// Record decoded but not yet consumed by an averaging group.
    pub(crate) pending: Option<Record>,
    /// Soft condition deferred for the next otherwise-clean reading.
    pub(crate) saved: Option<Condition>,
    /// Survey pings decoded over the life of the session.
    pub(crate) ping_count: u64,
    /// Comment records decoded over the life of the session.
    pub(crate) comment_count: u64,
    /// Fix behind the previous returned reading; basis for distance and
    /// derived speed.
    pub(crate) old_time_d: f64,
    pub(crate) old_lon: f64,
    pub(crate) old_lat: f64,
    /// Fix of the last gated ping; basis for time-gap detection.
    pub(crate) last_time_d: f64,
}

impl Session<BufReader<File>> {
    /// Open a file-backed session: bind the configured format, size the
    /// working buffers from its capabilities, and position at the start.
    pub fn open(path: &Path, config: SessionConfig) -> Result<Self> {
        let file = File::open(path).map_err(Error::Open)?;
        Self::new(BufReader::new(file), config)
    }
}

impl<R: Read + Seek> Session<R> {
    /// Bind a codec to an already-open stream.
    pub fn new(stream: R, mut config: SessionConfig) -> Result<Self> {
        config.pings_avg = config.pings_avg.max(1);
        let codec = get_codec_by_id(config.format)?;
        let caps = *codec.caps();
        tracing::debug!(
            format = codec.id().name(),
            pings_avg = config.pings_avg,
            beams_max = caps.beams_bath_max,
            "session opened"
        );
        Ok(Session {
            stream,
            codec,
            config,
            reading: Reading::sized_for(&caps),
            accum: Accumulator::sized_for(&caps),
            pending: None,
            saved: None,
            ping_count: 0,
            comment_count: 0,
            old_time_d: 0.0,
            old_lon: 0.0,
            old_lat: 0.0,
            last_time_d: 0.0,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Capability block of the bound format.
    pub fn caps(&self) -> &FormatCaps {
        self.codec.caps()
    }

    /// Survey pings decoded so far.
    pub fn ping_count(&self) -> u64 {
        self.ping_count
    }

    /// Comment records decoded so far.
    pub fn comment_count(&self) -> u64 {
        self.comment_count
    }

    /// Rewind to the start of the stream and clear all cross-call state,
    /// as if freshly opened. A seek failure is terminal for this call but
    /// leaves the session usable.
    pub fn rewind(&mut self) -> Result<()> {
        self.stream.seek(SeekFrom::Start(0)).map_err(Error::Seek)?;
        self.pending = None;
        self.saved = None;
        self.ping_count = 0;
        self.comment_count = 0;
        self.old_time_d = 0.0;
        self.old_lon = 0.0;
        self.old_lat = 0.0;
        self.last_time_d = 0.0;
        Ok(())
    }

    /// Release the stream. Consuming `self` makes use-after-close
    /// unrepresentable rather than a runtime handle error.
    pub fn close(self) -> Result<()> {
        Ok(())
    }

    /// Decode the next physical record, apply longitude normalization to
    /// any navigation it carries, and update session counters. This is
    /// the unaveraged dispatch path; [`Session::read`] builds on it.
    pub fn next_record(&mut self) -> Result<Record> {
        let mut rec = self.codec.decode_next(&mut self.stream)?;
        match &mut rec {
            Record::Data(p) => {
                p.longitude = normalize_longitude(p.longitude, self.config.lonflip);
                self.ping_count += 1;
                if self.ping_count == 1 {
                    // First fix seeds the distance basis so the first
                    // reading reports zero distance, not a jump from
                    // nowhere.
                    self.old_time_d = p.time_d;
                    self.old_lon = p.longitude;
                    self.old_lat = p.latitude;
                }
            }
            Record::NavSource(n) => {
                n.longitude = normalize_longitude(n.longitude, self.config.lonflip);
            }
            Record::Comment(_) => {
                self.comment_count += 1;
            }
            _ => {}
        }
        Ok(rec)
    }

    /// Current byte offset in the stream.
    pub fn position(&mut self) -> Result<u64> {
        self.stream.stream_position().map_err(Error::Seek)
    }

    // Probe support: decode without touching session bookkeeping, so a
    // bounded scan leaves counters, pending records and deferred
    // conditions exactly as it found them.
    pub(crate) fn decode_raw(&mut self) -> Result<Record> {
        self.codec.decode_next(&mut self.stream)
    }

    pub(crate) fn seek_raw(&mut self, pos: u64) -> Result<()> {
        self.stream.seek(SeekFrom::Start(pos)).map_err(Error::Seek)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatId;
    use std::io::Cursor;

    #[test]
    fn open_rejects_unknown_format() {
        let cfg = SessionConfig::for_format(40977);
        match Session::new(Cursor::new(Vec::new()), cfg) {
            Err(Error::UnsupportedFormat(40977)) => {}
            other => panic!("expected UnsupportedFormat, got {:?}", other.err()),
        }
    }

    #[test]
    fn buffers_are_sized_from_caps() {
        let cfg = SessionConfig::for_format(FormatId::GenericSwath.id());
        let s = Session::new(Cursor::new(Vec::new()), cfg).unwrap();
        assert_eq!(s.reading.flags.len(), s.caps().beams_bath_max);
        assert_eq!(s.reading.ss.len(), s.caps().pixels_ss_max);
    }

    #[test]
    fn pings_avg_zero_is_clamped_to_one() {
        let mut cfg = SessionConfig::for_format(FormatId::GenericSwath.id());
        cfg.pings_avg = 0;
        let s = Session::new(Cursor::new(Vec::new()), cfg).unwrap();
        assert_eq!(s.config().pings_avg, 1);
    }

    #[test]
    fn config_json_round_trip() {
        let mut cfg = SessionConfig::for_format(71);
        cfg.pings_avg = 5;
        cfg.lonflip = LonMode::Positive;
        cfg.bounds = [-122.5, -121.0, 36.0, 37.0];
        let text = serde_json::to_string(&cfg).unwrap();
        let back: SessionConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.pings_avg, 5);
        assert_eq!(back.lonflip, LonMode::Positive);
        assert_eq!(back.bounds, cfg.bounds);
        // The mode serializes as its historical integer.
        assert!(text.contains("\"lonflip\":1"));
    }
}
