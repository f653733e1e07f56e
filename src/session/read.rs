//! The ping buffering and averaging engine.
//!
//! [`Session::read`] satisfies one "get a reading" request by decoding up
//! to `pings_avg` survey pings and combining them: per-beam sums over
//! unflagged beams, arithmetic navigation mean, unit-vector heading mean,
//! distance from the previous reading's fix at the local meters-per-degree
//! scale, and speed from the format's own field when present or from
//! distance over elapsed time when not.
//!
//! Gating is soft: a ping outside the configured spatial or time window,
//! after too long a gap, or below minimum speed never kills the session.
//! A rejection that leaves the call with nothing usable comes back as a
//! recoverable [`Error::Soft`]; a rejection of a group's first candidate
//! when more pings are wanted is deferred through the session's saved
//! slot and surfaced once, as [`Reading::condition`], on the reading that
//! otherwise completed cleanly. A transient gap is reported, never
//! silently dropped, and never reported twice.

use std::io::{Read, Seek};

use chrono::{DateTime, Utc};

use crate::error::{Condition, Error, Result};
use crate::nav::{coord_scale, HeadingMean};
use crate::record::{epoch_to_datetime, BeamFlag, Ping, Record, RecordKind};
use crate::session::{Session, TIME_D_UNKNOWN};
use crate::format::FormatCaps;

// ── The client-visible reading ──────────────────────────────────────────────

/// One combined reading. Owned by the session and borrowed out; the next
/// call on the same session overwrites it.
///
/// Array fields are sized to the bound format's maxima; `nbath`, `namp`
/// and `nss` give the valid prefix for this reading. Beams with no
/// accepted contribution are [`BeamFlag::Null`] with zeroed values.
#[derive(Debug)]
pub struct Reading {
    pub kind: RecordKind,
    /// Pings combined into this reading.
    pub pings: u32,
    /// Epoch seconds; mean of the group.
    pub time_d: f64,
    pub navlon: f64,
    pub navlat: f64,
    /// km/hr.
    pub speed: f64,
    /// Degrees, [0, 360).
    pub heading: f64,
    /// Meters from the previous reading's fix.
    pub distance: f64,
    /// Transducer depth, meters; from the group's last ping.
    pub sensor_depth: f64,
    /// Height above bottom, meters; from the group's last ping.
    pub altitude: f64,

    pub nbath: usize,
    pub namp: usize,
    pub nss: usize,
    pub flags: Vec<BeamFlag>,
    pub bath: Vec<f64>,
    /// Per-beam positions: across/along-track offsets rotated by the mean
    /// heading and mapped to degrees at the mean fix.
    pub bath_lon: Vec<f64>,
    pub bath_lat: Vec<f64>,
    pub amp: Vec<f64>,
    pub ss: Vec<f64>,
    pub ss_lon: Vec<f64>,
    pub ss_lat: Vec<f64>,

    /// Set for comment readings.
    pub comment: Option<String>,
    /// A deferred soft condition, surfaced exactly once.
    pub condition: Option<Condition>,
}

impl Reading {
    pub(crate) fn sized_for(caps: &FormatCaps) -> Self {
        Reading {
            kind: RecordKind::Data,
            pings: 0,
            time_d: 0.0,
            navlon: 0.0,
            navlat: 0.0,
            speed: 0.0,
            heading: 0.0,
            distance: 0.0,
            sensor_depth: 0.0,
            altitude: 0.0,
            nbath: 0,
            namp: 0,
            nss: 0,
            flags: vec![BeamFlag::Null; caps.beams_bath_max],
            bath: vec![0.0; caps.beams_bath_max],
            bath_lon: vec![0.0; caps.beams_bath_max],
            bath_lat: vec![0.0; caps.beams_bath_max],
            amp: vec![0.0; caps.beams_amp_max],
            ss: vec![0.0; caps.pixels_ss_max],
            ss_lon: vec![0.0; caps.pixels_ss_max],
            ss_lat: vec![0.0; caps.pixels_ss_max],
            comment: None,
            condition: None,
        }
    }

    fn begin(&mut self) {
        self.kind = RecordKind::Data;
        self.pings = 0;
        self.time_d = 0.0;
        self.navlon = 0.0;
        self.navlat = 0.0;
        self.speed = 0.0;
        self.heading = 0.0;
        self.distance = 0.0;
        self.sensor_depth = 0.0;
        self.altitude = 0.0;
        self.nbath = 0;
        self.namp = 0;
        self.nss = 0;
        self.comment = None;
        self.condition = None;
    }

    /// Reading time as a calendar timestamp.
    pub fn time(&self) -> DateTime<Utc> {
        epoch_to_datetime(self.time_d)
    }
}

// ── Group accumulation ──────────────────────────────────────────────────────

/// Accumulation buffers for one averaging group, sized once at open and
/// re-zeroed at the start of every group. Indices beyond a contributing
/// ping's beam count stay untouched and are never read back, because
/// their counts stay zero.
pub(crate) struct Accumulator {
    pub(crate) pings_binned: u32,
    time_sum: f64,
    lon_sum: f64,
    lat_sum: f64,
    speed_sum: f64,
    heading: HeadingMean,
    sensor_depth_last: f64,
    altitude_last: f64,

    flags: Vec<BeamFlag>,
    bath_sum: Vec<f64>,
    across_sum: Vec<f64>,
    along_sum: Vec<f64>,
    bath_num: Vec<u32>,
    amp_sum: Vec<f64>,
    amp_num: Vec<u32>,
    ss_sum: Vec<f64>,
    ss_across_sum: Vec<f64>,
    ss_along_sum: Vec<f64>,
    ss_num: Vec<u32>,
}

impl Accumulator {
    pub(crate) fn sized_for(caps: &FormatCaps) -> Self {
        Accumulator {
            pings_binned: 0,
            time_sum: 0.0,
            lon_sum: 0.0,
            lat_sum: 0.0,
            speed_sum: 0.0,
            heading: HeadingMean::new(),
            sensor_depth_last: 0.0,
            altitude_last: 0.0,
            flags: vec![BeamFlag::Null; caps.beams_bath_max],
            bath_sum: vec![0.0; caps.beams_bath_max],
            across_sum: vec![0.0; caps.beams_bath_max],
            along_sum: vec![0.0; caps.beams_bath_max],
            bath_num: vec![0; caps.beams_bath_max],
            amp_sum: vec![0.0; caps.beams_amp_max],
            amp_num: vec![0; caps.beams_amp_max],
            ss_sum: vec![0.0; caps.pixels_ss_max],
            ss_across_sum: vec![0.0; caps.pixels_ss_max],
            ss_along_sum: vec![0.0; caps.pixels_ss_max],
            ss_num: vec![0; caps.pixels_ss_max],
        }
    }

    pub(crate) fn reset(&mut self) {
        self.pings_binned = 0;
        self.time_sum = 0.0;
        self.lon_sum = 0.0;
        self.lat_sum = 0.0;
        self.speed_sum = 0.0;
        self.heading = HeadingMean::new();
        self.sensor_depth_last = 0.0;
        self.altitude_last = 0.0;
        self.flags.fill(BeamFlag::Null);
        self.bath_sum.fill(0.0);
        self.across_sum.fill(0.0);
        self.along_sum.fill(0.0);
        self.bath_num.fill(0);
        self.amp_sum.fill(0.0);
        self.amp_num.fill(0);
        self.ss_sum.fill(0.0);
        self.ss_across_sum.fill(0.0);
        self.ss_along_sum.fill(0.0);
        self.ss_num.fill(0);
    }

    /// Fold one accepted ping into the group.
    ///
    /// With `pass_through` (configured group size 1) the single ping is
    /// copied verbatim, flags included, so an unaveraged reading shows the
    /// data exactly as decoded. Otherwise only unflagged beams contribute.
    fn bin(&mut self, ping: &Ping, pass_through: bool) {
        self.pings_binned += 1;
        self.time_sum += ping.time_d;
        self.lon_sum += ping.longitude;
        self.lat_sum += ping.latitude;
        self.speed_sum += ping.speed;
        self.heading.add(ping.heading);
        self.sensor_depth_last = ping.sensor_depth;
        self.altitude_last = ping.altitude;

        let nb = ping.beam_count().min(self.bath_sum.len());
        let na = ping.amp.len().min(self.amp_sum.len());
        let np = ping.pixel_count().min(self.ss_sum.len());

        if pass_through {
            for i in 0..nb {
                self.flags[i] = ping.flags[i];
                self.bath_sum[i] = ping.bath[i];
                self.across_sum[i] = ping.across[i];
                self.along_sum[i] = ping.along[i];
                self.bath_num[i] = 1;
            }
            for i in 0..na {
                self.amp_sum[i] = ping.amp[i];
                self.amp_num[i] = 1;
            }
            for i in 0..np {
                self.ss_sum[i] = ping.ss[i];
                self.ss_across_sum[i] = ping.ss_across[i];
                self.ss_along_sum[i] = ping.ss_along[i];
                self.ss_num[i] = 1;
            }
        } else {
            for i in 0..nb {
                if ping.flags[i].is_ok() {
                    self.flags[i] = BeamFlag::Ok;
                    self.bath_sum[i] += ping.bath[i];
                    self.across_sum[i] += ping.across[i];
                    self.along_sum[i] += ping.along[i];
                    self.bath_num[i] += 1;
                }
            }
            for i in 0..na {
                if i < ping.flags.len() && ping.flags[i].is_ok() {
                    self.amp_sum[i] += ping.amp[i];
                    self.amp_num[i] += 1;
                }
            }
            for i in 0..np {
                self.ss_sum[i] += ping.ss[i];
                self.ss_across_sum[i] += ping.ss_across[i];
                self.ss_along_sum[i] += ping.ss_along[i];
                self.ss_num[i] += 1;
            }
        }
    }
}

// ── The engine ──────────────────────────────────────────────────────────────

impl<R: Read + Seek> Session<R> {
    /// Produce one reading, combining up to `pings_avg` survey pings.
    ///
    /// Returns a comment reading when a comment record arrives before any
    /// ping has been accepted; a comment arriving mid-group ends the group
    /// and is delivered by the following call. Hard decode and I/O errors
    /// propagate immediately; [`Error::Eof`] after a partly filled group
    /// first yields the partial reading, then surfaces on the next call.
    pub fn read(&mut self) -> Result<&Reading> {
        self.reading.begin();
        self.accum.reset();
        let pings_avg = self.config().pings_avg;

        let mut pings_read: u32 = 0;

        loop {
            let rec = if let Some(r) = self.pending.take() {
                r
            } else {
                match self.next_record() {
                    Ok(r) => r,
                    Err(Error::Eof) => {
                        if self.accum.pings_binned > 0 {
                            break;
                        }
                        return Err(Error::Eof);
                    }
                    Err(e) => return Err(e),
                }
            };

            match rec {
                Record::Data(ping) => {
                    pings_read += 1;
                    match self.gate(&ping) {
                        None => {
                            self.accum.bin(&ping, pings_avg == 1);
                            self.last_time_d = ping.time_d;
                            if self.accum.pings_binned >= pings_avg {
                                break;
                            }
                        }
                        Some(cond) => {
                            tracing::debug!(
                                condition = %cond,
                                time_d = ping.time_d,
                                "ping rejected"
                            );
                            if self.accum.pings_binned >= 1 {
                                // The group already holds data: return the
                                // partial average and keep the rejected
                                // ping for the next call to deal with.
                                self.pending = Some(Record::Data(ping));
                                break;
                            } else if pings_avg > 1 && pings_read == 1 {
                                // First candidate of a multi-ping group:
                                // bin it anyway, remember the condition,
                                // keep reading.
                                if self.saved.is_none() {
                                    self.saved = Some(cond);
                                }
                                self.accum.bin(&ping, false);
                                self.last_time_d = ping.time_d;
                                if self.accum.pings_binned >= pings_avg {
                                    break;
                                }
                            } else {
                                self.last_time_d = ping.time_d;
                                return Err(Error::Soft(cond));
                            }
                        }
                    }
                }
                Record::Comment(text) => {
                    if self.accum.pings_binned >= 1 {
                        self.pending = Some(Record::Comment(text));
                        break;
                    }
                    self.reading.kind = RecordKind::Comment;
                    self.reading.comment = Some(text);
                    return Ok(&self.reading);
                }
                other => {
                    // Auxiliary records are not delivered by the averaging
                    // reader; callers wanting them use next_record().
                    tracing::trace!(kind = other.kind().name(), "skipping record");
                    continue;
                }
            }
        }

        self.combine()
    }

    /// Gate one candidate ping against the configured acceptance policy.
    fn gate(&self, ping: &Ping) -> Option<Condition> {
        let b = &self.config().bounds;
        if ping.longitude < b[0]
            || ping.longitude > b[1]
            || ping.latitude < b[2]
            || ping.latitude > b[3]
        {
            return Some(Condition::OutOfBounds);
        }
        if self.config().time_window_active()
            && ping.time_d > TIME_D_UNKNOWN
            && (ping.time_d < self.config().btime_d || ping.time_d > self.config().etime_d)
        {
            return Some(Condition::OutOfTimeBounds);
        }
        if self.ping_count > 1
            && ping.time_d > TIME_D_UNKNOWN
            && self.last_time_d > 0.0
            && ping.time_d - self.last_time_d > 60.0 * self.config().timegap
        {
            return Some(Condition::TimeGap);
        }
        None
    }

    /// Combine the accumulated group into the session's reading.
    fn combine(&mut self) -> Result<&Reading> {
        let binned = self.accum.pings_binned;
        debug_assert!(binned > 0);
        let n = binned as f64;
        let caps = *self.caps();

        self.reading.kind = RecordKind::Data;
        self.reading.pings = binned;
        self.reading.time_d = self.accum.time_sum / n;
        let navlon = self.accum.lon_sum / n;
        let navlat = self.accum.lat_sum / n;
        self.reading.navlon = navlon;
        self.reading.navlat = navlat;
        self.reading.sensor_depth = self.accum.sensor_depth_last;
        self.reading.altitude = self.accum.altitude_last;

        let (heading, hx, hy) = self.accum.heading.mean().unwrap_or((0.0, 0.0, 1.0));
        self.reading.heading = heading;

        let scale = coord_scale(navlat);

        let distance = if self.old_time_d > 0.0 {
            let dx = (navlon - self.old_lon) / scale.mtodeglon;
            let dy = (navlat - self.old_lat) / scale.mtodeglat;
            (dx * dx + dy * dy).sqrt()
        } else {
            0.0
        };
        self.reading.distance = distance;

        let speed = if self.accum.speed_sum > 0.0 {
            self.accum.speed_sum / n
        } else if self.old_time_d > 0.0 {
            let dt_hours = (self.reading.time_d - self.old_time_d) / 3600.0;
            if dt_hours > 0.0 {
                (distance / 1000.0) / dt_hours
            } else {
                0.0
            }
        } else {
            0.0
        };
        self.reading.speed = speed;

        // Per-beam outputs: average where anything was binned, null the
        // rest, and map track offsets to positions with the mean heading
        // rotation.
        let mut nbath = 0;
        for i in 0..caps.beams_bath_max {
            if self.accum.bath_num[i] > 0 {
                let c = self.accum.bath_num[i] as f64;
                let across = self.accum.across_sum[i] / c;
                let along = self.accum.along_sum[i] / c;
                self.reading.flags[i] = self.accum.flags[i];
                self.reading.bath[i] = self.accum.bath_sum[i] / c;
                self.reading.bath_lon[i] =
                    navlon + hy * scale.mtodeglon * across + hx * scale.mtodeglon * along;
                self.reading.bath_lat[i] =
                    navlat - hx * scale.mtodeglat * across + hy * scale.mtodeglat * along;
                nbath = i + 1;
            } else {
                self.reading.flags[i] = BeamFlag::Null;
                self.reading.bath[i] = 0.0;
                self.reading.bath_lon[i] = 0.0;
                self.reading.bath_lat[i] = 0.0;
            }
        }
        let mut namp = 0;
        for i in 0..caps.beams_amp_max {
            if self.accum.amp_num[i] > 0 {
                self.reading.amp[i] = self.accum.amp_sum[i] / self.accum.amp_num[i] as f64;
                namp = i + 1;
            } else {
                self.reading.amp[i] = 0.0;
            }
        }
        let mut nss = 0;
        for i in 0..caps.pixels_ss_max {
            if self.accum.ss_num[i] > 0 {
                let c = self.accum.ss_num[i] as f64;
                let across = self.accum.ss_across_sum[i] / c;
                let along = self.accum.ss_along_sum[i] / c;
                self.reading.ss[i] = self.accum.ss_sum[i] / c;
                self.reading.ss_lon[i] =
                    navlon + hy * scale.mtodeglon * across + hx * scale.mtodeglon * along;
                self.reading.ss_lat[i] =
                    navlat - hx * scale.mtodeglat * across + hy * scale.mtodeglat * along;
                nss = i + 1;
            } else {
                self.reading.ss[i] = 0.0;
                self.reading.ss_lon[i] = 0.0;
                self.reading.ss_lat[i] = 0.0;
            }
        }
        if !caps.variable_beams {
            nbath = caps.beams_bath_max;
            namp = caps.beams_amp_max;
            nss = caps.pixels_ss_max;
        }
        self.reading.nbath = nbath;
        self.reading.namp = namp;
        self.reading.nss = nss;

        // This reading becomes the distance basis for the next one.
        self.old_time_d = self.reading.time_d;
        self.old_lon = navlon;
        self.old_lat = navlat;

        // Minimum-speed gate, meaningful once more than one ping has been
        // seen overall and a speed estimate exists.
        if self.config().speed_min > 0.0
            && self.ping_count > 1
            && self.reading.time_d > TIME_D_UNKNOWN
            && speed < self.config().speed_min
        {
            tracing::debug!(speed, minimum = self.config().speed_min, "reading rejected");
            return Err(Error::Soft(Condition::SpeedTooSmall));
        }

        // Surface a deferred condition exactly once, on the first clean
        // reading after it was recorded.
        self.reading.condition = self.saved.take();

        Ok(&self.reading)
    }
}
