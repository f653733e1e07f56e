//! The capability probe: a bounded scan answering whether a file carries
//! enough auxiliary data to support re-deriving bathymetry by ray tracing
//! through a water-column velocity profile.
//!
//! The probe rewinds, classifies up to a fixed cap of records (default
//! 100), and stops with a True verdict the moment every required category
//! has been seen at least once. It never reads the whole file to say
//! yes, and never reads past the cap to say no. Classification is by
//! record kind plus qualifying content: a survey ping only counts when it
//! carries travel times and beam angles (on an accepted sensor when a
//! filter is set), a velocity profile only with enough points, and so on.
//!
//! Whatever happens (True, False, or a hard decode error), the stream is
//! returned to the position it held before the call. A failed restore is
//! itself a seek error; a hard decode error still propagates after the
//! restore is attempted. Session bookkeeping (counters, pending records,
//! deferred conditions) is never touched.

use std::io::{Read, Seek};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::Record;
use crate::session::Session;

/// Default record cap for one probe. An empirical constant: deep enough
/// to reach past file headers and startup chatter in practice, shallow
/// enough to stay cheap on huge files.
pub const PROBE_SCAN_CAP: usize = 100;

/// What a qualifying file must contain, and how far to look.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeRequirements {
    /// Maximum records examined before giving up.
    pub scan_cap: usize,
    /// Minimum points for a velocity profile to qualify.
    pub min_svp_points: usize,
    /// Minimum entries for a parameter record to qualify.
    pub min_parameters: usize,
    /// Minimum samples for an attitude record to qualify.
    pub min_attitude_samples: usize,
    /// When set, only pings from these sensor ids qualify as timed pings.
    pub accept_sensors: Option<Vec<u16>>,
}

impl Default for ProbeRequirements {
    fn default() -> Self {
        ProbeRequirements {
            scan_cap: PROBE_SCAN_CAP,
            min_svp_points: 2,
            min_parameters: 2,
            min_attitude_samples: 1,
            accept_sensors: None,
        }
    }
}

impl ProbeRequirements {
    fn sensor_accepted(&self, sensor_id: u16) -> bool {
        match &self.accept_sensors {
            Some(ids) => ids.contains(&sensor_id),
            None => true,
        }
    }
}

/// Qualifying-record tallies accumulated by one probe.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ProbeCounts {
    /// Records examined, qualifying or not.
    pub records_scanned: usize,
    /// Survey pings carrying travel times and beam angles on an accepted
    /// sensor.
    pub timed_pings: usize,
    /// Velocity profiles with enough points.
    pub velocity_profiles: usize,
    /// Parameter records with enough entries.
    pub parameter_records: usize,
    /// Attitude records with enough samples.
    pub attitude_records: usize,
}

impl ProbeCounts {
    fn satisfied(&self) -> bool {
        self.timed_pings >= 1
            && self.velocity_profiles >= 1
            && self.parameter_records >= 1
            && self.attitude_records >= 1
    }
}

/// The verdict plus the occurrences that justified it. Produced fresh by
/// every probe, stored nowhere.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub supported: bool,
    pub counts: ProbeCounts,
}

/// Probe a session's stream for ray-trace recomputation support.
///
/// The stream position is unchanged across the call on every path.
pub fn probe<R: Read + Seek>(
    session: &mut Session<R>,
    req: &ProbeRequirements,
) -> Result<ProbeReport> {
    let original = session.position()?;
    let outcome = scan(session, req);
    let restore = session.seek_raw(original);
    // The scan's own failure outranks a restore failure; a clean scan
    // with a failed restore is still a failure.
    match (outcome, restore) {
        (Err(e), _) => Err(e),
        (Ok(_), Err(e)) => Err(e),
        (Ok(report), Ok(())) => {
            tracing::debug!(
                supported = report.supported,
                scanned = report.counts.records_scanned,
                "probe finished"
            );
            Ok(report)
        }
    }
}

fn scan<R: Read + Seek>(session: &mut Session<R>, req: &ProbeRequirements) -> Result<ProbeReport> {
    session.seek_raw(0)?;
    let mut counts = ProbeCounts::default();

    while counts.records_scanned < req.scan_cap {
        let rec = match session.decode_raw() {
            Ok(r) => r,
            Err(Error::Eof) => break,
            Err(e) => return Err(e),
        };
        counts.records_scanned += 1;

        match &rec {
            Record::Data(p) => {
                if p.has_travel_times() && req.sensor_accepted(p.sensor_id) {
                    counts.timed_pings += 1;
                }
            }
            Record::SoundVelocityProfile(s) => {
                if s.points.len() >= req.min_svp_points {
                    counts.velocity_profiles += 1;
                }
            }
            Record::ProcessingParameters(pp) => {
                if pp.entries.len() >= req.min_parameters {
                    counts.parameter_records += 1;
                }
            }
            Record::Attitude(g) => {
                if g.samples.len() >= req.min_attitude_samples {
                    counts.attitude_records += 1;
                }
            }
            _ => {}
        }

        if counts.satisfied() {
            return Ok(ProbeReport {
                supported: true,
                counts,
            });
        }
    }

    Ok(ProbeReport {
        supported: false,
        counts,
    })
}
