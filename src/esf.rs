//! The edit journal: a non-destructive overlay of beam-flag changes.
//!
//! Flag edits are never written back into swath data files. Each data
//! file instead gets a sidecar journal, an append-only sequence of
//! fixed-size events, and readers re-apply the journal to every freshly
//! decoded ping. The source stream is never mutated.
//!
//! # Wire layout
//! A journal is a headerless sequence of 16-byte little-endian triples:
//!
//! ```text
//! time_d   f64    ping timestamp, epoch seconds
//! beam     u32    beam index within the ping
//! action   u32    edit action code
//! ```
//!
//! Appending is always safe; a reader that finds a short final triple
//! (a torn append) treats it as end-of-journal, not corruption.
//!
//! # Matching and precedence
//! On load, events are sorted by timestamp; the sort is stable, so two
//! events at the same instant keep their append order. [`EsfFile::apply`]
//! matches a ping by timestamp window (default ±0.02 s) and exact beam
//! index, applying every matching event in order, so the last action for a
//! (time, beam) pair wins.
//!
//! Several journals may overlay one file (manual edits and automated
//! filter edits are commonly kept apart). Apply them in a fixed,
//! documented order; journals applied later win.
//!
//! A journal file backing one data file assumes a single writer; two
//! sessions appending concurrently is a caller error this module does not
//! detect.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::record::BeamFlag;
use crate::wire::{get_f64, get_u32, put_f64, put_u32, LittleEndian};

/// On-disk size of one edit event.
pub const ESF_EVENT_SIZE: usize = 16;

/// Default half-width of the timestamp matching window, seconds. An
/// empirical constant carried over from long practice; override with
/// [`EsfFile::set_epsilon`] when a format's timestamps need a looser or
/// tighter match.
pub const ESF_TIME_EPSILON: f64 = 0.02;

// ── Actions ─────────────────────────────────────────────────────────────────

/// One edit's effect on a beam. The wire codes are frozen; journals
/// written by any release must load in any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditAction {
    /// Mark the beam bad, by hand.
    Flag,
    /// Restore the beam to good.
    Unflag,
    /// Erase the beam entirely.
    Null,
    /// Mark the beam bad, by an automated filter.
    Filter,
    /// Mark the beam bad, by the sonar's own screening.
    Sonar,
}

impl EditAction {
    pub fn to_u32(self) -> u32 {
        match self {
            EditAction::Flag => 1,
            EditAction::Unflag => 2,
            EditAction::Null => 3,
            EditAction::Filter => 4,
            EditAction::Sonar => 5,
        }
    }

    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(EditAction::Flag),
            2 => Some(EditAction::Unflag),
            3 => Some(EditAction::Null),
            4 => Some(EditAction::Filter),
            5 => Some(EditAction::Sonar),
            _ => None,
        }
    }

    /// The flag state this action drives a beam to.
    fn target_flag(self) -> BeamFlag {
        match self {
            EditAction::Flag => BeamFlag::Manual,
            EditAction::Unflag => BeamFlag::Ok,
            EditAction::Null => BeamFlag::Null,
            EditAction::Filter => BeamFlag::Filter,
            EditAction::Sonar => BeamFlag::Sonar,
        }
    }
}

/// One recorded flag change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditEvent {
    pub time_d: f64,
    pub beam: u32,
    pub action: EditAction,
}

// ── The journal ─────────────────────────────────────────────────────────────

/// An edit journal bound to one backing file.
pub struct EsfFile {
    path: PathBuf,
    /// Events in timestamp order, append order preserved on ties.
    events: Vec<EditEvent>,
    /// Open append handle; `None` for read-only overlays.
    out: Option<File>,
    epsilon: f64,
}

impl EsfFile {
    /// Conventional journal path for a swath data file: the data file's
    /// full name with `.esf` appended.
    pub fn default_path(swathfile: &Path) -> PathBuf {
        let mut name = swathfile.as_os_str().to_os_string();
        name.push(".esf");
        PathBuf::from(name)
    }

    /// Load a journal as a read-only overlay. A missing backing file is
    /// zero prior edits, not an error.
    pub fn load(path: &Path) -> Result<Self> {
        let events = Self::read_events(path)?;
        Ok(EsfFile {
            path: path.to_path_buf(),
            events,
            out: None,
            epsilon: ESF_TIME_EPSILON,
        })
    }

    /// Load a journal and open it for appending, creating the backing
    /// file if needed.
    pub fn open_append(path: &Path) -> Result<Self> {
        let events = Self::read_events(path)?;
        let out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(Error::Open)?;
        tracing::debug!(path = %path.display(), loaded = events.len(), "journal opened");
        Ok(EsfFile {
            path: path.to_path_buf(),
            events,
            out: Some(out),
            epsilon: ESF_TIME_EPSILON,
        })
    }

    fn read_events(path: &Path) -> Result<Vec<EditEvent>> {
        let mut raw = Vec::new();
        match File::open(path) {
            Ok(mut f) => {
                f.read_to_end(&mut raw)?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::Open(e)),
        }

        let mut events = Vec::with_capacity(raw.len() / ESF_EVENT_SIZE);
        // chunks_exact drops a torn final triple, as the layout requires.
        for chunk in raw.chunks_exact(ESF_EVENT_SIZE) {
            let time_d = get_f64::<LittleEndian>(chunk, 0);
            let beam = get_u32::<LittleEndian>(chunk, 8);
            let code = get_u32::<LittleEndian>(chunk, 12);
            match EditAction::from_u32(code) {
                Some(action) => events.push(EditEvent {
                    time_d,
                    beam,
                    action,
                }),
                None => {
                    tracing::warn!(code, time_d, beam, "skipping edit with unknown action");
                }
            }
        }
        // Stable: simultaneous events keep append order, so the later
        // append wins at apply time.
        events.sort_by(|a, b| a.time_d.partial_cmp(&b.time_d).unwrap_or(std::cmp::Ordering::Equal));
        Ok(events)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn events(&self) -> &[EditEvent] {
        &self.events
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Adjust the timestamp matching window.
    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon.abs();
    }

    /// Durably record one flag change and fold it into the loaded
    /// overlay. On error the caller must not assume the edit took
    /// effect.
    pub fn append(&mut self, time_d: f64, beam: u32, action: EditAction) -> Result<()> {
        let out = self.out.as_mut().ok_or(Error::BadHandle)?;

        let mut buf = [0u8; ESF_EVENT_SIZE];
        put_f64::<LittleEndian>(&mut buf, 0, time_d);
        put_u32::<LittleEndian>(&mut buf, 8, beam);
        put_u32::<LittleEndian>(&mut buf, 12, action.to_u32());
        out.write_all(&buf).map_err(Error::Write)?;
        out.flush().map_err(Error::Write)?;

        // Insert after any event at the same timestamp so this append
        // stays the winner.
        let at = self
            .events
            .partition_point(|e| e.time_d <= time_d);
        self.events.insert(
            at,
            EditEvent {
                time_d,
                beam,
                action,
            },
        );
        Ok(())
    }

    /// Overlay this journal onto a freshly decoded ping.
    ///
    /// Events within `epsilon` of `time_d` are applied to their beams in
    /// journal order, so the last action recorded for a beam wins. Null
    /// beams are untouchable: a flag or unflag of a beam with no data is
    /// ignored. Events naming beams beyond the ping's beam count are
    /// ignored. Returns how many beams changed state.
    pub fn apply(&self, time_d: f64, flags: &mut [BeamFlag]) -> usize {
        let lo = self
            .events
            .partition_point(|e| e.time_d < time_d - self.epsilon);
        let hi = self
            .events
            .partition_point(|e| e.time_d <= time_d + self.epsilon);

        let mut changed = 0usize;
        for i in 0..flags.len() {
            let before = flags[i];
            let mut state = before;
            for e in &self.events[lo..hi] {
                if e.beam as usize != i {
                    continue;
                }
                if state.is_null() {
                    // No data to edit; the event is inert against this
                    // ping.
                    continue;
                }
                state = e.action.target_flag();
            }
            if state != before {
                flags[i] = state;
                changed += 1;
            }
        }
        if changed > 0 {
            tracing::debug!(time_d, changed, "journal applied");
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn journal_in(dir: &TempDir) -> PathBuf {
        dir.path().join("line14.gsw.esf")
    }

    #[test]
    fn missing_journal_loads_empty() {
        let dir = TempDir::new().unwrap();
        let esf = EsfFile::load(&journal_in(&dir)).unwrap();
        assert!(esf.events().is_empty());
    }

    #[test]
    fn append_reload_preserves_events_in_time_order() {
        let dir = TempDir::new().unwrap();
        let path = journal_in(&dir);
        {
            let mut esf = EsfFile::open_append(&path).unwrap();
            esf.append(200.0, 3, EditAction::Flag).unwrap();
            esf.append(100.0, 7, EditAction::Null).unwrap();
            esf.append(150.0, 2, EditAction::Filter).unwrap();
        }
        let esf = EsfFile::load(&path).unwrap();
        let times: Vec<f64> = esf.events().iter().map(|e| e.time_d).collect();
        assert_eq!(times, vec![100.0, 150.0, 200.0]);
        assert_eq!(esf.events()[0].action, EditAction::Null);
    }

    #[test]
    fn last_action_wins_for_same_time_and_beam() {
        let dir = TempDir::new().unwrap();
        let path = journal_in(&dir);
        let mut esf = EsfFile::open_append(&path).unwrap();
        esf.append(1000.0, 5, EditAction::Flag).unwrap();
        esf.append(1000.0, 5, EditAction::Unflag).unwrap();

        let mut flags = vec![BeamFlag::Ok; 8];
        esf.apply(1000.0, &mut flags);
        assert_eq!(flags[5], BeamFlag::Ok);

        // The same precedence must hold after a reload from disk.
        drop(esf);
        let esf = EsfFile::load(&path).unwrap();
        let mut flags = vec![BeamFlag::Ok; 8];
        flags[5] = BeamFlag::Filter;
        esf.apply(1000.0, &mut flags);
        assert_eq!(flags[5], BeamFlag::Ok);
    }

    #[test]
    fn epsilon_window_bounds_matching() {
        let dir = TempDir::new().unwrap();
        let path = journal_in(&dir);
        let mut esf = EsfFile::open_append(&path).unwrap();
        esf.append(1000.0, 0, EditAction::Flag).unwrap();

        let mut flags = vec![BeamFlag::Ok; 1];
        esf.apply(1000.015, &mut flags);
        assert_eq!(flags[0], BeamFlag::Manual);

        let mut flags = vec![BeamFlag::Ok; 1];
        esf.apply(1000.5, &mut flags);
        assert_eq!(flags[0], BeamFlag::Ok);
    }

    #[test]
    fn null_beams_are_untouchable() {
        let dir = TempDir::new().unwrap();
        let path = journal_in(&dir);
        let mut esf = EsfFile::open_append(&path).unwrap();
        esf.append(10.0, 0, EditAction::Flag).unwrap();
        esf.append(10.0, 1, EditAction::Unflag).unwrap();

        let mut flags = vec![BeamFlag::Null, BeamFlag::Null];
        let changed = esf.apply(10.0, &mut flags);
        assert_eq!(changed, 0);
        assert_eq!(flags, vec![BeamFlag::Null, BeamFlag::Null]);
    }

    #[test]
    fn null_action_erases_a_good_beam() {
        let dir = TempDir::new().unwrap();
        let path = journal_in(&dir);
        let mut esf = EsfFile::open_append(&path).unwrap();
        esf.append(10.0, 2, EditAction::Null).unwrap();

        let mut flags = vec![BeamFlag::Ok; 4];
        esf.apply(10.0, &mut flags);
        assert_eq!(flags[2], BeamFlag::Null);
    }

    #[test]
    fn out_of_range_beam_indices_are_ignored() {
        let dir = TempDir::new().unwrap();
        let path = journal_in(&dir);
        let mut esf = EsfFile::open_append(&path).unwrap();
        esf.append(10.0, 99, EditAction::Flag).unwrap();

        let mut flags = vec![BeamFlag::Ok; 4];
        assert_eq!(esf.apply(10.0, &mut flags), 0);
    }

    #[test]
    fn torn_final_triple_is_end_of_journal() {
        let dir = TempDir::new().unwrap();
        let path = journal_in(&dir);
        {
            let mut esf = EsfFile::open_append(&path).unwrap();
            esf.append(10.0, 1, EditAction::Flag).unwrap();
        }
        // Simulate a torn append: half an event at the tail.
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[0u8; ESF_EVENT_SIZE / 2]).unwrap();
        }
        let esf = EsfFile::load(&path).unwrap();
        assert_eq!(esf.events().len(), 1);
        assert_eq!(esf.events()[0].beam, 1);
    }

    #[test]
    fn append_on_read_only_overlay_is_a_handle_error() {
        let dir = TempDir::new().unwrap();
        let mut esf = EsfFile::load(&journal_in(&dir)).unwrap();
        match esf.append(1.0, 0, EditAction::Flag) {
            Err(Error::BadHandle) => {}
            other => panic!("expected BadHandle, got {other:?}"),
        }
    }

    #[test]
    fn later_journal_wins_when_layered() {
        let dir = TempDir::new().unwrap();
        let manual = dir.path().join("line.gsw.esf");
        let filter = dir.path().join("line.gsw.ftr.esf");

        let mut m = EsfFile::open_append(&manual).unwrap();
        m.append(50.0, 3, EditAction::Flag).unwrap();
        let mut f = EsfFile::open_append(&filter).unwrap();
        f.append(50.0, 3, EditAction::Unflag).unwrap();

        let mut flags = vec![BeamFlag::Ok; 8];
        // Fixed layering order: manual first, filter journal second.
        m.apply(50.0, &mut flags);
        f.apply(50.0, &mut flags);
        assert_eq!(flags[3], BeamFlag::Ok);
    }

    #[test]
    fn default_path_appends_esf_suffix() {
        let p = EsfFile::default_path(Path::new("/data/line14.gsw"));
        assert_eq!(p, PathBuf::from("/data/line14.gsw.esf"));
    }
}
