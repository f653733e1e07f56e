//! Crate-wide error taxonomy.
//!
//! Every failure a caller can see is one variant of [`Error`]; there are no
//! raw numeric codes. The variants split into four families:
//!
//! - **Handle errors**: operating on a closed or never-opened session.
//!   Always terminal.
//! - **I/O errors**: open/seek/flush/write failures plus [`Error::Eof`].
//!   EOF is the one condition the averaging engine and the capability
//!   scanner treat as an expected end state rather than a failure.
//! - **Decode errors**: unrecognized record id, size mismatch, buffer too
//!   small, checksum mismatch, and one variant per record category so a
//!   caller can report which subsystem misdecoded. Terminal for the call.
//! - **Soft conditions**: gating rejections from the averaging engine
//!   (bounds, time window, time gap, minimum speed, empty group). These are
//!   recoverable: the caller may keep reading the same session.
//!
//! Use [`Error::is_recoverable`] to branch "skip this reading" vs. "stop
//! this file".

use std::io;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The record category a decode failure was detected in.
///
/// Carried by [`Error::RecordDecode`] so tools can say *which* part of a
/// file is bad, not just that something was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordCategory {
    Header,
    Data,
    Comment,
    Navigation,
    Attitude,
    VelocityProfile,
    ProcessingParameters,
    SensorParameters,
    History,
    NavigationError,
}

impl RecordCategory {
    pub fn name(self) -> &'static str {
        match self {
            RecordCategory::Header => "header",
            RecordCategory::Data => "data",
            RecordCategory::Comment => "comment",
            RecordCategory::Navigation => "navigation",
            RecordCategory::Attitude => "attitude",
            RecordCategory::VelocityProfile => "velocity profile",
            RecordCategory::ProcessingParameters => "processing parameters",
            RecordCategory::SensorParameters => "sensor parameters",
            RecordCategory::History => "history",
            RecordCategory::NavigationError => "navigation error",
        }
    }
}

impl std::fmt::Display for RecordCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The soft, recoverable conditions produced by the averaging engine's
/// gating policy. A condition never corrupts session state; the next call
/// proceeds normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Elapsed time since the previous accepted ping exceeded the
    /// configured gap threshold.
    TimeGap,
    /// Navigation fix fell outside the configured lon/lat bounds.
    OutOfBounds,
    /// Ping time fell outside the configured time window.
    OutOfTimeBounds,
    /// Estimated speed fell below the configured minimum.
    SpeedTooSmall,
    /// A read call ended with no pings accumulated and no other cause.
    NoPingsBinned,
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Condition::TimeGap => "time gap between pings",
            Condition::OutOfBounds => "navigation outside spatial bounds",
            Condition::OutOfTimeBounds => "ping outside time bounds",
            Condition::SpeedTooSmall => "speed below configured minimum",
            Condition::NoPingsBinned => "no pings binned",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// Operation on a session that has been closed.
    #[error("Session is closed")]
    BadHandle,

    #[error("Unable to open stream: {0}")]
    Open(#[source] io::Error),

    #[error("Seek failed: {0}")]
    Seek(#[source] io::Error),

    #[error("Flush failed on close: {0}")]
    Flush(#[source] io::Error),

    /// A journal append or record encode could not be durably written.
    /// The caller must not assume the write took effect.
    #[error("Write failed: {0}")]
    Write(#[source] io::Error),

    /// End of stream reached cleanly at a record boundary. Expected
    /// terminal condition for sequential readers.
    #[error("End of data")]
    Eof,

    /// Unknown format identifier passed to the registry.
    #[error("Unsupported format id {0}")]
    UnsupportedFormat(i32),

    /// A record tag no codec in this build recognizes.
    #[error("Unrecognized record id 0x{0:04x}")]
    UnrecognizedRecord(u16),

    /// The record's declared size disagrees with its content.
    #[error("Record size mismatch: declared {declared}, found {found}")]
    SizeMismatch { declared: usize, found: usize },

    /// A decode target array is smaller than the record requires.
    #[error("Insufficient buffer: need {needed}, have {have}")]
    InsufficientBuffer { needed: usize, have: usize },

    /// Payload checksum did not verify (for formats that define one).
    #[error("Record checksum mismatch: stored 0x{stored:08x}, computed 0x{computed:08x}")]
    Checksum { stored: u32, computed: u32 },

    /// A record of the named category failed to decode.
    #[error("Malformed {category} record: {detail}")]
    RecordDecode {
        category: RecordCategory,
        detail: String,
    },

    /// A soft gating condition that prevented any usable reading.
    #[error("{0}")]
    Soft(Condition),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// True for the soft conditions of the averaging engine's gating
    /// policy and for end-of-data. The session remains usable and the
    /// caller may issue further reads.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Soft(_) | Error::Eof)
    }

    /// The soft condition carried by this error, if any.
    pub fn condition(&self) -> Option<Condition> {
        match self {
            Error::Soft(c) => Some(*c),
            _ => None,
        }
    }

    pub(crate) fn decode(category: RecordCategory, detail: impl Into<String>) -> Self {
        Error::RecordDecode {
            category,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_conditions_are_recoverable() {
        assert!(Error::Soft(Condition::TimeGap).is_recoverable());
        assert!(Error::Soft(Condition::OutOfBounds).is_recoverable());
        assert!(Error::Eof.is_recoverable());
        assert!(!Error::BadHandle.is_recoverable());
        assert!(!Error::Checksum {
            stored: 1,
            computed: 2
        }
        .is_recoverable());
    }

    #[test]
    fn decode_errors_name_their_category() {
        let e = Error::decode(RecordCategory::VelocityProfile, "short payload");
        assert_eq!(e.to_string(), "Malformed velocity profile record: short payload");
    }
}
