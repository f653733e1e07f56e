pub mod error;
pub mod wire;
pub mod record;
pub mod nav;
pub mod format;
pub mod session;
pub mod esf;
pub mod probe;

pub use error::{Condition, Error, RecordCategory, Result};
pub use format::{get_codec, get_codec_by_id, FormatCaps, FormatId, SwathCodec};
pub use record::{BeamFlag, Ping, Record, RecordKind};
pub use session::{Reading, RecordWriter, Session, SessionConfig};
pub use esf::{EditAction, EsfFile};
pub use probe::{probe, ProbeReport, ProbeRequirements};
