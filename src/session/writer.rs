//! The write half of the session lifecycle: encode canonical records to a
//! stream one at a time through a bound codec.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::format::{get_codec_by_id, SwathCodec};
use crate::record::Record;

/// Encodes canonical records into one output stream.
///
/// `close` flushes and surfaces any flush failure; writing after close is
/// a handle error. Dropping without close loses the flush-error report,
/// so tools that care about durability call [`RecordWriter::close`].
pub struct RecordWriter<W: Write> {
    writer: Option<W>,
    codec: Box<dyn SwathCodec>,
}

impl RecordWriter<BufWriter<File>> {
    /// Create a file and bind the given format to it.
    pub fn create(path: &Path, format: i32) -> Result<Self> {
        let file = File::create(path).map_err(Error::Open)?;
        Self::new(BufWriter::new(file), format)
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn new(writer: W, format: i32) -> Result<Self> {
        let codec = get_codec_by_id(format)?;
        Ok(RecordWriter {
            writer: Some(writer),
            codec,
        })
    }

    /// Encode one record at the current stream position.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(Error::BadHandle)?;
        self.codec.encode(writer, record)
    }

    /// Flush and release the stream. Must be called exactly once.
    pub fn close(&mut self) -> Result<()> {
        let mut writer = self.writer.take().ok_or(Error::BadHandle)?;
        writer.flush().map_err(Error::Flush)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatId;
    use std::io::Cursor;

    #[test]
    fn write_after_close_is_a_handle_error() {
        let mut w = RecordWriter::new(Cursor::new(Vec::new()), FormatId::GenericSwath.id()).unwrap();
        w.write_record(&Record::Comment("ok".into())).unwrap();
        w.close().unwrap();
        match w.write_record(&Record::Comment("late".into())) {
            Err(Error::BadHandle) => {}
            other => panic!("expected BadHandle, got {other:?}"),
        }
        match w.close() {
            Err(Error::BadHandle) => {}
            other => panic!("expected BadHandle, got {other:?}"),
        }
    }

    #[test]
    fn flush_failure_surfaces_on_close() {
        struct FailingFlush;
        impl Write for FailingFlush {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "device gone"))
            }
        }
        let mut w = RecordWriter::new(FailingFlush, FormatId::GenericSwath.id()).unwrap();
        w.write_record(&Record::Comment("x".into())).unwrap();
        match w.close() {
            Err(Error::Flush(_)) => {}
            other => panic!("expected Flush, got {other:?}"),
        }
    }
}
