use std::io::{Result, Write};

use flate2::write::ZlibDecoder;

use crate::counting::CountingWriter;

/// Remembers whether the wrapped sink itself rejected a write, so decode
/// failures can be told apart from destination failures.
struct SinkWatch<W> {
    inner: CountingWriter<W>,
    failed: bool,
}

impl<W: Write> Write for SinkWatch<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.inner.write(buf).inspect_err(|_| self.failed = true)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush().inspect_err(|_| self.failed = true)
    }
}

/// Streaming zlib filter: compressed bytes written in come out inflated into
/// the wrapped sink.
pub struct Inflater<W: Write> {
    decoder: ZlibDecoder<SinkWatch<W>>,
    corrupt: bool,
}

impl<W: Write> Inflater<W> {
    pub fn new(sink: W) -> Self {
        Inflater {
            decoder: ZlibDecoder::new(SinkWatch {
                inner: CountingWriter::new(sink),
                failed: false,
            }),
            corrupt: false,
        }
    }

    /// Compressed bytes consumed so far.
    pub fn total_in(&self) -> u64 {
        self.decoder.total_in()
    }

    /// Inflated bytes handed to the sink so far.
    pub fn total_out(&self) -> u64 {
        self.decoder.get_ref().inner.bytes_written()
    }

    /// True once a write failed because the compressed stream was invalid,
    /// as opposed to the sink refusing the output.
    pub fn is_corrupt(&self) -> bool {
        self.corrupt
    }

    /// True once the wrapped sink refused a write.
    pub fn sink_failed(&self) -> bool {
        self.decoder.get_ref().failed
    }

    /// Flush any buffered output and return the sink with the inflated byte count.
    pub fn finish(self) -> Result<(W, u64)> {
        let watch = self.decoder.finish()?;
        let written = watch.inner.bytes_written();
        Ok((watch.inner.into_inner(), written))
    }

    fn note_error(&mut self, err: std::io::Error) -> std::io::Error {
        if !self.sink_failed() {
            self.corrupt = true;
        }
        err
    }
}

impl<W: Write> Write for Inflater<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self.decoder.write(buf) {
            Ok(n) => Ok(n),
            Err(e) => Err(self.note_error(e)),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self.decoder.flush() {
            Ok(()) => Ok(()),
            Err(e) => Err(self.note_error(e)),
        }
    }
}
