//! Blocking byte sources feeding the frame recoverer.
//!
//! Two shapes of source exist: a live serial device node and a replay of a
//! previously captured stream. Both block on every read; there is exactly
//! one reader per source and no buffering beyond `BufReader`.
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use crate::frame::MAX_LINE_BYTES;

/// Blocking byte stream with the two read shapes the framing schemes need.
///
/// `read_bytes` returns up to `n` bytes; an empty chunk means the read
/// timed out with nothing pending and is a no-op for the recoverer. A
/// source that is permanently exhausted reports
/// `ErrorKind::UnexpectedEof`; any other error means the device is gone
/// and aborts the run.
pub trait ByteSource {
    fn read_bytes(&mut self, n: usize) -> io::Result<Vec<u8>>;

    /// Read through the next `\n` (terminator included). May return a
    /// partial line on timeout; never returns more than
    /// [`MAX_LINE_BYTES`] at once.
    fn read_line(&mut self) -> io::Result<Vec<u8>>;
}

/// A serial device node opened as a plain file.
///
/// Symbol rate and read timeout are configured on the device out-of-band
/// (e.g. `stty -F /dev/ttyUSB0 460800 raw`). A timed-out read surfaces
/// here as an empty chunk; device loss surfaces as an I/O error. For
/// regular files use [`FileSource`], which knows end-of-file from timeout.
#[derive(Debug)]
pub struct PortSource {
    reader: BufReader<File>,
}

impl PortSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open serial device {path:?}"))?;
        Ok(Self { reader: BufReader::new(file) })
    }
}

impl ByteSource for PortSource {
    fn read_bytes(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        let got = self.reader.read(&mut buf)?;
        buf.truncate(got);
        Ok(buf)
    }

    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        (&mut self.reader)
            .take(MAX_LINE_BYTES as u64)
            .read_until(b'\n', &mut line)?;
        Ok(line)
    }
}

/// Replay of a captured byte stream from disk.
///
/// End of file is reported as source exhaustion, which ends the recovery
/// loop cleanly. Replaying the same capture twice yields the same record
/// sequence.
#[derive(Debug)]
pub struct FileSource {
    reader: BufReader<File>,
}

impl FileSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open replay file {path:?}"))?;
        Ok(Self { reader: BufReader::new(file) })
    }
}

impl ByteSource for FileSource {
    fn read_bytes(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        let got = self.reader.read(&mut buf)?;
        if got == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "replay stream exhausted"));
        }
        buf.truncate(got);
        Ok(buf)
    }

    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        let got = (&mut self.reader)
            .take(MAX_LINE_BYTES as u64)
            .read_until(b'\n', &mut line)?;
        if got == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "replay stream exhausted"));
        }
        Ok(line)
    }
}
