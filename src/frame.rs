//! Frame recovery from an unreliable serial byte stream.
//!
//! The device emits float telemetry in one of three wire formats:
//!
//! - marker-delimited binary: repeating `[3-byte marker][N x 4-byte f32]`,
//!   little-endian, N floats per frame
//! - null-delimited binary: repeating `[4 data bytes][0x00]`, one f32
//! - ascii lines: `field[;field]*\n`, decimal literals, optionally tagged
//!   with a leading `:`
//!
//! The stream may start mid-frame, drop bytes, or interleave garbage, so
//! [`FrameRecoverer`] accumulates bytes per the configured
//! [`FramingPolicy`] and throws the accumulator away whenever alignment is
//! lost, picking the frame boundary back up from the next marker or
//! terminator. Corrupt input never escapes as an error; only losing the
//! byte source itself ends the read loop.
use anyhow::{Context, Result, bail};
use std::collections::VecDeque;
use std::io::ErrorKind;
use tracing::{debug, warn};

use crate::record::Record;
use crate::source::ByteSource;

/// Bytes per encoded float field.
pub const FLOAT_WIDTH: usize = 4;

/// Defensive cap on one ascii line. A line still unterminated at this length
/// is treated as corruption and discarded up to the next terminator.
pub const MAX_LINE_BYTES: usize = 4096;

/// Wire format selection plus the expected record shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingPolicy {
    /// Repeating `[marker][arity x 4-byte little-endian f32]`.
    Marker { marker: [u8; 3], arity: usize },
    /// Repeating `[4 data bytes][0x00 terminator]`, one float per frame.
    NullDelimited,
    /// Separator-split decimal fields, one line per record. `arity` of
    /// `Some(n)` rejects lines that do not carry exactly `n` fields.
    Ascii { separator: u8, arity: Option<usize> },
}

impl FramingPolicy {
    /// Marker-delimited policy; the marker must be exactly 3 bytes.
    pub fn marker(marker: &[u8], arity: usize) -> Result<Self> {
        if marker.len() != 3 {
            bail!("frame marker must be exactly 3 bytes, got {}", marker.len());
        }
        if arity == 0 {
            bail!("marker frames must carry at least one float");
        }
        let mut m = [0u8; 3];
        m.copy_from_slice(marker);
        Ok(Self::Marker { marker: m, arity })
    }
}

/// Decide whether a marker-split part extends the pending frame bytes.
///
/// A part is kept while the accumulated length stays within one frame's
/// width; a part that would overflow the frame means the stream slipped and
/// the accumulator must be discarded.
pub fn accepts_part(pending_len: usize, part_len: usize, frame_len: usize) -> bool {
    pending_len + part_len <= frame_len
}

/// Turns chunks read from a byte source into decoded [`Record`]s.
///
/// One blocking read per iteration, synchronous decode, no I/O beyond the
/// read itself. The accumulator state lives here and nowhere else; it is
/// cleared on every decode and on every detected resync.
pub struct FrameRecoverer<S> {
    source: S,
    policy: FramingPolicy,
    /// Marker scheme: partially accumulated frame bytes.
    pending: Vec<u8>,
    /// Decoded but not yet returned records (one chunk can complete
    /// several marker frames).
    ready: VecDeque<Record>,
    /// Null scheme: rolling 4-slot buffer and its monotonic write counter.
    slots: [u8; FLOAT_WIDTH],
    slot_count: usize,
    /// Ascii scheme: discarding an oversized line until its terminator.
    skip_line: bool,
}

impl<S: ByteSource> FrameRecoverer<S> {
    pub fn new(source: S, policy: FramingPolicy) -> Result<Self> {
        match policy {
            FramingPolicy::Marker { arity: 0, .. } => {
                bail!("marker frames must carry at least one float")
            }
            FramingPolicy::Ascii { arity: Some(0), .. } => {
                bail!("ascii records must expect at least one field")
            }
            _ => {}
        }
        Ok(Self {
            source,
            policy,
            pending: Vec::new(),
            ready: VecDeque::new(),
            slots: [0u8; FLOAT_WIDTH],
            slot_count: 0,
            skip_line: false,
        })
    }

    /// Next recovered record; `None` once the byte source is exhausted.
    ///
    /// Blocks on the source. Malformed input is dropped and the loop keeps
    /// reading; only an I/O failure of the source itself is an error.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            if let Some(record) = self.ready.pop_front() {
                return Ok(Some(record));
            }
            let live = match self.policy {
                FramingPolicy::Marker { marker, arity } => self.step_marker(marker, arity)?,
                FramingPolicy::NullDelimited => self.step_nulls()?,
                FramingPolicy::Ascii { separator, arity } => self.step_ascii(separator, arity)?,
            };
            if !live {
                return Ok(None);
            }
        }
    }

    fn step_marker(&mut self, marker: [u8; 3], arity: usize) -> Result<bool> {
        let frame_len = arity * FLOAT_WIDTH;
        let chunk = match self.source.read_bytes(frame_len + marker.len()) {
            Ok(chunk) => chunk,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(false),
            Err(e) => return Err(anyhow::Error::new(e).context("read from byte source")),
        };
        // Timed-out empty read: nothing to do this round.
        if chunk.is_empty() {
            return Ok(true);
        }
        let mut poisoned = false;
        for part in split_on_marker(&chunk, &marker) {
            if poisoned {
                continue;
            }
            if accepts_part(self.pending.len(), part.len(), frame_len) {
                self.pending.extend_from_slice(part);
                if self.pending.len() == frame_len {
                    self.ready.push_back(decode_frame(&self.pending));
                    self.pending.clear();
                }
            } else {
                // Once one part is misaligned the rest of the chunk is
                // assumed misaligned too; drop everything and restart at
                // the next chunk.
                debug!(
                    pending = self.pending.len(),
                    part = part.len(),
                    "misaligned part, dropping rest of chunk"
                );
                self.pending.clear();
                poisoned = true;
            }
        }
        Ok(true)
    }

    fn step_nulls(&mut self) -> Result<bool> {
        let chunk = match self.source.read_bytes(1) {
            Ok(chunk) => chunk,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(false),
            Err(e) => return Err(anyhow::Error::new(e).context("read from byte source")),
        };
        for &byte in &chunk {
            if byte == 0 {
                if self.slot_count > 0 {
                    if self.slot_count > FLOAT_WIDTH {
                        debug!(
                            bytes = self.slot_count,
                            "over-long null frame, oldest bytes were overwritten"
                        );
                    }
                    self.ready.push_back(Record::new(vec![f32::from_le_bytes(self.slots)]));
                }
                self.slot_count = 0;
            } else {
                self.slots[self.slot_count % FLOAT_WIDTH] = byte;
                self.slot_count += 1;
            }
        }
        Ok(true)
    }

    fn step_ascii(&mut self, separator: u8, arity: Option<usize>) -> Result<bool> {
        let line = match self.source.read_line() {
            Ok(line) => line,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(false),
            Err(e) => return Err(anyhow::Error::new(e).context("read line from byte source")),
        };
        if line.is_empty() {
            return Ok(true);
        }
        let terminated = line.last() == Some(&b'\n');
        if self.skip_line {
            if terminated {
                self.skip_line = false;
            }
            return Ok(true);
        }
        if !terminated && line.len() >= MAX_LINE_BYTES {
            self.skip_line = true;
            warn!(len = line.len(), "oversized line discarded, resyncing at next terminator");
            return Ok(true);
        }
        match parse_ascii_line(&line, separator, arity) {
            Ok(Some(record)) => self.ready.push_back(record),
            Ok(None) => {}
            Err(e) => warn!("discarded line: {e:#}"),
        }
        Ok(true)
    }
}

/// Split `chunk` on every occurrence of `marker`, keeping empty parts, the
/// same way `bytes::split` would.
fn split_on_marker<'a>(chunk: &'a [u8], marker: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + marker.len() <= chunk.len() {
        if &chunk[i..i + marker.len()] == marker {
            parts.push(&chunk[start..i]);
            i += marker.len();
            start = i;
        } else {
            i += 1;
        }
    }
    parts.push(&chunk[start..]);
    parts
}

/// Decode one accumulated frame as consecutive little-endian floats.
fn decode_frame(bytes: &[u8]) -> Record {
    let mut values = Vec::with_capacity(bytes.len() / FLOAT_WIDTH);
    for word in bytes.chunks_exact(FLOAT_WIDTH) {
        let mut tmp = [0u8; FLOAT_WIDTH];
        tmp.copy_from_slice(word);
        values.push(f32::from_le_bytes(tmp));
    }
    Record::new(values)
}

/// Parse one line into a record, or `Ok(None)` for a line with no fields.
///
/// Fields are whitespace-trimmed and may carry a leading `:` tag byte. Any
/// unparseable field, or a field count that misses the required arity,
/// rejects the whole line; no partial record is ever produced.
fn parse_ascii_line(line: &[u8], separator: u8, arity: Option<usize>) -> Result<Option<Record>> {
    let text = std::str::from_utf8(line).context("line is not valid text")?;
    let mut values = Vec::new();
    for field in text.split(separator as char) {
        let field = field.trim();
        let field = field.strip_prefix(':').unwrap_or(field).trim();
        if field.is_empty() {
            continue;
        }
        let value: f32 = field
            .parse()
            .with_context(|| format!("unparseable field {field:?}"))?;
        values.push(value);
    }
    if values.is_empty() {
        return Ok(None);
    }
    if let Some(want) = arity {
        if values.len() != want {
            bail!("expected {want} fields, line carried {}", values.len());
        }
    }
    Ok(Some(Record::new(values)))
}
