use groundlink::frame::{FrameRecoverer, FramingPolicy};
use groundlink::record::Record;
use groundlink::source::{ByteSource, FileSource};
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::Path;

/// Byte source that hands back pre-scripted chunks verbatim, then reports
/// exhaustion, so tests control chunk boundaries exactly.
struct ScriptedSource {
    chunks: VecDeque<Vec<u8>>,
}

impl ScriptedSource {
    fn new(chunks: &[&[u8]]) -> Self {
        Self { chunks: chunks.iter().map(|c| c.to_vec()).collect() }
    }
}

impl ByteSource for ScriptedSource {
    fn read_bytes(&mut self, _n: usize) -> io::Result<Vec<u8>> {
        self.chunks
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "script finished"))
    }

    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        self.read_bytes(0)
    }
}

fn float_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn drain<S: ByteSource>(mut recoverer: FrameRecoverer<S>) -> Vec<Record> {
    let mut out = Vec::new();
    while let Some(record) = recoverer.next_record().unwrap() {
        out.push(record);
    }
    out
}

fn replay_marker_file(path: &Path, arity: usize) -> Vec<Record> {
    let source = FileSource::open(path).unwrap();
    let policy = FramingPolicy::marker(b"lol", arity).unwrap();
    drain(FrameRecoverer::new(source, policy).unwrap())
}

#[test]
fn end_to_end_frame_split_across_chunks() {
    // One frame split at float 7 of 10, the second frame arriving whole in
    // the same chunk as the first frame's tail.
    let first: Vec<f32> = (0..10).map(|i| i as f32 * 1.5 - 3.0).collect();
    let second: Vec<f32> = (0..10).map(|i| 100.0 - i as f32).collect();
    let first_bytes = float_bytes(&first);

    let mut chunk1 = b"lol".to_vec();
    chunk1.extend_from_slice(&first_bytes[..28]);
    let mut chunk2 = first_bytes[28..].to_vec();
    chunk2.extend_from_slice(b"lol");
    chunk2.extend_from_slice(&float_bytes(&second));

    let source = ScriptedSource::new(&[&chunk1, &chunk2]);
    let policy = FramingPolicy::marker(b"lol", 10).unwrap();
    let records = drain(FrameRecoverer::new(source, policy).unwrap());
    assert_eq!(records, vec![Record::new(first), Record::new(second)]);
}

#[test]
fn corrupt_chunk_resyncs_on_next_chunk() {
    let good: Vec<f32> = (0..10).map(|i| i as f32 + 0.25).collect();
    let good_bytes = float_bytes(&good);

    // truncated frame then a full frame in the same chunk: both lost
    let mut chunk1 = b"lol".to_vec();
    chunk1.extend_from_slice(&good_bytes[..12]);
    chunk1.extend_from_slice(b"lol");
    chunk1.extend_from_slice(&good_bytes);
    // the following chunk decodes normally
    let mut chunk2 = b"lol".to_vec();
    chunk2.extend_from_slice(&good_bytes);

    let source = ScriptedSource::new(&[&chunk1, &chunk2]);
    let policy = FramingPolicy::marker(b"lol", 10).unwrap();
    let records = drain(FrameRecoverer::new(source, policy).unwrap());
    assert_eq!(records, vec![Record::new(good)]);
}

#[test]
fn marker_file_replay_emits_one_record_per_frame() {
    let frames: Vec<Vec<f32>> = vec![
        (0..10).map(|i| i as f32).collect(),
        (0..10).map(|i| -(i as f32) / 4.0).collect(),
        // non-finite values decode like any others
        {
            let mut v: Vec<f32> = (0..10).map(|i| i as f32 * 2.0).collect();
            v[3] = f32::INFINITY;
            v
        },
    ];
    let mut stream = Vec::new();
    for frame in &frames {
        stream.extend_from_slice(b"lol");
        stream.extend_from_slice(&float_bytes(frame));
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.bin");
    fs::write(&path, &stream).unwrap();

    let records = replay_marker_file(&path, 10);
    let want: Vec<Record> = frames.into_iter().map(Record::new).collect();
    assert_eq!(records, want);
}

#[test]
fn replay_is_idempotent() {
    let frames: Vec<Vec<f32>> = (0..5)
        .map(|k| (0..9).map(|i| (k * 9 + i) as f32 / 3.0).collect())
        .collect();
    let mut stream = Vec::new();
    for frame in &frames {
        stream.extend_from_slice(b"lol");
        stream.extend_from_slice(&float_bytes(frame));
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.bin");
    fs::write(&path, &stream).unwrap();

    let first_run = replay_marker_file(&path, 9);
    let second_run = replay_marker_file(&path, 9);
    assert_eq!(first_run.len(), frames.len());
    assert_eq!(first_run, second_run);
}

#[test]
fn null_delimited_file_replay() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nulls.bin");
    fs::write(&path, b"\x00\x01\x02\x03\x04\x00").unwrap();

    let source = FileSource::open(&path).unwrap();
    let records = drain(FrameRecoverer::new(source, FramingPolicy::NullDelimited).unwrap());
    assert_eq!(records, vec![Record::new(vec![f32::from_le_bytes([1, 2, 3, 4])])]);
}

#[test]
fn ascii_file_replay_skips_bad_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lines.txt");
    fs::write(&path, "1.0;2.5;-3.25\n1.0;abc;3.0\n:0.5;\n").unwrap();

    let source = FileSource::open(&path).unwrap();
    let policy = FramingPolicy::Ascii { separator: b';', arity: None };
    let records = drain(FrameRecoverer::new(source, policy).unwrap());
    assert_eq!(
        records,
        vec![Record::new(vec![1.0, 2.5, -3.25]), Record::new(vec![0.5])]
    );
}
