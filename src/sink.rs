//! Record sinks: console printer, InfluxDB line-protocol writer, chart
//! feed.
//!
//! Sinks are interchangeable endpoints for the recovery loop. A sink write
//! failure is the caller's problem to log and skip; nothing here retries.
use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::io::Write;
use time::OffsetDateTime;
use tracing::debug;

use crate::record::{ATTITUDE_FIELDS, Record};

/// Prints one line per record: space-separated values, or JSON for piping
/// into other tooling.
#[derive(Debug)]
pub struct ConsolePrinter<W> {
    out: W,
    json: bool,
}

impl<W: Write> ConsolePrinter<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self { out, json }
    }

    pub fn print(&mut self, record: &Record) -> Result<()> {
        if self.json {
            serde_json::to_writer(&mut self.out, record).context("encode record")?;
            self.out.write_all(b"\n").context("write record line")?;
        } else {
            let line = record
                .values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(self.out, "{line}").context("write record line")?;
        }
        Ok(())
    }
}

/// Writes measurement points as InfluxDB line protocol over any byte
/// transport (typically a TCP connection to a line-protocol listener).
#[derive(Debug)]
pub struct InfluxWriter<W> {
    transport: W,
}

impl<W: Write> InfluxWriter<W> {
    pub fn new(transport: W) -> Self {
        Self { transport }
    }

    /// Write one point. Non-finite field values never reach storage; a
    /// point whose fields were all non-finite is skipped entirely.
    pub fn write_point<S: AsRef<str>>(
        &mut self,
        measurement: &str,
        tags: &[(&str, &str)],
        timestamp_ns: i128,
        fields: &[(S, f64)],
    ) -> Result<()> {
        let mut body = String::new();
        for (name, value) in fields {
            if !value.is_finite() {
                continue;
            }
            if !body.is_empty() {
                body.push(',');
            }
            body.push_str(name.as_ref());
            body.push('=');
            body.push_str(&value.to_string());
        }
        if body.is_empty() {
            debug!(measurement, "point skipped, no finite fields");
            return Ok(());
        }
        let mut line = String::from(measurement);
        for (key, value) in tags {
            line.push(',');
            line.push_str(key);
            line.push('=');
            line.push_str(value);
        }
        line.push(' ');
        line.push_str(&body);
        line.push(' ');
        line.push_str(&timestamp_ns.to_string());
        line.push('\n');
        self.transport
            .write_all(line.as_bytes())
            .context("write point to transport")?;
        self.transport.flush().context("flush transport")?;
        Ok(())
    }
}

/// Influx field set for a record.
///
/// A single float is the raw pitch angle in radians, stored both raw and
/// in degrees; a ten-float frame is the full attitude sample; anything
/// else gets positional names.
pub fn point_fields(record: &Record) -> Vec<(String, f64)> {
    match record.values.as_slice() {
        [pitch] => {
            let pitch = f64::from(*pitch);
            vec![("rawpitch".to_string(), pitch), ("pitch".to_string(), pitch.to_degrees())]
        }
        values if values.len() == ATTITUDE_FIELDS.len() => ATTITUDE_FIELDS
            .iter()
            .zip(values)
            .map(|(name, v)| ((*name).to_string(), f64::from(*v)))
            .collect(),
        values => values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("f{i}"), f64::from(*v)))
            .collect(),
    }
}

/// Point timestamps carry whole-second resolution scaled to nanoseconds.
pub fn whole_second_timestamp_ns() -> i128 {
    i128::from(OffsetDateTime::now_utc().unix_timestamp()) * 1_000_000_000
}

/// Feeds a sliding window of chart points to an external plotter.
///
/// Every append rewrites the window as `series x y` lines followed by a
/// blank separator line, so a line-oriented plotter always sees the most
/// recent points.
#[derive(Debug)]
pub struct ChartFeed<W> {
    out: W,
    window: usize,
    points: VecDeque<(f64, f64)>,
}

impl<W: Write> ChartFeed<W> {
    pub fn new(out: W, window: usize) -> Self {
        Self { out, window, points: VecDeque::new() }
    }

    pub fn append_point(&mut self, series: &str, x: f64, y: f64) -> Result<()> {
        self.points.push_back((x, y));
        while self.points.len() > self.window {
            self.points.pop_front();
        }
        for (px, py) in &self.points {
            writeln!(self.out, "{series} {px} {py}").context("write chart point")?;
        }
        writeln!(self.out).context("write chart frame separator")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_prints_space_separated_values() {
        let mut out = Vec::new();
        let mut printer = ConsolePrinter::new(&mut out, false);
        printer.print(&Record::new(vec![1.5, -2.0, 0.25])).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1.5 -2 0.25\n");
    }

    #[test]
    fn console_prints_json_lines() {
        let mut out = Vec::new();
        let mut printer = ConsolePrinter::new(&mut out, true);
        printer.print(&Record::new(vec![1.0, 2.5])).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"values\":[1.0,2.5]}\n");
    }

    #[test]
    fn influx_line_protocol_shape() {
        let mut out = Vec::new();
        let mut influx = InfluxWriter::new(&mut out);
        influx
            .write_point(
                "drone",
                &[("src", "sim")],
                123_000_000_000,
                &[("rawpitch", 0.5), ("pitch", 2.0)],
            )
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "drone,src=sim rawpitch=0.5,pitch=2 123000000000\n"
        );
    }

    #[test]
    fn influx_drops_non_finite_fields() {
        let mut out = Vec::new();
        let mut influx = InfluxWriter::new(&mut out);
        influx
            .write_point("drone", &[], 0, &[("a", f64::NAN), ("b", 1.0)])
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "drone b=1 0\n");
    }

    #[test]
    fn influx_skips_point_without_finite_fields() {
        let mut out = Vec::new();
        let mut influx = InfluxWriter::new(&mut out);
        influx
            .write_point("drone", &[], 0, &[("a", f64::NAN), ("b", f64::INFINITY)])
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn point_fields_for_single_float_is_pitch_pair() {
        let fields = point_fields(&Record::new(vec![std::f32::consts::FRAC_PI_2]));
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].0, "rawpitch");
        assert_eq!(fields[1].0, "pitch");
        assert!((fields[1].1 - 90.0).abs() < 1e-4);
    }

    #[test]
    fn point_fields_for_attitude_frame_uses_schema_names() {
        let values: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let fields = point_fields(&Record::new(values));
        let names: Vec<&str> = fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ATTITUDE_FIELDS.to_vec());
        assert_eq!(fields[6].1, 6.0);
    }

    #[test]
    fn point_fields_fallback_is_positional() {
        let fields = point_fields(&Record::new(vec![1.0, 2.0, 3.0]));
        let names: Vec<&str> = fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["f0", "f1", "f2"]);
    }

    #[test]
    fn chart_feed_trims_window() {
        let mut out = Vec::new();
        let mut chart = ChartFeed::new(&mut out, 3);
        for i in 0..5 {
            chart.append_point("pitch", i as f64, (i * 2) as f64).unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        let last_block = text
            .trim_end()
            .rsplit("\n\n")
            .next()
            .unwrap();
        let lines: Vec<&str> = last_block.lines().collect();
        assert_eq!(lines, vec!["pitch 2 4", "pitch 3 6", "pitch 4 8"]);
    }
}
