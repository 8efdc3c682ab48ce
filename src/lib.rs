//! Serial telemetry recovery toolkit.
//!
//! This crate provides the core types and logic used by the `groundlink`
//! printer binary and the `influx_bridge`/`chart_feed` forwarders:
//!
//! - `frame`: framing policies and the recoverer that turns an unreliable
//!   serial byte stream into decoded float records, resynchronizing after
//!   partial or misaligned chunks
//! - `record`: decoded record type and the attitude field schema
//! - `source`: blocking byte sources (serial device node, replay file)
//! - `sink`: console printer, InfluxDB line-protocol writer, chart feed
//!
//! The binaries wire one source into the recoverer and forward records to a
//! sink. Corrupt input is dropped and logged; only the loss of the byte
//! source ends a run.
pub mod frame;
pub mod logging;
pub mod record;
pub mod sink;
pub mod source;
