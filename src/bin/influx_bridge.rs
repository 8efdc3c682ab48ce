use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use groundlink::frame::{FrameRecoverer, FramingPolicy};
use groundlink::logging;
use groundlink::sink::{ConsolePrinter, InfluxWriter, point_fields, whole_second_timestamp_ns};
use groundlink::source::PortSource;
use std::net::TcpStream;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scheme {
    /// Marker-delimited binary frames of N floats.
    Marker,
    /// Null-terminated 4-byte binary frames, one float each.
    Nulls,
    /// Separator-split ascii lines of decimal fields.
    Ascii,
}

#[derive(Debug, Parser)]
#[command(version, about = "Forward recovered telemetry records to InfluxDB as line-protocol points")]
struct Args {
    /// Serial device path (e.g. /dev/ttyUSB0)
    device: PathBuf,

    /// Line-protocol listener address
    #[arg(long, env = "INFLUX_ADDR", default_value = "127.0.0.1:8089")]
    addr: String,

    /// Measurement name for written points
    #[arg(long, env = "INFLUX_MEASUREMENT", default_value = "drone")]
    measurement: String,

    /// Framing scheme the device is emitting
    #[arg(long, env = "GROUNDLINK_SCHEME", value_enum, default_value = "nulls")]
    scheme: Scheme,

    /// Frame marker for the marker scheme (exactly 3 bytes)
    #[arg(long, env = "GROUNDLINK_MARKER", default_value = "lol")]
    marker: String,

    /// Floats per marker-delimited frame
    #[arg(long, env = "GROUNDLINK_ARITY", default_value_t = 10)]
    arity: usize,

    /// Field separator for the ascii scheme
    #[arg(long, env = "GROUNDLINK_SEPARATOR", default_value_t = ';')]
    separator: char,

    /// Require exactly this many fields per ascii line
    #[arg(long, env = "GROUNDLINK_ASCII_ARITY")]
    ascii_arity: Option<usize>,
}

fn build_policy(args: &Args) -> Result<FramingPolicy> {
    Ok(match args.scheme {
        Scheme::Marker => FramingPolicy::marker(args.marker.as_bytes(), args.arity)?,
        Scheme::Nulls => FramingPolicy::NullDelimited,
        Scheme::Ascii => {
            if !args.separator.is_ascii() {
                bail!("field separator must be a single ascii byte");
            }
            FramingPolicy::Ascii { separator: args.separator as u8, arity: args.ascii_arity }
        }
    })
}

fn main() -> Result<()> {
    let _ = dotenv();
    logging::init();
    let args = Args::parse();
    let policy = build_policy(&args)?;

    let source = PortSource::open(&args.device)?;
    let mut recoverer = FrameRecoverer::new(source, policy)?;
    let transport = TcpStream::connect(&args.addr)
        .with_context(|| format!("connect to line-protocol listener at {}", args.addr))?;
    let mut influx = InfluxWriter::new(transport);

    ctrlc::set_handler(|| std::process::exit(0)).ok();

    let stdout = std::io::stdout();
    let mut printer = ConsolePrinter::new(stdout.lock(), false);
    while let Some(record) = recoverer.next_record()? {
        if let Err(e) = printer.print(&record) {
            warn!("console write failed: {e:#}");
        }
        let fields = point_fields(&record);
        let stamp = whole_second_timestamp_ns();
        if let Err(e) = influx.write_point(&args.measurement, &[], stamp, &fields) {
            warn!("point write failed: {e:#}");
        }
    }
    Ok(())
}
