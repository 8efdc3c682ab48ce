use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use groundlink::frame::{FrameRecoverer, FramingPolicy};
use groundlink::logging;
use groundlink::sink::ChartFeed;
use groundlink::source::PortSource;
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
#[command(version, about = "Stream a sliding window of telemetry points for a live plotter")]
struct Args {
    /// Serial device path (e.g. /dev/ttyUSB0)
    device: PathBuf,

    /// Points kept in the sliding window
    #[arg(long, default_value_t = 20)]
    window: usize,

    /// Series name written with every point
    #[arg(long, default_value = "pitch")]
    series: String,

    /// Emit raw radians instead of converting to degrees
    #[arg(long, default_value_t = false)]
    radians: bool,

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

    ctrlc::set_handler(|| std::process::exit(0)).ok();

    let stdout = std::io::stdout();
    let mut chart = ChartFeed::new(stdout.lock(), args.window);
    let mut sample = 0u64;
    while let Some(record) = recoverer.next_record()? {
        let Some(&value) = record.values.first() else {
            continue;
        };
        let y = if args.radians { f64::from(value) } else { f64::from(value).to_degrees() };
        if let Err(e) = chart.append_point(&args.series, sample as f64, y) {
            warn!("chart write failed: {e:#}");
        }
        sample += 1;
    }
    Ok(())
}
