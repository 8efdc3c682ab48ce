use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use groundlink::frame::{FrameRecoverer, FramingPolicy};
use groundlink::logging;
use groundlink::sink::ConsolePrinter;
use groundlink::source::{ByteSource, FileSource, PortSource};
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
#[command(version, about = "Print telemetry records recovered from a serial device")]
struct Args {
    /// Serial device path (e.g. /dev/ttyUSB0), or a capture file with --replay
    device: PathBuf,

    /// Framing scheme the device is emitting
    #[arg(long, env = "GROUNDLINK_SCHEME", value_enum, default_value = "marker")]
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

    /// Emit records as JSON lines instead of space-separated values
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Treat the device argument as a captured stream to replay
    #[arg(long, default_value_t = false)]
    replay: bool,
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

fn run<S: ByteSource>(mut recoverer: FrameRecoverer<S>, json: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let mut printer = ConsolePrinter::new(stdout.lock(), json);
    while let Some(record) = recoverer.next_record()? {
        if let Err(e) = printer.print(&record) {
            warn!("console write failed: {e:#}");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let _ = dotenv();
    logging::init();
    let args = Args::parse();
    let policy = build_policy(&args)?;

    ctrlc::set_handler(|| std::process::exit(0)).ok();

    if args.replay {
        run(FrameRecoverer::new(FileSource::open(&args.device)?, policy)?, args.json)
    } else {
        run(FrameRecoverer::new(PortSource::open(&args.device)?, policy)?, args.json)
    }
}
