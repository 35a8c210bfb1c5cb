//! Print the frames of a capture file as raw protobuf field trees.
//!
//! Action prototypes are unmasked so the inner action is readable too.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;
use prost::Message;

use majsoul_rpa::codec::{dump_raw, unmask, Frame, FrameKind, Obfuscation};
use majsoul_rpa::protocol::{names, CapturedExchange};

#[derive(Parser)]
#[command(name = "frame-dump")]
#[command(about = "Dump captured Mahjong Soul WebSocket frames")]
struct Args {
    /// JSONL capture, one exchange per line
    capture: PathBuf,

    /// Only show messages whose name contains this text
    #[arg(long)]
    filter: Option<String>,

    /// Leave action payloads masked
    #[arg(long)]
    masked: bool,
}

#[derive(Clone, PartialEq, Message)]
struct ActionPrototype {
    #[prost(uint32, tag = "1")]
    step: u32,
    #[prost(string, tag = "2")]
    name: String,
    #[prost(bytes = "vec", tag = "3")]
    data: Vec<u8>,
}

fn indent(text: &str) -> String {
    text.lines().map(|line| format!("    {line}\n")).collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();

    let args = Args::parse();
    let exchanges = CapturedExchange::load_jsonl(&args.capture).await?;
    tracing::info!(count = exchanges.len(), path = %args.capture.display(), "capture loaded");

    // responses carry no name; label them after their request
    let mut requests: HashMap<u16, String> = HashMap::new();
    let mut index = 0usize;
    for exchange in exchanges {
        for frame in exchange.into_frames()? {
            index += 1;
            let parsed = match Frame::parse(&frame.payload) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(index, error = %e, "unparseable frame");
                    continue;
                }
            };
            let correlation = parsed.correlation();
            let name = match (parsed.kind(), correlation) {
                (FrameKind::Request, Some(c)) => {
                    requests.insert(c, parsed.name.clone());
                    parsed.name.clone()
                }
                (FrameKind::Response, Some(c)) => requests.remove(&c).unwrap_or_else(|| "?".into()),
                _ => parsed.name.clone(),
            };
            if args.filter.as_deref().is_some_and(|f| !name.contains(f)) {
                continue;
            }

            let kind = match parsed.kind() {
                FrameKind::Notify => "notify",
                FrameKind::Request => "request",
                FrameKind::Response => "response",
            };
            let corr = correlation.map(|c| format!(" #{c}")).unwrap_or_default();
            println!("[{index}] {} {kind}{corr} {name}", frame.direction);
            print!("{}", indent(&dump_raw(&parsed.data)));

            if parsed.kind() == FrameKind::Notify && name == names::ACTION_PROTOTYPE {
                match ActionPrototype::decode(parsed.data.as_ref()) {
                    Ok(action) => {
                        let obfuscation = if args.masked { Obfuscation::Plain } else { Obfuscation::Masked };
                        let data = unmask(&action.data, obfuscation);
                        println!("    {} (step {}):", action.name, action.step);
                        print!("{}", indent(&indent(&dump_raw(&data))));
                    }
                    Err(e) => tracing::warn!(index, error = %e, "bad action prototype"),
                }
            }
        }
    }
    Ok(())
}
