use clap::Parser;
use rfcapture::cdp::CdpTarget;
use rfcapture::protocol::{Request, Response};
use rfcapture::relay::CaptureRelay;
use rfcapture::sink::DirectorySink;
use rfcapture::{CaptureConfig, Viewport};
use std::path::PathBuf;

/// Capture a web page as a single PNG
#[derive(Parser, Debug)]
#[command(name = "rfcapture", version, about)]
struct Args {
    /// Page to capture
    url: String,

    /// Capture only the visible viewport instead of the full page
    #[arg(long)]
    visible: bool,

    /// JSON configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory the PNG is written to
    #[arg(short, long)]
    out: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Wait after each scroll, in milliseconds
    #[arg(long)]
    settle_ms: Option<u64>,
}

fn build_config(args: &Args) -> rfcapture::Result<CaptureConfig> {
    let mut config = match &args.config {
        Some(path) => CaptureConfig::from_json_file(path)?,
        None => CaptureConfig::default(),
    };
    if let Some(out) = &args.out {
        config.output_dir = out.clone();
    }
    if args.width.is_some() || args.height.is_some() {
        config.viewport = Viewport {
            width: args.width.unwrap_or(config.viewport.width),
            height: args.height.unwrap_or(config.viewport.height),
        };
    }
    if let Some(ms) = args.settle_ms {
        config.settle_delay_ms = ms;
    }
    config.validate()?;
    Ok(config)
}

async fn run(args: Args) -> rfcapture::Result<Response> {
    let config = build_config(&args)?;
    log::debug!("{:?}", config);

    let target = CdpTarget::launch(&config)?;
    target.load_url(&args.url).await?;

    let relay = CaptureRelay::new(config.clone(), DirectorySink::new(&config.output_dir));
    let request = if args.visible {
        Request::CaptureVisible
    } else {
        Request::CaptureFull
    };
    Ok(relay.handle(Some(&target), request).await)
}

#[tokio::main]
async fn main() {
    pretty_env_logger::init_timed();

    let args = Args::parse();
    match run(args).await {
        Ok(resp) if resp.is_success() => println!("done"),
        Ok(resp) => {
            eprintln!("{}", resp.error_message().unwrap_or("capture failed"));
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
