use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::util::SubscriberInitExt;

use gbromgen::{BuildOptions, CartridgeSpec};

#[derive(Parser)]
#[command(name = "gbromgen")]
#[command(version, about = "Generate full ROM images for the Game Boy", long_about = None)]
struct Cli {
    /// Show more details (repeat for debug output)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// makebin executable to convert the Intel hex file with
    #[arg(long, default_value = "makebin")]
    makebin: PathBuf,

    /// A specification for the ROM image, or - to read it from stdin
    spec: PathBuf,
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish()
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let spec = CartridgeSpec::load(&cli.spec)
        .with_context(|| format!("failed to load {}", cli.spec.display()))?;

    let options = BuildOptions {
        makebin: cli.makebin.clone(),
    };
    let report = gbromgen::build(&spec, &options)?;

    if !report.missing.is_empty() {
        info!("{} fields left unpatched", report.missing.len());
    }
    info!("created {} ({} bytes)", spec.output.display(), report.size);
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("gbromgen: error: {:#}", e);
        std::process::exit(1);
    }
}
