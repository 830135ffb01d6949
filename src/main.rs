mod analyser;
mod classifier;
mod ui;

use std::path::Path;
use std::process::ExitCode;

use analyser::burst::{BurstParams, DEFAULT_GAP_MS};
use analyser::containers::NO_LABEL;
use analyser::error::Result;
use chrono::TimeDelta;
use clap::{ArgAction, Parser};
use classifier::model::GaussianNb;
use ui::output;

/// devprint turns a packet capture into per-packet and per-burst device fingerprint features
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// pcap/pcapng file to analyze
    #[arg(short = 'f', long, value_parser)]
    file: String,

    /// Device label attached to every row
    #[arg(short = 'l', long, default_value = NO_LABEL, value_parser)]
    label: String,

    /// Write the feature frame as JSON to this path
    #[arg(short = 'o', long, value_parser)]
    output: Option<String>,

    /// tshark display filter applied while reading, e.g. "eth.addr == 34:3e:a4:4d:70:b2"
    #[arg(short = 'F', long, value_parser)]
    filter: Option<String>,

    /// Burst time gap threshold in milliseconds
    #[arg(short = 'g', long, default_value_t = DEFAULT_GAP_MS, value_parser)]
    gap_ms: i64,

    /// Classifier parameter file (JSON); identifies the device when given
    #[arg(short = 'm', long, value_parser)]
    model: Option<String>,

    /// Print the feature frame as JSON instead of the summary, also when writing it with -o
    #[arg(short = 'j', long, action = ArgAction::SetTrue)]
    json: bool,

    /// Skip the terminal summary
    #[arg(short = 'q', long, action = ArgAction::SetTrue)]
    quiet: bool,
}

fn run(args: Args) -> Result<()> {
    let params = BurstParams {
        gap: TimeDelta::milliseconds(args.gap_ms),
        ..BurstParams::default()
    };

    // Fail on a bad model before spending time in tshark
    let model = match args.model.as_deref() {
        Some(path) => Some(GaussianNb::from_file(Path::new(path))?),
        None => None,
    };

    let frame = analyser::core::analyse(&args.file, args.filter.as_deref(), &args.label, &params)?;

    // ---- Output ----
    if args.json || args.output.is_some() {
        let json = output::data_as_json(&frame)?;
        if args.json {
            println!("{json}");
        }
        if let Some(out) = args.output.as_deref() {
            log::info!("Writing feature frame to {out}");
            output::data_to_file(json, Path::new(out))?;
        }
    }
    if !args.quiet && !args.json {
        output::print_results(&frame);
    }

    if let Some(model) = model {
        let identification = classifier::identify(&frame, &model)?;
        output::print_identification(&identification);
    }

    Ok(())
}

fn main() -> ExitCode {
    if let Err(err) = simple_logger::init_with_env() {
        eprintln!("Failed to initialise logger: {err}");
    }

    let args = Args::parse();
    if args.gap_ms <= 0 {
        log::error!("Gap threshold must be positive, got {} ms", args.gap_ms);
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
