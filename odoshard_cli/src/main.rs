// odoshard_cli/src/main.rs

use clap::{error::ErrorKind, CommandFactory, Parser};
use odoshard_cli::{logging, prelude::*};
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    // --- 1. Configuration ---
    let config = load_config(cli.config.as_deref(), cli.seed)?;
    let schema = config.validate()?;

    // --- 2. Inputs ---
    let mut scans = cli.scans.clone();
    if let Some(dir) = &cli.scan_dir {
        scans.extend(collect_scan_dir(dir)?);
    }
    let required = schema.max_offset() + 1;
    if scans.len() < required {
        Cli::command()
            .error(
                ErrorKind::TooFewValues,
                format!(
                    "expected at least {} scan files for the window schema, got {}",
                    required,
                    scans.len()
                ),
            )
            .exit();
    }

    let poses = load_poses(&cli.pose_file)?;
    info!(
        "Loaded {} poses from {:?} and {} scans",
        poses.len(),
        cli.pose_file,
        scans.len()
    );

    // --- 3. Sweeps ---
    let source = OpenCvYamlScans;
    let store = NpyShardStore::new(&cli.output_prefix);
    let mut driver = RunDriver::new(&config, &source, store)?;
    let summary = driver.run(&poses, &scans)?;

    for sweep in &summary.sweeps {
        info!(
            "Sweep {}: skip probability {:.3}, {} cells written, {} out of range",
            sweep.sweep, sweep.skip_probability, sweep.cells_written, sweep.cells_skipped
        );
    }
    info!(
        "Wrote {} shard(s) under prefix {:?}",
        summary.sweeps.iter().map(|s| s.shards).sum::<usize>(),
        cli.output_prefix
    );
    Ok(())
}
