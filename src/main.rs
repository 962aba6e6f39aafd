use anyhow::{Context, Result};
use clap::Parser;
use rlexp::{
    cli::Args,
    config::ExperimentConfig,
    logging,
    runner::{self, RunOptions},
};

fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ExperimentConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ExperimentConfig::default(),
    };

    let options = RunOptions {
        env: args.env,
        algorithm: args.algorithm,
        number_timesteps: args.number_timesteps,
        seed: args.seed,
        config,
        save_path: args.save_path,
        log_interval: args.log_interval,
    };

    let summary = runner::run(&options)
        .with_context(|| format!("{} on {} failed", options.algorithm, options.env))?;
    println!("{summary}");
    Ok(())
}
