use anyhow::Context;
use clap::Parser;
use normpool::utils::{logger, validation::Validate};
use normpool::{CliConfig, LocalStorage, PlanEngine, PlannerConfig, RunSettings, SampleSheetProvider};

fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    logger::init_cli_logger(config.verbose);
    tracing::info!("starting normpool");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("configuration invalid: {e}");
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    }

    let planner_config = match &config.config {
        Some(path) => {
            PlannerConfig::from_file(path).with_context(|| format!("loading config {path}"))?
        }
        None => PlannerConfig::default(),
    };
    let (constraints, slots, buffer_labware) = planner_config.resolve(&config.protocol)?;

    let settings = RunSettings {
        method: config.protocol.clone(),
        step_id: config.step_id.clone(),
        target: config.target()?,
        constraints,
        slots,
        buffer_labware,
    };

    let provider = SampleSheetProvider::tsv(&config.samplesheet);
    let storage = LocalStorage::new(config.output_path.clone());
    let engine = PlanEngine::new(provider, storage, settings);

    match engine.run() {
        Ok(artifacts) => {
            tracing::info!("worklist generation complete");
            println!("Worklist: {}", artifacts.worklist_path);
            println!("Log: {}", artifacts.log_path);
            println!("Annotations: {}", artifacts.annotations_path);

            // Mirror the host convention: a run that produced output but
            // flagged samples exits 2 so the operator checks the log.
            if artifacts.report.has_flags() {
                eprintln!("Worklist generated with warnings, check the log file");
                std::process::exit(2);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("worklist generation failed: {e}");
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    }
}
