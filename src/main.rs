use anyhow::Context;
use clap::Parser;
use money_notes::adapters::rejected_log::write_rejected;
use money_notes::config::{cli::import_resource, Command, EventArgs, ImportArgs};
use money_notes::core::settlement::{
    analyze_sharing, load_sharings, parse_conversion_rates, save_event, settle,
};
use money_notes::utils::{logger, validation::Validate};
use money_notes::{AppConfig, CliConfig, ImportEngine, ImportOptions, MemoryStore, NotePipeline};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI config: {:?}", cli);

    let config = if Path::new(&cli.config).exists() {
        AppConfig::from_file(&cli.config)
            .with_context(|| format!("cannot load configuration {}", cli.config))?
    } else {
        tracing::debug!("No configuration at {}, using defaults", cli.config);
        AppConfig::default()
    };
    config.validate().context("invalid configuration")?;

    let store_path = cli.store.clone().unwrap_or_else(|| config.store.path.clone());
    let store = Arc::new(
        MemoryStore::open(&store_path).with_context(|| format!("cannot open store {}", store_path))?,
    );
    config.apply_to(store.as_ref())?;

    let outcome = match &cli.command {
        Command::Import(args) => import(&config, store.clone(), args).await,
        Command::Event(args) => event(store.as_ref(), args),
    };

    store.save().with_context(|| format!("cannot save store {}", store_path))?;
    outcome
}

async fn import(config: &AppConfig, store: Arc<MemoryStore>, args: &ImportArgs) -> anyhow::Result<()> {
    let resource = import_resource(args, config, store.as_ref())?;
    tracing::info!("Importing '{}' from {}", resource.name, resource.link);

    let options = ImportOptions {
        force: args.force,
        rename: config.rename_map(),
    };
    let engine = ImportEngine::new(NotePipeline::new(store, resource, options));
    let report = engine.run().await?;

    println!(
        "Imported {} of {} new notes",
        report.imported.len(),
        report.notes.len()
    );
    for (index, error) in &report.failures {
        eprintln!("notes[{}]: {}", index + 1, error);
    }

    let rejected_dir = args
        .rejected_dir
        .clone()
        .or_else(|| config.notes.rejected_dir.clone());
    if let Some(dir) = rejected_dir {
        if let Some(path) = write_rejected(&PathBuf::from(dir), &report)? {
            println!("Rejected notes written to {}", path.display());
        }
    }
    Ok(())
}

fn event(store: &MemoryStore, args: &EventArgs) -> anyhow::Result<()> {
    let rates = parse_conversion_rates(&args.rates)?;
    let sharings = load_sharings(store, &args.tag)?;
    tracing::info!("Analyzing {} sharings tagged '{}'", sharings.len(), args.tag);

    let event = analyze_sharing(&sharings, &args.currency, &rates, args.ignore_unknown)?;
    let transfers = settle(&event.bills);
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "event": event, "transfers": transfers }))?
    );

    if let Some(name) = &args.save {
        let id = save_event(store, name, &event)?;
        tracing::info!("Saved event '{}' with id {}", name, id);
    }
    Ok(())
}
