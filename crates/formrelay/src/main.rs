//! `formrelay` - CLI for the form front-end and submission collector.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;

use formrelay::cli::{Cli, Command, ConfigCommand, LogCommand, RunCommand};
use formrelay::logging::Verbosity;
use formrelay::service::{self, Components};
use formrelay::{init_logging, Config, LogStore, Shutdown};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let verbosity = cli.verbosity();

    let config = Config::load_from(cli.config).context("loading configuration")?;

    match cli.command {
        Command::Serve(run) => handle_run(config, verbosity, &run, Components::Both).await,
        Command::Frontend(run) => handle_run(config, verbosity, &run, Components::FrontEnd).await,
        Command::Collector(run) => {
            handle_run(config, verbosity, &run, Components::Collector).await
        }
        Command::Log(log_cmd) => {
            init_logging(verbosity, None)?;
            handle_log(&config, log_cmd)
        }
        Command::Config(config_cmd) => {
            init_logging(verbosity, None)?;
            handle_config(&config, config_cmd)
        }
    }
}

async fn handle_run(
    mut config: Config,
    verbosity: Verbosity,
    run: &RunCommand,
    components: Components,
) -> anyhow::Result<()> {
    run.apply(&mut config);
    config.validate().context("validating configuration")?;
    init_logging(verbosity, Some(config.log_path()))
        .with_context(|| format!("opening log file {}", config.log_path().display()))?;

    let shutdown = Shutdown::new();
    let signals = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { shutdown.trigger_on_os_signal().await })
    };

    let result = service::run(&config, components, shutdown.clone()).await;

    // Stop the signal watcher if the components ended on their own.
    shutdown.trigger();
    let _ = signals.await;

    result.context("running formrelay")?;
    println!("Done!");
    Ok(())
}

fn store_for(config: &Config) -> LogStore {
    LogStore::new(&config.storage.dir, &config.storage.file)
}

fn handle_log(config: &Config, cmd: LogCommand) -> anyhow::Result<()> {
    let store = store_for(config);
    match cmd {
        LogCommand::Show { last, json } => {
            let entries = store.load()?;
            let skip = last.map_or(0, |n| entries.len().saturating_sub(n));
            let shown = &entries[skip..];

            if json {
                println!("{}", serde_json::to_string_pretty(shown)?);
            } else if shown.is_empty() {
                println!("No submissions in {}", store.path().display());
            } else {
                for entry in shown {
                    println!("[{}]", entry.timestamp);
                    for (field, value) in &entry.record {
                        println!("  {field}: {value}");
                    }
                }
            }
        }
        LogCommand::Stats { json } => {
            let stats = store.stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("formrelay log");
                println!("-------------");
                println!("File:          {}", store.path().display());
                println!("Entries:       {}", stats.total_entries);
                println!(
                    "First entry:   {}",
                    stats.first_timestamp.as_deref().unwrap_or("-")
                );
                println!(
                    "Last entry:    {}",
                    stats.last_timestamp.as_deref().unwrap_or("-")
                );
                println!("Size (bytes):  {}", stats.file_size_bytes);
                for (field, count) in &stats.field_counts {
                    println!("  {field}: {count}");
                }
            }
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[HTTP]");
                println!("  Port:               {}", config.http.port);
                println!("  Site root:          {}", config.http.root.display());
                println!();
                println!("[Relay]");
                println!("  Destination:        {}", config.relay_addr()?);
                println!("  Echo:               {}", config.collector.echo);
                println!();
                println!("[Storage]");
                println!("  Persisted log:      {}", config.storage_path().display());
                println!("  Process log:        {}", config.log_path().display());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
